//! Inkslate Core Library
//!
//! Stroke model, hit-testing, undo history and the input pipeline of the inkslate e-ink
//! annotation surface.

pub mod collab;
pub mod config;
pub mod debounce;
pub mod draw;
pub mod erase;
pub mod error;
pub mod geometry;
pub mod history;
pub mod mode;
pub mod overlay;
pub mod page;
pub mod pen;
pub mod pipeline;
pub mod recognition;
pub mod repaint;
pub mod select;
pub mod session;
pub mod signal;
pub mod storage;
pub mod store;
pub mod stroke;

pub use collab::{CompletionService, Recognizer};
pub use config::EditorConfig;
pub use draw::RawSample;
pub use error::{EditorError, EditorResult};
pub use history::{Edit, History, Operation, OperationGroup, StrokeDelta};
pub use mode::{Eraser, InkingStyle, Mode, ToolConfig};
pub use overlay::{ChatMessage, OverlayFeed, Role, SharedOverlay};
pub use page::{Page, SharedPage};
pub use pen::{PenStyle, PressureCurve};
pub use pipeline::Gesture;
pub use recognition::RecognitionOutcome;
pub use repaint::{NullSink, RefreshMode, RepaintRequest, RepaintSink};
pub use select::SelectionState;
pub use session::{Session, SessionBuilder};
pub use signal::Broadcast;
pub use storage::{FilePersistence, MemoryPersistence, StorageError, StrokePersistence};
pub use store::StrokeStore;
pub use stroke::{PenType, SerializableColor, Stroke, StrokeId, StrokePoint};
