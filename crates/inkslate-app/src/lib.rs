//! Inkslate Application
//!
//! Headless shell around the editing session: replays recorded gesture scripts through a
//! session and render engine and exports the resulting frame.

mod app;
pub mod script;

pub use app::{App, AppConfig, AppError, AppResult, Frame};
pub use script::{Script, Step};
