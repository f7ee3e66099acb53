//! Stroke persistence backends.

mod file;
mod memory;
mod worker;

pub use file::FilePersistence;
pub use memory::MemoryPersistence;
pub use worker::PersistenceWorker;

use crate::history::StrokeDelta;
use crate::overlay::ChatMessage;
use crate::stroke::Stroke;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Page not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future returned by collaborators. Driven on worker threads, so it must be `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable store of the strokes of each page and the exchange shown over it.
///
/// Implementations only ever see whole strokes: a delta upserts strokes by id and deletes ids.
/// Messages are append-only.
pub trait StrokePersistence: Send + Sync {
    /// Load the strokes of a page in paint order. Unknown pages yield `NotFound`.
    fn load_strokes(&self, page_id: &str) -> BoxFuture<'_, StorageResult<Vec<Stroke>>>;

    /// Apply a committed change to a page, creating the page if needed.
    fn persist(&self, page_id: &str, delta: &StrokeDelta) -> BoxFuture<'_, StorageResult<()>>;

    /// Load the messages of a page in the order they were appended. Unknown pages have none.
    fn load_messages(&self, page_id: &str) -> BoxFuture<'_, StorageResult<Vec<ChatMessage>>>;

    /// Append messages to a page, creating the page if needed.
    fn append_messages(&self, page_id: &str, messages: &[ChatMessage]) -> BoxFuture<'_, StorageResult<()>>;

    /// Remove a page with its strokes and messages.
    fn delete_page(&self, page_id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List the ids of every stored page.
    fn list_pages(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;
}

/// Apply `delta` to a persisted stroke list.
///
/// Upserted strokes replace an existing stroke with the same id in place, otherwise they are
/// appended.
pub(crate) fn apply_delta(strokes: &mut Vec<Stroke>, delta: &StrokeDelta) {
    strokes.retain(|s| !delta.deleted.contains(&s.id()));
    for stroke in &delta.upserted {
        match strokes.iter_mut().find(|s| s.id() == stroke.id()) {
            Some(existing) => *existing = stroke.clone(),
            None => strokes.push(stroke.clone()),
        }
    }
}
