//! Traits for the handwriting recognizer and the remote completion service.

use crate::error::EditorResult;
use crate::storage::BoxFuture;
use crate::stroke::Stroke;

/// Converts handwriting into text.
pub trait Recognizer: Send + Sync {
    /// Recognize `strokes`, a read-only snapshot of the page in paint order.
    fn recognize(&self, strokes: Vec<Stroke>) -> BoxFuture<'_, EditorResult<String>>;
}

/// Produces a response for recognized text.
pub trait CompletionService: Send + Sync {
    fn complete(&self, page_id: &str, prompt: &str) -> BoxFuture<'_, EditorResult<String>>;
}
