//! In-memory persistence.

use super::{BoxFuture, StorageError, StorageResult, StrokePersistence, apply_delta};
use crate::history::StrokeDelta;
use crate::overlay::ChatMessage;
use crate::stroke::Stroke;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct StoredPage {
    strokes: Vec<Stroke>,
    messages: Vec<ChatMessage>,
}

/// In-memory persistence for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryPersistence {
    pages: RwLock<HashMap<String, StoredPage>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a page with strokes, replacing any existing strokes.
    pub fn with_page(self, page_id: &str, strokes: Vec<Stroke>) -> Self {
        if let Ok(mut pages) = self.pages.write() {
            pages.entry(page_id.to_string()).or_default().strokes = strokes;
        }
        self
    }

    /// Seed a page with messages, replacing any existing messages.
    pub fn with_messages(self, page_id: &str, messages: Vec<ChatMessage>) -> Self {
        if let Ok(mut pages) = self.pages.write() {
            pages.entry(page_id.to_string()).or_default().messages = messages;
        }
        self
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<String, StoredPage>>> {
        self.pages
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<String, StoredPage>>> {
        self.pages
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))
    }
}

impl StrokePersistence for MemoryPersistence {
    fn load_strokes(&self, page_id: &str) -> BoxFuture<'_, StorageResult<Vec<Stroke>>> {
        let page_id = page_id.to_string();
        Box::pin(async move {
            let pages = self.read()?;
            match pages.get(&page_id) {
                Some(page) => Ok(page.strokes.clone()),
                None => Err(StorageError::NotFound(page_id)),
            }
        })
    }

    fn persist(&self, page_id: &str, delta: &StrokeDelta) -> BoxFuture<'_, StorageResult<()>> {
        let page_id = page_id.to_string();
        let delta = delta.clone();
        Box::pin(async move {
            let mut pages = self.write()?;
            apply_delta(&mut pages.entry(page_id).or_default().strokes, &delta);
            Ok(())
        })
    }

    fn load_messages(&self, page_id: &str) -> BoxFuture<'_, StorageResult<Vec<ChatMessage>>> {
        let page_id = page_id.to_string();
        Box::pin(async move {
            let pages = self.read()?;
            Ok(pages.get(&page_id).map(|page| page.messages.clone()).unwrap_or_default())
        })
    }

    fn append_messages(&self, page_id: &str, messages: &[ChatMessage]) -> BoxFuture<'_, StorageResult<()>> {
        let page_id = page_id.to_string();
        let messages = messages.to_vec();
        Box::pin(async move {
            let mut pages = self.write()?;
            pages.entry(page_id).or_default().messages.extend(messages);
            Ok(())
        })
    }

    fn delete_page(&self, page_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let page_id = page_id.to_string();
        Box::pin(async move {
            self.write()?.remove(&page_id);
            Ok(())
        })
    }

    fn list_pages(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move { Ok(self.read()?.keys().cloned().collect()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{PenType, SerializableColor, StrokePoint};
    use pollster::block_on;

    fn stroke(x: f64) -> Stroke {
        Stroke::new(
            PenType::Ballpen,
            SerializableColor::black(),
            2.0,
            vec![StrokePoint::new(x, 0.0, 1.0, 0), StrokePoint::new(x, 10.0, 1.0, 1)],
        )
    }

    #[test]
    fn test_persist_and_load() {
        let storage = MemoryPersistence::new();
        let mut delta = StrokeDelta::default();
        delta.upsert(stroke(0.0));
        delta.upsert(stroke(5.0));

        block_on(storage.persist("page", &delta)).unwrap();
        let loaded = block_on(storage.load_strokes("page")).unwrap();
        assert_eq!(loaded, delta.upserted);
    }

    #[test]
    fn test_not_found() {
        let storage = MemoryPersistence::new();
        let result = block_on(storage.load_strokes("nonexistent"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_messages_append_per_page() {
        let storage = MemoryPersistence::new().with_page("a", vec![stroke(0.0)]);
        block_on(storage.append_messages("a", &[ChatMessage::user("hi")])).unwrap();
        block_on(storage.append_messages("a", &[ChatMessage::assistant("hello")])).unwrap();

        assert_eq!(
            block_on(storage.load_messages("a")).unwrap(),
            vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]
        );
        assert!(block_on(storage.load_messages("b")).unwrap().is_empty());
        // Appending messages leaves the strokes alone
        assert_eq!(block_on(storage.load_strokes("a")).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_and_list() {
        let storage = MemoryPersistence::new()
            .with_page("a", vec![stroke(0.0)])
            .with_page("b", Vec::new());

        let mut list = block_on(storage.list_pages()).unwrap();
        list.sort();
        assert_eq!(list, vec!["a".to_string(), "b".to_string()]);

        block_on(storage.delete_page("a")).unwrap();
        assert_eq!(block_on(storage.list_pages()).unwrap(), vec!["b".to_string()]);
    }
}
