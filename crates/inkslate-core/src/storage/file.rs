//! File-based persistence: one JSON document per page.

use super::{BoxFuture, StorageError, StorageResult, StrokePersistence, apply_delta};
use crate::history::StrokeDelta;
use crate::overlay::ChatMessage;
use crate::stroke::Stroke;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// On-disk layout of one page.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PageFile {
    page_id: String,
    strokes: Vec<Stroke>,
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

/// Stores each page as `<base>/<sanitized id>.json`.
pub struct FilePersistence {
    base_path: PathBuf,
    /// Serializes read-modify-write cycles of `persist`.
    write_lock: Mutex<()>,
}

impl FilePersistence {
    /// Create file persistence in `base_path`, creating the directory if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    /// Persistence in the platform data directory, e.g. `~/.local/share/inkslate/pages/`.
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("inkslate").join("pages"))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Read-modify-write one page file, starting from an empty page when none exists.
    fn update(&self, page_id: &str, change: impl FnOnce(&mut PageFile)) -> StorageResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        let path = self.page_path(page_id);
        let mut page = match read_page(&path, page_id) {
            Ok(page) => page,
            Err(StorageError::NotFound(_)) => PageFile {
                page_id: page_id.to_string(),
                ..PageFile::default()
            },
            Err(e) => return Err(e),
        };
        change(&mut page);
        write_page(&path, &page)
    }

    fn page_path(&self, page_id: &str) -> PathBuf {
        let safe_id: String = page_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe_id))
    }
}

fn read_page(path: &Path, page_id: &str) -> StorageResult<PageFile> {
    if !path.exists() {
        return Err(StorageError::NotFound(page_id.to_string()));
    }
    let json = fs::read_to_string(path)
        .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&json).map_err(|e| {
        StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e))
    })
}

/// Write through a temporary file so a crash never leaves a truncated page behind.
fn write_page(path: &Path, page: &PageFile) -> StorageResult<()> {
    let json = serde_json::to_string(page).map_err(|e| StorageError::Serialization(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| StorageError::Io(format!("Failed to replace {}: {}", path.display(), e)))
}

impl StrokePersistence for FilePersistence {
    fn load_strokes(&self, page_id: &str) -> BoxFuture<'_, StorageResult<Vec<Stroke>>> {
        let path = self.page_path(page_id);
        let page_id = page_id.to_string();
        Box::pin(async move { read_page(&path, &page_id).map(|page| page.strokes) })
    }

    fn persist(&self, page_id: &str, delta: &StrokeDelta) -> BoxFuture<'_, StorageResult<()>> {
        let page_id = page_id.to_string();
        let delta = delta.clone();
        Box::pin(async move { self.update(&page_id, |page| apply_delta(&mut page.strokes, &delta)) })
    }

    fn load_messages(&self, page_id: &str) -> BoxFuture<'_, StorageResult<Vec<ChatMessage>>> {
        let path = self.page_path(page_id);
        let page_id = page_id.to_string();
        Box::pin(async move {
            match read_page(&path, &page_id) {
                Ok(page) => Ok(page.messages),
                Err(StorageError::NotFound(_)) => Ok(Vec::new()),
                Err(e) => Err(e),
            }
        })
    }

    fn append_messages(&self, page_id: &str, messages: &[ChatMessage]) -> BoxFuture<'_, StorageResult<()>> {
        let page_id = page_id.to_string();
        let messages = messages.to_vec();
        Box::pin(async move { self.update(&page_id, |page| page.messages.extend(messages)) })
    }

    fn delete_page(&self, page_id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.page_path(page_id);
        Box::pin(async move {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                })?;
            }
            Ok(())
        })
    }

    fn list_pages(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        let base = self.base_path.clone();
        Box::pin(async move {
            if !base.exists() {
                return Ok(vec![]);
            }
            let entries = fs::read_dir(&base)
                .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;

            let mut ids = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "json") {
                    // The stored id may differ from the sanitized file name
                    if let Ok(json) = fs::read_to_string(&path) {
                        if let Ok(page) = serde_json::from_str::<PageFile>(&json) {
                            ids.push(page.page_id);
                        }
                    }
                }
            }
            Ok(ids)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{PenType, SerializableColor, StrokePoint};
    use pollster::block_on;
    use tempfile::tempdir;

    fn stroke(x: f64) -> Stroke {
        Stroke::new(
            PenType::Fountain,
            SerializableColor::new(20, 40, 60, 255),
            4.0,
            vec![StrokePoint::new(x, 0.0, 900.0, 0), StrokePoint::new(x, 10.0, 1800.0, 16)],
        )
    }

    #[test]
    fn test_file_persistence_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = FilePersistence::new(dir.path().to_path_buf()).unwrap();

        let a = stroke(0.0);
        let b = stroke(10.0);
        let mut delta = StrokeDelta::default();
        delta.upsert(a.clone());
        delta.upsert(b.clone());
        block_on(storage.persist("page-1", &delta)).unwrap();

        let mut delete = StrokeDelta::default();
        delete.delete(a.id());
        block_on(storage.persist("page-1", &delete)).unwrap();

        let loaded = block_on(storage.load_strokes("page-1")).unwrap();
        assert_eq!(loaded, vec![b]);
    }

    #[test]
    fn test_file_persistence_not_found() {
        let dir = tempdir().unwrap();
        let storage = FilePersistence::new(dir.path().to_path_buf()).unwrap();
        let result = block_on(storage.load_strokes("missing"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_file_persistence_sanitizes_id() {
        let dir = tempdir().unwrap();
        let storage = FilePersistence::new(dir.path().to_path_buf()).unwrap();

        let mut delta = StrokeDelta::default();
        delta.upsert(stroke(0.0));
        block_on(storage.persist("notes/2024:page*1", &delta)).unwrap();

        assert_eq!(block_on(storage.load_strokes("notes/2024:page*1")).unwrap().len(), 1);
        assert_eq!(
            block_on(storage.list_pages()).unwrap(),
            vec!["notes/2024:page*1".to_string()]
        );
    }

    #[test]
    fn test_messages_survive_stroke_updates() {
        let dir = tempdir().unwrap();
        let storage = FilePersistence::new(dir.path().to_path_buf()).unwrap();
        assert!(block_on(storage.load_messages("p")).unwrap().is_empty());

        block_on(storage.append_messages("p", &[ChatMessage::user("2 + 2")])).unwrap();
        let mut delta = StrokeDelta::default();
        delta.upsert(stroke(0.0));
        block_on(storage.persist("p", &delta)).unwrap();
        block_on(storage.append_messages("p", &[ChatMessage::assistant("4")])).unwrap();

        let reopened = FilePersistence::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(
            block_on(reopened.load_messages("p")).unwrap(),
            vec![ChatMessage::user("2 + 2"), ChatMessage::assistant("4")]
        );
        assert_eq!(block_on(reopened.load_strokes("p")).unwrap().len(), 1);
    }

    #[test]
    fn test_file_persistence_delete() {
        let dir = tempdir().unwrap();
        let storage = FilePersistence::new(dir.path().to_path_buf()).unwrap();
        block_on(storage.persist("p", &StrokeDelta::default())).unwrap();
        block_on(storage.delete_page("p")).unwrap();
        assert!(block_on(storage.list_pages()).unwrap().is_empty());
    }
}
