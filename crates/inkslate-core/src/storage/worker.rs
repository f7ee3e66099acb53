//! Background thread that applies committed deltas in order.

use super::StrokePersistence;
use crate::history::StrokeDelta;
use crate::overlay::ChatMessage;
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

enum PersistCommand {
    Persist { page_id: String, delta: StrokeDelta },
    AppendMessages { page_id: String, messages: Vec<ChatMessage> },
    DeletePage(String),
    Barrier(Sender<()>),
    Shutdown,
}

/// Serializes persistence calls on a dedicated thread.
///
/// Queuing never blocks the caller. Failures are logged and the change is dropped, so the
/// in-memory page stays authoritative for the session.
pub struct PersistenceWorker {
    tx: Sender<PersistCommand>,
    handle: Option<JoinHandle<()>>,
}

impl PersistenceWorker {
    pub fn spawn(backend: Arc<dyn StrokePersistence>) -> Self {
        let (tx, rx) = mpsc::channel::<PersistCommand>();
        let handle = std::thread::Builder::new()
            .name("inkslate-persist".into())
            .spawn(move || {
                while let Ok(command) = rx.recv() {
                    match command {
                        PersistCommand::Persist { page_id, delta } => {
                            log::debug!(
                                "Persisting {} upserts and {} deletes for page {}",
                                delta.upserted.len(),
                                delta.deleted.len(),
                                page_id
                            );
                            if let Err(e) = pollster::block_on(backend.persist(&page_id, &delta)) {
                                log::error!("Failed to persist page {}: {}", page_id, e);
                            }
                        }
                        PersistCommand::AppendMessages { page_id, messages } => {
                            if let Err(e) = pollster::block_on(backend.append_messages(&page_id, &messages)) {
                                log::error!("Failed to store messages of page {}: {}", page_id, e);
                            }
                        }
                        PersistCommand::DeletePage(page_id) => {
                            log::info!("Deleting stored page {}", page_id);
                            if let Err(e) = pollster::block_on(backend.delete_page(&page_id)) {
                                log::error!("Failed to delete page {}: {}", page_id, e);
                            }
                        }
                        PersistCommand::Barrier(done) => {
                            let _ = done.send(());
                        }
                        PersistCommand::Shutdown => break,
                    }
                }
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn persistence thread: {}", e);
                None
            }
        };
        Self { tx, handle }
    }

    /// Queue a delta. Empty deltas are ignored.
    pub fn submit(&self, page_id: &str, delta: StrokeDelta) {
        if delta.is_empty() {
            return;
        }
        let command = PersistCommand::Persist {
            page_id: page_id.to_string(),
            delta,
        };
        self.send(command, page_id);
    }

    pub fn append_messages(&self, page_id: &str, messages: Vec<ChatMessage>) {
        if messages.is_empty() {
            return;
        }
        let command = PersistCommand::AppendMessages {
            page_id: page_id.to_string(),
            messages,
        };
        self.send(command, page_id);
    }

    /// Queue removal of a stored page. Runs after every change queued before it.
    pub fn delete_page(&self, page_id: &str) {
        self.send(PersistCommand::DeletePage(page_id.to_string()), page_id);
    }

    fn send(&self, command: PersistCommand, page_id: &str) {
        if self.tx.send(command).is_err() {
            log::warn!("Persistence worker stopped; dropping change for page {}", page_id);
        }
    }

    /// Block until every delta queued before this call has been handled.
    pub fn flush(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        if self.tx.send(PersistCommand::Barrier(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        let _ = self.tx.send(PersistCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
