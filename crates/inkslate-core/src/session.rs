//! Editing session: shared state plus the public entry points used by the device shell.

use crate::collab::{CompletionService, Recognizer};
use crate::config::EditorConfig;
use crate::draw::RawSample;
use crate::error::{EditorError, EditorResult};
use crate::history::{History, StrokeDelta};
use crate::mode::{Eraser, InkingStyle, Mode, ToolConfig};
use crate::overlay::{ChatMessage, OverlayFeed, SharedOverlay};
use crate::page::{Page, SharedPage};
use crate::pen::PenStyle;
use crate::pipeline::{Command, Gesture, InputPipeline, PipelineSender};
use crate::recognition::{self, RecognitionOutcome};
use crate::repaint::{NullSink, RepaintRequest, RepaintSink};
use crate::signal::Broadcast;
use crate::storage::{PersistenceWorker, StorageError, StrokePersistence};
use crate::store::StrokeStore;
use crate::stroke::Stroke;
use kurbo::Vec2;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;

/// Signals published to the shell.
#[derive(Default)]
pub struct Signals {
    pub mode: Broadcast<Mode>,
    pub inking_style: Broadcast<InkingStyle>,
    pub loading: Broadcast<bool>,
}

/// State shared by the input worker, the debounce timer and collaborator threads.
///
/// Lock order is history, then page. No lock is held while a repaint is requested.
pub struct EditorContext {
    pub(crate) page: SharedPage,
    pub(crate) history: Mutex<History>,
    pub(crate) overlay: SharedOverlay,
    pub(crate) sink: Arc<dyn RepaintSink>,
    pub(crate) persistence: Option<PersistenceWorker>,
    pub(crate) signals: Signals,
    pub(crate) config: EditorConfig,
}

impl EditorContext {
    pub(crate) fn lock_history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write_page(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn read_page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commit the pending batch as one undo group and persist it. Runs on the input worker.
    pub(crate) fn commit_pending(&self) {
        let committed = {
            let mut history = self.lock_history();
            history
                .flush_pending()
                .map(|delta| (self.read_page().id.clone(), delta))
        };
        if let Some((page_id, delta)) = committed {
            self.persist(&page_id, delta);
        }
    }

    pub(crate) fn persist(&self, page_id: &str, delta: StrokeDelta) {
        if let Some(worker) = &self.persistence {
            worker.submit(page_id, delta);
        }
    }

    pub(crate) fn persist_messages(&self, page_id: &str, messages: Vec<ChatMessage>) {
        if let Some(worker) = &self.persistence {
            worker.append_messages(page_id, messages);
        }
    }

    pub(crate) fn delete_stored(&self, page_id: &str) {
        if let Some(worker) = &self.persistence {
            worker.delete_page(page_id);
        }
    }

    pub(crate) fn repaint(&self, request: RepaintRequest) {
        self.sink.request_repaint(request);
    }

    pub(crate) fn set_loading(&self, loading: bool) {
        self.overlay
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_loading(loading);
        self.signals.loading.publish(loading);
    }
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    page: SharedPage,
    config: EditorConfig,
    sink: Arc<dyn RepaintSink>,
    persistence: Option<Arc<dyn StrokePersistence>>,
    recognizer: Option<Arc<dyn Recognizer>>,
    completion: Option<Arc<dyn CompletionService>>,
    overlay: SharedOverlay,
}

impl SessionBuilder {
    pub fn page(mut self, page: Page) -> Self {
        self.page = page.into_shared();
        self
    }

    /// Edit a page that is already shared with a renderer.
    pub fn shared_page(mut self, page: SharedPage) -> Self {
        self.page = page;
        self
    }

    pub fn config(mut self, config: EditorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn repaint_sink(mut self, sink: Arc<dyn RepaintSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn persistence(mut self, backend: Arc<dyn StrokePersistence>) -> Self {
        self.persistence = Some(backend);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn completion(mut self, completion: Arc<dyn CompletionService>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn overlay(mut self, overlay: OverlayFeed) -> Self {
        self.overlay = overlay.into_shared();
        self
    }

    pub fn shared_overlay(mut self, overlay: SharedOverlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn build(self) -> EditorResult<Session> {
        self.config.validate()?;

        let mode = {
            let mut page = self.page.write().unwrap_or_else(PoisonError::into_inner);
            if page.strokes.is_empty() {
                page.strokes = StrokeStore::with_cell_size(self.config.spatial_cell_size);
            }
            page.mode
        };
        let tool = ToolConfig {
            mode,
            pen: PenStyle::default(),
            eraser: self.config.default_eraser(),
        };
        let ctx = Arc::new(EditorContext {
            page: self.page,
            history: Mutex::new(History::new(self.config.max_undo_history)),
            overlay: self.overlay,
            sink: self.sink,
            persistence: self.persistence.clone().map(PersistenceWorker::spawn),
            signals: Signals::default(),
            config: self.config,
        });
        let pipeline = InputPipeline::spawn(ctx.clone())?;

        Ok(Session {
            ctx,
            pipeline,
            tool: Mutex::new(tool),
            persistence: self.persistence,
            recognizer: self.recognizer,
            completion: self.completion,
        })
    }
}

/// One open page with its input worker.
///
/// Every mutating call is queued to the worker and returns immediately; call [`Session::sync`]
/// to wait until queued work has been applied.
pub struct Session {
    ctx: Arc<EditorContext>,
    pipeline: InputPipeline,
    tool: Mutex<ToolConfig>,
    persistence: Option<Arc<dyn StrokePersistence>>,
    recognizer: Option<Arc<dyn Recognizer>>,
    completion: Option<Arc<dyn CompletionService>>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder {
            page: Page::new("default").into_shared(),
            config: EditorConfig::default(),
            sink: Arc::new(NullSink),
            persistence: None,
            recognizer: None,
            completion: None,
            overlay: OverlayFeed::new().into_shared(),
        }
    }

    fn sender(&self) -> &PipelineSender {
        self.pipeline.sender()
    }

    fn lock_tool(&self) -> MutexGuard<'_, ToolConfig> {
        self.tool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit one gesture with the current tool configuration.
    pub fn submit(&self, samples: Vec<RawSample>) -> EditorResult<()> {
        let tool = *self.lock_tool();
        self.submit_gesture(Gesture { samples, tool })
    }

    /// Submit one gesture with an explicit tool snapshot.
    pub fn submit_gesture(&self, gesture: Gesture) -> EditorResult<()> {
        self.sender().send(Command::Gesture(gesture))
    }

    pub fn tool(&self) -> ToolConfig {
        *self.lock_tool()
    }

    pub fn inking_style(&self) -> InkingStyle {
        InkingStyle::for_config(&self.lock_tool())
    }

    /// Switch mode. Pending strokes are committed and the debounce timer is cancelled.
    pub fn set_mode(&self, mode: Mode) -> EditorResult<()> {
        let tool = {
            let mut tool = self.lock_tool();
            tool.mode = mode;
            *tool
        };
        self.ctx.signals.mode.publish(mode);
        self.ctx.signals.inking_style.publish(InkingStyle::for_config(&tool));
        self.sender().send(Command::SetMode(mode))
    }

    pub fn set_pen(&self, pen: PenStyle) {
        self.update_tool(|tool| tool.pen = pen);
    }

    pub fn set_eraser(&self, eraser: Eraser) {
        self.update_tool(|tool| tool.eraser = eraser);
    }

    fn update_tool(&self, update: impl FnOnce(&mut ToolConfig)) {
        let tool = {
            let mut tool = self.lock_tool();
            update(&mut tool);
            *tool
        };
        self.ctx.signals.inking_style.publish(InkingStyle::for_config(&tool));
    }

    pub fn undo(&self) -> EditorResult<()> {
        self.sender().send(Command::Undo)
    }

    pub fn redo(&self) -> EditorResult<()> {
        self.sender().send(Command::Redo)
    }

    pub fn move_selection(&self, delta: Vec2) -> EditorResult<()> {
        self.sender().send(Command::MoveSelection(delta))
    }

    pub fn cut_selection(&self) -> EditorResult<()> {
        self.sender().send(Command::CutSelection)
    }

    pub fn commit_selection(&self) -> EditorResult<()> {
        self.sender().send(Command::CommitSelection)
    }

    /// Called by the scrolling collaborator.
    pub fn set_scroll(&self, offset: i32) -> EditorResult<()> {
        self.sender().send(Command::SetScroll(offset))
    }

    /// Commit pending strokes now instead of waiting for the debounce window.
    pub fn commit(&self) -> EditorResult<()> {
        self.sender().send(Command::Commit)
    }

    /// Load a page and its messages from persistence on a background thread.
    ///
    /// The current page's pending strokes are committed first. An unknown page opens empty.
    /// Strokes with non-finite geometry are dropped.
    pub fn load_page(&self, page_id: &str) -> EditorResult<JoinHandle<EditorResult<usize>>> {
        let sender = self.sender().clone();
        let backend = self.persistence.clone();
        let page_id = page_id.to_string();
        std::thread::Builder::new()
            .name("inkslate-load".into())
            .spawn(move || {
                let (mut strokes, messages) = match backend {
                    Some(backend) => load_stored(backend.as_ref(), &page_id)?,
                    None => (Vec::new(), Vec::new()),
                };
                let stored = strokes.len();
                strokes.retain(Stroke::is_finite);
                if strokes.len() < stored {
                    log::warn!(
                        "Dropped {} strokes with invalid coordinates from page {}",
                        stored - strokes.len(),
                        page_id
                    );
                }
                let count = strokes.len();
                log::info!(
                    "Loaded page {} with {} strokes and {} messages",
                    page_id,
                    count,
                    messages.len()
                );
                sender.send(Command::PageLoaded {
                    page_id,
                    strokes,
                    messages,
                })?;
                Ok(count)
            })
            .map_err(|_| EditorError::WorkerStopped)
    }

    /// Delete a stored page. Deleting the open page also empties it and drops its history.
    pub fn delete_page(&self, page_id: &str) -> EditorResult<()> {
        self.sender().send(Command::DeletePage(page_id.to_string()))
    }

    /// Recognize the page's handwriting and ask the completion service for a response.
    pub fn recognize(&self) -> EditorResult<JoinHandle<RecognitionOutcome>> {
        let recognizer = self
            .recognizer
            .clone()
            .ok_or_else(|| EditorError::Config("no recognizer configured".into()))?;
        recognition::spawn(
            self.ctx.clone(),
            self.sender().clone(),
            recognizer,
            self.completion.clone(),
        )
    }

    /// Wait until every queued command has been applied and persisted.
    pub fn sync(&self) -> EditorResult<()> {
        self.sender().barrier()?;
        if let Some(worker) = &self.ctx.persistence {
            worker.flush();
        }
        Ok(())
    }

    pub fn page(&self) -> SharedPage {
        self.ctx.page.clone()
    }

    pub fn overlay(&self) -> SharedOverlay {
        self.ctx.overlay.clone()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.ctx.config
    }

    pub fn undo_depth(&self) -> usize {
        self.ctx.lock_history().undo_len()
    }

    pub fn redo_depth(&self) -> usize {
        self.ctx.lock_history().redo_len()
    }

    pub fn has_pending(&self) -> bool {
        self.ctx.lock_history().has_pending()
    }

    pub fn subscribe_mode(&self) -> Receiver<Mode> {
        self.ctx.signals.mode.subscribe()
    }

    pub fn subscribe_inking_style(&self) -> Receiver<InkingStyle> {
        self.ctx.signals.inking_style.subscribe()
    }

    pub fn subscribe_loading(&self) -> Receiver<bool> {
        self.ctx.signals.loading.subscribe()
    }
}

fn load_stored(backend: &dyn StrokePersistence, page_id: &str) -> EditorResult<(Vec<Stroke>, Vec<ChatMessage>)> {
    let strokes = match pollster::block_on(backend.load_strokes(page_id)) {
        Ok(strokes) => strokes,
        Err(StorageError::NotFound(_)) => Vec::new(),
        Err(e) => {
            log::error!("Failed to load page {}: {}", page_id, e);
            return Err(e.into());
        }
    };
    let messages = pollster::block_on(backend.load_messages(page_id)).unwrap_or_else(|e| {
        log::warn!("Failed to load messages for page {}: {}", page_id, e);
        Vec::new()
    });
    Ok((strokes, messages))
}
