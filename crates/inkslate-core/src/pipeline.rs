//! Input pipeline: a worker thread that applies gestures and editing commands in order.

use crate::debounce::DebounceTimer;
use crate::draw::{RawSample, draw, page_points};
use crate::erase::erase;
use crate::error::{EditorError, EditorResult};
use crate::history::{Applied, Edit, History, Operation};
use crate::mode::{Mode, ToolConfig};
use crate::overlay::ChatMessage;
use crate::page::Page;
use crate::repaint::RepaintRequest;
use crate::select::{commit_selection, cut_selection, move_selection, select};
use crate::session::EditorContext;
use crate::store::StrokeStore;
use crate::stroke::Stroke;
use kurbo::{Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::{Arc, PoisonError};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

/// One pen-down to pen-up batch with the tool configuration captured at pen-down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gesture {
    pub samples: Vec<RawSample>,
    pub tool: ToolConfig,
}

pub(crate) enum Command {
    Gesture(Gesture),
    Undo,
    Redo,
    SetMode(Mode),
    SetScroll(i32),
    MoveSelection(Vec2),
    CutSelection,
    CommitSelection,
    /// Remove every stroke as one undo group.
    ClearPage,
    PageLoaded {
        page_id: String,
        strokes: Vec<Stroke>,
        messages: Vec<ChatMessage>,
    },
    /// Messages exchanged about `page_id`, shown only while that page is open.
    AppendMessages {
        page_id: String,
        messages: Vec<ChatMessage>,
    },
    DeletePage(String),
    Commit,
    Barrier(Sender<()>),
    Shutdown,
}

/// Cloneable handle for queuing commands to the worker.
#[derive(Clone)]
pub(crate) struct PipelineSender {
    tx: Sender<Command>,
}

impl PipelineSender {
    pub(crate) fn send(&self, command: Command) -> EditorResult<()> {
        self.tx.send(command).map_err(|_| EditorError::WorkerStopped)
    }

    /// Block until the worker has handled everything queued before this call.
    pub(crate) fn barrier(&self) -> EditorResult<()> {
        let (done_tx, done_rx) = mpsc::channel();
        self.send(Command::Barrier(done_tx))?;
        done_rx.recv().map_err(|_| EditorError::WorkerStopped)
    }
}

/// Owns the worker thread. Dropping the pipeline commits pending strokes and joins it.
pub(crate) struct InputPipeline {
    sender: PipelineSender,
    handle: Option<JoinHandle<()>>,
}

impl InputPipeline {
    pub(crate) fn spawn(ctx: Arc<EditorContext>) -> EditorResult<Self> {
        let (tx, rx) = mpsc::channel();
        // The commit is queued behind in-flight commands so deltas persist in history order
        let timer_tx = tx.clone();
        let timer = DebounceTimer::spawn(ctx.config.debounce_window(), move || {
            let _ = timer_tx.send(Command::Commit);
        });
        let handle = std::thread::Builder::new()
            .name("inkslate-input".into())
            .spawn(move || Worker { ctx, timer }.run(rx))
            .map_err(|_| EditorError::WorkerStopped)?;

        Ok(Self {
            sender: PipelineSender { tx },
            handle: Some(handle),
        })
    }

    pub(crate) fn sender(&self) -> &PipelineSender {
        &self.sender
    }
}

impl Drop for InputPipeline {
    fn drop(&mut self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct Worker {
    ctx: Arc<EditorContext>,
    timer: DebounceTimer,
}

impl Worker {
    fn run(self, rx: Receiver<Command>) {
        log::info!("Input worker started");
        while let Ok(command) = rx.recv() {
            if self.handle(command).is_break() {
                break;
            }
        }
        self.timer.cancel();
        self.ctx.commit_pending();
        log::info!("Input worker stopped");
    }

    fn handle(&self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Gesture(gesture) => self.on_gesture(gesture),
            Command::Undo => self.on_history(History::undo),
            Command::Redo => self.on_history(History::redo),
            Command::SetMode(mode) => self.on_mode(mode),
            Command::SetScroll(offset) => {
                self.ctx.write_page().set_scroll_offset(offset);
                self.ctx.repaint(RepaintRequest::full());
            }
            Command::MoveSelection(delta) => {
                self.record(|page| move_selection(page, delta), RepaintRequest::partial)
            }
            Command::CutSelection => self.record(cut_selection, RepaintRequest::partial),
            Command::CommitSelection => {
                let dirty = commit_selection(&mut *self.ctx.write_page());
                if dirty.is_some() {
                    self.ctx.repaint(RepaintRequest::partial(dirty));
                }
            }
            Command::ClearPage => self.record(clear_page, |_| RepaintRequest::full()),
            Command::PageLoaded {
                page_id,
                strokes,
                messages,
            } => self.on_page_loaded(page_id, strokes, messages),
            Command::AppendMessages { page_id, messages } => self.on_messages(page_id, messages),
            Command::DeletePage(page_id) => self.on_delete_page(page_id),
            Command::Commit => {
                self.timer.cancel();
                self.ctx.commit_pending();
            }
            Command::Barrier(done) => {
                let _ = done.send(());
            }
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Route a gesture by the mode captured in its tool snapshot.
    fn on_gesture(&self, gesture: Gesture) {
        let Gesture { samples, tool } = gesture;
        let result = {
            let mut history = self.ctx.lock_history();
            let mut page = self.ctx.write_page();
            let result = match tool.mode {
                Mode::Draw => draw(&mut page, &samples, &tool.pen),
                Mode::Erase => {
                    let path = page_points(&page, &samples);
                    Ok(erase(&mut page, &path, tool.eraser))
                }
                Mode::Select if page.mode == Mode::Select => {
                    let lasso = page_points(&page, &samples);
                    Ok(Edit {
                        operations: Vec::new(),
                        dirty: select(&mut page, &lasso),
                    })
                }
                Mode::Select => {
                    log::debug!("Ignoring lasso while the page is in {:?} mode", page.mode);
                    Ok(Edit::default())
                }
            };
            result.map(|Edit { operations, dirty }| {
                let mutated = !operations.is_empty();
                for op in operations {
                    history.push_pending(op);
                }
                (mutated, dirty)
            })
        };

        match result {
            Ok((mutated, dirty)) => {
                if mutated {
                    self.timer.poke();
                }
                if dirty.is_some() {
                    self.ctx.repaint(RepaintRequest::partial(dirty));
                }
            }
            Err(EditorError::MalformedGesture { samples }) => {
                log::debug!("Dropped {:?} gesture with {} samples", tool.mode, samples);
            }
            Err(e) => log::warn!("Gesture failed: {}", e),
        }
    }

    fn on_history(&self, step: fn(&mut History, &mut StrokeStore) -> Option<Applied>) {
        self.timer.cancel();
        let applied = {
            let mut history = self.ctx.lock_history();
            let mut page = self.ctx.write_page();
            let applied = step(&mut *history, &mut page.strokes);
            if let Some(applied) = &applied {
                follow_selection(&mut page, applied);
            }
            applied.map(|a| (page.id.clone(), a))
        };
        if let Some((page_id, applied)) = applied {
            self.ctx.persist(&page_id, applied.delta);
            self.ctx.repaint(RepaintRequest::full());
        }
    }

    fn on_mode(&self, mode: Mode) {
        self.timer.cancel();
        let (page_id, delta) = {
            let mut history = self.ctx.lock_history();
            let mut page = self.ctx.write_page();
            if mode != Mode::Select {
                page.selection = None;
            }
            page.mode = mode;
            (page.id.clone(), history.flush_pending())
        };
        log::info!("Mode changed to {:?}", mode);
        if let Some(delta) = delta {
            self.ctx.persist(&page_id, delta);
        }
        self.ctx.repaint(RepaintRequest::full());
    }

    fn on_page_loaded(&self, page_id: String, strokes: Vec<Stroke>, messages: Vec<ChatMessage>) {
        self.replace_page(page_id, strokes);
        self.ctx
            .overlay
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace_messages(messages);
        self.ctx.repaint(RepaintRequest::full());
    }

    /// Swap in new page content with a fresh history, committing what the old page had pending.
    fn replace_page(&self, page_id: String, strokes: Vec<Stroke>) {
        self.timer.cancel();
        let previous = {
            let mut history = self.ctx.lock_history();
            let mut page = self.ctx.write_page();
            let delta = history.flush_pending().map(|d| (page.id.clone(), d));
            *history = History::new(self.ctx.config.max_undo_history);

            let mode = page.mode;
            *page = Page::with_store(
                page_id,
                StrokeStore::from_strokes(strokes, self.ctx.config.spatial_cell_size),
            );
            page.mode = mode;
            delta
        };
        if let Some((old_id, delta)) = previous {
            self.ctx.persist(&old_id, delta);
        }
    }

    fn on_messages(&self, page_id: String, messages: Vec<ChatMessage>) {
        let open = self.ctx.read_page().id == page_id;
        if open {
            let mut overlay = self.ctx.overlay.write().unwrap_or_else(PoisonError::into_inner);
            for message in &messages {
                overlay.push(message.clone());
            }
        } else {
            log::info!("Page {} closed before its answer arrived", page_id);
        }
        self.ctx.persist_messages(&page_id, messages);
        if open {
            self.ctx.repaint(RepaintRequest::full());
        }
    }

    /// Delete a stored page. When it is the open page, the page is emptied as well.
    fn on_delete_page(&self, page_id: String) {
        let open = self.ctx.read_page().id == page_id;
        if open {
            self.replace_page(page_id.clone(), Vec::new());
            self.ctx.overlay.write().unwrap_or_else(PoisonError::into_inner).clear();
        }
        self.ctx.delete_stored(&page_id);
        if open {
            self.ctx.repaint(RepaintRequest::full());
        }
    }

    /// Apply a selection or page edit and record it as its own undo group.
    fn record(
        &self,
        apply: impl FnOnce(&mut Page) -> Edit,
        request: impl FnOnce(Option<Rect>) -> RepaintRequest,
    ) {
        self.timer.cancel();
        let result = {
            let mut history = self.ctx.lock_history();
            let mut page = self.ctx.write_page();
            let edit = apply(&mut *page);
            if edit.is_empty() {
                None
            } else {
                let delta = history.record_group(edit.operations);
                Some((page.id.clone(), delta, edit.dirty))
            }
        };
        if let Some((page_id, delta, dirty)) = result {
            self.ctx.persist(&page_id, delta);
            self.ctx.repaint(request(dirty));
        }
    }
}

fn clear_page(page: &mut Page) -> Edit {
    page.selection = None;
    let dirty = page.strokes.bounds();
    let removed = page.strokes.drain();
    Edit {
        operations: vec![Operation::DeleteStrokes(removed)],
        dirty,
    }
}

/// Keep the selection in step with an undo or redo: drop ids that no longer exist and move
/// the lasso with its strokes.
fn follow_selection(page: &mut Page, applied: &Applied) {
    let Page {
        strokes, selection, ..
    } = page;
    if let Some(selection) = selection {
        selection.selected.retain(|id| strokes.contains(*id));
        let shift = selection.selected.iter().find_map(|id| applied.shifted.get(id)).copied();
        if let Some(shift) = shift {
            selection.translate(shift);
        }
    }
}
