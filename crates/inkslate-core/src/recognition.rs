//! Handwriting recognition followed by a remote completion.

use crate::collab::{CompletionService, Recognizer};
use crate::error::{EditorError, EditorResult};
use crate::overlay::{ChatMessage, SPINNER_TICK_MS};
use crate::pipeline::{Command, PipelineSender};
use crate::repaint::RepaintRequest;
use crate::session::EditorContext;
use crate::stroke::Stroke;
use std::sync::{Arc, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// How a recognition request ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    /// The handwriting was replaced by the exchange shown in the overlay.
    Answered { prompt: String, response: String },
    /// Completion failed or is unavailable; the recognized text is shown instead.
    RecognizedOnly { text: String },
    /// Nothing was recognized. The page is unchanged.
    Failed(String),
}

pub(crate) fn spawn(
    ctx: Arc<EditorContext>,
    sender: PipelineSender,
    recognizer: Arc<dyn Recognizer>,
    completion: Option<Arc<dyn CompletionService>>,
) -> EditorResult<JoinHandle<RecognitionOutcome>> {
    std::thread::Builder::new()
        .name("inkslate-recognize".into())
        .spawn(move || {
            ctx.set_loading(true);
            let spinner = spawn_spinner(ctx.clone());

            let outcome = run(&ctx, &sender, recognizer.as_ref(), completion.as_deref());

            ctx.set_loading(false);
            if let Some(spinner) = spinner {
                let _ = spinner.join();
            }
            ctx.repaint(RepaintRequest::full());
            outcome
        })
        .map_err(|_| EditorError::WorkerStopped)
}

fn run(
    ctx: &EditorContext,
    sender: &PipelineSender,
    recognizer: &dyn Recognizer,
    completion: Option<&dyn CompletionService>,
) -> RecognitionOutcome {
    let (page_id, strokes) = {
        let page = ctx.read_page();
        let strokes: Vec<Stroke> = page.strokes.ordered().cloned().collect();
        (page.id.clone(), strokes)
    };
    if strokes.is_empty() {
        return RecognitionOutcome::Failed("page has no strokes".into());
    }

    let text = match pollster::block_on(recognizer.recognize(strokes)) {
        Ok(text) if text.trim().is_empty() => {
            log::warn!("No text recognized on page {}", page_id);
            return RecognitionOutcome::Failed("no text recognized".into());
        }
        Ok(text) => text,
        Err(e) => {
            log::warn!("Recognition failed on page {}: {}", page_id, e);
            return RecognitionOutcome::Failed(e.to_string());
        }
    };
    log::info!("Recognized {} characters on page {}", text.len(), page_id);

    let response = match completion {
        Some(service) => pollster::block_on(service.complete(&page_id, &text)),
        None => Err(EditorError::Completion("no completion service configured".into())),
    };

    match response {
        Ok(response) => {
            if let Err(e) = sender.send(Command::ClearPage) {
                log::warn!("Could not clear page after completion: {}", e);
            }
            let exchange = vec![ChatMessage::user(text.clone()), ChatMessage::assistant(response.clone())];
            post(sender, page_id, exchange);
            RecognitionOutcome::Answered {
                prompt: text,
                response,
            }
        }
        Err(e) => {
            log::warn!("Completion failed, showing recognized text: {}", e);
            post(sender, page_id, vec![ChatMessage::user(text.clone())]);
            RecognitionOutcome::RecognizedOnly { text }
        }
    }
}

/// Queue messages behind the page edits so they land on the page they were asked about.
fn post(sender: &PipelineSender, page_id: String, messages: Vec<ChatMessage>) {
    if let Err(e) = sender.send(Command::AppendMessages { page_id, messages }) {
        log::warn!("Could not post messages: {}", e);
    }
}

/// Rotate the spinner while loading, requesting a partial refresh per tick.
fn spawn_spinner(ctx: Arc<EditorContext>) -> Option<JoinHandle<()>> {
    let spawned = std::thread::Builder::new()
        .name("inkslate-spinner".into())
        .spawn(move || {
            loop {
                std::thread::sleep(Duration::from_millis(SPINNER_TICK_MS));
                {
                    let mut overlay = ctx.overlay.write().unwrap_or_else(PoisonError::into_inner);
                    if !overlay.is_loading() {
                        break;
                    }
                    overlay.advance_spinner();
                }
                ctx.repaint(RepaintRequest::partial(None));
            }
        });
    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("Failed to spawn spinner thread: {}", e);
            None
        }
    }
}
