//! Inactivity timer that fires once after the last poke.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

enum TimerCommand {
    Poke,
    Cancel,
    Shutdown,
}

/// Runs `on_fire` on its own thread once `window` has elapsed without a poke.
///
/// Every poke restarts the window. `cancel` disarms the timer without firing. Dropping the
/// timer stops the thread; a pending window is discarded.
pub struct DebounceTimer {
    tx: Sender<TimerCommand>,
    handle: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    pub fn spawn<F>(window: Duration, mut on_fire: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("inkslate-debounce".into())
            .spawn(move || {
                let mut deadline: Option<Instant> = None;
                loop {
                    let command = match deadline {
                        Some(at) => {
                            let wait = at.saturating_duration_since(Instant::now());
                            match rx.recv_timeout(wait) {
                                Ok(command) => command,
                                Err(RecvTimeoutError::Timeout) => {
                                    deadline = None;
                                    on_fire();
                                    continue;
                                }
                                Err(RecvTimeoutError::Disconnected) => break,
                            }
                        }
                        None => match rx.recv() {
                            Ok(command) => command,
                            Err(_) => break,
                        },
                    };

                    match command {
                        TimerCommand::Poke => deadline = Some(Instant::now() + window),
                        TimerCommand::Cancel => deadline = None,
                        TimerCommand::Shutdown => break,
                    }
                }
            });

        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn debounce thread: {}", e);
                None
            }
        };
        Self { tx, handle }
    }

    /// Restart the inactivity window.
    pub fn poke(&self) {
        let _ = self.tx.send(TimerCommand::Poke);
    }

    /// Disarm without firing.
    pub fn cancel(&self) {
        let _ = self.tx.send(TimerCommand::Cancel);
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        let _ = self.tx.send(TimerCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
