//! Overlay text supplied by the chat collaborator and the loading indicator state.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Degrees the spinner advances per tick.
pub const SPINNER_STEP_DEGREES: f64 = 10.0;
/// Interval between spinner ticks in milliseconds.
pub const SPINNER_TICK_MS: u64 = 50;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Text as painted on the page, or `None` for messages that are never shown.
    pub fn display_text(&self) -> Option<String> {
        match self.role {
            Role::System => None,
            Role::User => Some(format!("You: {}", self.content)),
            Role::Assistant => Some(format!("Assistant: {}", self.content)),
        }
    }
}

/// Messages shown over the page, plus the loading spinner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayFeed {
    messages: Vec<ChatMessage>,
    loading: bool,
    spinner_angle: f64,
}

pub type SharedOverlay = Arc<RwLock<OverlayFeed>>;

impl OverlayFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn into_shared(self) -> SharedOverlay {
        Arc::new(RwLock::new(self))
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Painted lines in order, system messages skipped.
    pub fn display_lines(&self) -> Vec<String> {
        self.messages.iter().filter_map(ChatMessage::display_text).collect()
    }

    /// Replace the messages, e.g. with those stored for a newly opened page.
    pub fn replace_messages(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
        if !loading {
            self.spinner_angle = 0.0;
        }
    }

    /// Spinner rotation in degrees, in `[0, 360)`.
    pub fn spinner_angle(&self) -> f64 {
        self.spinner_angle
    }

    pub fn advance_spinner(&mut self) {
        self.spinner_angle = (self.spinner_angle + SPINNER_STEP_DEGREES) % 360.0;
    }
}
