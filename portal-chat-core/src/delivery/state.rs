//! Assistant reply state machine
//!
//! ```text
//! Pending ──start──▶ Streaming ──last chunk──▶ Completed
//!    │                   │
//!    └──────cancel───────┴──────cancel───────▶ Cancelled
//! ```
//!
//! `Completed` and `Cancelled` are terminal.

use serde::Serialize;

/// Lifecycle of a single assistant reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyState {
    /// Placeholder not appended yet
    Pending,
    /// Placeholder appended, text growing each tick
    Streaming,
    /// Full text delivered
    Completed,
    /// Stopped by the user or superseded by a newer reply
    Cancelled,
}

impl ReplyState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReplyState::Completed | ReplyState::Cancelled)
    }

    pub fn is_in_flight(self) -> bool {
        !self.is_terminal()
    }
}

/// Incremental delivery of one fixed reply text
#[derive(Debug, Clone)]
pub struct ReplyDelivery {
    generation: u64,
    session_id: String,
    message_id: Option<String>,
    full_text: String,
    /// Byte offset of the emitted prefix; always on a char boundary
    cursor: usize,
    chunk_chars: usize,
    state: ReplyState,
}

impl ReplyDelivery {
    pub fn new(
        generation: u64,
        session_id: impl Into<String>,
        full_text: impl Into<String>,
        chunk_chars: usize,
    ) -> Self {
        Self {
            generation,
            session_id: session_id.into(),
            message_id: None,
            full_text: full_text.into(),
            cursor: 0,
            chunk_chars: chunk_chars.max(1),
            state: ReplyState::Pending,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Id of the placeholder message, once started
    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn state(&self) -> ReplyState {
        self.state
    }

    /// Text delivered so far
    pub fn emitted(&self) -> &str {
        &self.full_text[..self.cursor]
    }

    /// Bind the placeholder message and begin streaming
    ///
    /// An empty reply has nothing to stream and completes immediately.
    pub fn start(&mut self, message_id: impl Into<String>) -> bool {
        if self.state != ReplyState::Pending {
            return false;
        }
        self.message_id = Some(message_id.into());
        self.state = if self.full_text.is_empty() {
            ReplyState::Completed
        } else {
            ReplyState::Streaming
        };
        true
    }

    /// Reveal the next chunk; the tick revealing the last chunk completes the reply
    pub fn advance(&mut self) -> Option<&str> {
        if self.state != ReplyState::Streaming {
            return None;
        }
        self.cursor = self.full_text[self.cursor..]
            .char_indices()
            .nth(self.chunk_chars)
            .map(|(offset, _)| self.cursor + offset)
            .unwrap_or(self.full_text.len());
        if self.cursor == self.full_text.len() {
            self.state = ReplyState::Completed;
        }
        Some(self.emitted())
    }

    /// Stop delivery, keeping whatever text was already emitted
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = ReplyState::Cancelled;
        true
    }
}
