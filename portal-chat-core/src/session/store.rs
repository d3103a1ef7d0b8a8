//! Session data structures

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::truncate_chars;

static FIRST_SENTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?]+[.!?]?").expect("first-sentence pattern is valid"));

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// Older payloads spell this `ai`
    #[serde(alias = "ai")]
    Assistant,
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Time-based id, increasing within a session
    pub id: String,
    /// Message role
    pub role: Role,
    /// Message text; assistant text grows while the reply is typed
    pub content: String,
}

impl Message {
    pub(crate) fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
        }
    }

    pub(crate) fn assistant_placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: String::new(),
        }
    }
}

/// A conversation with its own identity, title and history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Session id
    pub id: String,
    /// Title derived from the first message
    pub title: String,
    /// Messages in insertion order
    pub messages: Vec<Message>,
    /// Time of the last mutation
    #[serde(rename = "lastModified", with = "chrono::serde::ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
}

impl ChatSession {
    /// Create an empty session titled after `first_message`
    pub(crate) fn new(
        id: impl Into<String>,
        first_message: &str,
        title_max_chars: usize,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: derive_title(first_message, title_max_chars),
            messages: Vec::new(),
            last_modified: at,
        }
    }

    pub(crate) fn push(&mut self, message: Message, at: DateTime<Utc>) {
        self.messages.push(message);
        self.last_modified = at;
    }

    /// Replace the text of an assistant message in place
    pub(crate) fn set_assistant_content(
        &mut self,
        message_id: &str,
        content: &str,
        at: DateTime<Utc>,
    ) -> bool {
        let Some(message) = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.id == message_id && m.role == Role::Assistant)
        else {
            return false;
        };
        message.content.clear();
        message.content.push_str(content);
        self.last_modified = at;
        true
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Title for a session: the first sentence, trimmed and bounded
///
/// Same input always yields the same title.
pub fn derive_title(first_message: &str, max_chars: usize) -> String {
    let sentence = FIRST_SENTENCE
        .find(first_message)
        .map(|m| m.as_str())
        .unwrap_or(first_message);
    truncate_chars(sentence.trim(), max_chars)
}
