//! Where assistant reply text comes from

use crate::config::schema::DEFAULT_CANNED_REPLY;
use crate::session::ChatSession;

/// Produces the full text of the next assistant reply for a session
pub trait ReplySource: Send + Sync {
    fn reply_for(&self, session: &ChatSession) -> String;
}

/// Always answers with the same text
#[derive(Debug, Clone)]
pub struct CannedReply {
    text: String,
}

impl CannedReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Default for CannedReply {
    fn default() -> Self {
        Self::new(DEFAULT_CANNED_REPLY)
    }
}

impl ReplySource for CannedReply {
    fn reply_for(&self, _session: &ChatSession) -> String {
        self.text.clone()
    }
}
