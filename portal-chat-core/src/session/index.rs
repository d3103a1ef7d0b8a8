//! Recency-ordered collection of sessions

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::store::ChatSession;

/// What the session list shows for one conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    #[serde(rename = "lastModified", with = "chrono::serde::ts_milliseconds")]
    pub last_modified: DateTime<Utc>,
}

impl From<&ChatSession> for SessionSummary {
    fn from(session: &ChatSession) -> Self {
        Self {
            id: session.id.clone(),
            title: session.title.clone(),
            last_modified: session.last_modified,
        }
    }
}

type RecencyKey = (Reverse<DateTime<Utc>>, String);

/// Sessions by id, plus an index ordered most-recently-modified first
///
/// Empty sessions are never admitted.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: HashMap<String, ChatSession>,
    recency: BTreeSet<RecencyKey>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from decoded sessions, dropping empty ones
    pub fn from_sessions(sessions: impl IntoIterator<Item = ChatSession>) -> Self {
        let mut store = Self::new();
        for session in sessions {
            store.insert(session);
        }
        store
    }

    /// Insert or replace a session; returns false when it was empty and skipped
    pub(crate) fn insert(&mut self, session: ChatSession) -> bool {
        if session.is_empty() {
            debug!("Skipping empty session {}", session.id);
            return false;
        }
        if let Some(previous) = self.sessions.remove(&session.id) {
            self.recency.remove(&recency_key(&previous));
        }
        self.recency.insert(recency_key(&session));
        self.sessions.insert(session.id.clone(), session);
        true
    }

    /// Mutate a session in place and keep the recency index in step
    pub(crate) fn update<R>(&mut self, id: &str, f: impl FnOnce(&mut ChatSession) -> R) -> Option<R> {
        let session = self.sessions.get_mut(id)?;
        self.recency.remove(&recency_key(session));
        let result = f(session);
        self.recency.insert(recency_key(session));
        Some(result)
    }

    pub(crate) fn clear(&mut self) {
        self.sessions.clear();
        self.recency.clear();
    }

    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Sessions, most recently modified first
    pub fn iter_recent(&self) -> impl Iterator<Item = &ChatSession> + '_ {
        self.recency
            .iter()
            .filter_map(move |(_, id)| self.sessions.get(id))
    }

    /// Session summaries, most recently modified first
    pub fn summaries(&self) -> impl Iterator<Item = SessionSummary> + '_ {
        self.iter_recent().map(SessionSummary::from)
    }

    /// Latest modification time across all sessions
    pub fn latest_modified(&self) -> Option<DateTime<Utc>> {
        self.recency.first().map(|(Reverse(at), _)| *at)
    }
}

fn recency_key(session: &ChatSession) -> RecencyKey {
    (Reverse(session.last_modified), session.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::Message;
    use chrono::Duration;

    fn session_at(id: &str, at: DateTime<Utc>) -> ChatSession {
        let mut session = ChatSession::new(id, "Hello", 50, at);
        session.push(Message::user(format!("{}-1", id), "Hello"), at);
        session
    }

    #[test]
    fn test_empty_sessions_are_rejected() {
        let mut store = SessionStore::new();
        let empty = ChatSession::new("empty", "Hello", 50, Utc::now());
        assert!(!store.insert(empty));
        assert!(store.is_empty());
        assert_eq!(store.summaries().count(), 0);
    }

    #[test]
    fn test_summaries_newest_first() {
        let base = Utc::now();
        let store = SessionStore::from_sessions([
            session_at("old", base),
            session_at("new", base + Duration::seconds(5)),
            session_at("mid", base + Duration::seconds(2)),
        ]);

        let ids: Vec<String> = store.summaries().map(|s| s.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
        assert_eq!(store.latest_modified(), Some(base + Duration::seconds(5)));
    }

    #[test]
    fn test_update_reorders() {
        let base = Utc::now();
        let mut store =
            SessionStore::from_sessions([session_at("a", base), session_at("b", base + Duration::seconds(1))]);

        let later = base + Duration::seconds(10);
        store
            .update("a", |s| s.push(Message::user("a-2", "again"), later))
            .unwrap();

        let ids: Vec<String> = store.summaries().map(|s| s.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.get("a").unwrap().messages.len(), 2);
        assert!(store.update("missing", |_| ()).is_none());
    }

    #[test]
    fn test_summaries_are_restartable() {
        let store = SessionStore::from_sessions([session_at("a", Utc::now())]);
        assert_eq!(store.summaries().count(), 1);
        assert_eq!(store.summaries().count(), 1);
    }
}
