//! Chat session manager
//!
//! Owns the session store, the active-session pointer and the single
//! in-flight assistant reply. Every mutation is written through to the
//! durable key-value store before the operation returns.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::schema::ChatConfig;
use crate::delivery::{CannedReply, ReplyDelivery, ReplySource, ReplyState};
use crate::kv::KeyValueStore;
use crate::observer::{PersistOp, PersistenceObserver, TracingObserver};
use crate::session::{codec, ChatSession, Message, SessionStore, SessionSummary};

/// Engine settings taken from [`ChatConfig`]
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Key holding the serialized session store
    pub storage_key: String,
    /// Maximum title length before the ellipsis
    pub title_max_chars: usize,
    /// Characters revealed per tick
    pub chunk_chars: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl From<&ChatConfig> for ChatSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            storage_key: config.storage_key.clone(),
            title_max_chars: config.title_max_chars,
            chunk_chars: config.chunk_chars,
        }
    }
}

/// Result of an accepted user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub session_id: String,
    pub message_id: String,
    /// True when this message minted a new session
    pub created_session: bool,
}

/// Snapshot of the current or most recent assistant reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplyStatus {
    pub generation: u64,
    pub session_id: String,
    pub message_id: Option<String>,
    pub state: ReplyState,
}

/// Read-only projection for the rendering layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChatView {
    pub active_session_id: Option<String>,
    /// Messages of the active session only
    pub messages: Vec<Message>,
    pub sessions: Vec<SessionSummary>,
    /// A reply for the active session is pending or streaming
    pub is_streaming: bool,
}

/// Issues strictly increasing millisecond timestamps
#[derive(Debug, Default)]
struct MonotonicClock {
    last_ms: i64,
}

impl MonotonicClock {
    fn seeded(after: Option<DateTime<Utc>>) -> Self {
        Self {
            last_ms: after.map(|at| at.timestamp_millis()).unwrap_or(0),
        }
    }

    fn now(&mut self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_millis();
        self.last_ms = wall.max(self.last_ms + 1);
        DateTime::from_timestamp_millis(self.last_ms).unwrap_or_else(Utc::now)
    }
}

/// Builder for [`ChatSessionManager`]
pub struct ChatSessionManagerBuilder {
    kv: Arc<dyn KeyValueStore>,
    settings: ChatSettings,
    observer: Arc<dyn PersistenceObserver>,
    replies: Arc<dyn ReplySource>,
}

impl ChatSessionManagerBuilder {
    pub fn settings(mut self, settings: ChatSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PersistenceObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn reply_source(mut self, replies: Arc<dyn ReplySource>) -> Self {
        self.replies = replies;
        self
    }

    /// Hydrate from the durable store and build the manager
    pub fn build(self) -> ChatSessionManager {
        let store = hydrate(self.kv.as_ref(), self.observer.as_ref(), &self.settings.storage_key);
        let clock = MonotonicClock::seeded(store.latest_modified());
        let (view, _) = watch::channel(ChatView::default());

        let manager = ChatSessionManager {
            kv: self.kv,
            observer: self.observer,
            replies: self.replies,
            settings: self.settings,
            store,
            active: None,
            reply_owner: None,
            reply: None,
            next_generation: 1,
            clock,
            view,
        };
        manager.publish();
        manager
    }
}

fn hydrate(kv: &dyn KeyValueStore, observer: &dyn PersistenceObserver, key: &str) -> SessionStore {
    let raw = match kv.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("No chat history under '{}'", key);
            return SessionStore::new();
        }
        Err(e) => {
            observer.on_failure(PersistOp::Load, key, &e);
            return SessionStore::new();
        }
    };

    match codec::decode(&raw) {
        Ok(store) => {
            info!("Loaded {} chat sessions", store.len());
            store
        }
        Err(e) => {
            observer.on_failure(PersistOp::Load, key, &e);
            SessionStore::new()
        }
    }
}

/// Mediates every read and write of chat session state
pub struct ChatSessionManager {
    kv: Arc<dyn KeyValueStore>,
    observer: Arc<dyn PersistenceObserver>,
    replies: Arc<dyn ReplySource>,
    settings: ChatSettings,
    store: SessionStore,
    active: Option<String>,
    /// Session whose user message is waiting for a reply
    reply_owner: Option<String>,
    /// Current or most recent reply
    reply: Option<ReplyDelivery>,
    next_generation: u64,
    clock: MonotonicClock,
    view: watch::Sender<ChatView>,
}

impl ChatSessionManager {
    /// Start building a manager over a durable store
    pub fn builder(kv: Arc<dyn KeyValueStore>) -> ChatSessionManagerBuilder {
        ChatSessionManagerBuilder {
            kv,
            settings: ChatSettings::default(),
            observer: Arc::new(TracingObserver),
            replies: Arc::new(CannedReply::default()),
        }
    }

    /// Manager with default settings, observer and reply source
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::builder(kv).build()
    }

    /// Clear the active pointer; the next message opens a new session
    pub fn start_new_session(&mut self) {
        self.active = None;
        self.reply_owner = None;
        self.publish();
    }

    /// Append a user message, creating the session if none is active
    ///
    /// Whitespace-only text is ignored.
    pub fn send_user_message(&mut self, text: &str) -> Option<SendReceipt> {
        if text.trim().is_empty() {
            debug!("Ignoring empty chat message");
            return None;
        }

        let at = self.clock.now();
        let message_id = at.timestamp_millis().to_string();
        let message = Message::user(message_id.clone(), text);

        let existing = self
            .active
            .as_deref()
            .filter(|id| self.store.contains(id))
            .map(str::to_string);

        let (session_id, created_session) = match existing {
            Some(id) => {
                self.store.update(&id, |s| s.push(message, at));
                (id, false)
            }
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                let mut session =
                    ChatSession::new(id.clone(), text, self.settings.title_max_chars, at);
                session.push(message, at);
                self.store.insert(session);
                info!("Started chat session {}", id);
                (id, true)
            }
        };

        self.active = Some(session_id.clone());
        self.reply_owner = Some(session_id.clone());
        self.persist();
        self.publish();

        Some(SendReceipt {
            session_id,
            message_id,
            created_session,
        })
    }

    /// Create a pending reply for `owner_session_id`, cancelling any previous one
    ///
    /// Returns the generation that identifies the new reply in
    /// [`start_reply`](Self::start_reply) and [`tick`](Self::tick).
    pub fn begin_assistant_reply(&mut self, owner_session_id: &str) -> Option<u64> {
        let Some(session) = self.store.get(owner_session_id) else {
            warn!("Cannot reply to unknown session {}", owner_session_id);
            return None;
        };
        let full_text = self.replies.reply_for(session);

        if let Some(previous) = self.reply.as_mut() {
            if previous.cancel() {
                info!(
                    "Reply {} superseded in session {}",
                    previous.generation(),
                    previous.session_id()
                );
            }
        }
        if self.reply_owner.as_deref() == Some(owner_session_id) {
            self.reply_owner = None;
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.reply = Some(ReplyDelivery::new(
            generation,
            owner_session_id,
            full_text,
            self.settings.chunk_chars,
        ));
        debug!("Reply {} pending for session {}", generation, owner_session_id);
        self.publish();
        Some(generation)
    }

    /// Append the empty assistant placeholder and begin streaming
    pub fn start_reply(&mut self, generation: u64) -> Option<ReplyState> {
        let at = self.clock.now();
        let reply = self.current_reply_mut(generation)?;
        if reply.state() != ReplyState::Pending {
            return Some(reply.state());
        }

        let message_id = at.timestamp_millis().to_string();
        let session_id = reply.session_id().to_string();
        reply.start(message_id.clone());
        let state = reply.state();

        let placeholder = Message::assistant_placeholder(message_id);
        if self.store.update(&session_id, |s| s.push(placeholder, at)).is_none() {
            // The session vanished (history cleared) between begin and start.
            self.cancel_reply();
            return Some(ReplyState::Cancelled);
        }

        self.persist();
        self.publish();
        Some(state)
    }

    /// Deliver the next chunk of a streaming reply
    ///
    /// Stale generations and terminal replies are ignored.
    pub fn tick(&mut self, generation: u64) -> Option<ReplyState> {
        let at = self.clock.now();
        let reply = self.current_reply_mut(generation)?;
        let text = reply.advance()?.to_string();
        let state = reply.state();
        let session_id = reply.session_id().to_string();
        let message_id = reply.message_id().unwrap_or_default().to_string();

        self.store
            .update(&session_id, |s| s.set_assistant_content(&message_id, &text, at));
        self.persist();

        if state == ReplyState::Completed {
            info!("Reply {} completed in session {}", generation, session_id);
        }
        self.publish();
        Some(state)
    }

    /// Stop the in-flight reply, keeping the text emitted so far
    pub fn cancel_reply(&mut self) -> bool {
        let Some(reply) = self.reply.as_mut() else {
            return false;
        };
        if !reply.cancel() {
            return false;
        }
        info!(
            "Reply {} cancelled after {} chars",
            reply.generation(),
            reply.emitted().chars().count()
        );
        self.publish();
        true
    }

    /// Make `id` the active session and return its messages
    ///
    /// Unknown ids return `None` and leave the active pointer alone.
    pub fn load_session(&mut self, id: &str) -> Option<&[Message]> {
        if !self.store.contains(id) {
            debug!("Session {} not found", id);
            return None;
        }
        self.active = Some(id.to_string());
        self.publish();
        self.store.get(id).map(|s| s.messages.as_slice())
    }

    /// Summaries of all sessions, most recently active first
    pub fn list_sessions(&self) -> impl Iterator<Item = SessionSummary> + '_ {
        self.store.summaries()
    }

    /// Drop every session and remove the durable payload
    pub fn clear_history(&mut self) {
        self.cancel_reply();
        self.store.clear();
        self.active = None;
        self.reply_owner = None;

        let key = &self.settings.storage_key;
        if let Err(e) = self.kv.remove(key) {
            self.observer.on_failure(PersistOp::Remove, key, &e);
        }
        info!("Chat history cleared");
        self.publish();
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Messages of the active session, empty when none is active
    pub fn active_messages(&self) -> &[Message] {
        self.active
            .as_deref()
            .and_then(|id| self.store.get(id))
            .map(|s| s.messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn session(&self, id: &str) -> Option<&ChatSession> {
        self.store.get(id)
    }

    /// Session waiting for its reply to begin, if any
    pub fn reply_owner(&self) -> Option<&str> {
        self.reply_owner.as_deref()
    }

    /// True while a reply for the active session is pending or streaming
    pub fn is_streaming(&self) -> bool {
        self.reply.as_ref().is_some_and(|r| {
            r.state().is_in_flight() && self.active.as_deref() == Some(r.session_id())
        })
    }

    pub fn reply_status(&self) -> Option<ReplyStatus> {
        self.reply.as_ref().map(|r| ReplyStatus {
            generation: r.generation(),
            session_id: r.session_id().to_string(),
            message_id: r.message_id().map(str::to_string),
            state: r.state(),
        })
    }

    /// Subscribe to the rendering projection
    pub fn subscribe(&self) -> watch::Receiver<ChatView> {
        self.view.subscribe()
    }

    /// Current rendering projection
    pub fn view(&self) -> ChatView {
        ChatView {
            active_session_id: self.active.clone(),
            messages: self.active_messages().to_vec(),
            sessions: self.store.summaries().collect(),
            is_streaming: self.is_streaming(),
        }
    }

    fn current_reply_mut(&mut self, generation: u64) -> Option<&mut ReplyDelivery> {
        self.reply
            .as_mut()
            .filter(|r| r.generation() == generation)
    }

    fn persist(&self) {
        let key = &self.settings.storage_key;
        let result = codec::encode(&self.store).and_then(|payload| self.kv.set(key, &payload));
        if let Err(e) = result {
            self.observer.on_failure(PersistOp::Save, key, &e);
        }
    }

    fn publish(&self) {
        self.view.send_replace(self.view());
    }
}
