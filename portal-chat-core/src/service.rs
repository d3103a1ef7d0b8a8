//! Timer-driven delivery of assistant replies
//!
//! [`ChatService`] wraps a [`ChatSessionManager`] and owns the one timer
//! task that types the in-flight reply. Starting a reply aborts the previous
//! task before spawning the next, so two timers never run at once. Ticks
//! from an aborted task that slip through are ignored by generation.
//!
//! Methods that start a reply spawn onto the current tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::schema::ChatConfig;
use crate::delivery::ReplyState;
use crate::manager::{ChatSessionManager, ChatView, SendReceipt};
use crate::session::{Message, SessionSummary};

/// Pace of the typing simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryTiming {
    /// Wait before the placeholder appears
    pub reply_delay: Duration,
    /// Wait between chunks
    pub tick_interval: Duration,
}

impl Default for DeliveryTiming {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl From<&ChatConfig> for DeliveryTiming {
    fn from(config: &ChatConfig) -> Self {
        Self {
            reply_delay: Duration::from_millis(config.reply_delay_ms),
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
        }
    }
}

/// Chat manager plus its single delivery timer
pub struct ChatService {
    manager: Arc<Mutex<ChatSessionManager>>,
    timing: DeliveryTiming,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ChatService {
    /// Create a new chat service
    pub fn new(manager: ChatSessionManager, timing: DeliveryTiming) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
            timing,
            timer: Mutex::new(None),
        }
    }

    /// Send a user message and start typing the reply to it
    pub fn send_user_message(&self, text: &str) -> Option<SendReceipt> {
        let receipt = self.manager.lock().send_user_message(text)?;
        self.begin_assistant_reply(&receipt.session_id);
        Some(receipt)
    }

    /// Start a reply for `owner_session_id`, replacing any running timer
    pub fn begin_assistant_reply(&self, owner_session_id: &str) -> Option<u64> {
        let mut timer = self.timer.lock();
        // An unknown owner leaves the current reply and its timer running.
        let generation = self.manager.lock().begin_assistant_reply(owner_session_id)?;
        if let Some(task) = timer.take() {
            task.abort();
        }
        *timer = Some(self.spawn_delivery(generation));
        Some(generation)
    }

    /// Stop the in-flight reply where it is
    pub fn cancel_reply(&self) -> bool {
        let mut timer = self.timer.lock();
        if let Some(task) = timer.take() {
            task.abort();
        }
        self.manager.lock().cancel_reply()
    }

    pub fn start_new_session(&self) {
        self.manager.lock().start_new_session();
    }

    /// Activate a session and return a copy of its messages
    pub fn load_session(&self, id: &str) -> Option<Vec<Message>> {
        self.manager.lock().load_session(id).map(<[Message]>::to_vec)
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        self.manager.lock().list_sessions().collect()
    }

    /// Cancel any reply and wipe all stored sessions
    pub fn clear_history(&self) {
        let mut timer = self.timer.lock();
        if let Some(task) = timer.take() {
            task.abort();
        }
        self.manager.lock().clear_history();
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatView> {
        self.manager.lock().subscribe()
    }

    /// Number of live delivery timers; never more than one
    pub fn active_timers(&self) -> usize {
        match self.timer.lock().as_ref() {
            Some(task) if !task.is_finished() => 1,
            _ => 0,
        }
    }

    /// Run a closure against the manager for reads
    pub fn with_manager<R>(&self, f: impl FnOnce(&ChatSessionManager) -> R) -> R {
        f(&self.manager.lock())
    }

    fn spawn_delivery(&self, generation: u64) -> JoinHandle<()> {
        let manager = Arc::clone(&self.manager);
        let timing = self.timing;

        tokio::spawn(async move {
            tokio::time::sleep(timing.reply_delay).await;
            let mut state = manager.lock().start_reply(generation);

            while state == Some(ReplyState::Streaming) {
                tokio::time::sleep(timing.tick_interval).await;
                state = manager.lock().tick(generation);
            }
            debug!("Delivery timer {} stopped in state {:?}", generation, state);
        })
    }
}

impl Drop for ChatService {
    fn drop(&mut self) {
        if let Some(task) = self.timer.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::CannedReply;
    use crate::kv::MemoryStore;

    fn service(reply: &str) -> ChatService {
        let manager = ChatSessionManager::builder(Arc::new(MemoryStore::new()))
            .reply_source(Arc::new(CannedReply::new(reply)))
            .build();
        ChatService::new(
            manager,
            DeliveryTiming {
                reply_delay: Duration::from_millis(100),
                tick_interval: Duration::from_millis(10),
            },
        )
    }

    #[test]
    fn test_timing_from_config() {
        let timing = DeliveryTiming::default();
        assert_eq!(timing.reply_delay, Duration::from_millis(1000));
        assert_eq!(timing.tick_interval, Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_is_typed_over_time() {
        let service = service("abcde");
        let receipt = service.send_user_message("Hello").unwrap();
        assert_eq!(service.active_timers(), 1);

        tokio::time::sleep(Duration::from_millis(105)).await;
        let content = service.with_manager(|m| m.active_messages()[1].content.clone());
        assert_eq!(content, "");

        tokio::time::sleep(Duration::from_millis(100)).await;
        service.with_manager(|m| {
            let session = m.session(&receipt.session_id).unwrap();
            assert_eq!(session.messages[1].content, "abcde");
            assert_eq!(m.reply_status().unwrap().state, ReplyState::Completed);
        });
        assert_eq!(service.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_for_unknown_session_keeps_current_timer() {
        let service = service("abcdefghij");
        let receipt = service.send_user_message("Hello").unwrap();
        tokio::time::sleep(Duration::from_millis(155)).await;

        assert_eq!(service.begin_assistant_reply("stale-id"), None);
        assert_eq!(service.active_timers(), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        service.with_manager(|m| {
            let session = m.session(&receipt.session_id).unwrap();
            assert_eq!(session.messages[1].content, "abcdefghij");
            assert_eq!(m.reply_status().unwrap().state, ReplyState::Completed);
            assert!(!m.is_streaming());
        });
        assert_eq!(service.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_the_timer() {
        let service = service("a long answer");
        service.send_user_message("Hello").unwrap();
        tokio::time::sleep(Duration::from_millis(135)).await;

        assert!(service.cancel_reply());
        assert_eq!(service.active_timers(), 0);
        let frozen = service.with_manager(|m| m.active_messages()[1].content.clone());

        tokio::time::sleep(Duration::from_millis(500)).await;
        let later = service.with_manager(|m| m.active_messages()[1].content.clone());
        assert_eq!(frozen, later);
        assert!(!frozen.is_empty());
        assert!(!service.cancel_reply());
    }
}
