//! Chat sessions and their durable payload
//!
//! A session is created by its first user message and is never stored
//! while empty. The whole collection is persisted as one JSON document.

pub mod codec;
pub mod index;
pub mod store;

pub use index::{SessionStore, SessionSummary};
pub use store::{derive_title, ChatSession, Message, Role};
