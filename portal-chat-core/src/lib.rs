//! Local-first chat engine for the student portal
//!
//! This crate owns the portal assistant's chat sessions: creating them on
//! the first message, simulating a typed reply, and writing every change
//! through to a durable key-value store so a reload resumes where the
//! student left off.
//!
//! ## Key Concepts
//!
//! - **Session**: one conversation, titled after its first message
//! - **Reply**: an assistant message revealed a chunk per timer tick
//! - **Generation**: token naming a reply; stale ones are ignored

pub mod config;
pub mod delivery;
pub mod error;
pub mod kv;
pub mod logging;
pub mod manager;
pub mod observer;
pub mod service;
pub mod session;
pub mod utils;

pub use error::{Error, Result};
pub use manager::{ChatSessionManager, ChatSettings, ChatView, ReplyStatus, SendReceipt};
pub use service::{ChatService, DeliveryTiming};
