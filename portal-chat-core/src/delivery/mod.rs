//! Simulated streaming of assistant replies

pub mod source;
pub mod state;

pub use source::{CannedReply, ReplySource};
pub use state::{ReplyDelivery, ReplyState};
