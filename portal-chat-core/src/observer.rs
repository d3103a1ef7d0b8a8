//! Reporting of best-effort persistence failures
//!
//! The chat engine never returns storage errors to its callers; the
//! in-memory state stays authoritative. Failures go to an observer instead.

use std::fmt;

use tracing::{error, warn};

/// Which storage call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOp {
    /// Hydrating the store at startup
    Load,
    /// Writing the store after a mutation
    Save,
    /// Removing the payload when history is cleared
    Remove,
}

impl fmt::Display for PersistOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistOp::Load => write!(f, "load"),
            PersistOp::Save => write!(f, "save"),
            PersistOp::Remove => write!(f, "remove"),
        }
    }
}

/// Receives persistence failures
pub trait PersistenceObserver: Send + Sync {
    fn on_failure(&self, op: PersistOp, key: &str, error: &crate::Error);
}

/// Logs failures through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PersistenceObserver for TracingObserver {
    fn on_failure(&self, op: PersistOp, key: &str, error: &crate::Error) {
        match op {
            PersistOp::Load => warn!("Failed to load chat history from '{}': {}", key, error),
            PersistOp::Save | PersistOp::Remove => {
                error!("Failed to {} chat history at '{}': {}", op, key, error)
            }
        }
    }
}
