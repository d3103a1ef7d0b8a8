//! Durable key-value storage
//!
//! The chat engine keeps its whole session store under a single key. The
//! [`KeyValueStore`] port is what a browser's local storage looks like from
//! Rust: string keys, string values, last writer wins.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// A durable string-to-string store
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> crate::Result<Option<String>>;

    /// Overwrite the value stored under `key`
    fn set(&self, key: &str, value: &str) -> crate::Result<()>;

    /// Remove `key`; removing an absent key succeeds
    fn remove(&self, key: &str) -> crate::Result<()>;
}
