//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reply shown by the portal assistant until a real backend answers
pub const DEFAULT_CANNED_REPLY: &str = "Here is a detailed response to demonstrate the layout orientation and scrolling behavior.\n\nFirst, let's look at the structure. The chat interface is designed to be minimal and unobtrusive, similar to modern AI assistants. The messages are stacked from the bottom, ensuring that the most recent interaction is always at eye level.\n\nSecondly, regarding the content presentation: long answers like this one should flow naturally without feeling cramped. The text is left-aligned for the AI to distinguish it from user queries, which are typically right-aligned or distinctively styled.\n\nFinally, this long text helps verify that the auto-scrolling mechanism works as expected. When a new message arrives, the view should smoothly scroll to reveal the latest content, while still allowing you to scroll back up to read the beginning of the response. This ensures a seamless reading experience even for extensive explanations.";

/// Root configuration for portal-chat
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chat engine configuration
    #[serde(default)]
    pub chat: ChatConfig,
    /// Durable storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chat engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Key holding the serialized session store
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Maximum title length in characters, before the `...` marker
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
    /// Delay before the assistant starts typing
    #[serde(default = "default_reply_delay_ms")]
    pub reply_delay_ms: u64,
    /// Interval between typing ticks
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Characters revealed per tick
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    /// Fixed assistant reply
    #[serde(default = "default_canned_reply")]
    pub canned_reply: String,
}

fn default_storage_key() -> String {
    "chatHistory".to_string()
}

fn default_title_max_chars() -> usize {
    50
}

fn default_reply_delay_ms() -> u64 {
    1000
}

fn default_tick_interval_ms() -> u64 {
    10
}

fn default_chunk_chars() -> usize {
    1
}

fn default_canned_reply() -> String {
    DEFAULT_CANNED_REPLY.to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            title_max_chars: default_title_max_chars(),
            reply_delay_ms: default_reply_delay_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            chunk_chars: default_chunk_chars(),
            canned_reply: default_canned_reply(),
        }
    }
}

/// Durable storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory backing the file key-value store
    #[serde(default = "default_storage_dir")]
    pub dir: String,
}

fn default_storage_dir() -> String {
    "~/.portal-chat/data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_defaults() {
        let chat = ChatConfig::default();
        assert_eq!(chat.storage_key, "chatHistory");
        assert_eq!(chat.title_max_chars, 50);
        assert_eq!(chat.reply_delay_ms, 1000);
        assert_eq!(chat.tick_interval_ms, 10);
        assert_eq!(chat.chunk_chars, 1);
        assert!(chat.canned_reply.starts_with("Here is a detailed response"));
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"chat":{"chunk_chars":4}}"#).unwrap();
        assert_eq!(config.chat.chunk_chars, 4);
        assert_eq!(config.chat.storage_key, "chatHistory");
        assert_eq!(config.logging.level, "info");
    }
}
