//! JSON payload for the whole session store
//!
//! Current payloads are a versioned envelope:
//!
//! ```json
//! {"version":1,"sessions":[{"id":"..","title":"..","messages":[..],"lastModified":1700000000000}]}
//! ```
//!
//! The portal used to write a bare array of sessions with a `timestamp`
//! field and `"ai"` roles. Those payloads still decode; the next save
//! rewrites them in the current form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::index::SessionStore;
use super::store::{ChatSession, Message};

/// Payload version written by this crate
pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Serialize)]
struct PayloadRef<'a> {
    version: u32,
    sessions: Vec<&'a ChatSession>,
}

#[derive(Deserialize)]
struct Payload {
    version: u32,
    #[serde(default)]
    sessions: Vec<ChatSession>,
}

#[derive(Deserialize)]
struct LegacySession {
    id: String,
    title: String,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
}

impl From<LegacySession> for ChatSession {
    fn from(legacy: LegacySession) -> Self {
        Self {
            id: legacy.id,
            title: legacy.title,
            messages: legacy.messages,
            last_modified: legacy.timestamp,
        }
    }
}

/// Serialize the store, most recently modified session first
pub fn encode(store: &SessionStore) -> crate::Result<String> {
    let payload = PayloadRef {
        version: PAYLOAD_VERSION,
        sessions: store.iter_recent().collect(),
    };
    Ok(serde_json::to_string(&payload)?)
}

/// Parse a stored payload of any supported version
pub fn decode(raw: &str) -> crate::Result<SessionStore> {
    let value: Value = serde_json::from_str(raw)?;

    match value {
        Value::Array(_) => {
            let legacy: Vec<LegacySession> = serde_json::from_value(value)?;
            Ok(SessionStore::from_sessions(
                legacy.into_iter().map(ChatSession::from),
            ))
        }
        Value::Object(_) => {
            let payload: Payload = serde_json::from_value(value)?;
            if payload.version > PAYLOAD_VERSION {
                return Err(crate::Error::Serialization(format!(
                    "unsupported payload version {} (newest known is {})",
                    payload.version, PAYLOAD_VERSION
                )));
            }
            Ok(SessionStore::from_sessions(payload.sessions))
        }
        other => Err(crate::Error::Serialization(format!(
            "expected a session payload object, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
