//! Event record codec: one record ↔ one line of compact JSON.
//!
//! Sealing builds the envelope in a fixed key order (command first), hashes
//! its compact serialization, then inserts `integrity.hashValue`.  Parsing
//! relies on serde_json's `preserve_order` so the first property of a line
//! is its command.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use ledger_contracts::{
    error::{LedgerError, LedgerResult},
    record::{
        envelope_timestamp, DecodedRecord, EncodedRecord, Integrity, DEFAULT_ACTOR,
        KEY_EVENT_TRACKING_ID, KEY_HASH_VALUE, KEY_INTEGRITY, KEY_SYSTEM_ID, KEY_TIMESTAMP,
        KEY_USER_ID,
    },
};
use ledger_core::ChainHead;

use crate::chain::hash_bytes;

/// Classification of one line (or one remote envelope).
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Empty or whitespace-only.
    Blank,
    /// Starts with `#` or `//`.
    Comment,
    /// Not a record; the reason is for the log.
    Malformed(String),
    Record(ParsedRecord),
}

/// A record together with the envelope it was decoded from.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub record: DecodedRecord,
    pub envelope: Map<String, Value>,
}

/// Classify and decode a single ledger line.  Never touches a chain head.
pub fn parse_line(line: &str) -> LineOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineOutcome::Blank;
    }
    if trimmed.starts_with('#') || trimmed.starts_with("//") {
        return LineOutcome::Comment;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => parse_envelope(value),
        Err(e) => LineOutcome::Malformed(format!("invalid JSON: {}", e)),
    }
}

/// Classify a raw line as read from disk.  Bytes that are not UTF-8 make the
/// line malformed rather than failing the read.
pub fn parse_bytes(bytes: &[u8]) -> LineOutcome {
    match std::str::from_utf8(bytes) {
        Ok(line) => parse_line(line),
        Err(e) => LineOutcome::Malformed(format!("line is not UTF-8: {}", e)),
    }
}

/// Decode an already-parsed envelope, as received from a remote peer.
pub fn parse_envelope(value: Value) -> LineOutcome {
    let envelope = match value {
        Value::Object(map) => map,
        other => {
            return LineOutcome::Malformed(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))
        }
    };

    let (command, payload) = match envelope.iter().next() {
        None => return LineOutcome::Malformed("record has no properties".to_string()),
        Some((command, Value::Object(payload))) => (command.clone(), payload.clone()),
        Some((command, other)) => {
            return LineOutcome::Malformed(format!(
                "payload of '{}' must be an object, found {}",
                command,
                json_kind(other)
            ))
        }
    };
    if command.is_empty() {
        return LineOutcome::Malformed("command name is empty".to_string());
    }

    let text = |key: &str| envelope.get(key).and_then(Value::as_str).map(str::to_string);
    let integrity = envelope
        .get(KEY_INTEGRITY)
        .and_then(|v| serde_json::from_value::<Integrity>(v.clone()).ok());

    let record = DecodedRecord {
        command,
        payload,
        event_tracking_id: text(KEY_EVENT_TRACKING_ID),
        actor_id: text(KEY_USER_ID),
        system_id: text(KEY_SYSTEM_ID),
        timestamp: envelope_timestamp(&envelope),
        integrity,
    };
    LineOutcome::Record(ParsedRecord { record, envelope })
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

/// Seals records for one writing instance.
///
/// The head it carries is read here and advanced by the writer once a sealed
/// line is on disk.
#[derive(Debug, Clone)]
pub struct Codec {
    system_id: String,
    head: ChainHead,
}

impl Codec {
    pub fn new(system_id: impl Into<String>, head: ChainHead) -> Self {
        Self {
            system_id: system_id.into(),
            head,
        }
    }

    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    pub fn head(&self) -> &ChainHead {
        &self.head
    }

    /// Seal a record that links to `parent_hash`.  Pure: the head is not moved.
    ///
    /// Returns `InvalidArgument` when `command` is empty or `payload` is not a
    /// JSON object.
    pub fn seal(
        &self,
        parent_hash: &str,
        command: &str,
        payload: Value,
        event_tracking_id: Option<&str>,
        actor_id: Option<&str>,
    ) -> LedgerResult<EncodedRecord> {
        if command.is_empty() {
            return Err(LedgerError::InvalidArgument {
                reason: "command must not be empty".to_string(),
            });
        }
        let payload = match payload {
            Value::Object(map) => map,
            other => {
                return Err(LedgerError::InvalidArgument {
                    reason: format!(
                        "payload of '{}' must be a JSON object, got {}",
                        command,
                        json_kind(&other)
                    ),
                })
            }
        };

        let tracking_id = event_tracking_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let actor = actor_id
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_ACTOR);

        let mut integrity = Map::new();
        integrity.insert(
            "nonce".to_string(),
            Value::String(uuid::Uuid::new_v4().simple().to_string()),
        );
        integrity.insert("parentHash".to_string(), Value::String(parent_hash.to_string()));

        let mut envelope = Map::new();
        envelope.insert(command.to_string(), Value::Object(payload));
        envelope.insert(KEY_EVENT_TRACKING_ID.to_string(), Value::String(tracking_id));
        envelope.insert(KEY_USER_ID.to_string(), Value::String(actor.to_string()));
        envelope.insert(KEY_SYSTEM_ID.to_string(), Value::String(self.system_id.clone()));
        envelope.insert(
            KEY_TIMESTAMP.to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        envelope.insert(KEY_INTEGRITY.to_string(), Value::Object(integrity));

        let unsealed = serde_json::to_vec(&envelope).map_err(|e| LedgerError::InvalidArgument {
            reason: format!("payload of '{}' cannot be serialized: {}", command, e),
        })?;
        let hash_value = hash_bytes(&unsealed);

        if let Some(Value::Object(integrity)) = envelope.get_mut(KEY_INTEGRITY) {
            integrity.insert(KEY_HASH_VALUE.to_string(), Value::String(hash_value.clone()));
        }
        let line = serde_json::to_string(&envelope).map_err(|e| LedgerError::InvalidArgument {
            reason: format!("record for '{}' cannot be serialized: {}", command, e),
        })?;

        Ok(EncodedRecord { line, hash_value })
    }
}
