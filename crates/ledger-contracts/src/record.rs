//! Event record types.
//!
//! A record is one line of the ledger file: a JSON object whose *first*
//! property is the command name mapped to its payload, followed by the
//! envelope fields and the `integrity` block that chains it to its
//! predecessor.
//!
//! ```text
//! {"addFAQIfNotExists":{...},"eventTrackingId":"..","userId":"..","systemId":"..",
//!  "timestamp":"..","integrity":{"nonce":"..","parentHash":"..","hashValue":".."}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope key holding the request correlation id.
pub const KEY_EVENT_TRACKING_ID: &str = "eventTrackingId";
/// Envelope key holding the actor id.
pub const KEY_USER_ID: &str = "userId";
/// Envelope key holding the writing instance id.
pub const KEY_SYSTEM_ID: &str = "systemId";
/// Envelope key holding the RFC 3339 write time.
pub const KEY_TIMESTAMP: &str = "timestamp";
/// Envelope key holding the [`Integrity`] block.
pub const KEY_INTEGRITY: &str = "integrity";
/// Key inside the integrity block that carries the record's own hash.
pub const KEY_HASH_VALUE: &str = "hashValue";

/// Actor recorded when the caller does not name one.
pub const DEFAULT_ACTOR: &str = "robot";

/// The `parentHash` of the first record in a ledger.
pub const GENESIS_PARENT: &str = "";

/// Tamper-evidence block carried by every record.
///
/// `hash_value` is `None` only while the record is being sealed: the hash is
/// computed over the envelope before this field exists.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrity {
    #[serde(default)]
    pub nonce: String,

    #[serde(default)]
    pub parent_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_value: Option<String>,
}

/// A record read back from a ledger line or a remote change set.
///
/// Only `command` and `payload` are guaranteed; the envelope fields are
/// optional because foreign or hand-written lines may omit them.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    /// Symbolic name of the state change, e.g. `"addNewsPostingIfNotExists"`.
    pub command: String,

    /// The data associated with the command.  Opaque to the ledger.
    pub payload: Map<String, Value>,

    pub event_tracking_id: Option<String>,

    /// Serialized as `userId`.
    pub actor_id: Option<String>,

    pub system_id: Option<String>,

    pub timestamp: Option<DateTime<Utc>>,

    pub integrity: Option<Integrity>,
}

impl DecodedRecord {
    /// The record's own hash, when it carries one.
    pub fn hash_value(&self) -> Option<&str> {
        self.integrity
            .as_ref()
            .and_then(|i| i.hash_value.as_deref())
    }

    /// The hash this record claims as its predecessor.
    pub fn parent_hash(&self) -> Option<&str> {
        self.integrity.as_ref().map(|i| i.parent_hash.as_str())
    }
}

/// Where a record came from, handed to replay handlers for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOrigin {
    /// File name or peer URL.
    pub sender: String,

    /// 1-based line (or array index) within the sender, when known.
    pub line_number: Option<u64>,
}

impl RecordOrigin {
    pub fn new(sender: impl Into<String>, line_number: Option<u64>) -> Self {
        Self {
            sender: sender.into(),
            line_number,
        }
    }
}

/// A freshly sealed record, ready to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    /// Single-line compact JSON, without the trailing newline.
    pub line: String,

    /// Lowercase hex SHA-256 stored in `integrity.hashValue`.
    pub hash_value: String,
}

/// Read `timestamp` off a raw envelope.
pub fn envelope_timestamp(envelope: &Map<String, Value>) -> Option<DateTime<Utc>> {
    envelope
        .get(KEY_TIMESTAMP)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Read `integrity.hashValue` off a raw envelope.
pub fn envelope_hash(envelope: &Map<String, Value>) -> Option<&str> {
    envelope
        .get(KEY_INTEGRITY)
        .and_then(Value::as_object)
        .and_then(|i| i.get(KEY_HASH_VALUE))
        .and_then(Value::as_str)
}
