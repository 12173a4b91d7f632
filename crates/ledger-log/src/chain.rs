//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! A record's hash is the SHA-256 of the compact JSON serialization of its
//! envelope *without* `integrity.hashValue`, in the envelope's own key order.
//! Because every envelope embeds its predecessor's hash as
//! `integrity.parentHash`, editing any historical line invalidates that
//! line's hash and breaks the link to its successor.

use std::path::Path;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, BufReader};

use ledger_contracts::{
    error::{LedgerError, LedgerResult},
    record::{envelope_hash, GENESIS_PARENT, KEY_HASH_VALUE, KEY_INTEGRITY},
};

use crate::codec::{parse_bytes, parse_line, LineOutcome};

/// SHA-256 of `bytes` as lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Recompute the hash an envelope should carry.
///
/// Returns `MalformedRecord` if the envelope cannot be re-serialized.
pub fn hash_envelope(envelope: &Map<String, Value>) -> LedgerResult<String> {
    let mut unsealed = envelope.clone();
    if let Some(Value::Object(integrity)) = unsealed.get_mut(KEY_INTEGRITY) {
        integrity.shift_remove(KEY_HASH_VALUE);
    }
    let bytes = serde_json::to_vec(&unsealed).map_err(|e| LedgerError::MalformedRecord {
        reason: format!("envelope cannot be serialized: {}", e),
    })?;
    Ok(hash_bytes(&bytes))
}

/// Why a record failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakKind {
    /// The record carries no `integrity.hashValue`.
    MissingHash,
    /// The stored hash does not match the record's content.
    HashMismatch { stored: String, computed: String },
    /// The record does not link to the hash of its predecessor.
    ParentMismatch { expected: String, found: String },
}

/// One verification failure, located by 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    pub line_number: u64,
    pub kind: BreakKind,
}

impl ChainBreak {
    pub fn into_error(self) -> LedgerError {
        let reason = match self.kind {
            BreakKind::MissingHash => "record has no hashValue".to_string(),
            BreakKind::HashMismatch { stored, computed } => {
                format!("stored hash {} but content hashes to {}", stored, computed)
            }
            BreakKind::ParentMismatch { expected, found } => {
                format!("parentHash {:?} does not match predecessor {:?}", found, expected)
            }
        };
        LedgerError::ChainBroken {
            line: self.line_number,
            reason,
        }
    }
}

/// Result of verifying a whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainVerification {
    /// Valid records seen.
    pub records: u64,
    pub breaks: Vec<ChainBreak>,
    /// Hash of the last valid record.
    pub terminal_hash: Option<String>,
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        self.breaks.is_empty()
    }

    pub fn first_break(&self) -> Option<&ChainBreak> {
        self.breaks.first()
    }

    /// Fold one classified line into the result.  Only records take part in
    /// the chain.
    fn observe(&mut self, verifier: &mut ChainVerifier, outcome: LineOutcome, line_number: u64) {
        if let LineOutcome::Record(parsed) = outcome {
            self.records += 1;
            self.breaks.extend(verifier.check(&parsed.envelope, line_number));
            self.terminal_hash = parsed.record.hash_value().map(str::to_string);
        }
    }
}

/// Incremental chain checker, fed one envelope at a time.
///
/// The expected parent of each record is the *recomputed* hash of the
/// previous one, so a tampered line is reported twice: once for its own
/// content and once more where its successor no longer links to it.
#[derive(Debug, Clone)]
pub struct ChainVerifier {
    expected_parent: Option<String>,
}

impl ChainVerifier {
    /// Expect the first record to link to `GENESIS_PARENT`.
    pub fn from_genesis() -> Self {
        Self::expecting(Some(GENESIS_PARENT.to_string()))
    }

    /// Expect the first record to link to `parent`, or accept any parent.
    pub fn expecting(parent: Option<String>) -> Self {
        Self {
            expected_parent: parent,
        }
    }

    /// Check one envelope; returns every rule it violates.
    pub fn check(&mut self, envelope: &Map<String, Value>, line_number: u64) -> Vec<ChainBreak> {
        let mut breaks = Vec::new();

        let found_parent = envelope
            .get(KEY_INTEGRITY)
            .and_then(Value::as_object)
            .and_then(|i| i.get("parentHash"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if let Some(expected) = &self.expected_parent {
            if *expected != found_parent {
                breaks.push(ChainBreak {
                    line_number,
                    kind: BreakKind::ParentMismatch {
                        expected: expected.clone(),
                        found: found_parent,
                    },
                });
            }
        }

        let computed = hash_envelope(envelope).ok();
        match (envelope_hash(envelope), &computed) {
            (None, _) => breaks.push(ChainBreak {
                line_number,
                kind: BreakKind::MissingHash,
            }),
            (Some(stored), Some(computed)) if stored != computed => breaks.push(ChainBreak {
                line_number,
                kind: BreakKind::HashMismatch {
                    stored: stored.to_string(),
                    computed: computed.clone(),
                },
            }),
            _ => {}
        }

        self.expected_parent = computed;
        breaks
    }
}

/// Verify ledger lines in order.  Blank, comment and malformed lines are
/// not part of the chain and are passed over.
pub fn verify_lines<'a, I>(lines: I) -> ChainVerification
where
    I: IntoIterator<Item = &'a str>,
{
    let mut verifier = ChainVerifier::from_genesis();
    let mut result = ChainVerification::default();

    for (idx, line) in lines.into_iter().enumerate() {
        result.observe(&mut verifier, parse_line(line), idx as u64 + 1);
    }

    result
}

/// Verify the ledger file at `path`.  A missing file verifies as empty.
pub async fn verify_file(path: &Path) -> LedgerResult<ChainVerification> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ChainVerification::default())
        }
        Err(e) => {
            return Err(LedgerError::ReadFailed {
                reason: format!("cannot open '{}': {}", path.display(), e),
            })
        }
    };

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut verifier = ChainVerifier::from_genesis();
    let mut result = ChainVerification::default();
    let mut line_number: u64 = 0;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| LedgerError::ReadFailed {
                reason: format!("cannot read '{}': {}", path.display(), e),
            })?;
        if read == 0 {
            break;
        }
        line_number += 1;
        result.observe(&mut verifier, parse_bytes(&buf), line_number);
    }

    Ok(result)
}
