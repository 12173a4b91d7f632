//! Error types for the portal ledger.
//!
//! Almost nothing in the ledger fails loudly: missing files, bad lines,
//! unreachable peers and failing handlers are logged and absorbed by the
//! components that meet them.  `LedgerError` is what those components use
//! internally, and what surfaces at the call boundary for precondition and
//! configuration failures.

use thiserror::Error;

/// The unified error type for the ledger crates.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A caller passed an argument that violates an operation's precondition
    /// (empty command name, non-object payload, ...).
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A line or envelope could not be decoded into a record.
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    /// Appending to the ledger file failed after all retry attempts.
    #[error("ledger write failed: {reason}")]
    WriteFailed { reason: String },

    /// Reading the ledger file failed for a reason other than absence.
    #[error("ledger read failed: {reason}")]
    ReadFailed { reason: String },

    /// A remote peer could not be reached or answered with something other
    /// than an array of envelopes.
    #[error("peer '{peer}' unavailable: {reason}")]
    PeerUnavailable { peer: String, reason: String },

    /// A replay handler rejected a record.
    #[error("handler for '{command}' failed: {reason}")]
    HandlerFailed { command: String, reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The hash chain does not link or a stored hash does not match its line.
    #[error("hash chain broken at line {line}: {reason}")]
    ChainBroken { line: u64, reason: String },
}

impl LedgerError {
    /// Shorthand for handler implementations that reject a payload.
    pub fn handler(command: &str, reason: impl Into<String>) -> Self {
        LedgerError::HandlerFailed {
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the ledger crates.
pub type LedgerResult<T> = Result<T, LedgerError>;
