//! Replay handler trait.
//!
//! Every record the ledger replays, whether from the local file or from a
//! remote peer, ends up in a `ReplayHandler`.  Domain modules implement it
//! once per command and register the implementations in a
//! [`CommandRegistry`](crate::registry::CommandRegistry).

use async_trait::async_trait;

use ledger_contracts::{
    error::LedgerResult,
    record::{DecodedRecord, RecordOrigin},
};

/// What a handler did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The record changed in-memory state.
    Applied,
    /// The record was understood but changed nothing (already present,
    /// unknown command, ...).  Replaying it again is harmless.
    Ignored,
}

/// Applies one decoded record to in-memory state.
///
/// Replay awaits handlers sequentially in ledger order, so a handler may
/// rely on every earlier record having been handled.  Handlers for
/// "add if not exists" commands must be idempotent: replay always starts at
/// the beginning of the file.
#[async_trait]
pub trait ReplayHandler: Send + Sync {
    /// Apply `record`.
    ///
    /// An `Err` is logged with `origin` by the caller and replay continues
    /// with the next record.
    async fn handle(
        &self,
        record: &DecodedRecord,
        origin: &RecordOrigin,
    ) -> LedgerResult<HandlerOutcome>;
}
