//! Filtered, paged reads of the ledger ("change sets").
//!
//! A `ChangeSetQuery` is built per call and never persisted.  The loader
//! answers it with a `ChangeSetPage` whose `checkpoint` a follower sends
//! back as `skipUntil` on its next poll.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Checkpoint reported when the ledger holds no valid record.
pub const CHECKPOINT_NONE: &str = "0";

/// Predicate over the raw text of a ledger line.
pub type LinePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Parameters for one filtered read.
///
/// Filters apply in declaration order: `since`, then `skip_until_hash`, then
/// `predicate`.  `skip`/`take` page the filtered result.
#[derive(Clone, Default)]
pub struct ChangeSetQuery {
    /// Drop records written before this instant.
    pub since: Option<DateTime<Utc>>,

    /// Drop every record up to and including the one carrying this hash.
    pub skip_until_hash: Option<String>,

    pub predicate: Option<LinePredicate>,

    pub skip: Option<usize>,

    pub take: Option<usize>,
}

impl ChangeSetQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn skip_until(mut self, hash: impl Into<String>) -> Self {
        self.skip_until_hash = Some(hash.into());
        self
    }

    pub fn matching<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn take(mut self, take: usize) -> Self {
        self.take = Some(take);
        self
    }
}

impl fmt::Debug for ChangeSetQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSetQuery")
            .field("since", &self.since)
            .field("skip_until_hash", &self.skip_until_hash)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .field("skip", &self.skip)
            .field("take", &self.take)
            .finish()
    }
}

/// The answer to a `ChangeSetQuery`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSetPage {
    /// Matching envelopes in ledger order, after paging.
    pub records: Vec<Value>,

    /// Number of valid records in the ledger, ignoring every filter.
    pub total_count: u64,

    /// Hash of the last valid line read, or [`CHECKPOINT_NONE`].
    pub checkpoint: String,
}

impl ChangeSetPage {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            total_count: 0,
            checkpoint: CHECKPOINT_NONE.to_string(),
        }
    }
}
