//! Filtered, paged windows over the ledger file ("change sets").
//!
//! This is what a `changeSets` endpoint serves to followers.  It is a pure
//! read: the chain head is never touched and the writer lock is not taken.
//! A partially written trailing line, or one that is not UTF-8, fails to
//! parse and is skipped like any other malformed line.

use std::path::Path;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, trace};

use ledger_contracts::{
    error::{LedgerError, LedgerResult},
    query::{ChangeSetPage, ChangeSetQuery, CHECKPOINT_NONE},
};

use crate::codec::{parse_bytes, LineOutcome};

/// Answer `query` from the ledger at `path`.
///
/// Every valid record counts towards `total_count`.  A record is returned
/// when it is not older than `since`, comes strictly after the record whose
/// hash is `skip_until_hash`, and satisfies the line predicate; `skip` and
/// `take` then page that result.  The skip-until gate watches every valid
/// record, so the checkpoint record opens it even if `since` filters it out.
///
/// A missing file yields an empty page with checkpoint `"0"`.
///
/// # Errors
///
/// `ReadFailed` when the file exists but cannot be read.
pub async fn load_change_sets(path: &Path, query: &ChangeSetQuery) -> LedgerResult<ChangeSetPage> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            trace!(file = %path.display(), "no ledger file; empty change set");
            return Ok(ChangeSetPage::empty());
        }
        Err(e) => {
            return Err(LedgerError::ReadFailed {
                reason: format!("cannot open '{}': {}", path.display(), e),
            })
        }
    };

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut total_count: u64 = 0;
    let mut last_valid_hash: Option<String> = None;
    let mut gate_open = query.skip_until_hash.is_none();
    let mut matched: Vec<Value> = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(LedgerError::ReadFailed {
                    reason: format!("cannot read '{}': {}", path.display(), e),
                })
            }
        }

        let parsed = match parse_bytes(&buf) {
            LineOutcome::Record(parsed) => parsed,
            _ => continue,
        };
        total_count += 1;

        let passes_since = match (query.since, parsed.record.timestamp) {
            (None, _) => true,
            (Some(since), Some(ts)) => ts >= since,
            (Some(_), None) => false,
        };

        let behind_checkpoint = !gate_open;
        if !gate_open {
            gate_open = parsed.record.hash_value() == query.skip_until_hash.as_deref();
        }

        // A record implies the line decoded as UTF-8.
        let passes_predicate = query.predicate.as_ref().map_or(true, |predicate| {
            std::str::from_utf8(&buf).is_ok_and(|line| predicate(line.trim_end()))
        });

        last_valid_hash = parsed.record.hash_value().map(str::to_string);
        if passes_since && !behind_checkpoint && passes_predicate {
            matched.push(Value::Object(parsed.envelope));
        }
    }

    let checkpoint = last_valid_hash.unwrap_or_else(|| CHECKPOINT_NONE.to_string());

    let filtered = matched.len();
    let records: Vec<Value> = matched
        .into_iter()
        .skip(query.skip.unwrap_or(0))
        .take(query.take.unwrap_or(usize::MAX))
        .collect();

    debug!(
        file = %path.display(),
        total = total_count,
        filtered,
        returned = records.len(),
        checkpoint = %checkpoint,
        "change sets loaded"
    );

    Ok(ChangeSetPage {
        records,
        total_count,
        checkpoint,
    })
}
