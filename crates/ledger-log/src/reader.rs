//! Replaying a ledger through a handler to rebuild in-memory state.
//!
//! Records are handed to the handler one at a time, in file order, and each
//! handler call is awaited before the next line is read.  Nothing here
//! fails the caller: a missing file is an empty history, and a malformed
//! line or a failing handler is logged with its file and line and skipped.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use ledger_contracts::record::{RecordOrigin, GENESIS_PARENT};
use ledger_core::{ChainHead, HandlerOutcome, ReplayHandler};

use crate::chain::ChainVerifier;
use crate::codec::{parse_bytes, LineOutcome};

/// Counters describing one replay or sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Records the handler applied.
    pub applied: u64,
    /// Records the handler understood but that changed nothing.
    pub ignored: u64,
    /// Lines or envelopes that were not records.
    pub skipped: u64,
    /// Records the handler returned an error for.
    pub failed: u64,
    /// Chain verification failures seen (reported, never fatal).
    pub chain_breaks: u64,
    /// Hash of the last decoded record.
    pub last_hash: Option<String>,
    pub cancelled: bool,
}

impl ReplayReport {
    /// Records decoded, whatever the handler made of them.
    pub fn records(&self) -> u64 {
        self.applied + self.ignored + self.failed
    }
}

/// Decode-and-dispatch state shared by local replay and remote sync.
pub struct ReplaySession<'a> {
    handler: &'a dyn ReplayHandler,
    head: &'a ChainHead,
    verifier: ChainVerifier,
    report: ReplayReport,
}

impl<'a> ReplaySession<'a> {
    /// `expected_parent` is the hash the first record should link to; pass
    /// `None` to accept whatever the first record claims.
    pub fn new(
        handler: &'a dyn ReplayHandler,
        head: &'a ChainHead,
        expected_parent: Option<String>,
    ) -> Self {
        Self {
            handler,
            head,
            verifier: ChainVerifier::expecting(expected_parent),
            report: ReplayReport::default(),
        }
    }

    /// Apply one decoded line or envelope.
    pub async fn apply(&mut self, outcome: LineOutcome, origin: RecordOrigin) {
        let parsed = match outcome {
            LineOutcome::Blank | LineOutcome::Comment => return,
            LineOutcome::Malformed(reason) => {
                warn!(
                    sender = %origin.sender,
                    line = ?origin.line_number,
                    reason = %reason,
                    "skipping unparsable ledger line"
                );
                self.report.skipped += 1;
                return;
            }
            LineOutcome::Record(parsed) => parsed,
        };

        let breaks = self
            .verifier
            .check(&parsed.envelope, origin.line_number.unwrap_or_default());
        for chain_break in breaks {
            warn!(
                sender = %origin.sender,
                line = ?origin.line_number,
                kind = ?chain_break.kind,
                "hash chain does not verify"
            );
            self.report.chain_breaks += 1;
        }

        if let Some(hash) = parsed.record.hash_value() {
            self.head.advance(hash);
            self.report.last_hash = Some(hash.to_string());
        }

        match self.handler.handle(&parsed.record, &origin).await {
            Ok(HandlerOutcome::Applied) => self.report.applied += 1,
            Ok(HandlerOutcome::Ignored) => self.report.ignored += 1,
            Err(e) => {
                warn!(
                    sender = %origin.sender,
                    line = ?origin.line_number,
                    command = %parsed.record.command,
                    error = %e,
                    "handler failed; continuing replay"
                );
                self.report.failed += 1;
            }
        }
    }

    pub fn mark_cancelled(&mut self) {
        self.report.cancelled = true;
    }

    pub fn finish(self) -> ReplayReport {
        self.report
    }
}

/// Replays a ledger file through a handler.
#[derive(Debug, Clone)]
pub struct Replayer {
    default_path: PathBuf,
    disabled: bool,
    head: ChainHead,
}

impl Replayer {
    pub fn new(default_path: impl Into<PathBuf>, head: ChainHead) -> Self {
        Self {
            default_path: default_path.into(),
            disabled: false,
            head,
        }
    }

    /// Turn replay into a no-op.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Replay `path` (or the primary database file) through `handler`.
    ///
    /// The chain head advances with every decoded record, so writes made
    /// after replay continue the same chain.  When `cancel` fires, replay
    /// stops before the next line and the report says so.
    pub async fn replay(
        &self,
        handler: &dyn ReplayHandler,
        path: Option<&Path>,
        cancel: Option<&CancellationToken>,
    ) -> ReplayReport {
        let path = path.unwrap_or(&self.default_path);
        let mut session = ReplaySession::new(handler, &self.head, Some(GENESIS_PARENT.to_string()));

        if self.disabled {
            return session.finish();
        }

        let file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(file = %path.display(), "no ledger file; nothing to replay");
                return session.finish();
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "cannot open ledger for replay");
                return session.finish();
            }
        };

        let sender = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut line_number: u64 = 0;

        loop {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                info!(file = %path.display(), line = line_number, "replay cancelled");
                session.mark_cancelled();
                break;
            }

            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        file = %path.display(),
                        line = line_number + 1,
                        error = %e,
                        "read error; stopping replay"
                    );
                    break;
                }
            }
            line_number += 1;

            let origin = RecordOrigin::new(sender.clone(), Some(line_number));
            session.apply(parse_bytes(&buf), origin).await;
        }

        let report = session.finish();
        debug!(
            file = %path.display(),
            applied = report.applied,
            ignored = report.ignored,
            skipped = report.skipped,
            failed = report.failed,
            chain_breaks = report.chain_breaks,
            "replay finished"
        );
        report
    }
}
