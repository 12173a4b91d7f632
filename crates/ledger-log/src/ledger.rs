//! `Ledger`: one configured ledger file with its writer, replayer and head.
//!
//! Construct one `Ledger` per database file and share clones of it.  All
//! clones write under the same lock and advance the same chain head.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use ledger_contracts::{
    config::LedgerConfig,
    error::LedgerResult,
    query::{ChangeSetPage, ChangeSetQuery},
};
use ledger_core::{ChainHead, ReplayHandler, RetryPolicy};

use crate::chain::{verify_file, ChainVerification};
use crate::codec::Codec;
use crate::filter::load_change_sets;
use crate::reader::{ReplayReport, Replayer};
use crate::writer::LogWriter;

#[derive(Debug, Clone)]
pub struct Ledger {
    config: Arc<LedgerConfig>,
    head: ChainHead,
    writer: LogWriter,
    replayer: Replayer,
}

impl Ledger {
    /// Build a ledger from validated configuration.
    ///
    /// # Errors
    ///
    /// `ConfigError` when the configuration does not validate.
    pub fn new(config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;

        let head = ChainHead::new();
        let codec = Codec::new(config.resolve_system_id(), head.clone());
        let retry = RetryPolicy::new(config.write_attempts, config.write_retry_delay());

        let writer = LogWriter::new(&config.database_file, codec, retry)
            .disabled(config.disable_logging);
        let replayer = Replayer::new(&config.database_file, head.clone())
            .disabled(config.disable_logging);

        info!(
            file = %config.database_file.display(),
            system_id = %writer.codec().system_id(),
            disabled = config.disable_logging,
            "ledger configured"
        );

        Ok(Self {
            config: Arc::new(config),
            head,
            writer,
            replayer,
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn head(&self) -> &ChainHead {
        &self.head
    }

    pub fn system_id(&self) -> &str {
        self.writer.codec().system_id()
    }

    pub fn database_file(&self) -> &Path {
        &self.config.database_file
    }

    pub fn writer(&self) -> &LogWriter {
        &self.writer
    }

    /// Append a record to the primary database file.
    pub async fn append(
        &self,
        command: &str,
        payload: Value,
        event_tracking_id: Option<&str>,
        actor_id: Option<&str>,
    ) -> LedgerResult<Option<String>> {
        self.writer
            .append(command, payload, event_tracking_id, actor_id)
            .await
    }

    /// Append a `#` comment line to the primary database file.
    pub async fn append_comment(&self, text: &str) -> bool {
        self.writer.append_comment(text).await
    }

    /// Replay the primary database file through `handler`.
    pub async fn replay(
        &self,
        handler: &dyn ReplayHandler,
        cancel: Option<&CancellationToken>,
    ) -> ReplayReport {
        self.replayer.replay(handler, None, cancel).await
    }

    /// Replay another ledger file through `handler`.
    pub async fn replay_file(
        &self,
        handler: &dyn ReplayHandler,
        path: &Path,
        cancel: Option<&CancellationToken>,
    ) -> ReplayReport {
        self.replayer.replay(handler, Some(path), cancel).await
    }

    /// Filtered, paged read of the primary database file.
    pub async fn load_change_sets(&self, query: &ChangeSetQuery) -> LedgerResult<ChangeSetPage> {
        load_change_sets(&self.config.database_file, query).await
    }

    /// Verify the hash chain of the primary database file.
    pub async fn verify(&self) -> LedgerResult<ChainVerification> {
        verify_file(&self.config.database_file).await
    }
}
