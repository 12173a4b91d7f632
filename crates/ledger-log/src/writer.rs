//! Appending records to the ledger file.
//!
//! All writes of one ledger go through a single async mutex, because the
//! file is one physical resource.  Appends are best-effort durability: when
//! the retry budget runs out the failure is logged and swallowed, and the
//! caller's in-memory change stands.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error};

use ledger_contracts::error::LedgerResult;
use ledger_core::{retry_io, RetryPolicy};

use crate::codec::Codec;

/// Appends sealed records and comment lines to a ledger file.
///
/// Clones share the codec (and therefore the chain head) and the write lock.
#[derive(Debug, Clone)]
pub struct LogWriter {
    default_path: PathBuf,
    disabled: bool,
    retry: RetryPolicy,
    codec: Codec,
    lock: Arc<Mutex<()>>,
}

impl LogWriter {
    pub fn new(default_path: impl Into<PathBuf>, codec: Codec, retry: RetryPolicy) -> Self {
        Self {
            default_path: default_path.into(),
            disabled: false,
            retry,
            codec,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Turn every write into a no-op.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn default_path(&self) -> &Path {
        &self.default_path
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Append a record to the primary database file.
    ///
    /// See [`LogWriter::append_to`].
    pub async fn append(
        &self,
        command: &str,
        payload: Value,
        event_tracking_id: Option<&str>,
        actor_id: Option<&str>,
    ) -> LedgerResult<Option<String>> {
        let path = self.default_path.clone();
        self.append_to(&path, command, payload, event_tracking_id, actor_id)
            .await
    }

    /// Seal a record on top of the chain head and append it to `path`.
    ///
    /// Returns the record's hash once it is on disk, or `None` when logging
    /// is disabled or every attempt failed.  The chain head only advances
    /// when the line was written, so the file never links to a record it
    /// does not contain.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty command or a non-object payload.
    pub async fn append_to(
        &self,
        path: &Path,
        command: &str,
        payload: Value,
        event_tracking_id: Option<&str>,
        actor_id: Option<&str>,
    ) -> LedgerResult<Option<String>> {
        if self.disabled {
            return Ok(None);
        }

        let _guard = self.lock.lock().await;

        let parent = self.codec.head().current();
        let record = self
            .codec
            .seal(&parent, command, payload, event_tracking_id, actor_id)?;

        let text = format!("{}\n", record.line);
        match self.write_text(path, &text).await {
            Ok(()) => {
                self.codec.head().advance(&record.hash_value);
                debug!(
                    file = %path.display(),
                    command = %command,
                    hash = %record.hash_value,
                    "record appended"
                );
                Ok(Some(record.hash_value))
            }
            Err(e) => {
                error!(
                    file = %path.display(),
                    command = %command,
                    attempts = self.retry.attempts,
                    error = %e,
                    "giving up on ledger append"
                );
                Ok(None)
            }
        }
    }

    /// Append a `# <text>` line to the primary database file.
    pub async fn append_comment(&self, text: &str) -> bool {
        let path = self.default_path.clone();
        self.append_comment_to(&path, text).await
    }

    /// Append a `# <text>` line to `path`.
    ///
    /// Comments bypass the envelope and never move the chain head.  Newlines
    /// in `text` are folded to spaces so the comment stays on one line.
    /// Returns whether the line was written.
    pub async fn append_comment_to(&self, path: &Path, text: &str) -> bool {
        if self.disabled {
            return false;
        }

        let _guard = self.lock.lock().await;

        let folded: String = text
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        let line = format!("# {}\n", folded);
        match self.write_text(path, &line).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    file = %path.display(),
                    error = %e,
                    "giving up on ledger comment"
                );
                false
            }
        }
    }

    async fn write_text(&self, path: &Path, text: &str) -> io::Result<()> {
        retry_io(self.retry, "ledger append", move || append_text(path, text)).await
    }
}

async fn append_text(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(text.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}
