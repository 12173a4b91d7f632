//! Command-name → handler registry.
//!
//! Domain modules register one handler per command at startup.  The
//! registry itself is a `ReplayHandler` that routes each record by its
//! command name, so replay and sync only ever see a single handler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ledger_contracts::{
    error::{LedgerError, LedgerResult},
    record::{DecodedRecord, RecordOrigin},
};

use crate::traits::{HandlerOutcome, ReplayHandler};

/// Routes records to the handler registered for their command.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn ReplayHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `command`.
    ///
    /// Returns `InvalidArgument` for an empty command name or a command that
    /// already has a handler.
    pub fn register(
        &mut self,
        command: impl Into<String>,
        handler: Arc<dyn ReplayHandler>,
    ) -> LedgerResult<&mut Self> {
        let command = command.into();
        if command.is_empty() {
            return Err(LedgerError::InvalidArgument {
                reason: "command name must not be empty".to_string(),
            });
        }
        if self.handlers.contains_key(&command) {
            return Err(LedgerError::InvalidArgument {
                reason: format!("command '{}' is already registered", command),
            });
        }
        self.handlers.insert(command, handler);
        Ok(self)
    }

    pub fn contains(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    /// Registered command names, sorted.
    pub fn commands(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl ReplayHandler for CommandRegistry {
    async fn handle(
        &self,
        record: &DecodedRecord,
        origin: &RecordOrigin,
    ) -> LedgerResult<HandlerOutcome> {
        match self.handlers.get(&record.command) {
            Some(handler) => handler.handle(record, origin).await,
            None => {
                debug!(
                    command = %record.command,
                    sender = %origin.sender,
                    line = ?origin.line_number,
                    "no handler registered; record ignored"
                );
                Ok(HandlerOutcome::Ignored)
            }
        }
    }
}
