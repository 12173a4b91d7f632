//! # ledger-core
//!
//! The pieces of the portal ledger that sit between the record types and
//! the file/network code:
//!
//! - [`ChainHead`]: the explicit, shared hash-chain head
//! - [`ReplayHandler`]: how replayed records reach in-memory state
//! - [`CommandRegistry`]: command name → handler routing
//! - [`retry_io`]: the single bounded-retry helper used by the writer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_core::{CommandRegistry, ReplayHandler};
//!
//! let mut registry = CommandRegistry::new();
//! registry.register("addFAQIfNotExists", Arc::new(AddFaq::new(store)))?;
//! ledger.replay(&registry, None).await;
//! ```

pub mod chain_head;
pub mod registry;
pub mod retry;
pub mod traits;

pub use chain_head::ChainHead;
pub use registry::CommandRegistry;
pub use retry::{retry_io, RetryPolicy};
pub use traits::{HandlerOutcome, ReplayHandler};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Map;

    use ledger_contracts::{
        error::{LedgerError, LedgerResult},
        record::{DecodedRecord, RecordOrigin},
    };

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Remembers every command it was handed.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReplayHandler for Recorder {
        async fn handle(
            &self,
            record: &DecodedRecord,
            _origin: &RecordOrigin,
        ) -> LedgerResult<HandlerOutcome> {
            self.seen.lock().unwrap().push(record.command.clone());
            Ok(HandlerOutcome::Applied)
        }
    }

    fn record(command: &str) -> DecodedRecord {
        DecodedRecord {
            command: command.to_string(),
            payload: Map::new(),
            event_tracking_id: None,
            actor_id: None,
            system_id: None,
            timestamp: None,
            integrity: None,
        }
    }

    fn origin() -> RecordOrigin {
        RecordOrigin::new("test.jsonl", Some(1))
    }

    // ── ChainHead ─────────────────────────────────────────────────────────────

    #[test]
    fn chain_head_starts_at_genesis() {
        let head = ChainHead::new();
        assert!(head.is_genesis());
        assert_eq!(head.current(), "");
    }

    #[test]
    fn chain_head_clones_share_state() {
        let head = ChainHead::new();
        let other = head.clone();
        other.advance("abc123");
        assert_eq!(head.current(), "abc123");
        assert!(!head.is_genesis());
    }

    // ── CommandRegistry ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn registry_routes_by_command() {
        let faqs = Arc::new(Recorder::default());
        let news = Arc::new(Recorder::default());

        let mut registry = CommandRegistry::new();
        registry
            .register("addFAQIfNotExists", faqs.clone())
            .unwrap()
            .register("addNewsPostingIfNotExists", news.clone())
            .unwrap();

        registry.handle(&record("addFAQIfNotExists"), &origin()).await.unwrap();
        registry
            .handle(&record("addNewsPostingIfNotExists"), &origin())
            .await
            .unwrap();
        registry.handle(&record("addFAQIfNotExists"), &origin()).await.unwrap();

        assert_eq!(faqs.seen.lock().unwrap().len(), 2);
        assert_eq!(news.seen.lock().unwrap().len(), 1);
        assert_eq!(
            registry.commands(),
            vec!["addFAQIfNotExists", "addNewsPostingIfNotExists"]
        );
    }

    #[tokio::test]
    async fn unknown_command_is_ignored() {
        let registry = CommandRegistry::new();
        let outcome = registry.handle(&record("dropDatabase"), &origin()).await.unwrap();
        assert_eq!(outcome, HandlerOutcome::Ignored);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = CommandRegistry::new();
        registry.register("removeFAQ", Arc::new(Recorder::default())).unwrap();
        let err = registry
            .register("removeFAQ", Arc::new(Recorder::default()))
            .err()
            .unwrap();
        assert!(matches!(err, LedgerError::InvalidArgument { .. }));
    }

    #[test]
    fn empty_command_registration_rejected() {
        let mut registry = CommandRegistry::new();
        assert!(registry.register("", Arc::new(Recorder::default())).is_err());
        assert!(!registry.contains(""));
    }

    // ── retry_io ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1));

        let value = retry_io(policy, "append", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(4, Duration::from_millis(1));

        let result: io::Result<()> = retry_io(policy, "append", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(io::Error::new(io::ErrorKind::Other, "still locked")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(0, Duration::from_millis(1));

        let _ = retry_io(policy, "append", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(io::Error::new(io::ErrorKind::Other, "x")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
