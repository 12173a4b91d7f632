//! # ledger-contracts
//!
//! Shared types for the portal ledger: records and their envelope keys,
//! change-set queries, configuration, and the error type.
//!
//! All crates in the workspace import from here. No I/O lives in this crate
//! apart from reading a configuration file.

pub mod config;
pub mod error;
pub mod query;
pub mod record;

#[cfg(test)]
mod tests {
    use super::*;
    use config::LedgerConfig;
    use error::LedgerError;
    use query::{ChangeSetPage, ChangeSetQuery, CHECKPOINT_NONE};
    use record::{envelope_hash, envelope_timestamp, Integrity, DEFAULT_ACTOR};

    // ── LedgerConfig ─────────────────────────────────────────────────────────

    #[test]
    fn empty_toml_yields_defaults() {
        let config = LedgerConfig::from_toml_str("").unwrap();

        assert_eq!(config.database_file.to_str(), Some("ledger.jsonl"));
        assert!(!config.disable_logging);
        assert_eq!(config.write_attempts, 23);
        assert_eq!(config.write_retry_delay_ms, 10);
        assert!(config.sync.peers.is_empty());
        assert_eq!(config.sync.request_timeout_secs, 5);
        assert_eq!(config.sync.retries, 3);
        assert_eq!(config.sync.api_key_header, "X-API-Key");
        assert!(config.server.api_key.is_none());
    }

    #[test]
    fn peers_parse_in_declaration_order() {
        let toml = r#"
            database_file = "data/portal.jsonl"
            system_id = "portal-eu-1"

            [[sync.peers]]
            url = "http://a.example/api"
            api_key = "ka"

            [[sync.peers]]
            url = "http://b.example/api"
        "#;

        let config = LedgerConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.resolve_system_id(), "portal-eu-1");
        assert_eq!(config.sync.peers.len(), 2);
        assert_eq!(config.sync.peers[0].url, "http://a.example/api");
        assert_eq!(config.sync.peers[0].api_key, "ka");
        assert_eq!(config.sync.peers[1].api_key, "");
    }

    #[test]
    fn zero_write_attempts_rejected() {
        let err = LedgerConfig::from_toml_str("write_attempts = 0").unwrap_err();
        assert!(matches!(err, LedgerError::ConfigError { .. }));
    }

    #[test]
    fn peer_with_empty_url_rejected() {
        let toml = r#"
            [[sync.peers]]
            url = "  "
        "#;
        let err = LedgerConfig::from_toml_str(toml).unwrap_err();
        assert!(err.to_string().contains("sync.peers[0]"));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = LedgerConfig::from_toml_str("database_file = [").unwrap_err();
        assert!(err.to_string().contains("failed to parse ledger TOML"));
    }

    #[test]
    fn generated_system_ids_are_unique() {
        let config = LedgerConfig::default();
        assert_ne!(config.resolve_system_id(), config.resolve_system_id());
    }

    // ── Records ──────────────────────────────────────────────────────────────

    #[test]
    fn integrity_omits_missing_hash_value() {
        let integrity = Integrity {
            nonce: "ab".to_string(),
            parent_hash: String::new(),
            hash_value: None,
        };
        let json = serde_json::to_string(&integrity).unwrap();
        assert_eq!(json, r#"{"nonce":"ab","parentHash":""}"#);
    }

    #[test]
    fn envelope_accessors_read_hash_and_timestamp() {
        let envelope = serde_json::json!({
            "noop": {},
            "timestamp": "2024-03-01T10:00:00.000000Z",
            "integrity": { "nonce": "n", "parentHash": "", "hashValue": "abc" }
        });
        let map = envelope.as_object().unwrap();

        assert_eq!(envelope_hash(map), Some("abc"));
        let ts = envelope_timestamp(map).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn default_actor_is_robot() {
        assert_eq!(DEFAULT_ACTOR, "robot");
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    #[test]
    fn query_builder_sets_every_field() {
        let query = ChangeSetQuery::new()
            .skip_until("abc")
            .matching(|line| line.contains("FAQ"))
            .skip(2)
            .take(5);

        assert_eq!(query.skip_until_hash.as_deref(), Some("abc"));
        assert_eq!(query.skip, Some(2));
        assert_eq!(query.take, Some(5));
        let predicate = query.predicate.clone().unwrap();
        assert!(predicate("addFAQIfNotExists"));
        assert!(!predicate("addNewsPostingIfNotExists"));
        assert!(format!("{:?}", query).contains("<fn>"));
    }

    #[test]
    fn empty_page_uses_sentinel_checkpoint() {
        let page = ChangeSetPage::empty();
        assert_eq!(page.checkpoint, CHECKPOINT_NONE);
        assert_eq!(page.total_count, 0);
        assert!(page.records.is_empty());
    }

    // ── LedgerError display messages ─────────────────────────────────────────

    #[test]
    fn error_peer_unavailable_display() {
        let err = LedgerError::PeerUnavailable {
            peer: "http://a.example".to_string(),
            reason: "timed out".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("http://a.example"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn error_handler_failed_display() {
        let err = LedgerError::handler("updateFAQ", "unknown id");
        let msg = err.to_string();
        assert!(msg.contains("updateFAQ"));
        assert!(msg.contains("unknown id"));
    }

    #[test]
    fn error_chain_broken_display() {
        let err = LedgerError::ChainBroken {
            line: 4,
            reason: "parentHash mismatch".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "hash chain broken at line 4: parentHash mismatch"
        );
    }
}
