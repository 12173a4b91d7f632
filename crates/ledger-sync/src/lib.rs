//! # ledger-sync
//!
//! Change-set synchronization between portal ledger instances.
//!
//! - [`server`]: serves a ledger's filtered windows at `GET /changeSets`
//! - [`client`]: fetches those windows from one peer
//! - [`synchronizer`]: tries peers in order, retries whole rounds, and
//!   replays what it gets through the same handler as local replay
//! - [`follower`]: runs the synchronizer periodically
//!
//! Local replay first, then remote sync, is the intended order: the chain
//! head left by local replay is the natural `skipUntil` for the first poll.

pub mod client;
pub mod follower;
pub mod server;
pub mod synchronizer;

pub use client::PeerClient;
pub use follower::run_follower_loop;
pub use server::{build_router, serve};
pub use synchronizer::{SyncReport, Synchronizer};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    use ledger_contracts::{
        config::{LedgerConfig, PeerConfig, SyncConfig},
        error::{LedgerError, LedgerResult},
        query::ChangeSetQuery,
        record::{DecodedRecord, RecordOrigin},
    };
    use ledger_core::{ChainHead, HandlerOutcome, ReplayHandler};
    use ledger_log::Ledger;

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct FaqMap {
        faqs: Mutex<HashMap<String, Value>>,
        senders: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReplayHandler for FaqMap {
        async fn handle(
            &self,
            record: &DecodedRecord,
            origin: &RecordOrigin,
        ) -> LedgerResult<HandlerOutcome> {
            self.senders.lock().unwrap().push(origin.sender.clone());
            let id = record
                .payload
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| LedgerError::handler(&record.command, "missing id"))?;
            let mut faqs = self.faqs.lock().unwrap();
            if faqs.contains_key(id) {
                return Ok(HandlerOutcome::Ignored);
            }
            faqs.insert(id.to_string(), Value::Object(record.payload.clone()));
            Ok(HandlerOutcome::Applied)
        }
    }

    fn leader_ledger(dir: &TempDir, api_key: Option<&str>) -> Ledger {
        let mut config = LedgerConfig {
            database_file: dir.path().join("leader.jsonl"),
            system_id: Some("leader".to_string()),
            write_retry_delay_ms: 1,
            ..LedgerConfig::default()
        };
        config.server.api_key = api_key.map(str::to_string);
        Ledger::new(config).unwrap()
    }

    async fn seed(ledger: &Ledger, ids: &[&str]) -> Vec<String> {
        let mut hashes = Vec::new();
        for id in ids {
            let hash = ledger
                .append(
                    "addFAQIfNotExists",
                    json!({ "id": id, "question": "Q", "answer": "A" }),
                    None,
                    None,
                )
                .await
                .unwrap()
                .unwrap();
            hashes.push(hash);
        }
        hashes
    }

    /// Serve `ledger` on an ephemeral port; returns its base URL.
    async fn spawn_leader(ledger: Ledger) -> String {
        spawn_stub(build_router(ledger).unwrap()).await
    }

    /// Serve an arbitrary router on an ephemeral port; returns its base URL.
    async fn spawn_stub(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// A peer that always answers `body` with status 200.
    async fn spawn_fixed_peer(body: Value) -> String {
        let app = Router::new().route(
            "/changeSets",
            get(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        );
        spawn_stub(app).await
    }

    fn sync_config(peers: Vec<PeerConfig>) -> SyncConfig {
        SyncConfig {
            peers,
            request_timeout_secs: 2,
            retries: 1,
            retry_delay_ms: 1,
            ..SyncConfig::default()
        }
    }

    fn peer(url: &str, api_key: &str) -> PeerConfig {
        PeerConfig {
            url: url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Nothing listens on port 1, so connections are refused immediately.
    const DEAD_PEER: &str = "http://127.0.0.1:1";

    // ── Server ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn server_sends_checkpoint_and_total_headers() {
        let dir = TempDir::new().unwrap();
        let ledger = leader_ledger(&dir, None);
        let hashes = seed(&ledger, &["faq-1", "faq-2", "faq-3"]).await;
        let base = spawn_leader(ledger).await;

        let resp = reqwest::Client::new()
            .get(format!("{}/changeSets", base))
            .query(&[("skipUntil", hashes[0].as_str()), ("take", "1")])
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(
            resp.headers()["etag"].to_str().unwrap(),
            format!("\"{}\"", hashes[2])
        );
        assert_eq!(resp.headers()["x-total-count"].to_str().unwrap(), "3");
        let body: Vec<Value> = resp.json().await.unwrap();
        assert_eq!(body.len(), 1);
        assert_eq!(body[0]["addFAQIfNotExists"]["id"], "faq-2");
    }

    #[tokio::test]
    async fn server_rejects_missing_api_key() {
        let dir = TempDir::new().unwrap();
        let base = spawn_leader(leader_ledger(&dir, Some("s3cret"))).await;

        let denied = reqwest::Client::new()
            .get(format!("{}/changeSets", base))
            .send()
            .await
            .unwrap();
        assert_eq!(denied.status(), reqwest::StatusCode::UNAUTHORIZED);

        let allowed = reqwest::Client::new()
            .get(format!("{}/changeSets", base))
            .header("X-API-Key", "s3cret")
            .send()
            .await
            .unwrap();
        assert_eq!(allowed.status(), reqwest::StatusCode::OK);
        assert_eq!(allowed.headers()["etag"].to_str().unwrap(), "\"0\"");
    }

    // ── Synchronizer ──────────────────────────────────────────────────────────

    /// With no peers there is nothing to do and nothing to fail.
    #[tokio::test]
    async fn zero_peers_apply_nothing() {
        let synchronizer =
            Synchronizer::from_config(&sync_config(Vec::new()), ChainHead::new()).unwrap();
        let faqs = FaqMap::default();

        let report = synchronizer.synchronize(&faqs, None).await;

        assert!(!report.succeeded());
        assert_eq!(report.replay.records(), 0);
        assert!(faqs.faqs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_the_next_peer() {
        let dir = TempDir::new().unwrap();
        let ledger = leader_ledger(&dir, None);
        let hashes = seed(&ledger, &["faq-1", "faq-2"]).await;
        let base = spawn_leader(ledger).await;

        let head = ChainHead::new();
        let config = sync_config(vec![peer(DEAD_PEER, ""), peer(&base, "")]);
        let synchronizer = Synchronizer::from_config(&config, head.clone()).unwrap();
        let faqs = FaqMap::default();

        let report = synchronizer.synchronize(&faqs, None).await;

        assert_eq!(report.peer.as_deref(), Some(base.as_str()));
        assert_eq!(report.replay.applied, 2);
        assert_eq!(report.replay.chain_breaks, 0);
        assert_eq!(report.replay.last_hash.as_deref(), Some(hashes[1].as_str()));
        assert_eq!(head.current(), hashes[1]);
        assert!(faqs.senders.lock().unwrap().iter().all(|s| *s == base));
    }

    #[tokio::test]
    async fn checkpoint_fetches_only_new_records() {
        let dir = TempDir::new().unwrap();
        let ledger = leader_ledger(&dir, None);
        let hashes = seed(&ledger, &["faq-1", "faq-2"]).await;
        let base = spawn_leader(ledger.clone()).await;

        let synchronizer =
            Synchronizer::from_config(&sync_config(vec![peer(&base, "")]), ChainHead::new())
                .unwrap();
        let faqs = FaqMap::default();
        synchronizer.synchronize(&faqs, None).await;

        seed(&ledger, &["faq-3"]).await;
        let report = synchronizer.synchronize(&faqs, Some(&hashes[1])).await;

        assert_eq!(report.replay.applied, 1);
        assert_eq!(report.replay.ignored, 0);
        assert_eq!(report.replay.chain_breaks, 0);
        assert_eq!(faqs.faqs.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn all_peers_failing_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let ledger = leader_ledger(&dir, Some("right-key"));
        seed(&ledger, &["faq-1"]).await;
        let base = spawn_leader(ledger).await;

        let config = sync_config(vec![peer(DEAD_PEER, ""), peer(&base, "wrong-key")]);
        let synchronizer = Synchronizer::from_config(&config, ChainHead::new()).unwrap();
        let faqs = FaqMap::default();

        let report = synchronizer.synchronize(&faqs, None).await;

        assert_eq!(report, SyncReport::default());
        assert!(faqs.faqs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn api_key_is_sent_to_the_peer() {
        let dir = TempDir::new().unwrap();
        let ledger = leader_ledger(&dir, Some("right-key"));
        seed(&ledger, &["faq-1"]).await;
        let base = spawn_leader(ledger).await;

        let config = sync_config(vec![peer(&base, "right-key")]);
        let synchronizer = Synchronizer::from_config(&config, ChainHead::new()).unwrap();
        let faqs = FaqMap::default();

        let report = synchronizer.synchronize(&faqs, None).await;
        assert!(report.succeeded());
        assert_eq!(report.replay.applied, 1);
    }

    #[tokio::test]
    async fn non_array_body_counts_as_a_failed_peer() {
        let dir = TempDir::new().unwrap();
        let ledger = leader_ledger(&dir, None);
        seed(&ledger, &["faq-1", "faq-2"]).await;
        let base = spawn_leader(ledger).await;
        let odd = spawn_fixed_peer(json!({ "x": 1 })).await;

        let alone = Synchronizer::from_config(&sync_config(vec![peer(&odd, "")]), ChainHead::new())
            .unwrap();
        assert_eq!(alone.synchronize(&FaqMap::default(), None).await, SyncReport::default());

        let config = sync_config(vec![peer(&odd, ""), peer(&base, "")]);
        let synchronizer = Synchronizer::from_config(&config, ChainHead::new()).unwrap();
        let faqs = FaqMap::default();
        let report = synchronizer.synchronize(&faqs, None).await;

        assert_eq!(report.peer.as_deref(), Some(base.as_str()));
        assert_eq!(report.replay.applied, 2);
    }

    #[tokio::test]
    async fn malformed_envelope_is_skipped_and_the_rest_apply() {
        let dir = TempDir::new().unwrap();
        let ledger = leader_ledger(&dir, None);
        let hashes = seed(&ledger, &["faq-1", "faq-2"]).await;
        let page = ledger
            .load_change_sets(&ChangeSetQuery::new())
            .await
            .unwrap();

        let mut body = vec![json!(1)];
        body.extend(page.records);
        let base = spawn_fixed_peer(Value::Array(body)).await;

        let synchronizer =
            Synchronizer::from_config(&sync_config(vec![peer(&base, "")]), ChainHead::new())
                .unwrap();
        let faqs = FaqMap::default();
        let report = synchronizer.synchronize(&faqs, None).await;

        assert_eq!(report.replay.skipped, 1);
        assert_eq!(report.replay.applied, 2);
        assert_eq!(report.replay.chain_breaks, 0);
        assert_eq!(report.replay.last_hash.as_deref(), Some(hashes[1].as_str()));
        assert_eq!(faqs.faqs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failing_peer_is_tried_once_per_round() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/changeSets",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }),
        );
        let base = spawn_stub(app).await;

        let config = SyncConfig {
            retries: 2,
            ..sync_config(vec![peer(&base, "")])
        };
        let synchronizer = Synchronizer::from_config(&config, ChainHead::new()).unwrap();
        let report = synchronizer.synchronize(&FaqMap::default(), None).await;

        assert!(!report.succeeded());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    // ── Follower loop ─────────────────────────────────────────────────────────

    #[tokio::test]
    async fn follower_loop_tracks_last_hash_until_cancelled() {
        let dir = TempDir::new().unwrap();
        let ledger = leader_ledger(&dir, None);
        let hashes = seed(&ledger, &["faq-1", "faq-2"]).await;
        let base = spawn_leader(ledger).await;

        let synchronizer =
            Synchronizer::from_config(&sync_config(vec![peer(&base, "")]), ChainHead::new())
                .unwrap();
        let faqs = FaqMap::default();
        let cancel = CancellationToken::new();

        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            stopper.cancel();
        });

        let last = run_follower_loop(
            &synchronizer,
            &faqs,
            None,
            Duration::from_millis(20),
            cancel,
        )
        .await;

        assert_eq!(last.as_deref(), Some(hashes[1].as_str()));
        assert_eq!(faqs.faqs.lock().unwrap().len(), 2);
    }
}
