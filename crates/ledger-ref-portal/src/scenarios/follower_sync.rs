//! Scenario 2: Follower Synchronization
//!
//! A leader portal serves its ledger at `/changeSets`.  A follower with an
//! empty ledger is configured with an unreachable peer followed by the
//! leader; it falls back to the leader, applies everything, then polls
//! again with its checkpoint and only receives what was written since.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use ledger_contracts::{
    config::{LedgerConfig, PeerConfig},
    error::{LedgerError, LedgerResult},
};
use ledger_log::Ledger;
use ledger_sync::{build_router, Synchronizer};

use crate::mock_data::{sample_faqs, sample_news};
use crate::model::Faq;
use crate::portal::Portal;

pub async fn run_scenario(dir: &Path) -> LedgerResult<()> {
    println!("--- Scenario 2: Follower Synchronization ---");
    println!();

    // ── Leader ───────────────────────────────────────────────────────────────

    let mut leader_config = LedgerConfig {
        database_file: dir.join("leader.jsonl"),
        system_id: Some("leader".to_string()),
        ..LedgerConfig::default()
    };
    leader_config.server.api_key = Some("demo-key".to_string());
    let leader = Portal::new(Ledger::new(leader_config)?);
    for faq in sample_faqs() {
        leader.add_faq(faq, None).await?;
    }
    for posting in sample_news() {
        leader.add_news_posting(posting, None).await?;
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| LedgerError::ConfigError {
            reason: format!("cannot bind demo listener: {}", e),
        })?;
    let addr = listener.local_addr().map_err(|e| LedgerError::ConfigError {
        reason: format!("demo listener has no address: {}", e),
    })?;
    let router = build_router(leader.ledger().clone())?;
    let shutdown = CancellationToken::new();
    let server_stop = shutdown.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move { server_stop.cancelled().await })
            .await
    });

    let leader_url = format!("http://{}", addr);
    println!("  Leader serving changeSets at {}/changeSets", leader_url);

    // ── Follower ─────────────────────────────────────────────────────────────

    let mut follower_config = LedgerConfig {
        database_file: dir.join("follower.jsonl"),
        system_id: Some("follower".to_string()),
        ..LedgerConfig::default()
    };
    follower_config.sync.peers = vec![
        PeerConfig {
            url: "http://127.0.0.1:1".to_string(),
            api_key: "demo-key".to_string(),
        },
        PeerConfig {
            url: leader_url.clone(),
            api_key: "demo-key".to_string(),
        },
    ];
    follower_config.sync.retries = 1;
    follower_config.sync.retry_delay_ms = 50;
    let follower = Portal::new(Ledger::new(follower_config)?);
    let synchronizer = Synchronizer::for_ledger(follower.ledger())?;

    let first = follower.synchronize(&synchronizer).await?;
    println!(
        "  First poll:  peer={} applied={}",
        first.peer.as_deref().unwrap_or("none"),
        first.replay.applied
    );

    leader
        .add_faq(
            Faq {
                id: "faq-9".to_string(),
                question: "Is there a mobile app?".to_string(),
                answer: "Not yet; the portal works in mobile browsers.".to_string(),
            },
            None,
        )
        .await?;

    let second = follower.synchronize(&synchronizer).await?;
    println!(
        "  Second poll: peer={} applied={} (only the new FAQ)",
        second.peer.as_deref().unwrap_or("none"),
        second.replay.applied
    );
    println!(
        "  Follower state: {} FAQ(s), {} news posting(s); leader: {} FAQ(s), {} news posting(s)",
        follower.faqs().len().await,
        follower.news().len().await,
        leader.faqs().len().await,
        leader.news().len().await
    );

    shutdown.cancel();
    let _ = server.await;

    println!();
    println!("  Scenario 2 complete.");
    println!();

    Ok(())
}
