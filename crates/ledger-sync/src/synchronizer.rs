//! Pulling change sets from remote peers and replaying them locally.
//!
//! Peers are tried in configuration order and the first one that answers
//! wins.  When a whole round fails the round is repeated a bounded number of
//! times; after that the synchronizer gives up for this cycle.  It never
//! returns an error: a follower that cannot reach anyone simply does not
//! advance until the next cycle.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use ledger_contracts::{
    config::SyncConfig,
    error::LedgerResult,
    record::{RecordOrigin, GENESIS_PARENT},
};
use ledger_core::{ChainHead, ReplayHandler};
use ledger_log::{parse_envelope, Ledger, ReplayReport, ReplaySession};

use crate::client::PeerClient;

/// Outcome of one synchronization cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// The peer that answered, if any did.
    pub peer: Option<String>,
    pub replay: ReplayReport,
}

impl SyncReport {
    pub fn succeeded(&self) -> bool {
        self.peer.is_some()
    }
}

pub struct Synchronizer {
    peers: Vec<PeerClient>,
    retries: u32,
    retry_delay: Duration,
    head: ChainHead,
}

impl Synchronizer {
    pub fn new(peers: Vec<PeerClient>, retries: u32, retry_delay: Duration, head: ChainHead) -> Self {
        Self {
            peers,
            retries,
            retry_delay,
            head,
        }
    }

    /// Build peer clients from `config`; records advance `head`.
    ///
    /// # Errors
    ///
    /// `ConfigError` when an HTTP client cannot be built.
    pub fn from_config(config: &SyncConfig, head: ChainHead) -> LedgerResult<Self> {
        let peers = config
            .peers
            .iter()
            .map(|peer| PeerClient::new(peer, &config.api_key_header, config.request_timeout()))
            .collect::<LedgerResult<Vec<_>>>()?;
        Ok(Self::new(peers, config.retries, config.retry_delay(), head))
    }

    /// A synchronizer that feeds `ledger`'s chain head.
    pub fn for_ledger(ledger: &Ledger) -> LedgerResult<Self> {
        Self::from_config(&ledger.config().sync, ledger.head().clone())
    }

    pub fn peers(&self) -> &[PeerClient] {
        &self.peers
    }

    /// Fetch change sets from the first peer that answers.
    ///
    /// Returns the peer's URL and its records, or `None` once every round
    /// over every peer has failed.
    pub async fn fetch(&self, last_known_hash: Option<&str>) -> Option<(String, Vec<Value>)> {
        if self.peers.is_empty() {
            debug!("no sync peers configured");
            return None;
        }

        let rounds = self.retries.saturating_add(1);
        for round in 1..=rounds {
            for peer in &self.peers {
                match peer.fetch_change_sets(last_known_hash).await {
                    Ok(records) => {
                        debug!(
                            peer = %peer.base_url(),
                            records = records.len(),
                            round,
                            "change sets fetched"
                        );
                        return Some((peer.base_url().to_string(), records));
                    }
                    Err(e) => {
                        warn!(peer = %peer.base_url(), round, error = %e, "peer failed");
                    }
                }
            }
            if round < rounds {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        warn!(
            peers = self.peers.len(),
            rounds,
            "no peer answered; change sets not applied this cycle"
        );
        None
    }

    /// Fetch change sets after `last_known_hash` and replay them through
    /// `handler`, exactly as local replay would.
    pub async fn synchronize(
        &self,
        handler: &dyn ReplayHandler,
        last_known_hash: Option<&str>,
    ) -> SyncReport {
        let Some((peer, records)) = self.fetch(last_known_hash).await else {
            return SyncReport::default();
        };

        let expected_parent = last_known_hash.unwrap_or(GENESIS_PARENT).to_string();
        let mut session = ReplaySession::new(handler, &self.head, Some(expected_parent));
        for (idx, envelope) in records.into_iter().enumerate() {
            let origin = RecordOrigin::new(peer.clone(), Some(idx as u64 + 1));
            session.apply(parse_envelope(envelope), origin).await;
        }
        let replay = session.finish();

        info!(
            peer = %peer,
            applied = replay.applied,
            ignored = replay.ignored,
            skipped = replay.skipped,
            failed = replay.failed,
            "change sets synchronized"
        );

        SyncReport {
            peer: Some(peer),
            replay,
        }
    }
}
