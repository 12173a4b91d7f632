//! Periodic synchronization for follower instances.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ledger_core::ReplayHandler;

use crate::synchronizer::Synchronizer;

/// Synchronize every `interval` until `cancel` fires.
///
/// Each cycle asks for the records after the last hash applied so far,
/// starting from `start_from` (usually the chain head after local replay).
/// Returns the last hash applied when the loop stops.
pub async fn run_follower_loop(
    synchronizer: &Synchronizer,
    handler: &dyn ReplayHandler,
    start_from: Option<String>,
    interval: Duration,
    cancel: CancellationToken,
) -> Option<String> {
    let mut last_hash = start_from.filter(|h| !h.is_empty());

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let report = synchronizer.synchronize(handler, last_hash.as_deref()).await;
        if let Some(hash) = report.replay.last_hash {
            last_hash = Some(hash);
        }
        debug!(
            peer = ?report.peer,
            applied = report.replay.applied,
            last_hash = ?last_hash,
            "follower cycle finished"
        );

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!(last_hash = ?last_hash, "follower loop stopped");
    last_hash
}
