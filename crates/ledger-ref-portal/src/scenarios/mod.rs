//! Portal demo scenarios.
//!
//! Each scenario is a self-contained module that wires real ledger
//! components (writer, replayer, filtered loader, synchronizer) to the
//! reference portal stores inside a scratch directory.

pub mod follower_sync;
pub mod replay_restore;
