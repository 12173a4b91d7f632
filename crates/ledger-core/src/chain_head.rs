//! The ledger's chain head.
//!
//! The chain head is the `hashValue` of the most recently written or
//! replayed record and the `parentHash` of the next one.  It is an explicit
//! value owned by a ledger and handed to the components that advance it,
//! instead of process-global state.

use std::sync::{Arc, Mutex};

use ledger_contracts::record::GENESIS_PARENT;

/// A shared handle on the current chain head.
///
/// Clones observe and advance the same value.
#[derive(Debug, Clone)]
pub struct ChainHead {
    inner: Arc<Mutex<String>>,
}

impl ChainHead {
    /// A head for an empty ledger: the next record links to the genesis parent.
    pub fn new() -> Self {
        Self::starting_at(GENESIS_PARENT)
    }

    pub fn starting_at(hash: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(hash.into())),
        }
    }

    /// The hash the next record must carry as its `parentHash`.
    pub fn current(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn advance(&self, hash: &str) {
        let mut head = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        head.clear();
        head.push_str(hash);
    }

    pub fn is_genesis(&self) -> bool {
        self.current() == GENESIS_PARENT
    }
}

impl Default for ChainHead {
    fn default() -> Self {
        Self::new()
    }
}
