//! # ledger-ref-portal
//!
//! Reference domain for the ledger: a small content portal with FAQs and
//! news postings.  Every mutation is appended to the ledger as a command
//! record, and the state of a fresh instance is rebuilt by replaying the
//! local file and then synchronizing with peers.
//!
//! ## Commands
//!
//! | Command                      | Payload             |
//! |------------------------------|---------------------|
//! | `addFAQIfNotExists`          | full FAQ            |
//! | `updateFAQ`                  | full FAQ            |
//! | `removeFAQ`                  | `{ "id": … }`       |
//! | `addNewsPostingIfNotExists`  | full news posting   |
//! | `updateNewsPosting`          | full news posting   |
//! | `removeNewsPosting`          | `{ "id": … }`       |

pub mod handlers;
pub mod mock_data;
pub mod model;
pub mod portal;
pub mod scenarios;
pub mod store;

pub use model::{Entity, Faq, NewsPosting};
pub use portal::Portal;
pub use store::EntityStore;

// ── Tests ─────────────────────────────────────────────────────────────────────
