//! # ledger-log
//!
//! Append-only, SHA-256 hash-chained, JSON-lines ledger for the portal.
//!
//! ## Overview
//!
//! Every durable state change is written as one line: the command name
//! mapped to its payload, the envelope fields, and an `integrity` block
//! whose `parentHash` is the previous line's `hashValue`.  Editing any
//! historical line breaks the chain and is detected by [`verify_lines`].
//!
//! - [`codec`]: sealing and parsing single lines
//! - [`writer`]: serialized, retried appends
//! - [`reader`]: sequential replay through a [`ReplayHandler`](ledger_core::ReplayHandler)
//! - [`filter`]: `since` / `skipUntil` / predicate windows with paging
//! - [`Ledger`]: all of the above bound to one configured file
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ledger_log::Ledger;
//!
//! let ledger = Ledger::new(config)?;
//! ledger.replay(&registry, None).await;
//! ledger.append("addFAQIfNotExists", json!({ "id": "faq-1" }), None, None).await?;
//! ```

pub mod chain;
pub mod codec;
pub mod filter;
pub mod ledger;
pub mod reader;
pub mod writer;

pub use chain::{hash_envelope, verify_file, verify_lines, BreakKind, ChainBreak, ChainVerification};
pub use codec::{parse_bytes, parse_envelope, parse_line, Codec, LineOutcome, ParsedRecord};
pub use filter::load_change_sets;
pub use ledger::Ledger;
pub use reader::{ReplayReport, ReplaySession, Replayer};
pub use writer::LogWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────
