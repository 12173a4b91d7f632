//! Portal Ledger: command-line tool
//!
//! Appends records, replays and verifies a ledger file, answers change-set
//! queries, serves `/changeSets` to peers, and synchronizes from them.  The
//! `scenario` subcommand runs the portal demo scenarios in a scratch dir.
//!
//! Usage:
//!   cargo run -p demo -- append addFAQIfNotExists '{"id":"faq-1","question":"Q","answer":"A"}'
//!   cargo run -p demo -- replay
//!   cargo run -p demo -- verify
//!   cargo run -p demo -- change-sets --skip-until <hash> --take 10
//!   cargo run -p demo -- --config ledger.toml serve
//!   cargo run -p demo -- --config ledger.toml sync --follow
//!   cargo run -p demo -- scenario all

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ledger_contracts::{
    config::LedgerConfig,
    error::{LedgerError, LedgerResult},
    query::{ChangeSetPage, ChangeSetQuery},
};
use ledger_log::Ledger;
use ledger_ref_portal::{
    scenarios::{follower_sync, replay_restore},
    Portal,
};
use ledger_sync::{run_follower_loop, serve, Synchronizer};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Portal ledger: a hash-chained, append-only JSON-lines event log.
#[derive(Parser)]
#[command(
    name = "ledger",
    about = "Hash-chained append-only event log for the portal",
    long_about = "Writes, replays, verifies and synchronizes portal ledger files.\n\
                  Every record carries the SHA-256 hash of its predecessor."
)]
struct Cli {
    /// TOML configuration file.  Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `database_file` from the configuration.
    #[arg(long, global = true)]
    database_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append one command record.
    Append {
        /// Command name, e.g. `addFAQIfNotExists`.
        command: String,
        /// JSON object payload.
        payload: String,
        #[arg(long)]
        tracking_id: Option<String>,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Append a `#` comment line.
    Comment { text: String },
    /// Replay the ledger into the portal stores and print the result.
    Replay,
    /// Verify the hash chain of the ledger file.
    Verify,
    /// Print a filtered window of records as JSON.
    ChangeSets {
        /// Only records with a timestamp at or after this RFC 3339 instant.
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        /// Only records after the record with this hash.
        #[arg(long)]
        skip_until: Option<String>,
        #[arg(long)]
        skip: Option<usize>,
        #[arg(long)]
        take: Option<usize>,
    },
    /// Replay locally, then pull change sets from the configured peers.
    Sync {
        /// Keep polling every `sync.interval_secs` until Ctrl-C.
        #[arg(long)]
        follow: bool,
    },
    /// Serve `GET /changeSets` until Ctrl-C.
    Serve,
    /// Run portal demo scenarios in a temporary directory.
    Scenario {
        #[arg(value_enum, default_value_t = ScenarioName::All)]
        name: ScenarioName,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScenarioName {
    All,
    ReplayRestore,
    FollowerSync,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("ledger error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> LedgerResult<()> {
    if let Command::Scenario { name } = cli.command {
        return run_scenarios(name).await;
    }

    let mut config = match &cli.config {
        Some(path) => LedgerConfig::from_file(path)?,
        None => LedgerConfig::default(),
    };
    if let Some(path) = cli.database_file {
        config.database_file = path;
    }
    let ledger = Ledger::new(config)?;

    match cli.command {
        Command::Append {
            command,
            payload,
            tracking_id,
            actor,
        } => append(&ledger, &command, &payload, tracking_id.as_deref(), actor.as_deref()).await,
        Command::Comment { text } => {
            if !ledger.append_comment(&text).await {
                warn!("comment was not written");
            }
            Ok(())
        }
        Command::Replay => replay(ledger).await,
        Command::Verify => verify(&ledger).await,
        Command::ChangeSets {
            since,
            skip_until,
            skip,
            take,
        } => {
            let mut query = ChangeSetQuery::new();
            if let Some(since) = since {
                query = query.since(since);
            }
            if let Some(hash) = skip_until {
                query = query.skip_until(hash);
            }
            if let Some(skip) = skip {
                query = query.skip(skip);
            }
            if let Some(take) = take {
                query = query.take(take);
            }
            let page = ledger.load_change_sets(&query).await?;
            println!("{}", to_pretty(&page)?);
            Ok(())
        }
        Command::Sync { follow } => sync(ledger, follow).await,
        Command::Serve => serve(ledger, shutdown_on_ctrl_c()).await,
        Command::Scenario { .. } => Ok(()),
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

async fn append(
    ledger: &Ledger,
    command: &str,
    payload: &str,
    tracking_id: Option<&str>,
    actor: Option<&str>,
) -> LedgerResult<()> {
    let payload: Value = serde_json::from_str(payload).map_err(|e| LedgerError::InvalidArgument {
        reason: format!("payload is not valid JSON: {}", e),
    })?;

    // The writer appends to the current head, so catch up with the file first.
    let verification = ledger.verify().await?;
    if let Some(hash) = verification.terminal_hash {
        ledger.head().advance(&hash);
    }

    match ledger.append(command, payload, tracking_id, actor).await? {
        Some(hash) => println!("{}", hash),
        None => println!("(not written)"),
    }
    Ok(())
}

async fn replay(ledger: Ledger) -> LedgerResult<()> {
    let portal = Portal::new(ledger);
    let report = portal.restore(None).await?;

    println!("Replayed {}", portal.ledger().database_file().display());
    println!(
        "  applied={} ignored={} skipped={} failed={} chain_breaks={}",
        report.applied, report.ignored, report.skipped, report.failed, report.chain_breaks
    );
    println!("  head: {}", report.last_hash.as_deref().unwrap_or("(genesis)"));
    println!();
    println!("FAQs:");
    for faq in portal.faqs().list().await {
        println!("  [{}] {}", faq.id, faq.question);
    }
    println!("News postings:");
    for posting in portal.news().list().await {
        println!("  [{}] {}", posting.id, posting.headline);
    }
    Ok(())
}

async fn verify(ledger: &Ledger) -> LedgerResult<()> {
    let verification = ledger.verify().await?;

    println!("Verified {}", ledger.database_file().display());
    println!("  records: {}", verification.records);
    println!(
        "  head:    {}",
        verification.terminal_hash.as_deref().unwrap_or("(genesis)")
    );
    if verification.is_intact() {
        println!("  chain:   VERIFIED");
        return Ok(());
    }

    println!("  chain:   BROKEN ({} break(s))", verification.breaks.len());
    for brk in &verification.breaks {
        println!("    {}", brk.clone().into_error());
    }
    match verification.first_break() {
        Some(first) => Err(first.clone().into_error()),
        None => Ok(()),
    }
}

async fn sync(ledger: Ledger, follow: bool) -> LedgerResult<()> {
    let interval = ledger.config().sync.interval();
    let synchronizer = Synchronizer::for_ledger(&ledger)?;
    let portal = Portal::new(ledger);

    let local = portal.restore(None).await?;
    println!("Local replay: applied={} failed={}", local.applied, local.failed);

    if !follow {
        let report = portal.synchronize(&synchronizer).await?;
        println!(
            "Sync: peer={} applied={} ignored={} failed={} chain_breaks={}",
            report.peer.as_deref().unwrap_or("none"),
            report.replay.applied,
            report.replay.ignored,
            report.replay.failed,
            report.replay.chain_breaks
        );
        return Ok(());
    }

    let registry = portal.registry()?;
    let start_from = Some(portal.ledger().head().current());
    info!(peers = synchronizer.peers().len(), "following peers");
    let last = run_follower_loop(
        &synchronizer,
        &registry,
        start_from,
        interval,
        shutdown_on_ctrl_c(),
    )
    .await;
    println!("Stopped following at {}", last.as_deref().unwrap_or("(genesis)"));
    Ok(())
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

async fn run_scenarios(name: ScenarioName) -> LedgerResult<()> {
    let dir = std::env::temp_dir().join(format!("ledger-demo-{}", std::process::id()));
    std::fs::create_dir_all(&dir).map_err(|e| LedgerError::WriteFailed {
        reason: format!("cannot create {}: {}", dir.display(), e),
    })?;

    print_banner();
    let result = match name {
        ScenarioName::All => {
            replay_restore::run_scenario(&dir).await?;
            follower_sync::run_scenario(&dir).await
        }
        ScenarioName::ReplayRestore => replay_restore::run_scenario(&dir).await,
        ScenarioName::FollowerSync => follower_sync::run_scenario(&dir).await,
    };
    if result.is_ok() {
        println!("All selected scenarios completed successfully.");
        println!("Ledger files kept in {}", dir.display());
    }
    result
}

fn print_banner() {
    println!();
    println!("Portal Ledger");
    println!("=============");
    println!();
    println!("Every mutation is appended as one JSON line:");
    println!("  {{ \"<command>\": {{payload}}, \"eventTrackingId\", \"userId\", \"systemId\",");
    println!("    \"timestamp\", \"integrity\": {{ \"nonce\", \"parentHash\", \"hashValue\" }} }}");
    println!("  hashValue = SHA-256 of the line without it; parentHash links to the previous line.");
    println!();
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn shutdown_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
        }
        trigger.cancel();
    });
    cancel
}

fn to_pretty(page: &ChangeSetPage) -> LedgerResult<String> {
    serde_json::to_string_pretty(page).map_err(|e| LedgerError::InvalidArgument {
        reason: format!("cannot render JSON: {}", e),
    })
}
