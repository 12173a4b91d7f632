//! `Portal`: the reference domain state plus the ledger that makes it durable.
//!
//! Mutations change memory first and then append a record; the append is
//! best-effort and never undoes the in-memory change.  Each domain has one
//! write guard held across both steps, so the ledger sees a domain's
//! mutations in the order memory did.  On startup the state
//! is rebuilt by replaying the ledger through [`Portal::registry`].

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use ledger_contracts::error::{LedgerError, LedgerResult};
use ledger_core::CommandRegistry;
use ledger_log::{Ledger, ReplayReport};
use ledger_sync::{SyncReport, Synchronizer};

use crate::handlers::{AddIfNotExists, Remove, Update};
use crate::model::{Faq, NewsPosting};
use crate::store::EntityStore;

pub const ADD_FAQ: &str = "addFAQIfNotExists";
pub const UPDATE_FAQ: &str = "updateFAQ";
pub const REMOVE_FAQ: &str = "removeFAQ";
pub const ADD_NEWS_POSTING: &str = "addNewsPostingIfNotExists";
pub const UPDATE_NEWS_POSTING: &str = "updateNewsPosting";
pub const REMOVE_NEWS_POSTING: &str = "removeNewsPosting";

#[derive(Clone)]
pub struct Portal {
    ledger: Ledger,
    faqs: Arc<EntityStore<Faq>>,
    news: Arc<EntityStore<NewsPosting>>,
    faq_writes: Arc<Mutex<()>>,
    news_writes: Arc<Mutex<()>>,
}

impl Portal {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            faqs: Arc::new(EntityStore::new()),
            news: Arc::new(EntityStore::new()),
            faq_writes: Arc::new(Mutex::new(())),
            news_writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn faqs(&self) -> &EntityStore<Faq> {
        &self.faqs
    }

    pub fn news(&self) -> &EntityStore<NewsPosting> {
        &self.news
    }

    /// Handlers for every portal command, bound to this portal's stores.
    pub fn registry(&self) -> LedgerResult<CommandRegistry> {
        let mut registry = CommandRegistry::new();
        registry
            .register(ADD_FAQ, Arc::new(AddIfNotExists::new(self.faqs.clone())))?
            .register(UPDATE_FAQ, Arc::new(Update::new(self.faqs.clone())))?
            .register(REMOVE_FAQ, Arc::new(Remove::new(self.faqs.clone())))?
            .register(ADD_NEWS_POSTING, Arc::new(AddIfNotExists::new(self.news.clone())))?
            .register(UPDATE_NEWS_POSTING, Arc::new(Update::new(self.news.clone())))?
            .register(REMOVE_NEWS_POSTING, Arc::new(Remove::new(self.news.clone())))?;
        Ok(registry)
    }

    /// Rebuild state from the local ledger.
    pub async fn restore(&self, cancel: Option<&CancellationToken>) -> LedgerResult<ReplayReport> {
        let registry = self.registry()?;
        let report = self.ledger.replay(&registry, cancel).await;
        info!(
            applied = report.applied,
            faqs = self.faqs.len().await,
            news = self.news.len().await,
            "portal state restored"
        );
        Ok(report)
    }

    /// Pull remote change sets after the current chain head and apply them.
    pub async fn synchronize(&self, synchronizer: &Synchronizer) -> LedgerResult<SyncReport> {
        let registry = self.registry()?;
        let head = self.ledger.head().current();
        let checkpoint = Some(head.as_str()).filter(|h| !h.is_empty());
        Ok(synchronizer.synchronize(&registry, checkpoint).await)
    }

    pub async fn add_faq(&self, faq: Faq, actor: Option<&str>) -> LedgerResult<bool> {
        let _writes = self.faq_writes.lock().await;
        require_id(&faq.id)?;
        let payload = faq.clone();
        if !self.faqs.add_if_not_exists(faq).await {
            return Ok(false);
        }
        self.record(ADD_FAQ, &payload, actor).await?;
        Ok(true)
    }

    pub async fn update_faq(&self, faq: Faq, actor: Option<&str>) -> LedgerResult<bool> {
        let _writes = self.faq_writes.lock().await;
        let payload = faq.clone();
        if !self.faqs.update(faq).await {
            return Ok(false);
        }
        self.record(UPDATE_FAQ, &payload, actor).await?;
        Ok(true)
    }

    pub async fn remove_faq(&self, id: &str, actor: Option<&str>) -> LedgerResult<bool> {
        let _writes = self.faq_writes.lock().await;
        if self.faqs.remove(id).await.is_none() {
            return Ok(false);
        }
        self.record(REMOVE_FAQ, &serde_json::json!({ "id": id }), actor)
            .await?;
        Ok(true)
    }

    pub async fn add_news_posting(&self, posting: NewsPosting, actor: Option<&str>) -> LedgerResult<bool> {
        let _writes = self.news_writes.lock().await;
        require_id(&posting.id)?;
        let payload = posting.clone();
        if !self.news.add_if_not_exists(posting).await {
            return Ok(false);
        }
        self.record(ADD_NEWS_POSTING, &payload, actor).await?;
        Ok(true)
    }

    pub async fn update_news_posting(
        &self,
        posting: NewsPosting,
        actor: Option<&str>,
    ) -> LedgerResult<bool> {
        let _writes = self.news_writes.lock().await;
        let payload = posting.clone();
        if !self.news.update(posting).await {
            return Ok(false);
        }
        self.record(UPDATE_NEWS_POSTING, &payload, actor).await?;
        Ok(true)
    }

    pub async fn remove_news_posting(&self, id: &str, actor: Option<&str>) -> LedgerResult<bool> {
        let _writes = self.news_writes.lock().await;
        if self.news.remove(id).await.is_none() {
            return Ok(false);
        }
        self.record(REMOVE_NEWS_POSTING, &serde_json::json!({ "id": id }), actor)
            .await?;
        Ok(true)
    }

    async fn record<P: Serialize>(&self, command: &str, payload: &P, actor: Option<&str>) -> LedgerResult<()> {
        let payload = serde_json::to_value(payload).map_err(|e| LedgerError::InvalidArgument {
            reason: format!("cannot serialize payload for '{}': {}", command, e),
        })?;
        self.ledger.append(command, payload, None, actor).await?;
        Ok(())
    }
}

fn require_id(id: &str) -> LedgerResult<()> {
    if id.trim().is_empty() {
        return Err(LedgerError::InvalidArgument {
            reason: "entity id must not be empty".to_string(),
        });
    }
    Ok(())
}
