//! Replay handlers for portal entities.
//!
//! One generic handler per verb replaces a family of near-identical
//! per-entity methods; [`crate::portal::Portal::registry`] binds them to
//! command names.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use ledger_contracts::{
    error::{LedgerError, LedgerResult},
    record::{DecodedRecord, RecordOrigin},
};
use ledger_core::{HandlerOutcome, ReplayHandler};

use crate::model::Entity;
use crate::store::EntityStore;

fn entity_from<T: Entity>(record: &DecodedRecord) -> LedgerResult<T> {
    serde_json::from_value(Value::Object(record.payload.clone()))
        .map_err(|e| LedgerError::handler(&record.command, format!("bad {} payload: {}", T::KIND, e)))
}

fn applied(changed: bool) -> HandlerOutcome {
    if changed {
        HandlerOutcome::Applied
    } else {
        HandlerOutcome::Ignored
    }
}

/// `add…IfNotExists`: idempotent insert.
pub struct AddIfNotExists<T: Entity> {
    store: Arc<EntityStore<T>>,
}

impl<T: Entity> AddIfNotExists<T> {
    pub fn new(store: Arc<EntityStore<T>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<T: Entity> ReplayHandler for AddIfNotExists<T> {
    async fn handle(
        &self,
        record: &DecodedRecord,
        origin: &RecordOrigin,
    ) -> LedgerResult<HandlerOutcome> {
        let entity: T = entity_from(record)?;
        let id = entity.id().to_string();
        let inserted = self.store.add_if_not_exists(entity).await;
        if !inserted {
            debug!(kind = T::KIND, id = %id, sender = %origin.sender, "already present");
        }
        Ok(applied(inserted))
    }
}

/// `update…`: replaces an existing entity; unknown ids are ignored.
pub struct Update<T: Entity> {
    store: Arc<EntityStore<T>>,
}

impl<T: Entity> Update<T> {
    pub fn new(store: Arc<EntityStore<T>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<T: Entity> ReplayHandler for Update<T> {
    async fn handle(
        &self,
        record: &DecodedRecord,
        origin: &RecordOrigin,
    ) -> LedgerResult<HandlerOutcome> {
        let entity: T = entity_from(record)?;
        let id = entity.id().to_string();
        let updated = self.store.update(entity).await;
        if !updated {
            debug!(kind = T::KIND, id = %id, sender = %origin.sender, "update for unknown id");
        }
        Ok(applied(updated))
    }
}

/// `remove…`: payload `{ "id": "…" }`.
pub struct Remove<T: Entity> {
    store: Arc<EntityStore<T>>,
}

impl<T: Entity> Remove<T> {
    pub fn new(store: Arc<EntityStore<T>>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<T: Entity> ReplayHandler for Remove<T> {
    async fn handle(
        &self,
        record: &DecodedRecord,
        _origin: &RecordOrigin,
    ) -> LedgerResult<HandlerOutcome> {
        let id = record
            .payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| LedgerError::handler(&record.command, "payload has no string 'id'"))?;
        Ok(applied(self.store.remove(id).await.is_some()))
    }
}
