//! In-memory entity stores.
//!
//! Each domain gets its own store and therefore its own lock; only the
//! ledger file is shared between domains.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::model::Entity;

pub struct EntityStore<T: Entity> {
    entries: RwLock<HashMap<String, T>>,
}

impl<T: Entity> EntityStore<T> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Insert `entity` unless its id is taken.  Returns whether it was inserted.
    pub async fn add_if_not_exists(&self, entity: T) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(entity.id()) {
            return false;
        }
        entries.insert(entity.id().to_string(), entity);
        true
    }

    /// Replace an existing entity.  Returns `false` when the id is unknown.
    pub async fn update(&self, entity: T) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(entity.id()) {
            Some(existing) => {
                *existing = entity;
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, id: &str) -> Option<T> {
        self.entries.write().await.remove(id)
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        self.entries.read().await.get(id).cloned()
    }

    /// All entities, ordered by id.
    pub async fn list(&self) -> Vec<T> {
        let mut all: Vec<T> = self.entries.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id().cmp(b.id()));
        all
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<T: Entity> Default for EntityStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
