use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

use crate::model::EntityDetail;

/// Process-scoped cache of entity details.
///
/// Entries are keyed by the requested language set plus the entity id, since
/// labels and descriptions depend on the languages asked for. Concurrent
/// misses may fill the same entry twice; the second insert simply replaces
/// an identical value.
#[derive(Clone)]
pub struct EntityCache {
    entities: Arc<DashMap<String, EntityDetail>>,
    max_entries: usize,
}

impl EntityCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entities: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn get(&self, languages: &[String], id: &str) -> Option<EntityDetail> {
        self.entities
            .get(&Self::key(languages, id))
            .map(|r| r.value().clone())
    }

    pub fn insert(&self, languages: &[String], detail: EntityDetail) {
        let id = detail.id.clone();
        self.insert_as(languages, &id, detail);
    }

    /// Store `detail` under `id`, which differs from `detail.id` when the
    /// requested entity was redirected to another one.
    pub fn insert_as(&self, languages: &[String], id: &str, detail: EntityDetail) {
        if self.max_entries == 0 {
            return;
        }
        if self.entities.len() >= self.max_entries {
            // Simple eviction: clear 25% when full
            let to_remove: Vec<_> = self
                .entities
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.entities.remove(&key);
            }
        }
        self.entities.insert(Self::key(languages, id), detail);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entities_cached: self.entities.len(),
            max_entries: self.max_entries,
        }
    }

    pub fn clear(&self) {
        self.entities.clear();
    }

    fn key(languages: &[String], id: &str) -> String {
        format!("{}:{}", languages.join("|"), id)
    }
}

#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub entities_cached: usize,
    pub max_entries: usize,
}
