//! In-memory knowledge base for unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::KbError;
use crate::kb::KnowledgeBase;
use crate::model::{ClaimValue, EntityDetail, SearchHit, P_INSTANCE_OF, P_SUBCLASS_OF};

#[derive(Default)]
pub struct MockKb {
    entities: HashMap<String, EntityDetail>,
    searches: HashMap<(String, String), Vec<String>>,
    exact_searches: HashMap<(String, String), Vec<String>>,
    pub search_calls: AtomicUsize,
    pub entity_calls: AtomicUsize,
    pub requested_batches: Mutex<Vec<Vec<String>>>,
    failing: bool,
}

impl MockKb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a transient error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn entity(
        mut self,
        id: &str,
        label: &str,
        description: &str,
        instance_of: &[&str],
        subclass_of: &[&str],
    ) -> Self {
        let mut detail = EntityDetail {
            id: id.to_string(),
            ..Default::default()
        };
        detail.labels.insert("en".to_string(), label.to_string());
        detail
            .descriptions
            .insert("en".to_string(), description.to_string());
        detail.claims.insert(
            P_INSTANCE_OF.to_string(),
            instance_of.iter().map(|q| ClaimValue::Item(q.to_string())).collect(),
        );
        detail.claims.insert(
            P_SUBCLASS_OF.to_string(),
            subclass_of.iter().map(|q| ClaimValue::Item(q.to_string())).collect(),
        );
        self.entities.insert(id.to_string(), detail);
        self
    }

    pub fn search(mut self, term: &str, language: &str, ids: &[&str]) -> Self {
        self.searches.insert(
            (term.to_lowercase(), language.to_string()),
            ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn exact(mut self, term: &str, language: &str, ids: &[&str]) -> Self {
        self.exact_searches.insert(
            (term.to_lowercase(), language.to_string()),
            ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    fn hits(&self, table: &HashMap<(String, String), Vec<String>>, term: &str, language: &str, limit: usize) -> Vec<SearchHit> {
        table
            .get(&(term.to_lowercase(), language.to_string()))
            .map(|ids| {
                ids.iter()
                    .take(limit)
                    .map(|id| {
                        let detail = self.entities.get(id);
                        SearchHit {
                            id: id.clone(),
                            label: detail
                                .and_then(|d| d.labels.get("en").cloned())
                                .unwrap_or_default(),
                            description: detail
                                .and_then(|d| d.descriptions.get("en").cloned())
                                .unwrap_or_default(),
                            aliases: Vec::new(),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check(&self) -> Result<(), KbError> {
        if self.failing {
            Err(KbError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KnowledgeBase for MockKb {
    async fn search_entities(&self, term: &str, language: &str, limit: usize) -> Result<Vec<SearchHit>, KbError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.hits(&self.searches, term, language, limit))
    }

    async fn search_exact_label(&self, term: &str, language: &str, limit: usize) -> Result<Vec<SearchHit>, KbError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.hits(&self.exact_searches, term, language, limit))
    }

    async fn get_entities(&self, ids: &[String], _languages: &[String]) -> Result<HashMap<String, EntityDetail>, KbError> {
        self.entity_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.requested_batches
            .lock()
            .unwrap()
            .push(ids.to_vec());
        Ok(ids
            .iter()
            .filter_map(|id| self.entities.get(id).map(|d| (id.clone(), d.clone())))
            .collect())
    }
}
