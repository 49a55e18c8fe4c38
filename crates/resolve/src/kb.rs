use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::KbError;
use crate::model::{EntityDetail, SearchHit};

/// Read-only access to an external knowledge base.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Free-text entity search, best hits first.
    async fn search_entities(
        &self,
        term: &str,
        language: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, KbError>;

    /// Search restricted to hits whose label equals `term`.
    async fn search_exact_label(
        &self,
        term: &str,
        language: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, KbError>;

    /// Full details for `ids`. Ids unknown to the knowledge base are absent
    /// from the result.
    async fn get_entities(
        &self,
        ids: &[String],
        languages: &[String],
    ) -> Result<HashMap<String, EntityDetail>, KbError>;

    /// Best label per id; ids without any label map to themselves.
    async fn get_labels(
        &self,
        ids: &[String],
        languages: &[String],
    ) -> Result<HashMap<String, String>, KbError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let entities = self.get_entities(ids, languages).await?;
        Ok(ids
            .iter()
            .map(|id| {
                let label = entities
                    .get(id)
                    .and_then(|e| e.label(languages))
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| id.clone());
                (id.clone(), label)
            })
            .collect())
    }
}
