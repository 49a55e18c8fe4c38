use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::cache::EntityCache;
use crate::error::KbError;
use crate::kb::KnowledgeBase;
use crate::model::{EntityDetail, SearchHit};
use crate::retry::RetryPolicy;
use crate::text::normalize;
use crate::throttle::Throttle;
use crate::wire;

pub const WIKIDATA_API: &str = "https://www.wikidata.org/w/api.php";

/// `wbgetentities` accepts at most 50 ids per request.
pub const MAX_IDS_PER_REQUEST: usize = 50;

/// Unfiltered search results kept per (term, language, limit).
const MAX_REMEMBERED_SEARCHES: usize = 1_000;

type SearchKey = (String, String, usize);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub min_request_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: WIKIDATA_API.to_string(),
            user_agent: concat!(
                "kbmap/",
                env!("CARGO_PKG_VERSION"),
                " (keyword to Wikidata mapping; academic use)"
            )
            .to_string(),
            request_timeout: Duration::from_secs(20),
            min_request_interval: Duration::from_millis(100),
        }
    }
}

/// Wikidata Action API client.
///
/// Cheap to clone; clones share the HTTP pool, the throttle and the caches.
#[derive(Clone)]
pub struct WikidataClient {
    endpoint: String,
    client: reqwest::Client,
    retry: RetryPolicy,
    throttle: Arc<Throttle>,
    cache: EntityCache,
    /// Regular and exact-label searches filter the same response, so one
    /// request serves both.
    searches: Arc<DashMap<SearchKey, Vec<wire::ParsedHit>>>,
}

impl WikidataClient {
    pub fn new(
        config: ClientConfig,
        retry: RetryPolicy,
        cache: EntityCache,
    ) -> Result<Self, KbError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            endpoint: config.endpoint,
            client,
            retry,
            throttle: Arc::new(Throttle::new(config.min_request_interval)),
            cache,
            searches: Arc::new(DashMap::new()),
        })
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    async fn get_json(&self, operation: &str, params: &[(&str, String)]) -> Result<Value, KbError> {
        let this = self;
        self.retry
            .retry(operation, KbError::is_transient, move || async move {
                this.throttle.acquire().await;

                let response = this
                    .client
                    .get(&this.endpoint)
                    .query(params)
                    .query(&[("format", "json")])
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(KbError::Status(status));
                }

                let bytes = response.bytes().await?;
                let payload: Value = serde_json::from_slice(&bytes)?;
                wire::check_api_error(&payload)?;
                Ok(payload)
            })
            .await
    }

    async fn search(
        &self,
        term: &str,
        language: &str,
        limit: usize,
    ) -> Result<Vec<wire::ParsedHit>, KbError> {
        let term = normalize(term);
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let key = (term.clone(), language.to_string(), limit);
        if let Some(hits) = self.searches.get(&key) {
            debug!(term = %key.0, language, limit, "Search answered from memory");
            return Ok(hits.value().clone());
        }

        let params = [
            ("action", "wbsearchentities".to_string()),
            ("search", term),
            ("language", language.to_string()),
            ("uselang", language.to_string()),
            ("type", "item".to_string()),
            ("limit", limit.to_string()),
        ];
        let payload = self.get_json("wbsearchentities", &params).await?;
        let hits = wire::parse_search(payload)?;
        self.remember_search(key, hits.clone());
        Ok(hits)
    }

    fn remember_search(&self, key: SearchKey, hits: Vec<wire::ParsedHit>) {
        if self.searches.len() >= MAX_REMEMBERED_SEARCHES {
            let to_remove: Vec<SearchKey> = self
                .searches
                .iter()
                .take(MAX_REMEMBERED_SEARCHES / 4)
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.searches.remove(&key);
            }
        }
        self.searches.insert(key, hits);
    }

    async fn fetch_batch(
        &self,
        batch: &[String],
        languages: &[String],
    ) -> Result<HashMap<String, EntityDetail>, KbError> {
        let params = [
            ("action", "wbgetentities".to_string()),
            ("ids", batch.join("|")),
            ("props", "labels|descriptions|aliases|claims".to_string()),
            ("languages", languages.join("|")),
            ("languagefallback", "1".to_string()),
        ];
        let payload = self.get_json("wbgetentities", &params).await?;
        wire::parse_entities(payload)
    }
}

#[async_trait]
impl KnowledgeBase for WikidataClient {
    async fn search_entities(
        &self,
        term: &str,
        language: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, KbError> {
        let hits = self.search(term, language, limit).await?;
        Ok(hits.into_iter().map(|h| h.hit).collect())
    }

    /// `wbsearchentities` has no exact-label mode, so exactness is enforced
    /// here: only hits matched on their label, and whose label equals the
    /// term, are returned.
    async fn search_exact_label(
        &self,
        term: &str,
        language: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, KbError> {
        let wanted = normalize(term).to_lowercase();
        let hits = self.search(term, language, limit).await?;
        Ok(hits
            .into_iter()
            .filter(|h| h.label_match && normalize(&h.hit.label).to_lowercase() == wanted)
            .map(|h| h.hit)
            .collect())
    }

    async fn get_entities(
        &self,
        ids: &[String],
        languages: &[String],
    ) -> Result<HashMap<String, EntityDetail>, KbError> {
        let mut found = HashMap::new();
        let mut misses = Vec::new();
        let mut queued = HashSet::new();

        for id in ids {
            if !queued.insert(id.as_str()) {
                continue;
            }
            match self.cache.get(languages, id) {
                Some(detail) => {
                    found.insert(id.clone(), detail);
                }
                None => misses.push(id.clone()),
            }
        }

        debug!(
            requested = ids.len(),
            cached = found.len(),
            fetching = misses.len(),
            "Fetching entity details"
        );

        for batch in misses.chunks(MAX_IDS_PER_REQUEST) {
            for (id, detail) in self.fetch_batch(batch, languages).await? {
                self.cache.insert_as(languages, &id, detail.clone());
                found.insert(id, detail);
            }
        }

        Ok(found)
    }
}
