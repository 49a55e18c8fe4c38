use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::record::HarvestedRecord;

pub const HAL_SEARCH_API: &str = "https://api.archives-ouvertes.fr/search";

/// Fields requested from the search API; `keyword*` covers every keyword
/// variant.
const FIELDS: &[&str] = &[
    "docid",
    "halId_s",
    "title_s",
    "abstract_s",
    "keyword*",
    "domainAll_s",
    "domainAllCode_s",
    "linkExtUrl_s",
    "files_s",
];

/// Author keywords live under several fields.
const KEYWORD_FILTER: &str =
    "(keyword_s:[* TO *] OR keyword_en_s:[* TO *] OR keyword_fr_s:[* TO *] OR keyword_t:[* TO *])";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub base_url: String,
    pub portal: String,
    pub page_size: usize,
    pub language_filter: String,
    pub page_pause_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: HAL_SEARCH_API.to_string(),
            portal: "u-pec".to_string(),
            page_size: 100,
            language_filter: "language_s:en".to_string(),
            page_pause_ms: 120,
            request_timeout_secs: 30,
        }
    }
}

impl HarvestConfig {
    pub fn endpoint(&self) -> String {
        format!("{}/{}/", self.base_url.trim_end_matches('/'), self.portal)
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub docs: Vec<Map<String, Value>>,
    pub num_found: u64,
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    response: ResponseBody,
    #[serde(rename = "nextCursorMark")]
    next_cursor: Option<String>,
}

#[derive(Deserialize, Default)]
struct ResponseBody {
    #[serde(rename = "numFound", default)]
    num_found: u64,
    #[serde(default)]
    docs: Vec<Map<String, Value>>,
}

/// Cursor-paginated client for the HAL search API.
pub struct HalClient {
    client: reqwest::Client,
    config: HarvestConfig,
}

impl HalClient {
    pub fn new(config: HarvestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Fetch the page starting at `cursor` (`*` for the first page).
    pub async fn fetch_page(&self, cursor: &str) -> Result<SearchPage> {
        let params = [
            ("q", "*:*".to_string()),
            ("fl", FIELDS.join(",")),
            ("wt", "json".to_string()),
            ("rows", self.config.page_size.to_string()),
            ("sort", "docid asc".to_string()),
            ("cursorMark", cursor.to_string()),
            ("fq", self.config.language_filter.clone()),
            ("fq", KEYWORD_FILTER.to_string()),
        ];

        let response = self
            .client
            .get(self.config.endpoint())
            .query(&params)
            .send()
            .await
            .context("Failed to send request to HAL")?
            .error_for_status()
            .context("HAL search returned an error status")?;

        let body: SearchResponse = response
            .json()
            .await
            .context("Failed to parse HAL search response")?;

        debug!(
            cursor,
            docs = body.response.docs.len(),
            num_found = body.response.num_found,
            "Fetched HAL page"
        );

        Ok(SearchPage {
            docs: body.response.docs,
            num_found: body.response.num_found,
            next_cursor: body.next_cursor,
        })
    }

    /// Page through the portal until `limit` records are kept, a page comes
    /// back empty or the cursor stops moving.
    pub async fn harvest(&self, limit: usize) -> Result<Vec<HarvestedRecord>> {
        let mut records = Vec::new();
        let mut cursor = "*".to_string();
        let mut seen = 0usize;
        let pause = Duration::from_millis(self.config.page_pause_ms);

        while records.len() < limit {
            let page = self.fetch_page(&cursor).await?;
            if page.docs.is_empty() {
                break;
            }

            seen += page.docs.len();
            for doc in page.docs {
                if let Some(record) = HarvestedRecord::from_hal_doc(doc) {
                    records.push(record);
                    if records.len() >= limit {
                        break;
                    }
                }
            }

            info!(
                kept = records.len(),
                seen,
                total = page.num_found,
                "Harvest progress"
            );

            match page.next_cursor {
                Some(next) if next != cursor => cursor = next,
                _ => break,
            }
            if records.len() < limit {
                tokio::time::sleep(pause).await;
            }
        }

        Ok(records)
    }
}
