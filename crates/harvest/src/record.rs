use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::discipline::{self, Discipline};
use crate::fields::{
    choose_url, consolidate_domains, consolidate_keywords, first_scalar, hal_record_url,
    scalar_string, to_list, unwrap_single,
};

static KEYWORD_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;,]").expect("keyword separator pattern is valid"));

/// A HAL document kept by the harvester, as written to the records file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestedRecord {
    pub docid: String,
    #[serde(rename = "halId_s", default)]
    pub hal_id: Option<String>,
    #[serde(rename = "title_s", default)]
    pub title: String,
    #[serde(rename = "abstract_s", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub keywords_joined: String,
    #[serde(rename = "keyword_s", default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub domain_codes: String,
    pub discipline: Discipline,
    #[serde(default)]
    pub url_primary: Option<String>,
}

impl HarvestedRecord {
    /// Build from a raw search document. Documents without keywords or
    /// outside every discipline are skipped.
    pub fn from_hal_doc(mut doc: Map<String, Value>) -> Option<Self> {
        unwrap_single(&mut doc, &["title_s", "abstract_s", "halId_s"]);

        let keywords_joined = consolidate_keywords(&doc);
        if keywords_joined.is_empty() {
            return None;
        }

        let (labels, codes) = consolidate_domains(&doc);
        let title = first_scalar(doc.get("title_s")).unwrap_or_default();
        let abstract_text = first_scalar(doc.get("abstract_s")).unwrap_or_default();

        let discipline = discipline::from_codes(&codes).or_else(|| {
            discipline::from_text(&[title.as_str(), abstract_text.as_str(), keywords_joined.as_str()])
        })?;

        let hal_id = first_scalar(doc.get("halId_s"));
        let record_url = hal_record_url(hal_id.as_deref());
        let url_primary = choose_url(doc.get("linkExtUrl_s"), record_url.as_deref(), doc.get("files_s"));

        tracing::trace!(hal_id = ?hal_id, domains = labels.len(), %discipline, "Kept record");

        Some(Self {
            docid: first_scalar(doc.get("docid")).unwrap_or_default(),
            hal_id,
            title,
            abstract_text,
            keywords: doc.get("keyword_s").map(to_list).unwrap_or_default(),
            keywords_joined,
            domain_codes: codes.join("; "),
            discipline,
            url_primary,
        })
    }
}

/// The parts of a record the enrichment run needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub title: String,
    pub abstract_text: String,
    pub keywords: Vec<String>,
}

impl DocumentRecord {
    /// Read a record leniently: missing fields become empty, single-element
    /// lists are unwrapped, and keywords come from `keyword_s`, `keywords`
    /// or `keywords_joined`, first non-empty wins.
    pub fn from_value(value: &Value) -> Self {
        let Some(doc) = value.as_object() else {
            return Self::default();
        };

        let text = |keys: &[&str]| -> String {
            keys.iter()
                .find_map(|k| first_scalar(doc.get(*k)))
                .unwrap_or_default()
        };

        let keywords = ["keyword_s", "keywords", "keywords_joined"]
            .iter()
            .map(|k| doc.get(*k).map(split_keywords).unwrap_or_default())
            .find(|kws| !kws.is_empty())
            .unwrap_or_default();

        Self {
            doc_id: text(&["docid", "halId_s"]),
            title: text(&["title_s", "title"]),
            abstract_text: text(&["abstract_s", "abstract"]),
            keywords,
        }
    }

    /// Title and abstract, the text keywords are disambiguated against.
    pub fn context(&self) -> String {
        format!("{}. {}", self.title, self.abstract_text)
    }
}

impl From<&HarvestedRecord> for DocumentRecord {
    fn from(record: &HarvestedRecord) -> Self {
        let keywords = if record.keywords.is_empty() {
            split_keywords(&Value::String(record.keywords_joined.clone()))
        } else {
            record.keywords.clone()
        };
        Self {
            doc_id: if record.docid.is_empty() {
                record.hal_id.clone().unwrap_or_default()
            } else {
                record.docid.clone()
            },
            title: record.title.clone(),
            abstract_text: record.abstract_text.clone(),
            keywords,
        }
    }
}

/// A list is taken element by element; a string is split on `;` and `,`.
fn split_keywords(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_string)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
        Value::String(s) => KEYWORD_SEPARATOR
            .split(s)
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
