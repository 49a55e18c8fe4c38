//! Helpers over raw HAL documents, whose fields come back as a scalar or a
//! list depending on the record.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

pub const HAL_RECORD_BASE: &str = "https://hal.science";

/// Stringify a scalar or every scalar of a list. Nulls and empty strings
/// yield nothing.
pub fn to_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other).into_iter().collect(),
    }
}

pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First element of a list, or the value itself.
pub fn first_scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Array(items) => items.first().and_then(scalar_string),
        other => scalar_string(other),
    }
}

/// Replace non-empty lists under `keys` by their first element.
pub fn unwrap_single(doc: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        let first = doc
            .get(*key)
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .cloned();
        if let Some(first) = first {
            doc.insert(key.to_string(), first);
        }
    }
}

/// Every value of every field whose name starts with `keyword`, trimmed,
/// deduplicated, sorted and joined by `; `.
pub fn consolidate_keywords(doc: &Map<String, Value>) -> String {
    let keywords: BTreeSet<String> = doc
        .iter()
        .filter(|(key, _)| key.to_lowercase().starts_with("keyword"))
        .flat_map(|(_, value)| to_list(value))
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();

    keywords.into_iter().collect::<Vec<_>>().join("; ")
}

/// Domain labels and domain codes, trimmed, empties dropped.
pub fn consolidate_domains(doc: &Map<String, Value>) -> (Vec<String>, Vec<String>) {
    let clean = |key: &str| -> Vec<String> {
        doc.get(key)
            .map(to_list)
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };
    (clean("domainAll_s"), clean("domainAllCode_s"))
}

pub fn hal_record_url(hal_id: Option<&str>) -> Option<String> {
    hal_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| format!("{HAL_RECORD_BASE}/{id}"))
}

/// External link first, then the HAL record page, then the first absolute
/// file URL.
pub fn choose_url(
    link_ext: Option<&Value>,
    record_url: Option<&str>,
    files: Option<&Value>,
) -> Option<String> {
    if let Some(link) = link_ext.and_then(|v| first_scalar(Some(v))) {
        let link = link.trim();
        if !link.is_empty() {
            return Some(link.to_string());
        }
    }
    if let Some(url) = record_url {
        return Some(url.to_string());
    }
    files
        .map(to_list)
        .unwrap_or_default()
        .into_iter()
        .find(|f| f.starts_with("http"))
}
