//! Wikidata Action API payloads.
//!
//! Responses mix scalars and lists depending on cardinality and carry claim
//! values of several shapes. Everything is normalized here, once, into the
//! uniform types of [`crate::model`].

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::KbError;
use crate::model::{ClaimValue, EntityDetail, SearchHit};

/// Zero-or-more values arriving as either a scalar or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    // Tried first: a derived struct would also accept a one-element array.
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    info: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<WireHit>,
}

#[derive(Debug, Deserialize)]
struct WireHit {
    id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    aliases: OneOrMany<String>,
    #[serde(default, rename = "match")]
    matched: Option<WireMatch>,
}

#[derive(Debug, Deserialize)]
struct WireMatch {
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct EntitiesResponse {
    #[serde(default)]
    entities: HashMap<String, WireEntity>,
}

#[derive(Debug, Deserialize)]
struct LangValue {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireEntity {
    id: Option<String>,
    missing: Option<Value>,
    labels: HashMap<String, LangValue>,
    descriptions: HashMap<String, LangValue>,
    aliases: HashMap<String, OneOrMany<LangValue>>,
    claims: HashMap<String, OneOrMany<WireClaim>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireClaim {
    mainsnak: Option<WireSnak>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireSnak {
    datavalue: Option<WireDataValue>,
}

#[derive(Debug, Deserialize)]
struct WireDataValue {
    #[serde(default)]
    value: Value,
}

/// A search hit plus whether the server matched it on the label itself
/// (as opposed to an alias).
#[derive(Debug, Clone)]
pub struct ParsedHit {
    pub hit: SearchHit,
    pub label_match: bool,
}

/// Fail on an `error` member; the MediaWiki API answers 200 with one.
pub fn check_api_error(payload: &Value) -> Result<(), KbError> {
    match payload.get("error") {
        Some(err) => {
            let parsed: ApiError = serde_json::from_value(err.clone()).unwrap_or(ApiError {
                code: String::new(),
                info: err.to_string(),
            });
            Err(KbError::Api {
                code: parsed.code,
                info: parsed.info,
            })
        }
        None => Ok(()),
    }
}

pub fn parse_search(payload: Value) -> Result<Vec<ParsedHit>, KbError> {
    check_api_error(&payload)?;
    let response: SearchResponse = serde_json::from_value(payload)?;

    Ok(response
        .search
        .into_iter()
        .map(|h| ParsedHit {
            label_match: h.matched.as_ref().is_some_and(|m| m.kind == "label"),
            hit: SearchHit {
                id: h.id,
                label: h.label.unwrap_or_default(),
                description: h.description.unwrap_or_default(),
                aliases: h.aliases.into_vec(),
            },
        })
        .collect())
}

/// Parse a `wbgetentities` payload, dropping entities the server reports missing.
pub fn parse_entities(payload: Value) -> Result<HashMap<String, EntityDetail>, KbError> {
    check_api_error(&payload)?;
    let response: EntitiesResponse = serde_json::from_value(payload)?;

    Ok(response
        .entities
        .into_iter()
        .filter(|(_, e)| e.missing.is_none())
        .map(|(key, e)| {
            let id = e.id.clone().unwrap_or_else(|| key.clone());
            (key, into_detail(id, e))
        })
        .collect())
}

fn into_detail(id: String, e: WireEntity) -> EntityDetail {
    EntityDetail {
        id,
        labels: e.labels.into_iter().map(|(k, v)| (k, v.value)).collect(),
        descriptions: e.descriptions.into_iter().map(|(k, v)| (k, v.value)).collect(),
        aliases: e
            .aliases
            .into_iter()
            .map(|(k, v)| (k, v.into_vec().into_iter().map(|a| a.value).collect()))
            .collect(),
        claims: e
            .claims
            .into_iter()
            .map(|(property, claims)| {
                let values = claims
                    .into_vec()
                    .into_iter()
                    .filter_map(|c| c.mainsnak?.datavalue)
                    .filter_map(|dv| claim_value(dv.value))
                    .collect();
                (property, values)
            })
            .collect(),
    }
}

fn claim_value(value: Value) -> Option<ClaimValue> {
    match value {
        Value::String(s) => Some(ClaimValue::Literal(s)),
        Value::Object(map) => match map.get("id") {
            Some(Value::String(id)) => Some(ClaimValue::Item(id.clone())),
            // time, quantity, coordinates: not needed downstream
            _ => None,
        },
        _ => None,
    }
}
