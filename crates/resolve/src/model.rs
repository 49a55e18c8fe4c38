use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Wikidata property: instance of.
pub const P_INSTANCE_OF: &str = "P31";
/// Wikidata property: subclass of.
pub const P_SUBCLASS_OF: &str = "P279";
/// Wikidata property: Bibliothèque nationale de France identifier.
pub const P_BNF_ID: &str = "P268";
/// Wikidata class of disambiguation pages.
pub const Q_DISAMBIGUATION: &str = "Q4167410";

/// A lightweight search hit as returned by the knowledge-base search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub label: String,
    pub description: String,
    pub aliases: Vec<String>,
}

/// A single claim value: either a reference to another entity or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ClaimValue {
    Item(String),
    Literal(String),
}

/// Full entity detail from the entity-detail endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDetail {
    pub id: String,
    /// language -> label
    pub labels: HashMap<String, String>,
    /// language -> description
    pub descriptions: HashMap<String, String>,
    /// language -> aliases
    pub aliases: HashMap<String, Vec<String>>,
    /// property id -> values
    pub claims: HashMap<String, Vec<ClaimValue>>,
}

impl EntityDetail {
    /// Ids of the entities referenced by `property`, in claim order.
    pub fn claim_ids(&self, property: &str) -> Vec<String> {
        self.claims
            .get(property)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| match v {
                        ClaimValue::Item(id) => Some(id.clone()),
                        ClaimValue::Literal(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn instance_of(&self) -> BTreeSet<String> {
        self.claim_ids(P_INSTANCE_OF).into_iter().collect()
    }

    pub fn subclass_of(&self) -> Vec<String> {
        self.claim_ids(P_SUBCLASS_OF)
    }

    pub fn is_disambiguation(&self) -> bool {
        self.claim_ids(P_INSTANCE_OF)
            .iter()
            .any(|id| id == Q_DISAMBIGUATION)
    }

    /// First literal value of the BnF identifier property, if any.
    pub fn bnf_id(&self) -> Option<String> {
        self.claims.get(P_BNF_ID)?.iter().find_map(|v| match v {
            ClaimValue::Literal(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
    }

    /// Label in the first available preferred language, else any label.
    pub fn label(&self, languages: &[String]) -> Option<String> {
        languages
            .iter()
            .find_map(|lang| self.labels.get(lang).cloned())
            .or_else(|| {
                // HashMap order is arbitrary; pick the smallest language code
                // so the fallback stays deterministic.
                self.labels
                    .iter()
                    .min_by(|a, b| a.0.cmp(b.0))
                    .map(|(_, label)| label.clone())
            })
    }
}

/// A scored search hit competing for a keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub hit: SearchHit,
    /// Language whose search surfaced this hit first.
    pub language: String,
    pub types: BTreeSet<String>,
    pub label_similarity: f64,
    pub match_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    Context,
    ExactLabel,
    None,
}

impl MatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStage::Context => "context",
            MatchStage::ExactLabel => "exact_label",
            MatchStage::None => "none",
        }
    }
}

impl std::fmt::Display for MatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The accepted entity for a keyword.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntity {
    pub id: String,
    pub label: String,
    pub description: String,
    pub cross_ref: Option<String>,
    pub stage: MatchStage,
    pub label_similarity: f64,
    pub match_score: f64,
    pub instance_of: BTreeSet<String>,
    pub direct_superclasses: Vec<String>,
}

/// Outcome of resolving one keyword.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Resolution {
    Resolved(ResolvedEntity),
    /// No acceptable match. `disambiguation` is set when a match was found
    /// but discarded because it is a disambiguation page.
    Unresolved { disambiguation: bool },
}

impl Resolution {
    pub fn entity(&self) -> Option<&ResolvedEntity> {
        match self {
            Resolution::Resolved(entity) => Some(entity),
            Resolution::Unresolved { .. } => None,
        }
    }

    pub fn is_disambiguation(&self) -> bool {
        matches!(self, Resolution::Unresolved { disambiguation: true })
    }

    pub fn stage(&self) -> MatchStage {
        self.entity().map(|e| e.stage).unwrap_or(MatchStage::None)
    }
}

/// Ordered entity ids from a direct superclass up to an ancestor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HierarchyPath(pub Vec<String>);

impl HierarchyPath {
    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as `label > label > ...`, falling back to ids for unknown labels.
    pub fn render(&self, labels: &HashMap<String, String>) -> String {
        self.0
            .iter()
            .map(|id| labels.get(id).map(String::as_str).unwrap_or(id))
            .collect::<Vec<_>>()
            .join(" > ")
    }
}
