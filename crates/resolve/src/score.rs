//! Candidate scoring.
//!
//! The composite score is `exact_bonus + context_overlap + 0.6 × label_similarity`
//! (plus the type bonus when ranking). An exact label match dominates, context
//! corroborates and fuzzy similarity breaks ties; the weights are fixed so
//! rankings stay stable.

use std::collections::{BTreeSet, HashSet};

use crate::model::SearchHit;
use crate::text::{normalize, singularize_english, tokenize};

pub const EXACT_MATCH_BONUS: f64 = 50.0;
pub const PREFERRED_TYPE_BONUS: f64 = 30.0;
pub const SIMILARITY_WEIGHT: f64 = 0.6;

/// Instance-of classes that are never valid resolution targets
/// (publications and other bibliographic artefacts).
pub const DISALLOWED_TYPES: &[&str] = &[
    "Q13442814", // scholarly article
    "Q571",      // book
    "Q1002697",  // periodical literature
    "Q737498",   // academic journal
    "Q732577",   // publication
    "Q47461344", // written work
];

/// Instance-of classes of concrete concepts that earn a bonus.
pub const PREFERRED_TYPES: &[&str] = &[
    "Q486972",   // human settlement
    "Q618123",   // geographical feature
    "Q82794",    // geographic region
    "Q16889133", // class
    "Q151885",   // concept
    "Q11173",    // chemical compound
    "Q11862829", // academic discipline
    "Q7187",     // gene
    "Q16521",    // taxon
];

/// Result of checking a candidate's instance-of set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypeVerdict {
    pub blocked: bool,
    pub bonus: f64,
}

/// Disallowed and preferred instance-of classes.
#[derive(Debug, Clone)]
pub struct TypePolicy {
    disallowed: HashSet<String>,
    preferred: HashSet<String>,
}

impl Default for TypePolicy {
    fn default() -> Self {
        Self::new(
            DISALLOWED_TYPES.iter().map(|s| s.to_string()),
            PREFERRED_TYPES.iter().map(|s| s.to_string()),
        )
    }
}

impl TypePolicy {
    pub fn new(
        disallowed: impl IntoIterator<Item = String>,
        preferred: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            disallowed: disallowed.into_iter().collect(),
            preferred: preferred.into_iter().collect(),
        }
    }

    pub fn type_bonus_or_block(&self, types: &BTreeSet<String>) -> TypeVerdict {
        if types.iter().any(|t| self.disallowed.contains(t)) {
            return TypeVerdict { blocked: true, bonus: 0.0 };
        }
        let bonus = if types.iter().any(|t| self.preferred.contains(t)) {
            PREFERRED_TYPE_BONUS
        } else {
            0.0
        };
        TypeVerdict { blocked: false, bonus }
    }
}

/// `label aliases...`, trimmed.
fn label_and_aliases(hit: &SearchHit) -> String {
    format!("{} {}", hit.label, hit.aliases.join(" "))
        .trim()
        .to_string()
}

/// Order-independent fuzzy similarity between the keyword and the
/// candidate's label plus aliases, in `[0, 100]`.
pub fn label_similarity(keyword: &str, hit: &SearchHit) -> f64 {
    token_sort_ratio(&normalize(keyword), &normalize(&label_and_aliases(hit)))
}

/// Number of distinct context tokens that also occur in the candidate's
/// label, description or aliases, not counting tokens of the keyword itself.
pub fn context_overlap(keyword: &str, context: &str, hit: &SearchHit) -> usize {
    let context_tokens: HashSet<String> = tokenize(&normalize(context)).into_iter().collect();
    let keyword_tokens: HashSet<String> = tokenize(&normalize(keyword)).into_iter().collect();

    let blob = format!("{} {} {}", hit.label, hit.description, hit.aliases.join(" "));
    tokenize(&blob)
        .into_iter()
        .filter(|t| !keyword_tokens.contains(t))
        .collect::<HashSet<_>>()
        .intersection(&context_tokens)
        .count()
}

/// Whether the candidate label equals the keyword or its singular form,
/// ignoring case.
pub fn is_exact_match(keyword: &str, label: &str) -> bool {
    let label = normalize(label).to_lowercase();
    let kw = normalize(keyword).to_lowercase();
    let kw_singular = singularize_english(&kw).to_lowercase();
    label == kw || label == kw_singular
}

/// Components of a candidate's score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub exact_bonus: f64,
    pub context_overlap: usize,
    pub label_similarity: f64,
}

impl ScoreBreakdown {
    pub fn compute(keyword: &str, context: &str, hit: &SearchHit) -> Self {
        Self {
            exact_bonus: if is_exact_match(keyword, &hit.label) {
                EXACT_MATCH_BONUS
            } else {
                0.0
            },
            context_overlap: context_overlap(keyword, context, hit),
            label_similarity: label_similarity(keyword, hit),
        }
    }

    pub fn total(&self) -> f64 {
        self.exact_bonus + self.context_overlap as f64 + SIMILARITY_WEIGHT * self.label_similarity
    }
}

/// `exact_bonus + context_overlap + 0.6 × label_similarity`.
pub fn total_score(keyword: &str, context: &str, hit: &SearchHit) -> f64 {
    ScoreBreakdown::compute(keyword, context, hit).total()
}

/// Fuzzy ratio after sorting whitespace-separated tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Normalized Indel similarity: `200 × LCS / (len(a) + len(b))`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    200.0 * lcs_len(&a, &b) as f64 / total as f64
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
