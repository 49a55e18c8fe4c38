//! Turns resolutions into output rows and graph upserts.

use std::collections::{BTreeSet, HashMap, HashSet};

use harvest::DocumentRecord;
use resolve::text::normalize;
use resolve::{Ancestry, MatchStage, Resolution};
use store::{round1, GraphOp, ResultRow};

/// A keyword as it occurs in one document.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordOccurrence {
    /// Position in input order.
    pub seq: usize,
    pub doc_id: String,
    pub title: String,
    pub keyword: String,
    pub context: String,
}

/// Everything learned about one keyword occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub resolution: Resolution,
    /// Labels of the resolved entity's instance-of classes.
    pub type_labels: HashMap<String, String>,
    pub ancestry: Ancestry,
}

impl Enrichment {
    pub fn unresolved(disambiguation: bool) -> Self {
        Self {
            resolution: Resolution::Unresolved { disambiguation },
            type_labels: HashMap::new(),
            ancestry: Ancestry::default(),
        }
    }
}

/// Tracks which (document, keyword) pairs were already taken.
#[derive(Debug, Default)]
pub struct SeenSet {
    seen: HashSet<(String, String)>,
}

impl SeenSet {
    /// `true` the first time a pair is offered.
    pub fn admit(&mut self, doc_id: &str, keyword: &str) -> bool {
        self.seen.insert((doc_id.to_string(), normalize(keyword)))
    }
}

/// Occurrences in input order, first occurrence of each pair only, plus the
/// number of duplicates dropped.
pub fn collect_occurrences(records: &[DocumentRecord]) -> (Vec<KeywordOccurrence>, usize) {
    let mut seen = SeenSet::default();
    let mut occurrences = Vec::new();
    let mut duplicates = 0;

    for record in records {
        let context = record.context();
        for keyword in &record.keywords {
            if normalize(keyword).is_empty() {
                continue;
            }
            if !seen.admit(&record.doc_id, keyword) {
                duplicates += 1;
                continue;
            }
            occurrences.push(KeywordOccurrence {
                seq: occurrences.len(),
                doc_id: record.doc_id.clone(),
                title: record.title.clone(),
                keyword: keyword.clone(),
                context: context.clone(),
            });
        }
    }

    (occurrences, duplicates)
}

/// One row per hierarchy path, a single row with an empty path when there
/// are none, and a single row with empty entity fields when unresolved.
pub fn rows_for(occurrence: &KeywordOccurrence, enrichment: &Enrichment) -> Vec<ResultRow> {
    let base = ResultRow {
        docid: occurrence.doc_id.clone(),
        title: occurrence.title.clone(),
        keyword: occurrence.keyword.clone(),
        match_stage: MatchStage::None.to_string(),
        ..Default::default()
    };

    let entity = match &enrichment.resolution {
        Resolution::Resolved(entity) => entity,
        Resolution::Unresolved { disambiguation } => {
            return vec![ResultRow {
                is_disambiguation: *disambiguation,
                ..base
            }];
        }
    };

    let types: &BTreeSet<String> = &entity.instance_of;
    let type_labels: Vec<&str> = types
        .iter()
        .map(|id| {
            enrichment
                .type_labels
                .get(id)
                .map(String::as_str)
                .unwrap_or(id)
        })
        .collect();

    let resolved = ResultRow {
        wikidata_label: entity.label.clone(),
        wikidata_qid: entity.id.clone(),
        bnf_id: entity.cross_ref.clone().unwrap_or_default(),
        match_stage: entity.stage.to_string(),
        label_similarity: round1(entity.label_similarity),
        match_score: round1(entity.match_score),
        p31_types: types.iter().cloned().collect::<Vec<_>>().join(";"),
        p31_label: type_labels.join(";"),
        ..base
    };

    let paths = enrichment.ancestry.rendered();
    if paths.is_empty() {
        return vec![resolved];
    }
    paths
        .into_iter()
        .map(|p279_path| ResultRow {
            p279_path,
            ..resolved.clone()
        })
        .collect()
}

/// Upserts recording a resolved keyword: the entity, its classes, its
/// ancestry chain and the document-keyword-entity mapping.
pub fn graph_ops_for(occurrence: &KeywordOccurrence, enrichment: &Enrichment) -> Vec<GraphOp> {
    let Some(entity) = enrichment.resolution.entity() else {
        return Vec::new();
    };

    let mut ops = vec![GraphOp::EnsureEntity {
        id: entity.id.clone(),
        label: entity.label.clone(),
    }];

    for class_id in &entity.instance_of {
        ops.push(GraphOp::EnsureInstanceOf {
            entity_id: entity.id.clone(),
            class_id: class_id.clone(),
            class_label: enrichment
                .type_labels
                .get(class_id)
                .cloned()
                .unwrap_or_else(|| class_id.clone()),
        });
    }

    let mut emitted = HashSet::new();
    for path in &enrichment.ancestry.paths {
        let mut child = entity.id.as_str();
        for parent in path.ids() {
            if parent == child {
                continue;
            }
            if emitted.insert((child.to_string(), parent.clone())) {
                ops.push(GraphOp::EnsureSubclassOf {
                    child: child.to_string(),
                    parent: parent.clone(),
                    parent_label: enrichment.ancestry.label_of(parent).to_string(),
                });
            }
            child = parent;
        }
    }

    ops.push(GraphOp::EnsureKeywordMapping {
        doc_id: occurrence.doc_id.clone(),
        keyword: occurrence.keyword.clone(),
        entity_id: entity.id.clone(),
    });

    ops
}
