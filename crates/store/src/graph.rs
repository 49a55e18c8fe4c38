use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// An idempotent graph upsert.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum GraphOp {
    /// `(:Item {qid})` with its label.
    EnsureEntity { id: String, label: String },
    /// `(:Item)-[:SUBCLASS_OF]->(:Item)`, labelling the parent.
    EnsureSubclassOf {
        child: String,
        parent: String,
        parent_label: String,
    },
    /// `(:Document)-[:CONTAINS_KEYWORD]->(:Keyword)-[:MAPS_TO]->(:Item)`.
    EnsureKeywordMapping {
        doc_id: String,
        keyword: String,
        entity_id: String,
    },
    /// `(:Item)-[:INSTANCE_OF]->(:Class)`, labelling the class.
    EnsureInstanceOf {
        entity_id: String,
        class_id: String,
        class_label: String,
    },
}

impl GraphOp {
    pub fn kind(&self) -> &'static str {
        match self {
            GraphOp::EnsureEntity { .. } => "ensure_entity",
            GraphOp::EnsureSubclassOf { .. } => "ensure_subclass_of",
            GraphOp::EnsureKeywordMapping { .. } => "ensure_keyword_mapping",
            GraphOp::EnsureInstanceOf { .. } => "ensure_instance_of",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub items: usize,
    pub classes: usize,
    pub documents: usize,
    pub keywords: usize,
    pub relationships: usize,
}

/// Destination for graph upserts.
#[async_trait]
pub trait GraphSink: Send + Sync {
    async fn apply(&self, op: &GraphOp) -> Result<()>;

    /// Apply every op, logging failures instead of stopping. Returns the
    /// number of failed ops.
    async fn apply_all(&self, ops: &[GraphOp]) -> usize {
        let mut failed = 0;
        for op in ops {
            if let Err(e) = self.apply(op).await {
                warn!(op = op.kind(), error = %format!("{e:#}"), "Graph write failed");
                failed += 1;
            }
        }
        failed
    }

    async fn stats(&self) -> Result<GraphStats>;
}
