use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::graph::{GraphOp, GraphSink, GraphStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Item,
    Class,
    Document,
    Keyword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelKind {
    SubclassOf,
    InstanceOf,
    ContainsKeyword,
    MapsTo,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub kind: NodeKind,
    pub id: String,
}

impl NodeKey {
    fn new(kind: NodeKind, id: &str) -> Self {
        Self { kind, id: id.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeKey,
    pub rel: RelKind,
    pub to: NodeKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(flatten)]
    pub key: NodeKey,
    pub label: Option<String>,
}

/// Sorted, serializable copy of a [`MemoryGraph`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<Edge>,
}

/// Graph sink with the same merge semantics as the Neo4j writer, kept in
/// memory. Used for dry runs and exported as JSON.
#[derive(Default)]
pub struct MemoryGraph {
    nodes: DashMap<NodeKey, Option<String>>,
    edges: DashSet<Edge>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn merge_node(&self, kind: NodeKind, id: &str) -> NodeKey {
        let key = NodeKey::new(kind, id);
        self.nodes.entry(key.clone()).or_insert(None);
        key
    }

    fn merge_labelled(&self, kind: NodeKind, id: &str, label: &str) -> NodeKey {
        let key = NodeKey::new(kind, id);
        self.nodes.insert(key.clone(), Some(label.to_string()));
        key
    }

    fn merge_edge(&self, from: NodeKey, rel: RelKind, to: NodeKey) {
        self.edges.insert(Edge { from, rel, to });
    }

    pub fn upsert(&self, op: &GraphOp) {
        match op {
            GraphOp::EnsureEntity { id, label } => {
                self.merge_labelled(NodeKind::Item, id, label);
            }
            GraphOp::EnsureSubclassOf { child, parent, parent_label } => {
                let child = self.merge_node(NodeKind::Item, child);
                let parent = self.merge_labelled(NodeKind::Item, parent, parent_label);
                self.merge_edge(child, RelKind::SubclassOf, parent);
            }
            GraphOp::EnsureKeywordMapping { doc_id, keyword, entity_id } => {
                let doc = self.merge_node(NodeKind::Document, doc_id);
                let kw = self.merge_node(NodeKind::Keyword, keyword);
                let item = self.merge_node(NodeKind::Item, entity_id);
                self.merge_edge(doc, RelKind::ContainsKeyword, kw.clone());
                self.merge_edge(kw, RelKind::MapsTo, item);
            }
            GraphOp::EnsureInstanceOf { entity_id, class_id, class_label } => {
                let item = self.merge_node(NodeKind::Item, entity_id);
                let class = self.merge_labelled(NodeKind::Class, class_id, class_label);
                self.merge_edge(item, RelKind::InstanceOf, class);
            }
        }
    }

    pub fn label(&self, kind: NodeKind, id: &str) -> Option<String> {
        self.nodes
            .get(&NodeKey::new(kind, id))
            .and_then(|entry| entry.value().clone())
    }

    pub fn has_edge(&self, from: (NodeKind, &str), rel: RelKind, to: (NodeKind, &str)) -> bool {
        self.edges.contains(&Edge {
            from: NodeKey::new(from.0, from.1),
            rel,
            to: NodeKey::new(to.0, to.1),
        })
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let mut nodes: Vec<NodeRecord> = self
            .nodes
            .iter()
            .map(|entry| NodeRecord {
                key: entry.key().clone(),
                label: entry.value().clone(),
            })
            .collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));

        let mut edges: Vec<Edge> = self.edges.iter().map(|e| e.key().clone()).collect();
        edges.sort();

        GraphSnapshot { nodes, edges }
    }

    pub fn counts(&self) -> GraphStats {
        let count = |kind: NodeKind| self.nodes.iter().filter(|e| e.key().kind == kind).count();
        GraphStats {
            items: count(NodeKind::Item),
            classes: count(NodeKind::Class),
            documents: count(NodeKind::Document),
            keywords: count(NodeKind::Keyword),
            relationships: self.edges.len(),
        }
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create directory: {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())
            .context("Failed to serialize graph")?;
        tokio::fs::write(path, json)
            .await
            .context(format!("Failed to write graph file: {:?}", path))?;
        Ok(())
    }
}

#[async_trait]
impl GraphSink for MemoryGraph {
    async fn apply(&self, op: &GraphOp) -> Result<()> {
        self.upsert(op);
        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats> {
        Ok(self.counts())
    }
}
