use anyhow::{Context, Result};
use async_trait::async_trait;
use neo4rs::{Graph, Query};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::graph::{GraphOp, GraphSink, GraphStats};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://127.0.0.1:7687".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
        }
    }
}

const SCHEMA: &[(&str, &str)] = &[
    ("item_qid_index", "CREATE INDEX item_qid_index IF NOT EXISTS FOR (n:Item) ON (n.qid)"),
    ("class_qid_index", "CREATE INDEX class_qid_index IF NOT EXISTS FOR (n:Class) ON (n.qid)"),
    ("document_id_index", "CREATE INDEX document_id_index IF NOT EXISTS FOR (n:Document) ON (n.id)"),
    ("keyword_name_index", "CREATE INDEX keyword_name_index IF NOT EXISTS FOR (n:Keyword) ON (n.name)"),
];

/// Cypher text and string parameters for one op.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub cypher: &'static str,
    pub params: Vec<(&'static str, String)>,
}

impl Statement {
    fn into_query(self) -> Query {
        self.params
            .into_iter()
            .fold(Query::new(self.cypher.to_string()), |q, (k, v)| q.param(k, v))
    }
}

pub fn statement(op: &GraphOp) -> Statement {
    match op {
        GraphOp::EnsureEntity { id, label } => Statement {
            cypher: r#"
            MERGE (e:Item {qid: $qid})
            SET e.label = $label
            "#,
            params: vec![("qid", id.clone()), ("label", label.clone())],
        },
        GraphOp::EnsureSubclassOf { child, parent, parent_label } => Statement {
            cypher: r#"
            MERGE (child:Item {qid: $child_qid})
            MERGE (parent:Item {qid: $parent_qid})
            SET parent.label = $parent_label
            MERGE (child)-[:SUBCLASS_OF]->(parent)
            "#,
            params: vec![
                ("child_qid", child.clone()),
                ("parent_qid", parent.clone()),
                ("parent_label", parent_label.clone()),
            ],
        },
        GraphOp::EnsureKeywordMapping { doc_id, keyword, entity_id } => Statement {
            cypher: r#"
            MERGE (d:Document {id: $doc_id})
            MERGE (k:Keyword {name: $keyword})
            MERGE (q:Item {qid: $qid})
            MERGE (d)-[:CONTAINS_KEYWORD]->(k)
            MERGE (k)-[:MAPS_TO]->(q)
            "#,
            params: vec![
                ("doc_id", doc_id.clone()),
                ("keyword", keyword.clone()),
                ("qid", entity_id.clone()),
            ],
        },
        GraphOp::EnsureInstanceOf { entity_id, class_id, class_label } => Statement {
            cypher: r#"
            MERGE (item:Item {qid: $item_qid})
            MERGE (type:Class {qid: $class_qid})
            SET type.label = $class_label
            MERGE (item)-[:INSTANCE_OF]->(type)
            "#,
            params: vec![
                ("item_qid", entity_id.clone()),
                ("class_qid", class_id.clone()),
                ("class_label", class_label.clone()),
            ],
        },
    }
}

/// Applies graph ops to Neo4j with MERGE semantics.
pub struct Neo4jWriter {
    graph: Graph,
}

impl Neo4jWriter {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    pub async fn connect(config: &Neo4jConfig) -> Result<Self> {
        let graph = Graph::new(&config.uri, &config.user, &config.password)
            .await
            .context(format!("Failed to connect to Neo4j at {}", config.uri))?;
        Ok(Self::new(graph))
    }

    /// Create lookup indexes for every merged node key.
    pub async fn init_schema(&self) -> Result<()> {
        for (name, cypher) in SCHEMA {
            self.graph
                .run(Query::new(cypher.to_string()))
                .await
                .context(format!("Failed to create index {name}"))?;
        }
        info!(indexes = SCHEMA.len(), "Neo4j schema ready");
        Ok(())
    }

    async fn count(&self, cypher: &str) -> Result<usize> {
        let mut result = self
            .graph
            .execute(Query::new(cypher.to_string()))
            .await
            .context("Failed to run count query")?;
        let count = if let Some(row) = result.next().await? {
            row.get::<i64>("count").unwrap_or(0) as usize
        } else {
            0
        };
        Ok(count)
    }
}

#[async_trait]
impl GraphSink for Neo4jWriter {
    async fn apply(&self, op: &GraphOp) -> Result<()> {
        self.graph
            .run(statement(op).into_query())
            .await
            .context(format!("Failed to apply {}", op.kind()))?;
        Ok(())
    }

    async fn stats(&self) -> Result<GraphStats> {
        Ok(GraphStats {
            items: self.count("MATCH (n:Item) RETURN count(n) as count").await?,
            classes: self.count("MATCH (n:Class) RETURN count(n) as count").await?,
            documents: self.count("MATCH (n:Document) RETURN count(n) as count").await?,
            keywords: self.count("MATCH (n:Keyword) RETURN count(n) as count").await?,
            relationships: self.count("MATCH ()-[r]->() RETURN count(r) as count").await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops() -> Vec<GraphOp> {
        vec![
            GraphOp::EnsureEntity { id: "Q2539".into(), label: "machine learning".into() },
            GraphOp::EnsureSubclassOf {
                child: "Q2539".into(),
                parent: "Q11660".into(),
                parent_label: "artificial intelligence".into(),
            },
            GraphOp::EnsureKeywordMapping {
                doc_id: "42".into(),
                keyword: "machine learning".into(),
                entity_id: "Q2539".into(),
            },
            GraphOp::EnsureInstanceOf {
                entity_id: "Q2539".into(),
                class_id: "Q11862829".into(),
                class_label: "academic discipline".into(),
            },
        ]
    }

    #[test]
    fn test_statements_only_merge() {
        for op in ops() {
            let stmt = statement(&op);
            assert!(stmt.cypher.contains("MERGE"));
            assert!(!stmt.cypher.contains("CREATE"));
            for (name, _) in &stmt.params {
                assert!(stmt.cypher.contains(&format!("${name}")), "{name} unused in {}", op.kind());
            }
        }
    }

    #[test]
    fn test_keyword_mapping_parameters() {
        let stmt = statement(&ops()[2]);
        assert_eq!(
            stmt.params,
            vec![
                ("doc_id", "42".to_string()),
                ("keyword", "machine learning".to_string()),
                ("qid", "Q2539".to_string()),
            ]
        );
        assert!(stmt.cypher.contains("CONTAINS_KEYWORD"));
        assert!(stmt.cypher.contains("MAPS_TO"));
    }

    #[test]
    fn test_schema_covers_merge_keys() {
        for key in ["(n:Item) ON (n.qid)", "(n:Class) ON (n.qid)", "(n:Document) ON (n.id)", "(n:Keyword) ON (n.name)"] {
            assert!(SCHEMA.iter().any(|(_, c)| c.contains(key)), "{key}");
        }
    }
}
