//! Subclass-of ancestry expansion.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::error::KbError;
use crate::kb::KnowledgeBase;
use crate::model::HierarchyPath;

pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Ancestor paths of an entity plus labels for every id on them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ancestry {
    pub paths: Vec<HierarchyPath>,
    pub labels: HashMap<String, String>,
}

impl Ancestry {
    /// Each path as a `label > label > ...` chain.
    pub fn rendered(&self) -> Vec<String> {
        self.paths.iter().map(|p| p.render(&self.labels)).collect()
    }

    pub fn label_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.labels.get(id).map(String::as_str).unwrap_or(id)
    }
}

/// Breadth-first walk up the subclass-of graph from `direct_superclasses`.
///
/// Paths hold at most `max_depth` ids and never repeat an id. A path ends
/// when its tail has no unvisited superclass; paths still growing when the
/// depth runs out are emitted as they stand. Each level costs one batched
/// entity fetch, and labels for the whole result one more.
pub async fn expand_ancestry<K>(
    kb: &K,
    direct_superclasses: &[String],
    max_depth: usize,
    languages: &[String],
) -> Result<Ancestry, KbError>
where
    K: KnowledgeBase + ?Sized,
{
    if direct_superclasses.is_empty() || max_depth == 0 {
        return Ok(Ancestry::default());
    }

    let mut seen_starts = HashSet::new();
    let mut frontier: Vec<Vec<String>> = direct_superclasses
        .iter()
        .filter(|id| seen_starts.insert(id.as_str()))
        .map(|id| vec![id.clone()])
        .collect();

    let mut paths = PathSet::default();

    for level in 1..max_depth {
        if frontier.is_empty() {
            break;
        }

        let mut tails: Vec<String> = Vec::new();
        for path in &frontier {
            if let Some(tail) = path.last() {
                if !tails.contains(tail) {
                    tails.push(tail.clone());
                }
            }
        }
        let details = kb.get_entities(&tails, languages).await?;

        let mut next = Vec::new();
        for path in frontier.drain(..) {
            let parents = path
                .last()
                .and_then(|tail| details.get(tail))
                .map(|d| d.subclass_of())
                .unwrap_or_default();

            let unvisited: Vec<String> = parents
                .into_iter()
                .filter(|p| !path.contains(p))
                .collect();

            if unvisited.is_empty() {
                paths.push(path);
                continue;
            }
            for parent in unvisited {
                let mut extended = path.clone();
                extended.push(parent);
                next.push(extended);
            }
        }

        debug!(level, tails = tails.len(), next = next.len(), "Expanded hierarchy level");
        frontier = next;
    }

    for path in frontier {
        paths.push(path);
    }

    let paths = paths.into_inner();
    let mut ids: Vec<String> = Vec::new();
    let mut seen_ids = HashSet::new();
    for path in &paths {
        for id in path.ids() {
            if seen_ids.insert(id.clone()) {
                ids.push(id.clone());
            }
        }
    }
    let labels = kb.get_labels(&ids, languages).await?;

    Ok(Ancestry { paths, labels })
}

/// Insertion-ordered set of paths.
#[derive(Default)]
struct PathSet {
    seen: HashSet<Vec<String>>,
    ordered: Vec<HierarchyPath>,
}

impl PathSet {
    fn push(&mut self, path: Vec<String>) {
        if self.seen.insert(path.clone()) {
            self.ordered.push(HierarchyPath(path));
        }
    }

    fn into_inner(self) -> Vec<HierarchyPath> {
        self.ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockKb;
    use std::sync::atomic::Ordering;

    fn langs() -> Vec<String> {
        vec!["en".to_string(), "fr".to_string()]
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn chain() -> MockKb {
        MockKb::new()
            .entity("Q1", "one", "", &[], &["Q2"])
            .entity("Q2", "two", "", &[], &["Q3"])
            .entity("Q3", "three", "", &[], &["Q4"])
            .entity("Q4", "four", "", &[], &["Q5"])
            .entity("Q5", "five", "", &[], &["Q6"])
            .entity("Q6", "six", "", &[], &[])
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let kb = chain();
        let ancestry = expand_ancestry(&kb, &ids(&["Q1"]), 5, &langs()).await.unwrap();

        assert_eq!(ancestry.paths.len(), 1);
        assert_eq!(ancestry.paths[0].ids(), ids(&["Q1", "Q2", "Q3", "Q4", "Q5"]).as_slice());
        assert_eq!(ancestry.rendered(), vec!["one > two > three > four > five"]);

        let short = expand_ancestry(&kb, &ids(&["Q1"]), 2, &langs()).await.unwrap();
        assert_eq!(short.paths[0].ids(), ids(&["Q1", "Q2"]).as_slice());
    }

    #[tokio::test]
    async fn test_path_ends_at_root() {
        let kb = chain();
        let ancestry = expand_ancestry(&kb, &ids(&["Q4"]), 5, &langs()).await.unwrap();
        assert_eq!(ancestry.rendered(), vec!["four > five > six"]);
    }

    #[tokio::test]
    async fn test_cycles_never_repeat_ids() {
        let kb = MockKb::new()
            .entity("QA", "a", "", &[], &["QB"])
            .entity("QB", "b", "", &[], &["QC"])
            .entity("QC", "c", "", &[], &["QA"]);

        let ancestry = expand_ancestry(&kb, &ids(&["QA"]), 10, &langs()).await.unwrap();
        assert_eq!(ancestry.paths.len(), 1);
        assert_eq!(ancestry.paths[0].ids(), ids(&["QA", "QB", "QC"]).as_slice());

        for path in &ancestry.paths {
            let unique: HashSet<&String> = path.ids().iter().collect();
            assert_eq!(unique.len(), path.len());
        }
    }

    #[tokio::test]
    async fn test_branching_and_dedup() {
        let kb = MockKb::new()
            .entity("QA", "a", "", &[], &["QB", "QC"])
            .entity("QB", "b", "", &[], &[])
            .entity("QC", "c", "", &[], &[]);

        let ancestry = expand_ancestry(&kb, &ids(&["QA", "QA"]), 5, &langs()).await.unwrap();
        assert_eq!(ancestry.rendered(), vec!["a > b", "a > c"]);
    }

    #[tokio::test]
    async fn test_one_fetch_per_level_and_one_label_lookup() {
        let kb = MockKb::new()
            .entity("QA", "a", "", &[], &["QC"])
            .entity("QB", "b", "", &[], &["QC"])
            .entity("QC", "c", "", &[], &[]);

        let ancestry = expand_ancestry(&kb, &ids(&["QA", "QB"]), 5, &langs()).await.unwrap();
        assert_eq!(ancestry.rendered(), vec!["a > c", "b > c"]);

        // level 1 (QA, QB), level 2 (QC), labels
        assert_eq!(kb.entity_calls.load(Ordering::SeqCst), 3);
        let batches = kb.requested_batches.lock().unwrap();
        assert_eq!(batches[0], ids(&["QA", "QB"]));
        assert_eq!(batches[1], ids(&["QC"]));
        assert_eq!(batches[2], ids(&["QA", "QC", "QB"]));
    }

    #[tokio::test]
    async fn test_unknown_labels_fall_back_to_ids() {
        let kb = MockKb::new().entity("QA", "a", "", &[], &["Q_GONE"]);

        let ancestry = expand_ancestry(&kb, &ids(&["QA"]), 3, &langs()).await.unwrap();
        assert_eq!(ancestry.rendered(), vec!["a > Q_GONE"]);
        assert_eq!(ancestry.label_of("Q_GONE"), "Q_GONE");
    }

    #[tokio::test]
    async fn test_no_superclasses() {
        let kb = MockKb::new();
        let ancestry = expand_ancestry(&kb, &[], 5, &langs()).await.unwrap();
        assert!(ancestry.paths.is_empty());
        assert_eq!(kb.entity_calls.load(Ordering::SeqCst), 0);
    }
}
