use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use harvest::DocumentRecord;
use resolve::{expand_ancestry, Ancestry, KbError, KnowledgeBase, Resolution, Resolver};
use store::{GraphOp, ResultRow};

use crate::assemble::{collect_occurrences, graph_ops_for, rows_for, Enrichment, KeywordOccurrence};
use crate::stats::RunStats;

/// Rows and graph upserts of a run, in input order.
#[derive(Debug, Default)]
pub struct EnrichOutput {
    pub rows: Vec<ResultRow>,
    pub graph_ops: Vec<GraphOp>,
}

/// Resolves every keyword of a record set on a bounded worker pool.
pub struct Enricher<K> {
    resolver: Arc<Resolver<K>>,
    max_depth: usize,
    workers: usize,
}

impl<K: KnowledgeBase + 'static> Enricher<K> {
    pub fn new(resolver: Resolver<K>, max_depth: usize, workers: usize) -> Self {
        Self {
            resolver: Arc::new(resolver),
            max_depth,
            workers: workers.max(1),
        }
    }

    pub fn resolver(&self) -> &Resolver<K> {
        &self.resolver
    }

    /// Resolve one keyword, then label its classes and expand its ancestry.
    pub async fn enrich_one(&self, occurrence: &KeywordOccurrence) -> Result<Enrichment, KbError> {
        enrich_with(&self.resolver, self.max_depth, occurrence).await
    }

    /// Process all records. A keyword whose lookups fail after retries is
    /// logged, counted and left out; the rest of the run carries on.
    pub async fn run(&self, records: &[DocumentRecord], stats: &RunStats) -> EnrichOutput {
        let (occurrences, duplicates) = collect_occurrences(records);
        for _ in 0..duplicates {
            stats.record_duplicate();
        }
        info!(
            documents = records.len(),
            keywords = occurrences.len(),
            duplicates,
            workers = self.workers,
            "Starting enrichment"
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for occurrence in occurrences {
            let semaphore = semaphore.clone();
            let resolver = self.resolver.clone();
            let max_depth = self.max_depth;

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => enrich_with(&resolver, max_depth, &occurrence).await,
                    Err(_) => Ok(Enrichment::unresolved(false)),
                };
                (occurrence, result)
            });
        }

        let mut finished = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(done) => finished.push(done),
                Err(e) => {
                    warn!(error = %e, "Enrichment task panicked");
                    stats.record_keyword();
                    stats.record_failure();
                }
            }
        }
        finished.sort_by_key(|(occurrence, _)| occurrence.seq);

        let mut output = EnrichOutput::default();
        for (occurrence, result) in finished {
            stats.record_keyword();
            match result {
                Ok(enrichment) => {
                    stats.record_resolution(&enrichment.resolution);
                    let rows = rows_for(&occurrence, &enrichment);
                    stats.record_rows(rows.len());
                    output.rows.extend(rows);
                    output.graph_ops.extend(graph_ops_for(&occurrence, &enrichment));
                }
                Err(e) => {
                    warn!(
                        doc_id = %occurrence.doc_id,
                        keyword = %occurrence.keyword,
                        error = %e,
                        "Keyword failed after retries"
                    );
                    stats.record_failure();
                }
            }
        }

        output
    }
}

async fn enrich_with<K: KnowledgeBase>(
    resolver: &Resolver<K>,
    max_depth: usize,
    occurrence: &KeywordOccurrence,
) -> Result<Enrichment, KbError> {
    let resolution = resolver
        .resolve(&occurrence.keyword, &occurrence.context)
        .await?;

    let Resolution::Resolved(entity) = &resolution else {
        debug!(keyword = %occurrence.keyword, "Keyword unresolved");
        return Ok(Enrichment {
            resolution,
            ..Enrichment::unresolved(false)
        });
    };

    let languages = resolver.languages();
    let type_ids: Vec<String> = entity.instance_of.iter().cloned().collect();
    let type_labels = resolver.kb().get_labels(&type_ids, languages).await?;

    let ancestry = if entity.direct_superclasses.is_empty() {
        Ancestry::default()
    } else {
        expand_ancestry(
            resolver.kb().as_ref(),
            &entity.direct_superclasses,
            max_depth,
            languages,
        )
        .await?
    };

    debug!(
        keyword = %occurrence.keyword,
        entity = %entity.id,
        stage = %entity.stage,
        paths = ancestry.paths.len(),
        "Keyword resolved"
    );

    Ok(Enrichment {
        resolution,
        type_labels,
        ancestry,
    })
}
