use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

use resolve::Resolution;

/// Counters for one enrichment run.
pub struct RunStats {
    keywords: AtomicUsize,
    duplicates: AtomicUsize,
    resolved: AtomicUsize,
    unresolved: AtomicUsize,
    disambiguation: AtomicUsize,
    failed: AtomicUsize,
    rows: AtomicUsize,
    graph_ops: AtomicUsize,
    graph_failures: AtomicUsize,
    started: Instant,
}

impl RunStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            keywords: AtomicUsize::new(0),
            duplicates: AtomicUsize::new(0),
            resolved: AtomicUsize::new(0),
            unresolved: AtomicUsize::new(0),
            disambiguation: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            rows: AtomicUsize::new(0),
            graph_ops: AtomicUsize::new(0),
            graph_failures: AtomicUsize::new(0),
            started: Instant::now(),
        })
    }

    pub fn record_keyword(&self) {
        self.keywords.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolution(&self, resolution: &Resolution) {
        match resolution {
            Resolution::Resolved(_) => {
                self.resolved.fetch_add(1, Ordering::Relaxed);
            }
            Resolution::Unresolved { disambiguation } => {
                self.unresolved.fetch_add(1, Ordering::Relaxed);
                if *disambiguation {
                    self.disambiguation.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rows(&self, rows: usize) {
        self.rows.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_graph_writes(&self, ops: usize, failures: usize) {
        self.graph_ops.fetch_add(ops, Ordering::Relaxed);
        self.graph_failures.fetch_add(failures, Ordering::Relaxed);
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            keywords: self.keywords.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            unresolved: self.unresolved.load(Ordering::Relaxed),
            disambiguation: self.disambiguation.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rows: self.rows.load(Ordering::Relaxed),
            graph_ops: self.graph_ops.load(Ordering::Relaxed),
            graph_failures: self.graph_failures.load(Ordering::Relaxed),
            elapsed_ms: self.elapsed().as_millis() as u64,
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            keywords = s.keywords,
            duplicates = s.duplicates,
            resolved = s.resolved,
            unresolved = s.unresolved,
            disambiguation = s.disambiguation,
            failed = s.failed,
            rows = s.rows,
            graph_ops = s.graph_ops,
            graph_failures = s.graph_failures,
            elapsed_ms = s.elapsed_ms,
            resolved_pct = %format!("{:.1}", s.resolution_rate() * 100.0),
            "Enrichment finished"
        );
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub keywords: usize,
    pub duplicates: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub disambiguation: usize,
    pub failed: usize,
    pub rows: usize,
    pub graph_ops: usize,
    pub graph_failures: usize,
    pub elapsed_ms: u64,
}

impl StatsSnapshot {
    /// Share of processed keywords that resolved.
    pub fn resolution_rate(&self) -> f64 {
        if self.keywords > 0 {
            self.resolved as f64 / self.keywords as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = RunStats::new();
        for _ in 0..4 {
            stats.record_keyword();
        }
        stats.record_duplicate();
        stats.record_resolution(&Resolution::Unresolved { disambiguation: true });
        stats.record_resolution(&Resolution::Unresolved { disambiguation: false });
        stats.record_failure();
        stats.record_graph_writes(10, 1);

        let s = stats.snapshot();
        assert_eq!(s.keywords, 4);
        assert_eq!(s.duplicates, 1);
        assert_eq!(s.unresolved, 2);
        assert_eq!(s.disambiguation, 1);
        assert_eq!(s.failed, 1);
        assert_eq!((s.graph_ops, s.graph_failures), (10, 1));
        assert_eq!(s.resolution_rate(), 0.0);
    }
}
