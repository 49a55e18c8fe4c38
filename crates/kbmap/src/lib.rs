pub mod assemble;
pub mod config;
pub mod enrich;
pub mod stats;

pub use assemble::{Enrichment, KeywordOccurrence};
pub use config::AppConfig;
pub use enrich::{EnrichOutput, Enricher};
pub use stats::{RunStats, StatsSnapshot};
