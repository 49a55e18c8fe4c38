pub mod cache;
pub mod client;
pub mod error;
pub mod hierarchy;
pub mod kb;
pub mod model;
pub mod resolver;
pub mod retry;
pub mod score;
pub mod text;
pub mod throttle;
mod wire;

#[cfg(test)]
mod testing;

pub use cache::{CacheStats, EntityCache};
pub use client::{ClientConfig, WikidataClient};
pub use error::KbError;
pub use hierarchy::{expand_ancestry, Ancestry, DEFAULT_MAX_DEPTH};
pub use kb::KnowledgeBase;
pub use model::{
    Candidate, ClaimValue, EntityDetail, HierarchyPath, MatchStage, Resolution, ResolvedEntity,
    SearchHit,
};
pub use resolver::{Resolver, ResolverConfig};
pub use retry::RetryPolicy;
pub use score::TypePolicy;
pub use throttle::Throttle;
