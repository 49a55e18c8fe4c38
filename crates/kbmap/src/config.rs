use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use harvest::HarvestConfig;
use resolve::{ClientConfig, EntityCache, ResolverConfig, RetryPolicy, DEFAULT_MAX_DEPTH};
use store::Neo4jConfig;

pub const NEO4J_PASSWORD_ENV: &str = "KBMAP_NEO4J_PASSWORD";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub knowledge_base: KnowledgeBaseConfig,
    pub resolver: ResolverSettings,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub harvest: HarvestConfig,
    pub neo4j: Neo4jConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeBaseConfig {
    pub endpoint: String,
    /// Overrides the built-in `User-Agent`.
    pub user_agent: Option<String>,
    pub request_timeout_secs: u64,
    pub min_request_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    pub languages: Vec<String>,
    pub search_limit: usize,
    pub exact_search_limit: usize,
    pub min_label_similarity: f64,
    pub min_total_score: f64,
    pub max_hierarchy_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        let client = ClientConfig::default();
        Self {
            endpoint: client.endpoint,
            user_agent: None,
            request_timeout_secs: client.request_timeout.as_secs(),
            min_request_interval_ms: client.min_request_interval.as_millis() as u64,
        }
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        let resolver = ResolverConfig::default();
        Self {
            languages: resolver.languages,
            search_limit: resolver.search_limit,
            exact_search_limit: resolver.exact_search_limit,
            min_label_similarity: resolver.min_label_similarity,
            min_total_score: resolver.min_total_score,
            max_hierarchy_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { workers: 3 }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid by the TOML file at `path` if given, then by the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                Self::from_toml_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            None => Self::default(),
        };

        let config = config.with_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply environment overrides read through `lookup`.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(password) = lookup(NEO4J_PASSWORD_ENV) {
            self.neo4j.password = password;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency.workers == 0 {
            bail!("concurrency.workers must be at least 1");
        }
        if self.resolver.languages.is_empty() {
            bail!("resolver.languages must not be empty");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.resolver.max_hierarchy_depth == 0 {
            bail!("resolver.max_hierarchy_depth must be at least 1");
        }
        Ok(())
    }

    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            endpoint: self.knowledge_base.endpoint.clone(),
            user_agent: self
                .knowledge_base
                .user_agent
                .clone()
                .unwrap_or(defaults.user_agent),
            request_timeout: Duration::from_secs(self.knowledge_base.request_timeout_secs),
            min_request_interval: Duration::from_millis(self.knowledge_base.min_request_interval_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            self.retry.initial_backoff_ms,
            self.retry.max_backoff_ms,
        )
    }

    pub fn entity_cache(&self) -> EntityCache {
        if self.cache.enabled {
            EntityCache::new(self.cache.max_entries)
        } else {
            EntityCache::disabled()
        }
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            languages: self.resolver.languages.clone(),
            search_limit: self.resolver.search_limit,
            exact_search_limit: self.resolver.exact_search_limit,
            min_label_similarity: self.resolver.min_label_similarity,
            min_total_score: self.resolver.min_total_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.concurrency.workers, 3);
        assert_eq!(config.resolver.languages, vec!["en", "fr"]);
        assert_eq!(config.resolver.max_hierarchy_depth, 5);
        assert_eq!(config.resolver.min_label_similarity, 70.0);
        assert_eq!(config.resolver.min_total_score, 30.0);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.knowledge_base.min_request_interval_ms, 100);
        assert_eq!(config.knowledge_base.request_timeout_secs, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [concurrency]
            workers = 8

            [resolver]
            languages = ["fr"]

            [neo4j]
            uri = "bolt://graph:7687"
            "#,
        )
        .unwrap();

        assert_eq!(config.concurrency.workers, 8);
        assert_eq!(config.resolver.languages, vec!["fr"]);
        assert_eq!(config.resolver.search_limit, 50);
        assert_eq!(config.neo4j.uri, "bolt://graph:7687");
        assert_eq!(config.neo4j.user, "neo4j");
        assert_eq!(config.harvest.portal, "u-pec");
    }

    #[test]
    fn test_env_overrides_password() {
        let config = AppConfig::default().with_env(|key| {
            (key == NEO4J_PASSWORD_ENV).then(|| "s3cret".to_string())
        });
        assert_eq!(config.neo4j.password, "s3cret");

        let untouched = AppConfig::default().with_env(|_| None);
        assert_eq!(untouched.neo4j.password, "");
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.concurrency.workers = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.resolver.languages.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.resolver.max_hierarchy_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kbmap.toml");
        std::fs::write(&path, "[cache]\nenabled = false\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(!config.cache.enabled);
        assert_eq!(config.entity_cache().stats().max_entries, 0);

        std::fs::write(&path, "[concurrency]\nworkers = 0\n").unwrap();
        assert!(AppConfig::load(Some(&path)).is_err());
        assert!(AppConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_conversions() {
        let mut config = AppConfig::default();
        config.knowledge_base.user_agent = Some("custom/1.0".to_string());
        config.knowledge_base.min_request_interval_ms = 250;

        let client = config.client_config();
        assert_eq!(client.user_agent, "custom/1.0");
        assert_eq!(client.min_request_interval, Duration::from_millis(250));
        assert_eq!(config.retry_policy().max_attempts(), 5);
        assert_eq!(config.resolver_config().exact_search_limit, 5);
    }
}
