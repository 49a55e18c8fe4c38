use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use harvest::{HalClient, RecordFile};
use kbmap::{AppConfig, Enricher, RunStats};
use resolve::{Resolver, WikidataClient};
use store::{CsvWriter, GraphSink, MemoryGraph, Neo4jWriter};

/// Map HAL author keywords to Wikidata entities.
#[derive(Parser)]
#[command(name = "kbmap", version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest records from the HAL portal
    Harvest {
        #[arg(long)]
        out: PathBuf,
        /// Stop after this many kept records
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Resolve the keywords of harvested records
    Enrich {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        csv: PathBuf,
        /// Also write the entity graph to Neo4j
        #[arg(long)]
        neo4j: bool,
        /// Also export the entity graph as JSON
        #[arg(long)]
        graph_json: Option<PathBuf>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Harvest { out, limit } => harvest(&config, &out, limit).await,
        Command::Enrich {
            input,
            csv,
            neo4j,
            graph_json,
        } => enrich(&config, &input, &csv, neo4j, graph_json.as_deref()).await,
    }
}

async fn harvest(config: &AppConfig, out: &Path, limit: usize) -> Result<()> {
    let client = HalClient::new(config.harvest.clone())?;
    info!(endpoint = %config.harvest.endpoint(), limit, "Harvesting");

    let records = client.harvest(limit).await?;
    RecordFile::write(out, &records).await?;

    info!(records = records.len(), path = ?out, "Records saved");
    Ok(())
}

async fn enrich(
    config: &AppConfig,
    input: &Path,
    csv: &Path,
    neo4j: bool,
    graph_json: Option<&Path>,
) -> Result<()> {
    let records = RecordFile::read(input).await?;
    info!(records = records.len(), path = ?input, "Records loaded");

    let client = WikidataClient::new(config.client_config(), config.retry_policy(), config.entity_cache())
        .context("Failed to build knowledge-base client")?;
    let cache = client.cache().clone();
    let resolver = Resolver::new(Arc::new(client), config.resolver_config());
    let enricher = Enricher::new(
        resolver,
        config.resolver.max_hierarchy_depth,
        config.concurrency.workers,
    );

    let stats = RunStats::new();
    let output = enricher.run(&records, &stats).await;

    let mut writer = CsvWriter::create(csv)?;
    writer.write_all(&output.rows)?;
    writer.finish()?;

    if neo4j {
        let sink = Neo4jWriter::connect(&config.neo4j).await?;
        sink.init_schema().await?;
        let failures = sink.apply_all(&output.graph_ops).await;
        stats.record_graph_writes(output.graph_ops.len(), failures);
        match sink.stats().await {
            Ok(graph) => info!(?graph, "Neo4j graph updated"),
            Err(e) => warn!(error = %format!("{e:#}"), "Could not read Neo4j stats"),
        }
    }

    if let Some(path) = graph_json {
        let graph = MemoryGraph::new();
        let failures = graph.apply_all(&output.graph_ops).await;
        if !neo4j {
            stats.record_graph_writes(output.graph_ops.len(), failures);
        }
        graph.write_json(path).await?;
        info!(graph = ?graph.counts(), path = ?path, "Graph exported");
    }

    let cache_stats = cache.stats();
    info!(
        cached = cache_stats.entities_cached,
        capacity = cache_stats.max_entries,
        "Entity cache"
    );
    stats.log_summary();
    Ok(())
}
