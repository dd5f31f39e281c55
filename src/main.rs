//! # Perk Harness CLI (`perk`)
//!
//! The `perk` binary is the operational surface for the discount catalog
//! engine. It builds an index snapshot from the configured document store
//! and runs queries through the three-stage pipeline.
//!
//! ## Usage
//!
//! ```bash
//! perk --config ./config/perk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `perk index` | Rebuild the snapshot and print a build summary |
//! | `perk search "<query>"` | Search the catalog with ranked results |
//! | `perk status` | Print the engine status contract |
//! | `perk categories` | List category buckets with counts |
//! | `perk list` | Dump every record's user-facing fields |
//!
//! ## Examples
//!
//! ```bash
//! # Rebuild and inspect what was indexed
//! perk index --config ./config/perk.toml
//!
//! # Ranked search
//! perk search "hotel discounts" --config ./config/perk.toml
//!
//! # Bias ranking towards a category (soft bonus, not a filter)
//! perk search "deals" --category Dining
//!
//! # Status for health checks, as JSON
//! perk status --json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use perk_harness::config::{self, Config};
use perk_harness::error::QueryError;
use perk_harness::index::IndexManager;
use perk_harness::models::{DiscountItem, Query};
use perk_harness::pipeline::{Pipeline, PipelineParams};
use perk_harness::store::DocumentStore;
use perk_harness::store_fs::FilesystemStore;
use perk_harness::store_object::ObjectStore;

/// Perk Harness CLI — an indexing and relevance-ranking engine for employee
/// discount offers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file that selects the document store (filesystem or object storage) and
/// tunes indexing, scoring, and pipeline budgets.
#[derive(Parser)]
#[command(
    name = "perk",
    about = "Perk Harness — index and search a catalog of employee discount offers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/perk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Rebuild the index snapshot and print a build summary.
    ///
    /// Lists documents from the configured store, extracts and parses them
    /// on a bounded worker pool, and prints record counts, the per-category
    /// breakdown, and any per-document diagnostics.
    Index,

    /// Search the catalog.
    ///
    /// Builds a snapshot at startup, then runs the query through the
    /// retrieve → categorize → assemble pipeline and prints ranked results.
    Search {
        /// The search query string.
        query: String,

        /// Category hint. Matching-category records get a flat ranking
        /// bonus; other records remain eligible.
        #[arg(long)]
        category: Option<String>,

        /// Maximum number of results to display.
        #[arg(long)]
        limit: Option<usize>,

        /// Emit the full result contract as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the engine status contract.
    ///
    /// Attempts a rebuild first so the output reflects current source
    /// health; a failed rebuild shows up as `ready: false` or `stale: true`.
    Status {
        /// Emit the status contract as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List category buckets and their record counts.
    Categories,

    /// Dump every indexed record's user-facing fields.
    List {
        /// Emit records as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("perk_harness=warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;
    let store = build_store(&config)?;
    let manager = Arc::new(IndexManager::new(store, &config.indexing));

    match cli.command {
        Commands::Index => run_index(&manager).await,
        Commands::Search {
            query,
            category,
            limit,
            json,
        } => run_search(manager, &config, query, category, limit, json).await,
        Commands::Status { json } => run_status(&manager, json).await,
        Commands::Categories => run_categories(&manager).await,
        Commands::List { json } => run_list(&manager, json).await,
    }
}

fn build_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    if let Some(fs_config) = &config.store.filesystem {
        let store = FilesystemStore::new(fs_config).context("Failed to set up filesystem store")?;
        return Ok(Arc::new(store));
    }
    if let Some(object_config) = &config.store.object {
        let store = ObjectStore::new(object_config).context("Failed to set up object store")?;
        return Ok(Arc::new(store));
    }
    // load_config validated that one variant is present.
    anyhow::bail!("No store configured")
}

async fn run_index(manager: &IndexManager) -> Result<()> {
    let snapshot = manager.rebuild().await.context("Rebuild failed")?;

    println!("index generation {}", snapshot.generation);
    println!("  documents indexed: {}", snapshot.document_count());
    println!("  records: {}", snapshot.records.len());

    if !snapshot.by_category.is_empty() {
        println!("  by category:");
        for (category, members) in &snapshot.by_category {
            println!("    {:<20} {}", category, members.len());
        }
    }

    if !snapshot.diagnostics.is_empty() {
        println!("  skipped or partial documents:");
        for diagnostic in &snapshot.diagnostics {
            println!("    {}: {}", diagnostic.document_id, diagnostic.detail);
        }
    }

    println!("ok");
    Ok(())
}

async fn run_search(
    manager: Arc<IndexManager>,
    config: &Config,
    query_text: String,
    category: Option<String>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    manager.rebuild().await.context("Rebuild failed")?;

    let query = match Query::new(query_text, category) {
        Ok(query) => query,
        Err(QueryError::Malformed) => anyhow::bail!("Query must not be empty"),
        Err(e) => return Err(e.into()),
    };

    let mut params = PipelineParams::from_config(config);
    if let Some(limit) = limit {
        params.final_limit = limit;
        params.search_limit = params.search_limit.max(limit);
    }

    let pipeline = Pipeline::new(manager, params);
    let result = pipeline.run(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("{}", result.message);
    if result.degraded {
        println!("(degraded result — see diagnostics)");
    }
    println!();

    for (i, item) in result.results.iter().enumerate() {
        print_item(i + 1, item);
    }

    if !result.categories.is_empty() {
        println!("by category:");
        for summary in &result.categories {
            println!("  {:<20} {}", summary.category, summary.count);
        }
        println!();
    }

    println!("stage A: {}", result.diagnostics.stage_a);
    println!("stage B: {}", result.diagnostics.stage_b);
    println!("stage C: {}", result.diagnostics.stage_c);

    Ok(())
}

fn print_item(rank: usize, item: &DiscountItem) {
    println!("{}. [{:.0}] {} — {}", rank, item.score, item.name, item.discount);
    println!("    category: {}", item.category);
    if let Some(code) = &item.code {
        println!("    code: {}", code);
    }
    if !item.how_to_use.is_empty() {
        println!("    how to use: {}", item.how_to_use);
    }
    if let Some(bonus) = &item.bonus {
        println!("    bonus: {}", bonus);
    }
    println!();
}

async fn run_status(manager: &IndexManager, json: bool) -> Result<()> {
    // Best effort: a failed rebuild still yields a meaningful status.
    if let Err(e) = manager.rebuild().await {
        tracing::warn!(error = %e, "rebuild failed while gathering status");
    }

    let status = manager.status();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("generation:          {}", status.generation);
    println!("documents:           {}", status.document_count);
    println!("records:             {}", status.record_count);
    println!(
        "last rebuild:        {}",
        status
            .last_rebuild_time
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string())
    );
    println!("rebuild errors:      {}", status.rebuild_error_count);
    println!("ready:               {}", status.ready);
    println!("stale:               {}", status.stale);
    Ok(())
}

async fn run_categories(manager: &IndexManager) -> Result<()> {
    let snapshot = manager.rebuild().await.context("Rebuild failed")?;

    println!("{:<24} RECORDS", "CATEGORY");
    for (category, members) in &snapshot.by_category {
        println!("{:<24} {}", category, members.len());
    }
    Ok(())
}

async fn run_list(manager: &IndexManager, json: bool) -> Result<()> {
    let snapshot = manager.rebuild().await.context("Rebuild failed")?;

    let items: Vec<DiscountItem> = snapshot
        .records
        .iter()
        .map(|record| DiscountItem::from_record(record, 0.0))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    println!("{} record(s) in generation {}", items.len(), snapshot.generation);
    println!();
    for (i, item) in items.iter().enumerate() {
        print_item(i + 1, item);
    }
    Ok(())
}
