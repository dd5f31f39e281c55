use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Exactly one store variant must be configured; the choice is made once at
/// startup and the variants are never mixed.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    pub filesystem: Option<FilesystemStoreConfig>,
    pub object: Option<ObjectStoreConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesystemStoreConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObjectStoreConfig {
    /// Base URL of the S3-compatible endpoint (e.g. an internal gateway or
    /// MinIO). The gateway owns authentication; no credentials here.
    pub endpoint_url: String,
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexingConfig {
    /// Bound on concurrent fetch+extract workers during a rebuild.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Retry attempts for transient fetch errors, on top of the first try.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_retries: default_max_retries(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    /// Matches scoring below this are excluded from results.
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    /// Retrieve-stage candidate cap; exceeds `final_limit` to leave
    /// re-ranking headroom for the categorize stage.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Display cap applied by the assemble stage.
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            search_limit: default_search_limit(),
            final_limit: default_final_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Overall per-query timeout budget across all three stages.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
    ]
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_concurrent() -> usize {
    8
}
fn default_max_retries() -> u32 {
    3
}
fn default_min_score() -> f64 {
    15.0
}
fn default_search_limit() -> usize {
    50
}
fn default_final_limit() -> usize {
    12
}
fn default_timeout_ms() -> u64 {
    5000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match (&config.store.filesystem, &config.store.object) {
        (Some(_), Some(_)) => {
            anyhow::bail!("Configure exactly one store variant, not both [store.filesystem] and [store.object]")
        }
        (None, None) => {
            anyhow::bail!("No store configured. Set [store.filesystem] or [store.object]")
        }
        _ => {}
    }

    if config.indexing.max_concurrent == 0 {
        anyhow::bail!("indexing.max_concurrent must be >= 1");
    }

    if config.scoring.final_limit == 0 {
        anyhow::bail!("scoring.final_limit must be >= 1");
    }
    if config.scoring.search_limit < config.scoring.final_limit {
        anyhow::bail!("scoring.search_limit must be >= scoring.final_limit");
    }
    if !(0.0..=120.0).contains(&config.scoring.min_score) {
        anyhow::bail!("scoring.min_score must be in [0, 120]");
    }

    if config.pipeline.timeout_ms == 0 {
        anyhow::bail!("pipeline.timeout_ms must be >= 1");
    }

    Ok(())
}
