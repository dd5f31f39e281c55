//! Three-stage query pipeline: retrieve → categorize & rank → assemble.
//!
//! The stages are logically sequential — each is a pure transform of the
//! previous stage's output — and every invocation runs over one shared,
//! immutable snapshot reference, so any number of queries may execute
//! concurrently with no coordination. Real concurrency lives in independent
//! queries and per-document extraction, not inside a single pipeline run.
//!
//! Each run carries an overall timeout budget. A stage that would exceed it
//! is skipped or cut short and the result is assembled from whatever the
//! completed stages produced, marked `degraded: true` — the pipeline never
//! hangs and a stage problem never fails the whole query.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::QueryError;
use crate::index::{IndexManager, IndexSnapshot};
use crate::models::{
    CategorySummary, DiscountItem, DiscountRecord, PipelineResult, Query, ScoredMatch,
    StageDiagnostics,
};
use crate::score::{self, ScoreParams};

#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub min_score: f64,
    /// Retrieve-stage candidate cap; above `final_limit` for re-ranking
    /// headroom.
    pub search_limit: usize,
    /// Display cap applied by the assemble stage.
    pub final_limit: usize,
    /// Overall budget for one pipeline run.
    pub timeout: Duration,
}

impl PipelineParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_score: config.scoring.min_score,
            search_limit: config.scoring.search_limit,
            final_limit: config.scoring.final_limit,
            timeout: Duration::from_millis(config.pipeline.timeout_ms),
        }
    }
}

/// A retrieve-stage match carried through the later stages. `record` is
/// `None` only when the snapshot unexpectedly lacks the record id, in which
/// case the match passes through minimally processed and the result is
/// marked degraded.
struct RankedEntry {
    matched: ScoredMatch,
    record: Option<DiscountRecord>,
}

pub struct Pipeline {
    manager: Arc<IndexManager>,
    params: PipelineParams,
}

impl Pipeline {
    pub fn new(manager: Arc<IndexManager>, params: PipelineParams) -> Self {
        Self { manager, params }
    }

    /// Run one query through all three stages.
    ///
    /// Returns `Err(QueryError::IndexNotReady)` when no snapshot has been
    /// published — an explicit signal, never an empty success.
    pub async fn run(&self, query: Query) -> Result<PipelineResult, QueryError> {
        let deadline = Instant::now() + self.params.timeout;
        let snapshot = self.manager.current().ok_or(QueryError::IndexNotReady)?;

        let mut degraded = false;
        let mut diagnostics = StageDiagnostics::default();

        // Stage A — retrieve. Scoring walks every record, so it runs on a
        // blocking worker under the remaining time budget.
        let stage_a_started = Instant::now();
        let score_params = ScoreParams {
            min_score: self.params.min_score,
            limit: self.params.search_limit,
        };
        let matches = {
            let worker_snapshot = Arc::clone(&snapshot);
            let worker_query = query.clone();
            let remaining = deadline.saturating_duration_since(Instant::now());
            let scoring = tokio::task::spawn_blocking(move || {
                score::rank(&worker_snapshot, &worker_query, &score_params)
            });

            match tokio::time::timeout(remaining, scoring).await {
                Ok(Ok(matches)) => {
                    diagnostics.stage_a = format!(
                        "retrieved {} candidate(s) from generation {} in {}ms",
                        matches.len(),
                        snapshot.generation,
                        stage_a_started.elapsed().as_millis()
                    );
                    matches
                }
                Ok(Err(join_err)) => {
                    warn!(error = %join_err, "retrieve stage failed");
                    degraded = true;
                    diagnostics.stage_a = format!("retrieve stage failed: {}", join_err);
                    Vec::new()
                }
                Err(_) => {
                    warn!(query = %query.text, "retrieve stage timed out");
                    diagnostics.stage_a = format!(
                        "retrieve stage timed out after {}ms",
                        self.params.timeout.as_millis()
                    );
                    diagnostics.stage_b = "skipped: timeout budget exhausted".to_string();
                    diagnostics.stage_c = "assembled empty result after timeout".to_string();
                    return Ok(assemble_empty(&query.text, true, diagnostics));
                }
            }
        };
        let total_found = matches.len();

        // Stage B — categorize & rank. Pure function of stage A's output.
        let (entries, categories) = if Instant::now() >= deadline {
            degraded = true;
            diagnostics.stage_b = "skipped: timeout budget exhausted".to_string();
            (
                matches
                    .into_iter()
                    .map(|matched| RankedEntry {
                        matched,
                        record: None,
                    })
                    .collect(),
                Vec::new(),
            )
        } else {
            let (entries, categories, missing) = categorize(&snapshot, matches);
            if missing > 0 {
                degraded = true;
                diagnostics.stage_b = format!(
                    "grouped {} match(es) into {} category(ies); {} passed through undecorated",
                    entries.len(),
                    categories.len(),
                    missing
                );
            } else {
                diagnostics.stage_b = format!(
                    "grouped {} match(es) into {} category(ies)",
                    entries.len(),
                    categories.len()
                );
            }
            (entries, categories)
        };

        // Stage C — assemble. Pure formatting; always runs.
        let results = assemble_items(&entries, self.params.final_limit);
        diagnostics.stage_c = format!(
            "assembled {} of {} result(s)",
            results.len(),
            total_found
        );

        debug!(
            query = %query.text,
            total_found,
            degraded,
            "pipeline run complete"
        );

        Ok(PipelineResult {
            message: result_message(&query.text, total_found),
            query: query.text,
            results,
            total_found,
            categories,
            degraded,
            diagnostics,
        })
    }
}

/// Stage B: look up each match's record, group by category, and summarize
/// the groups. Matches arrive sorted by score, so per-group member order is
/// already rank order. Returns the entries, the category summaries, and the
/// count of matches whose record was missing from the snapshot.
fn categorize(
    snapshot: &IndexSnapshot,
    matches: Vec<ScoredMatch>,
) -> (Vec<RankedEntry>, Vec<CategorySummary>, usize) {
    let mut missing = 0usize;
    let entries: Vec<RankedEntry> = matches
        .into_iter()
        .map(|matched| {
            let record = snapshot.record(&matched.record_id).cloned();
            if record.is_none() {
                missing += 1;
            }
            RankedEntry { matched, record }
        })
        .collect();

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entry in &entries {
        if let Some(record) = &entry.record {
            *counts.entry(record.category.as_str()).or_default() += 1;
        }
    }

    let mut categories: Vec<CategorySummary> = counts
        .into_iter()
        .map(|(category, count)| CategorySummary {
            category: category.to_string(),
            count,
        })
        .collect();
    categories.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.category.cmp(&b.category)));

    (entries, categories, missing)
}

/// Stage C: map ranked entries to user-facing items, capped at the display
/// limit. An entry without a record keeps its id and score so a degraded
/// response still identifies what matched.
fn assemble_items(entries: &[RankedEntry], final_limit: usize) -> Vec<DiscountItem> {
    entries
        .iter()
        .take(final_limit)
        .map(|entry| match &entry.record {
            Some(record) => DiscountItem::from_record(record, entry.matched.score),
            None => DiscountItem {
                name: entry.matched.record_id.clone(),
                discount: "N/A".to_string(),
                category: crate::fields::FALLBACK_CATEGORY.to_string(),
                code: None,
                how_to_use: String::new(),
                bonus: None,
                score: entry.matched.score,
            },
        })
        .collect()
}

fn assemble_empty(query: &str, degraded: bool, diagnostics: StageDiagnostics) -> PipelineResult {
    PipelineResult {
        query: query.to_string(),
        results: Vec::new(),
        total_found: 0,
        categories: Vec::new(),
        message: result_message(query, 0),
        degraded,
        diagnostics,
    }
}

fn result_message(query: &str, count: usize) -> String {
    match count {
        0 => format!("No discounts found for '{}'. Try a different search!", query),
        1 => format!("Found 1 discount for '{}'!", query),
        n => format!("Found {} discounts matching '{}'!", n, query),
    }
}
