//! Core data models used throughout the engine.
//!
//! These types represent the documents, records, and query results that flow
//! from the store adapter through extraction, indexing, and the query
//! pipeline. The serializable types at the bottom are the output and status
//! contracts consumed by external transport layers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::QueryError;

/// Identity and metadata of one source document, produced by a store adapter.
#[derive(Debug, Clone)]
pub struct DocumentDescriptor {
    /// Source-relative path or object key. Stable across rebuilds for an
    /// unchanged source; record ids derive from it.
    pub id: String,
    /// File or object name, including extension.
    pub name: String,
    pub modified: DateTime<Utc>,
    pub size: u64,
}

/// Text extracted from one document.
///
/// `display_text` keeps the original casing for presentation;
/// `normalized_text` is the lower-cased, punctuation-folded copy used for
/// matching. The two are never conflated.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub document_id: String,
    pub display_text: String,
    pub normalized_text: String,
    /// Byte offset of each page's start within `display_text`. Plain-text
    /// documents have a single page at offset 0.
    pub page_offsets: Vec<usize>,
    /// Per-page extraction problems that did not exclude the document.
    pub diagnostics: Vec<String>,
}

/// One discount offer, parsed from an extracted document.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountRecord {
    /// `"{document_id}#{ordinal}"` — unique within a snapshot, stable across
    /// rebuilds when the source document is unchanged, and sorted in catalog
    /// order because records are ordered by document id before sealing.
    pub id: String,
    pub name: String,
    /// E.g. `"20%"`. Absent when no discount marker was found.
    pub discount_value: Option<String>,
    pub category: String,
    pub code: Option<String>,
    pub how_to_use: String,
    pub bonus: Option<String>,
    pub source_document_id: String,
    /// Token-normalized body text used for term matching.
    pub raw_text: String,
}

/// A validated query. Construct through [`Query::new`], which rejects empty
/// text before the pipeline is ever invoked.
#[derive(Debug, Clone)]
pub struct Query {
    pub text: String,
    pub category: Option<String>,
}

impl Query {
    pub fn new(text: impl Into<String>, category: Option<String>) -> Result<Self, QueryError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QueryError::Malformed);
        }
        Ok(Self { text, category })
    }
}

/// One record's relevance against a query, produced by the scorer.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub record_id: String,
    /// Tiered lexical score in `[0, 120]` (base tier up to 100 plus the
    /// optional +20 category bonus).
    pub score: f64,
    pub matched_terms: Vec<String>,
}

// ── Output contracts ───────────────────────────────────────────────────

/// User-facing fields of one result row.
#[derive(Debug, Clone, Serialize)]
pub struct DiscountItem {
    pub name: String,
    pub discount: String,
    pub category: String,
    pub code: Option<String>,
    pub how_to_use: String,
    pub bonus: Option<String>,
    pub score: f64,
}

impl DiscountItem {
    pub fn from_record(record: &DiscountRecord, score: f64) -> Self {
        Self {
            name: record.name.clone(),
            discount: record
                .discount_value
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            category: record.category.clone(),
            code: record.code.clone(),
            how_to_use: record.how_to_use.clone(),
            bonus: record.bonus.clone(),
            score,
        }
    }
}

/// Category bucket summary attached by the categorize stage.
#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub count: usize,
}

/// One-line summary of what each pipeline stage did (or why it didn't run).
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageDiagnostics {
    pub stage_a: String,
    pub stage_b: String,
    pub stage_c: String,
}

/// The full response for one query, the result output contract.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub query: String,
    pub results: Vec<DiscountItem>,
    /// Total matches found by the retrieve stage, which may exceed the
    /// number of displayed `results`.
    pub total_found: usize,
    pub categories: Vec<CategorySummary>,
    pub message: String,
    /// Set when any stage timed out or fell back to the prior stage's
    /// minimally-processed output.
    pub degraded: bool,
    pub diagnostics: StageDiagnostics,
}

/// The status contract consumed by health-check collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub generation: u64,
    pub document_count: usize,
    pub record_count: usize,
    pub last_rebuild_time: Option<DateTime<Utc>>,
    /// Per-document diagnostics recorded in the latest published snapshot.
    pub rebuild_error_count: usize,
    pub ready: bool,
    /// The most recent rebuild attempt failed outright; an older snapshot
    /// is still being served.
    pub stale: bool,
}
