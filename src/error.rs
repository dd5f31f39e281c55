//! Error taxonomy for the indexing engine and query pipeline.
//!
//! Store, extraction, and query failures are separate types because they are
//! handled at different altitudes: a fetch failure skips one document, an
//! extraction failure skips one document, and a query failure is returned to
//! the caller before any pipeline stage runs.

use thiserror::Error;

/// Failure modes of the document store capability.
///
/// `Transient` is the only retryable variant; everything else either skips
/// the affected document (`NotFound`, `PermissionDenied`) or fails the whole
/// rebuild attempt (`Unavailable`, returned by `list()` when the source is
/// unreachable).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("document not found")]
    NotFound,

    #[error("transient source error: {0}")]
    Transient(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl FetchError {
    /// Whether a retry with backoff is worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Failure modes of text extraction for a single document.
///
/// None of these abort a rebuild; the document is excluded and the failure
/// is recorded as a build diagnostic.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unreadable document: {0}")]
    Unreadable(String),

    #[error("all {0} page(s) failed to extract")]
    AllPagesFailed(usize),

    #[error("document produced no text")]
    EmptyText,
}

/// Failure modes of a query, raised before or instead of pipeline output.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// Empty or whitespace-only query text, rejected before any stage runs.
    #[error("query text must not be empty")]
    Malformed,

    /// No snapshot has been published yet. Distinct from a well-formed
    /// zero-result response so "no discounts" is never confused with
    /// "not yet indexed".
    #[error("index not ready: no snapshot has been published")]
    IndexNotReady,
}
