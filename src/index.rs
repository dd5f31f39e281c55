//! Index building and snapshot lifecycle.
//!
//! A rebuild lists documents from the store, runs fetch + extract + parse for
//! each on a bounded worker pool, and seals the results into an immutable
//! [`IndexSnapshot`]. The [`IndexManager`] owns the single swappable
//! reference to the latest published snapshot: rebuilds happen entirely off
//! the serving path and are published with one atomic pointer swap, so
//! readers never observe a partially-built snapshot and never block on a
//! rebuild in progress.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::IndexingConfig;
use crate::error::FetchError;
use crate::extract;
use crate::fields;
use crate::models::{DiscountRecord, DocumentDescriptor, EngineStatus};
use crate::store::{fetch_with_retry, DocumentStore};

/// A per-document problem recorded during a rebuild. Never fatal to the
/// rebuild itself.
#[derive(Debug, Clone, Serialize)]
pub struct BuildDiagnostic {
    pub document_id: String,
    pub detail: String,
}

/// An immutable, fully-built generation of the discount catalog.
///
/// Published snapshots are only handed out as `Arc<IndexSnapshot>` and are
/// never mutated; a rebuild produces a new generation instead.
#[derive(Debug)]
pub struct IndexSnapshot {
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    /// Records sorted by id, which is catalog order (ids derive from
    /// document ids).
    pub records: Vec<DiscountRecord>,
    /// Category name → ids of member records. Always a subset of `records`.
    pub by_category: BTreeMap<String, BTreeSet<String>>,
    pub diagnostics: Vec<BuildDiagnostic>,
}

impl IndexSnapshot {
    /// Sort records deterministically and derive the category buckets.
    /// Worker completion order does not matter: two builds over the same
    /// documents seal identical snapshots.
    pub fn seal(
        generation: u64,
        mut records: Vec<DiscountRecord>,
        mut diagnostics: Vec<BuildDiagnostic>,
    ) -> Self {
        records.sort_by(|a, b| a.id.cmp(&b.id));
        diagnostics.sort_by(|a, b| a.document_id.cmp(&b.document_id));

        let mut by_category: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for record in &records {
            by_category
                .entry(record.category.clone())
                .or_default()
                .insert(record.id.clone());
        }

        Self {
            generation,
            built_at: Utc::now(),
            records,
            by_category,
            diagnostics,
        }
    }

    pub fn record(&self, id: &str) -> Option<&DiscountRecord> {
        self.records
            .binary_search_by(|r| r.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.records[i])
    }

    /// Number of distinct source documents represented.
    pub fn document_count(&self) -> usize {
        self.records
            .iter()
            .map(|r| r.source_document_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// Outcome of processing one document during a rebuild.
struct DocumentOutcome {
    record: Option<DiscountRecord>,
    diagnostics: Vec<BuildDiagnostic>,
}

impl DocumentOutcome {
    fn skipped(document_id: &str, detail: String) -> Self {
        Self {
            record: None,
            diagnostics: vec![BuildDiagnostic {
                document_id: document_id.to_string(),
                detail,
            }],
        }
    }
}

/// Builds snapshots from a document store on a bounded worker pool.
pub struct IndexBuilder {
    store: Arc<dyn DocumentStore>,
    max_concurrent: usize,
    max_retries: u32,
}

impl IndexBuilder {
    pub fn new(store: Arc<dyn DocumentStore>, config: &IndexingConfig) -> Self {
        Self {
            store,
            max_concurrent: config.max_concurrent.max(1),
            max_retries: config.max_retries,
        }
    }

    /// Build one snapshot. Fails only when the store listing itself fails;
    /// per-document problems become diagnostics.
    ///
    /// Dropping the returned future aborts the in-flight workers without
    /// touching any published snapshot.
    pub async fn build(&self, generation: u64) -> Result<IndexSnapshot, FetchError> {
        let descriptors = self.store.list().await?;
        info!(
            source = self.store.label(),
            documents = descriptors.len(),
            generation,
            "starting index rebuild"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut workers: JoinSet<DocumentOutcome> = JoinSet::new();

        for descriptor in descriptors {
            let store = Arc::clone(&self.store);
            let semaphore = Arc::clone(&semaphore);
            let max_retries = self.max_retries;

            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return DocumentOutcome::skipped(
                            &descriptor.id,
                            "worker pool shut down".to_string(),
                        )
                    }
                };
                process_document(store.as_ref(), &descriptor, max_retries).await
            });
        }

        let mut records = Vec::new();
        let mut diagnostics = Vec::new();

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(outcome) => {
                    records.extend(outcome.record);
                    diagnostics.extend(outcome.diagnostics);
                }
                Err(e) => diagnostics.push(BuildDiagnostic {
                    document_id: "<worker>".to_string(),
                    detail: format!("extraction task failed: {}", e),
                }),
            }
        }

        let snapshot = IndexSnapshot::seal(generation, records, diagnostics);
        info!(
            generation,
            records = snapshot.records.len(),
            skipped = snapshot.diagnostics.len(),
            "index rebuild complete"
        );
        Ok(snapshot)
    }
}

async fn process_document(
    store: &dyn DocumentStore,
    descriptor: &DocumentDescriptor,
    max_retries: u32,
) -> DocumentOutcome {
    let bytes = match fetch_with_retry(store, &descriptor.id, max_retries).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(document = %descriptor.id, error = %e, "skipping document: fetch failed");
            return DocumentOutcome::skipped(&descriptor.id, format!("fetch failed: {}", e));
        }
    };

    let extracted = match extract::extract_document(descriptor, &bytes) {
        Ok(extracted) => extracted,
        Err(e) => {
            warn!(document = %descriptor.id, error = %e, "skipping document: extraction failed");
            return DocumentOutcome::skipped(&descriptor.id, format!("extraction failed: {}", e));
        }
    };

    let diagnostics: Vec<BuildDiagnostic> = extracted
        .diagnostics
        .iter()
        .map(|detail| BuildDiagnostic {
            document_id: descriptor.id.clone(),
            detail: detail.clone(),
        })
        .collect();

    DocumentOutcome {
        record: Some(fields::build_record(descriptor, &extracted)),
        diagnostics,
    }
}

/// Owns the latest published snapshot and the rebuild lifecycle.
///
/// The snapshot slot is the only shared mutable-lifecycle state in the
/// engine: the write lock is held just long enough to swap the pointer, and
/// readers clone the `Arc` out under the read lock. Query pipelines receive
/// the cloned reference and are completely unaffected by later swaps.
pub struct IndexManager {
    builder: IndexBuilder,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
    generation: AtomicU64,
    stale: AtomicBool,
    last_rebuild: RwLock<Option<DateTime<Utc>>>,
}

impl IndexManager {
    pub fn new(store: Arc<dyn DocumentStore>, config: &IndexingConfig) -> Self {
        Self {
            builder: IndexBuilder::new(store, config),
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
            stale: AtomicBool::new(false),
            last_rebuild: RwLock::new(None),
        }
    }

    /// The latest published snapshot, if any rebuild has completed.
    pub fn current(&self) -> Option<Arc<IndexSnapshot>> {
        self.current.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Build a new snapshot off the serving path and publish it atomically.
    ///
    /// On failure the previously published snapshot keeps serving and the
    /// status is marked stale.
    pub async fn rebuild(&self) -> Result<Arc<IndexSnapshot>, FetchError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        match self.builder.build(generation).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.current.write().unwrap_or_else(|e| e.into_inner()) =
                    Some(Arc::clone(&snapshot));
                *self.last_rebuild.write().unwrap_or_else(|e| e.into_inner()) = Some(Utc::now());
                self.stale.store(false, Ordering::SeqCst);
                Ok(snapshot)
            }
            Err(e) => {
                warn!(error = %e, "rebuild failed; serving previous snapshot");
                self.stale.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Rebuild on a fixed interval until the future is dropped. Errors are
    /// logged and the loop keeps going; the last good snapshot keeps
    /// serving throughout.
    pub async fn refresh_loop(self: Arc<Self>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the loop below should only
        // fire after a full period.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = self.rebuild().await {
                warn!(error = %e, "scheduled refresh failed");
            }
        }
    }

    /// The status contract for health-check collaborators.
    pub fn status(&self) -> EngineStatus {
        let current = self.current();
        let last_rebuild_time = *self
            .last_rebuild
            .read()
            .unwrap_or_else(|e| e.into_inner());

        match current {
            Some(snapshot) => EngineStatus {
                generation: snapshot.generation,
                document_count: snapshot.document_count(),
                record_count: snapshot.records.len(),
                last_rebuild_time,
                rebuild_error_count: snapshot.diagnostics.len(),
                ready: true,
                stale: self.stale.load(Ordering::SeqCst),
            },
            None => EngineStatus {
                generation: 0,
                document_count: 0,
                record_count: 0,
                last_rebuild_time,
                rebuild_error_count: 0,
                ready: false,
                stale: self.stale.load(Ordering::SeqCst),
            },
        }
    }
}
