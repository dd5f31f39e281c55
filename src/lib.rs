//! # Perk Harness
//!
//! An indexing and relevance-ranking engine for a catalog of employee
//! discount offers extracted from heterogeneous documents, plus the
//! three-stage query pipeline that consumes it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Store       │──▶│  Rebuild      │──▶│ IndexSnapshot  │
//! │ FS / Object │   │ extract+parse │   │ (generation N) │
//! └─────────────┘   └──────────────┘   └───────┬───────┘
//!                                              │ atomic swap
//!                                              ▼
//!                               ┌──────────────────────────┐
//!                               │ Pipeline (per query)     │
//!                               │ retrieve → rank → format │
//!                               └──────────────────────────┘
//! ```
//!
//! Rebuilds construct a complete new snapshot off the serving path and
//! publish it with a single pointer swap; queries always read exactly one
//! generation and never block on an in-progress rebuild.
//!
//! ## Quick Start
//!
//! ```bash
//! perk index                        # rebuild and show a summary
//! perk search "hotel discounts"     # query the catalog
//! perk search "deals" --category Dining
//! perk status                       # health/status contract
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and output contracts |
//! | [`error`] | Fetch, extraction, and query error taxonomy |
//! | [`store`] | Document store capability trait |
//! | [`store_fs`] | Local-filesystem store variant |
//! | [`store_object`] | Object-storage store variant |
//! | [`extract`] | Page-tolerant text extraction |
//! | [`fields`] | Heuristic structured-field parsing |
//! | [`index`] | Snapshot building and atomic publication |
//! | [`score`] | Tiered lexical relevance scoring |
//! | [`pipeline`] | Three-stage query orchestration |

pub mod config;
pub mod error;
pub mod extract;
pub mod fields;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod score;
pub mod store;
pub mod store_fs;
pub mod store_object;
