//! # kb-sync
//!
//! A change-log driven reconciliation engine for a vector-searchable
//! knowledge base.
//!
//! The source of truth is an externally edited workbook: content teams
//! append pending edits to a change-log sheet, and kb-sync reconciles
//! the persisted content store against it — rebuilding affected chunks
//! from their authoritative source sheets, re-deriving embeddings, and
//! committing each chunk's changes in an isolated transaction.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌───────────┐
//! │  Workbook    │──▶│  Sync Engine   │──▶│  SQLite    │
//! │ change log + │   │ group/rebuild │   │ chunks +  │
//! │ source sheets│   │ embed/commit  │   │ vectors   │
//! └──────────────┘   └───────┬───────┘   └─────┬─────┘
//!                            │                 │
//!                     mark rows synced    semantic/hybrid
//!                     (after commit)         search
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kbs init                      # create database
//! kbs ingest --path data/kb.json   # initial bulk load
//! kbs sync                      # reconcile pending change-log edits
//! kbs sync --dry-run            # preview without writes
//! kbs search "jump passes" --mode hybrid
//! kbs status                    # version markers and pending rows
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`workbook`] | Workbook trait + JSON sheet directory backend |
//! | [`changelog`] | Change-log parsing and grouping |
//! | [`rebuild`] | Simple/composite chunk reconstruction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Persistence gateway (chunks, sync state, audit) |
//! | [`engine`] | Reconciliation orchestrator |
//! | [`ingest`] | Initial knowledge-base load |
//! | [`search`] | Semantic and hybrid retrieval |
//! | [`status`] | Sync status report |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod changelog;
pub mod config;
pub mod db;
pub mod embedding;
pub mod engine;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod rebuild;
pub mod search;
pub mod status;
pub mod store;
pub mod workbook;
