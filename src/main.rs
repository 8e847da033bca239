//! # kb-sync CLI (`kbs`)
//!
//! The `kbs` binary is the operational surface for kb-sync. It provides
//! commands for database initialization, the initial knowledge-base
//! load, change-log reconciliation, retrieval queries, and sync status.
//!
//! ## Usage
//!
//! ```bash
//! kbs --config ./config/kbs.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbs init` | Create the SQLite database and run schema migrations |
//! | `kbs ingest` | Bulk-load a knowledge-base JSON file |
//! | `kbs sync` | Reconcile pending change-log edits into the store |
//! | `kbs search "<query>"` | Query the store (semantic or hybrid) |
//! | `kbs status` | Show version markers and pending rows |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! kbs init --config ./config/kbs.toml
//!
//! # Load the exported knowledge base
//! kbs ingest --path data/knowledge_base.json
//!
//! # Reconcile, ignoring the version short-circuit
//! kbs sync --force
//!
//! # Preview a sync without writing anything
//! kbs sync --dry-run
//!
//! # Hybrid search with a category filter
//! kbs search "birthday packages" --mode hybrid --category "Birthday Parties"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kb_sync::{config, engine, ingest, migrate, search, status};

/// kb-sync CLI — reconcile an externally edited change log into a
/// vector-searchable knowledge base.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kbs.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "kbs",
    about = "kb-sync — change-log reconciliation for a vector-searchable knowledge base",
    version,
    long_about = "kb-sync reads pending edits from an externally maintained change log, \
    rebuilds the affected content chunks from their source-of-truth sheets, re-derives \
    their embeddings, and applies the results to a SQLite content store — idempotently, \
    with per-chunk failure isolation and resumable versioning."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kbs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (knowledge_chunks, sync_state, sync_history). Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Bulk-load a knowledge-base JSON export into the store.
    ///
    /// Validates every chunk, embeds the valid ones in batches, and
    /// upserts them in a single transaction.
    Ingest {
        /// Path to the knowledge-base JSON file.
        #[arg(long, default_value = "data/knowledge_base.json")]
        path: PathBuf,

        /// Validate only; skip embedding and the store write.
        #[arg(long)]
        dry_run: bool,
    },

    /// Reconcile pending change-log edits into the store.
    ///
    /// Compares the workbook's version marker against the store's,
    /// groups unsynced rows by chunk id, rebuilds each chunk from its
    /// source sheet, re-embeds, and commits per group. Group failures
    /// are reported in the summary and never abort the run.
    Sync {
        /// Ignore the version short-circuit and process all unsynced rows.
        #[arg(long)]
        force: bool,

        /// Compute everything but write nothing (no store writes, no
        /// embedding calls, no mark-synced).
        #[arg(long)]
        dry_run: bool,
    },

    /// Query the knowledge base.
    Search {
        /// The search query string.
        query: String,

        /// Search mode: `semantic` (cosine) or `hybrid` (cosine + tag overlap).
        #[arg(long, default_value = "semantic")]
        mode: String,

        /// Restrict results to one category.
        #[arg(long)]
        category: Option<String>,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show version markers, pending change-log rows, and store size.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { path, dry_run } => {
            ingest::run_ingest(&cfg, &path, dry_run).await?;
        }
        Commands::Sync { force, dry_run } => {
            engine::run_sync(&cfg, force, dry_run).await?;
        }
        Commands::Search {
            query,
            mode,
            category,
            limit,
        } => {
            search::run_search(&cfg, &query, &mode, category, limit).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
    }

    Ok(())
}
