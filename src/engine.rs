//! Reconciliation engine.
//!
//! Sequences one sync run end to end:
//!
//! ```text
//! CHECK_VERSION → (SKIP | READ) → GROUP → PROCESS_GROUPS → UPDATE_VERSION
//! ```
//!
//! Groups are processed strictly sequentially and independently: a
//! failure in one group (missing source rows, embedding error, store
//! error) is reported and counted but neither aborts the remaining
//! groups nor blocks version advancement. A group's change-log rows are
//! marked synced only after its store transaction has committed, so a
//! crash between commit and mark causes harmless re-processing on the
//! next run, never data loss.

use anyhow::Result;
use chrono::Utc;

use crate::changelog::{self, ChangeGroup};
use crate::config::{Config, WorkbookConfig};
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::SyncReport;
use crate::rebuild::{self, SourceKind};
use crate::store::{self, Store};
use crate::workbook::{self, JsonWorkbook, Workbook};

/// Decide whether a run should proceed. Exact string equality is the
/// only gate; the version token carries no ordering semantics.
pub fn version_gate(external: &str, persisted: &str, force: bool) -> bool {
    force || external != persisted
}

/// Run one reconciliation against the configured workbook and store.
pub async fn run_sync(config: &Config, force: bool, dry_run: bool) -> Result<SyncReport> {
    let workbook = JsonWorkbook::open(&config.workbook.root)?;
    let provider = embedding::create_provider(&config.embedding)?;

    let pool = db::connect(config).await?;
    let store = Store::new(pool);

    let result = sync_workbook(
        &workbook,
        &store,
        provider.as_ref(),
        &config.workbook,
        force,
        dry_run,
    )
    .await;

    store.close().await;
    result
}

/// The engine proper, over trait-object collaborators so tests can plug
/// in an in-memory workbook and a stub embedder.
pub async fn sync_workbook(
    workbook: &dyn Workbook,
    store: &Store,
    provider: &dyn EmbeddingProvider,
    wb: &WorkbookConfig,
    force: bool,
    dry_run: bool,
) -> Result<SyncReport> {
    if dry_run {
        println!("sync (dry-run) — no store or workbook writes");
    }

    let version_addr = workbook::parse_a1(&wb.version_cell)?;
    let raw_version = workbook.cell(&wb.change_log, version_addr)?;
    let external = match raw_version.trim() {
        "" => "1.0".to_string(),
        v => v.to_string(),
    };
    let persisted = store.last_version().await?;

    println!("workbook version: {}", external);
    println!("store version:    {}", persisted);

    if !version_gate(&external, &persisted, force) {
        println!("Versions match — nothing to sync.");
        return Ok(SyncReport::default());
    }

    let read = changelog::read_unsynced(workbook, &wb.change_log)?;
    let groups = changelog::group_entries(read.entries);

    let mut report = SyncReport::default();

    for group in &groups {
        match process_group(workbook, store, provider, wb, group, dry_run).await {
            Ok(rows) => {
                report.groups_ok += 1;
                report.rows_ok += rows;
            }
            Err(e) => {
                eprintln!("Warning: chunk '{}' failed: {:#}", group.chunk_id, e);
                report.groups_failed += 1;
            }
        }
    }

    // The version always advances after attempting every group; a
    // permanently broken row reappears as unsynced next run instead of
    // wedging the pipeline.
    if !dry_run {
        store.set_version(&external).await?;
    }

    println!("sync");
    println!("  groups ok: {}", report.groups_ok);
    println!("  rows ok: {}", report.rows_ok);
    println!("  groups failed: {}", report.groups_failed);
    println!("  rows skipped: {}", read.skipped);
    println!("  version: {}", external);
    println!("ok");

    Ok(report)
}

/// Apply one group. Returns the number of raw change-log rows folded in.
async fn process_group(
    workbook: &dyn Workbook,
    store: &Store,
    provider: &dyn EmbeddingProvider,
    wb: &WorkbookConfig,
    group: &ChangeGroup,
    dry_run: bool,
) -> Result<usize> {
    let rows = group.entries.len();

    // Delete wins over any UPDATE/ADD logged for the same chunk; every
    // entry in the group lands in the delete's audit trail.
    if group.has_delete() {
        println!("DELETE {} ({} entries)", group.chunk_id, rows);
        if !dry_run {
            store.apply_delete(&group.chunk_id, &group.entries).await?;
            mark_group_synced(workbook, wb, group)?;
        }
        return Ok(rows);
    }

    let sheet_name = group.source_sheet();
    let kind = SourceKind::select(sheet_name, &group.chunk_id, &wb.faq_sheet);

    let mut chunk = match kind {
        SourceKind::Simple => {
            let sheet = workbook.read_sheet(&wb.faq_sheet)?;
            rebuild::rebuild_simple(&sheet, &wb.faq_sheet, &group.chunk_id, &wb.default_location)?
        }
        SourceKind::Composite => {
            let sheet = workbook.read_sheet(sheet_name)?;
            rebuild::rebuild_composite(&sheet, sheet_name, &group.chunk_id, &wb.default_location)?
        }
    };

    let label = group
        .entries
        .last()
        .map(|e| e.kind.as_str())
        .unwrap_or("UPDATE");
    println!("{} {} ({:?})", label, group.chunk_id, kind);

    if dry_run {
        return Ok(rows);
    }

    // Reuse the stored vector when the embed input is unchanged for the
    // same model; otherwise call the provider.
    let hash = store::content_hash(&chunk.embed_text());
    let vector = match store.embedding_state(&group.chunk_id).await? {
        Some((stored_hash, stored_model, vec))
            if stored_hash == hash && stored_model == provider.model_name() =>
        {
            vec
        }
        _ => embedding::embed_one(provider, &chunk.embed_text()).await?,
    };
    chunk.embedding = Some(vector);

    store
        .apply_upsert(&chunk, &hash, provider.model_name(), &group.entries)
        .await?;
    mark_group_synced(workbook, wb, group)?;

    Ok(rows)
}

fn mark_group_synced(workbook: &dyn Workbook, wb: &WorkbookConfig, group: &ChangeGroup) -> Result<()> {
    let stamp = crate::models::stamp(Utc::now());
    let updates = changelog::mark_synced_updates(&group.row_indices(), &stamp);
    workbook.write_cells(&wb.change_log, &updates)
}
