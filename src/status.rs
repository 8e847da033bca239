use anyhow::Result;

use crate::changelog;
use crate::config::Config;
use crate::db;
use crate::store::Store;
use crate::workbook::{parse_a1, JsonWorkbook, Workbook};

/// Print the sync state a scheduler operator cares about: both version
/// markers, pending change-log rows, and the store size.
pub async fn run_status(config: &Config) -> Result<()> {
    let workbook = JsonWorkbook::open(&config.workbook.root)?;
    let addr = parse_a1(&config.workbook.version_cell)?;
    let external = workbook.cell(&config.workbook.change_log, addr)?;
    let read = changelog::read_unsynced(&workbook, &config.workbook.change_log)?;

    let pool = db::connect(config).await?;
    let store = Store::new(pool);
    let persisted = store.last_version().await?;
    let chunks = store.chunk_count().await?;
    store.close().await;

    let external = if external.trim().is_empty() {
        "1.0".to_string()
    } else {
        external.trim().to_string()
    };
    let in_sync = external == persisted && read.entries.is_empty();

    println!("{:<18} {}", "workbook version", external);
    println!("{:<18} {}", "store version", persisted);
    println!("{:<18} {}", "unsynced rows", read.entries.len());
    println!("{:<18} {}", "quarantined rows", read.skipped);
    println!("{:<18} {}", "stored chunks", chunks);
    println!("{:<18} {}", "in sync", if in_sync { "yes" } else { "no" });

    Ok(())
}
