use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Main knowledge store
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS knowledge_chunks (
            id TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            subcategory TEXT NOT NULL,
            location TEXT NOT NULL,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            tags_json TEXT NOT NULL DEFAULT '[]',
            embedding BLOB,
            embed_model TEXT,
            content_hash TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Sync state: the last workbook version we've processed
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_version TEXT NOT NULL DEFAULT '1.0',
            last_synced_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Audit log of every applied change entry
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            change_id TEXT NOT NULL,
            chunk_id TEXT NOT NULL,
            change_type TEXT NOT NULL,
            field_changed TEXT,
            synced_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_category ON knowledge_chunks(category)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chunks_subcategory ON knowledge_chunks(subcategory)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_history_chunk_id ON sync_history(chunk_id)")
        .execute(pool)
        .await?;

    // Seed the singleton sync_state row if missing
    sqlx::query("INSERT OR IGNORE INTO sync_state (id, last_version) VALUES (1, '1.0')")
        .execute(pool)
        .await?;

    Ok(())
}
