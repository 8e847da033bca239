//! Persistence gateway over the SQLite content store.
//!
//! All store access goes through [`Store`]: full-replace upserts,
//! idempotent deletes, the singleton sync-state row, and the append-only
//! audit trail. A group's writes — one upsert or delete plus one audit
//! row per raw change entry — commit in a single transaction, so a crash
//! mid-group leaves the store either fully before or fully after the
//! group, never in between.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::models::{ChangeEntry, ChunkRecord};

/// SHA-256 of a chunk's embed-input text, stored alongside the vector
/// for staleness detection.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(self) {
        self.pool.close().await;
    }

    // ---- sync state -----------------------------------------------------

    pub async fn last_version(&self) -> Result<String> {
        let version: Option<String> =
            sqlx::query_scalar("SELECT last_version FROM sync_state WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(version.unwrap_or_else(|| "1.0".to_string()))
    }

    pub async fn set_version(&self, version: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO sync_state (id, last_version, last_synced_at) VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                last_version = excluded.last_version,
                last_synced_at = excluded.last_synced_at
            "#,
        )
        .bind(version)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- chunks ---------------------------------------------------------

    pub async fn get_chunk(&self, id: &str) -> Result<Option<ChunkRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, category, subcategory, location, question, answer, tags_json, embedding
            FROM knowledge_chunks WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_chunk).transpose()
    }

    /// Stored embed-input hash, model, and vector for a chunk, when all
    /// are present. Used to reuse an up-to-date vector instead of
    /// re-calling the embedding provider.
    pub async fn embedding_state(&self, id: &str) -> Result<Option<(String, String, Vec<f32>)>> {
        let row = sqlx::query(
            "SELECT content_hash, embed_model, embedding FROM knowledge_chunks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| {
            let hash: Option<String> = r.get("content_hash");
            let model: Option<String> = r.get("embed_model");
            let blob: Option<Vec<u8>> = r.get("embedding");
            match (hash, model, blob) {
                (Some(hash), Some(model), Some(blob)) => Some((hash, model, blob_to_vec(&blob))),
                _ => None,
            }
        }))
    }

    pub async fn chunk_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// All chunks carrying an embedding, optionally filtered by category.
    pub async fn embedded_chunks(&self, category: Option<&str>) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, category, subcategory, location, question, answer, tags_json, embedding
            FROM knowledge_chunks
            WHERE embedding IS NOT NULL AND (? IS NULL OR category = ?)
            ORDER BY id
            "#,
        )
        .bind(category)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_chunk).collect()
    }

    // ---- group transactions --------------------------------------------

    /// Upsert one rebuilt chunk and append its group's audit rows in one
    /// transaction. Full replace, not a field patch.
    pub async fn apply_upsert(
        &self,
        chunk: &ChunkRecord,
        hash: &str,
        model: &str,
        entries: &[ChangeEntry],
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let tags_json = serde_json::to_string(&chunk.tags)?;
        let blob = chunk.embedding.as_ref().map(|v| vec_to_blob(v));

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO knowledge_chunks
                (id, category, subcategory, location, question, answer,
                 tags_json, embedding, embed_model, content_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                category = excluded.category,
                subcategory = excluded.subcategory,
                location = excluded.location,
                question = excluded.question,
                answer = excluded.answer,
                tags_json = excluded.tags_json,
                embedding = excluded.embedding,
                embed_model = excluded.embed_model,
                content_hash = excluded.content_hash,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.category)
        .bind(&chunk.subcategory)
        .bind(&chunk.location)
        .bind(&chunk.question)
        .bind(&chunk.answer)
        .bind(&tags_json)
        .bind(&blob)
        .bind(model)
        .bind(hash)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for entry in entries {
            append_audit(&mut tx, entry, now).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete a chunk and append the group's audit rows in one
    /// transaction. Deleting an absent id is not an error.
    pub async fn apply_delete(&self, chunk_id: &str, entries: &[ChangeEntry]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM knowledge_chunks WHERE id = ?")
            .bind(chunk_id)
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            append_audit(&mut tx, entry, now).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Bulk upsert for the initial ingest: every chunk in one
    /// transaction, no audit rows (the ingest file is not the change log).
    pub async fn upsert_all(&self, chunks: &[ChunkRecord], model: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for chunk in chunks {
            let tags_json = serde_json::to_string(&chunk.tags)?;
            let blob = chunk.embedding.as_ref().map(|v| vec_to_blob(v));
            let hash = content_hash(&chunk.embed_text());

            sqlx::query(
                r#"
                INSERT INTO knowledge_chunks
                    (id, category, subcategory, location, question, answer,
                     tags_json, embedding, embed_model, content_hash, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    category = excluded.category,
                    subcategory = excluded.subcategory,
                    location = excluded.location,
                    question = excluded.question,
                    answer = excluded.answer,
                    tags_json = excluded.tags_json,
                    embedding = excluded.embedding,
                    embed_model = excluded.embed_model,
                    content_hash = excluded.content_hash,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.category)
            .bind(&chunk.subcategory)
            .bind(&chunk.location)
            .bind(&chunk.question)
            .bind(&chunk.answer)
            .bind(&tags_json)
            .bind(&blob)
            .bind(model)
            .bind(&hash)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn audit_count(&self, chunk_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sync_history WHERE chunk_id = ?")
                .bind(chunk_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

async fn append_audit(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    entry: &ChangeEntry,
    now: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_history (change_id, chunk_id, change_type, field_changed, synced_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.change_id)
    .bind(&entry.chunk_id)
    .bind(entry.kind.as_str())
    .bind(&entry.field_changed)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn row_to_chunk(row: sqlx::sqlite::SqliteRow) -> Result<ChunkRecord> {
    let tags_json: String = row.get("tags_json");
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    let blob: Option<Vec<u8>> = row.get("embedding");

    Ok(ChunkRecord {
        id: row.get("id"),
        category: row.get("category"),
        subcategory: row.get("subcategory"),
        location: row.get("location"),
        question: row.get("question"),
        answer: row.get("answer"),
        tags,
        embedding: blob.map(|b| blob_to_vec(&b)),
    })
}
