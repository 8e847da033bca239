//! Initial bulk load of a knowledge-base JSON file into the store.
//!
//! The export format is `{ "metadata": { "total_chunks": N },
//! "chunks": [ … ] }`. Chunks failing validation are reported and
//! skipped; the rest are embedded in batches and upserted in a single
//! transaction.

use anyhow::{bail, Result};
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::models::ChunkRecord;
use crate::store::Store;

#[derive(serde::Deserialize)]
struct KbFile {
    #[serde(default)]
    metadata: KbMeta,
    #[serde(default)]
    chunks: Vec<serde_json::Value>,
}

#[derive(serde::Deserialize, Default)]
struct KbMeta {
    total_chunks: Option<usize>,
}

/// Load and validate chunks from a knowledge-base JSON file.
///
/// Returns the valid chunks and the number skipped for validation
/// errors.
pub fn load_chunks(path: &Path) -> Result<(Vec<ChunkRecord>, usize)> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let file: KbFile = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid knowledge-base JSON: {}", e))?;

    let declared = file.metadata.total_chunks.unwrap_or(file.chunks.len());
    println!(
        "file declares {} chunks; found {}",
        declared,
        file.chunks.len()
    );

    let mut chunks = Vec::new();
    let mut skipped = 0usize;

    for raw in file.chunks {
        let id = raw
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("?")
            .to_string();
        match serde_json::from_value::<ChunkRecord>(raw) {
            Ok(chunk) => chunks.push(chunk),
            Err(e) => {
                eprintln!("Warning: chunk {} failed validation: {}", id, e);
                skipped += 1;
            }
        }
    }

    Ok((chunks, skipped))
}

pub async fn run_ingest(config: &Config, path: &Path, dry_run: bool) -> Result<()> {
    let (mut chunks, skipped) = load_chunks(path)?;

    if dry_run {
        println!("ingest (dry-run)");
        println!("  valid chunks: {}", chunks.len());
        println!("  skipped: {}", skipped);
        return Ok(());
    }

    if chunks.is_empty() {
        bail!("No valid chunks in {}", path.display());
    }

    if !config.embedding.is_enabled() {
        bail!("Ingest requires embeddings. Set [embedding] provider in config.");
    }
    let provider = embedding::create_provider(&config.embedding)?;

    // Embed in batches
    let texts: Vec<String> = chunks.iter().map(|c| c.embed_text()).collect();
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for batch in texts.chunks(config.embedding.batch_size) {
        let mut batch_vecs = provider.embed(batch).await?;
        vectors.append(&mut batch_vecs);
    }
    if vectors.len() != chunks.len() {
        bail!(
            "Embedding count mismatch: {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        );
    }
    for (chunk, vec) in chunks.iter_mut().zip(vectors) {
        chunk.embedding = Some(vec);
    }

    let pool = db::connect(config).await?;
    let store = Store::new(pool);
    let result = store.upsert_all(&chunks, provider.model_name()).await;
    let total = store.chunk_count().await.unwrap_or(0);
    store.close().await;
    result?;

    println!("ingest");
    println!("  upserted chunks: {}", chunks.len());
    println!("  skipped: {}", skipped);
    println!("  store total: {}", total);
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_chunks_skips_invalid_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kb.json");
        std::fs::write(
            &path,
            r#"{
                "metadata": {"total_chunks": 3},
                "chunks": [
                    {"id": "scb_faq_001", "category": "FAQ", "subcategory": "General",
                     "location": "Scarborough", "question": "Q?", "answer": "A.",
                     "tags": ["hours"]},
                    {"id": "scb_faq_002"},
                    {"id": "scb_faq_003", "category": "FAQ", "subcategory": "General",
                     "location": "Scarborough", "question": "Q3?", "answer": "A3.",
                     "tags": []}
                ]
            }"#,
        )
        .unwrap();

        let (chunks, skipped) = load_chunks(&path).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(chunks[0].id, "scb_faq_001");
        assert_eq!(chunks[0].tags, vec!["hours"]);
    }

    #[test]
    fn load_chunks_rejects_non_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kb.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(load_chunks(&path).is_err());
    }
}
