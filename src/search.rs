//! Semantic and hybrid retrieval over the content store.
//!
//! Semantic mode ranks by cosine similarity between the query vector and
//! each stored embedding. Hybrid mode blends that with a tag keyword
//! overlap score: a tag hits when it appears inside the lower-cased
//! query (or the query inside the tag).

use anyhow::{bail, Result};

use crate::config::{Config, SearchConfig};
use crate::db;
use crate::embedding::{self, cosine_similarity};
use crate::models::{ChunkRecord, SearchHit};
use crate::store::Store;

pub async fn run_search(
    config: &Config,
    query: &str,
    mode: &str,
    category: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    match mode {
        "semantic" | "hybrid" => {}
        _ => bail!("Unknown search mode: {}. Use semantic or hybrid.", mode),
    }

    if !config.embedding.is_enabled() {
        bail!(
            "Mode '{}' requires embeddings. Set [embedding] provider in config.",
            mode
        );
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let query_vec = embedding::embed_one(provider.as_ref(), query).await?;

    let pool = db::connect(config).await?;
    let store = Store::new(pool);
    let chunks = store.embedded_chunks(category.as_deref()).await?;
    store.close().await;

    let top_k = limit.unwrap_or(config.search.top_k);
    let hits = rank_chunks(chunks, &query_vec, query, mode, &config.search, top_k);

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    println!("search \"{}\" ({})", query, mode);
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{:>3}. {}  score={:.4}  [{}/{}]",
            i + 1,
            hit.chunk.id,
            hit.score,
            hit.chunk.category,
            hit.chunk.subcategory
        );
        println!("     Q: {}", hit.chunk.question);
        println!("     A: {}", snippet(&hit.chunk.answer, 160));
    }

    Ok(())
}

/// Score and rank chunks. Pure so the blend is testable without a store.
pub fn rank_chunks(
    chunks: Vec<ChunkRecord>,
    query_vec: &[f32],
    query: &str,
    mode: &str,
    weights: &SearchConfig,
    top_k: usize,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = chunks
        .into_iter()
        .filter_map(|chunk| {
            let embedding = chunk.embedding.as_ref()?;
            let semantic = cosine_similarity(query_vec, embedding) as f64;
            let score = match mode {
                "hybrid" => {
                    let keyword = tag_overlap(&chunk.tags, query);
                    weights.semantic_weight * semantic + weights.keyword_weight * keyword
                }
                _ => semantic,
            };
            Some(SearchHit { chunk, score })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
    hits
}

/// Fraction of a chunk's tags that match the query text.
fn tag_overlap(tags: &[String], query: &str) -> f64 {
    if tags.is_empty() {
        return 0.0;
    }
    let query = query.to_lowercase();
    let matched = tags
        .iter()
        .filter(|t| {
            let tag = t.to_lowercase();
            !tag.is_empty() && (query.contains(&tag) || tag.contains(&query))
        })
        .count();
    matched as f64 / tags.len() as f64
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, tags: &[&str], embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            category: "Pricing".to_string(),
            subcategory: "General".to_string(),
            location: "Main".to_string(),
            question: "Q?".to_string(),
            answer: "A.".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            embedding: Some(embedding),
        }
    }

    fn weights() -> SearchConfig {
        SearchConfig {
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            top_k: 5,
        }
    }

    #[test]
    fn semantic_ranks_by_cosine() {
        let chunks = vec![
            chunk("far", &[], vec![0.0, 1.0]),
            chunk("near", &[], vec![1.0, 0.0]),
        ];
        let hits = rank_chunks(chunks, &[1.0, 0.0], "anything", "semantic", &weights(), 5);
        assert_eq!(hits[0].chunk.id, "near");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn hybrid_boosts_tag_matches() {
        // Identical embeddings; only the tag overlap separates them.
        let chunks = vec![
            chunk("untagged", &["parking"], vec![1.0, 0.0]),
            chunk("tagged", &["birthday"], vec![1.0, 0.0]),
        ];
        let hits = rank_chunks(
            chunks,
            &[1.0, 0.0],
            "birthday party prices",
            "hybrid",
            &weights(),
            5,
        );
        assert_eq!(hits[0].chunk.id, "tagged");
    }

    #[test]
    fn tag_overlap_is_fractional() {
        let tags = vec!["jump".to_string(), "socks".to_string()];
        let overlap = tag_overlap(&tags, "how much are jump passes");
        assert!((overlap - 0.5).abs() < 1e-9);
        assert_eq!(tag_overlap(&[], "query"), 0.0);
    }

    #[test]
    fn top_k_truncates() {
        let chunks = (0..10)
            .map(|i| chunk(&format!("c{}", i), &[], vec![1.0, i as f32 / 10.0]))
            .collect();
        let hits = rank_chunks(chunks, &[1.0, 0.0], "q", "semantic", &weights(), 3);
        assert_eq!(hits.len(), 3);
    }
}
