//! Core data models used throughout kb-sync.
//!
//! These types represent the content chunks, change-log entries, and
//! search results that flow through the reconciliation and retrieval
//! pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single retrievable knowledge unit, identified by a stable id.
///
/// Created on first ADD or initial ingest, replaced wholesale on UPDATE,
/// removed on DELETE. The embedding is always derived from
/// [`embed_text`](ChunkRecord::embed_text); a chunk whose question or
/// answer changed is never persisted with its old vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Stable, globally unique id (e.g. `"scb_faq_140"`).
    pub id: String,
    pub category: String,
    pub subcategory: String,
    pub location: String,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Embedding vector; absent until the chunk has been embedded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl ChunkRecord {
    /// Text used as embedding input: question + newline + answer.
    pub fn embed_text(&self) -> String {
        format!("{}\n{}", self.question, self.answer)
    }
}

/// Kind of edit recorded in the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
}

impl ChangeKind {
    /// Parse the change-type column. Unrecognized values return `None`
    /// and the row is quarantined by the reader.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "ADD" => Some(ChangeKind::Add),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }

    /// Label stored in the audit trail.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "ADD",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }
}

/// The chunk field a change entry claims to have touched.
///
/// The rebuild strategies re-read the authoritative source tables, so the
/// field is audit metadata rather than a patch instruction; an
/// unrecognized label still parses (as [`PatchField::Unknown`]) so a typo
/// in the log never aborts a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchField {
    Question,
    Answer,
    Category,
    Subcategory,
    Tags,
    Unknown,
}

impl PatchField {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "question" => PatchField::Question,
            "answer" => PatchField::Answer,
            "category" => PatchField::Category,
            "subcategory" => PatchField::Subcategory,
            "tags" => PatchField::Tags,
            _ => PatchField::Unknown,
        }
    }
}

/// One parsed, unsynced row of the change log.
///
/// Ephemeral: read fresh each run. `row_index` is the 0-based position of
/// the row in the change-log sheet, used to mark it synced after the
/// group's store transaction commits.
#[derive(Debug, Clone)]
pub struct ChangeEntry {
    pub change_id: String,
    pub timestamp: String,
    pub sheet_name: String,
    pub chunk_id: String,
    pub kind: ChangeKind,
    /// Raw label from the log, kept verbatim for the audit trail.
    pub field_changed: String,
    pub field: PatchField,
    pub old_value: String,
    pub new_value: String,
    pub row_index: usize,
}

/// A scored retrieval result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk: ChunkRecord,
    pub score: f64,
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Groups fully committed and marked synced.
    pub groups_ok: usize,
    /// Raw change-log rows folded into committed groups.
    pub rows_ok: usize,
    /// Groups that failed (rebuild, embed, or persistence).
    pub groups_failed: usize,
}

/// Format a UTC timestamp the way the change log records them.
pub fn stamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_kind_parses_case_insensitively() {
        assert_eq!(ChangeKind::parse("update"), Some(ChangeKind::Update));
        assert_eq!(ChangeKind::parse(" ADD "), Some(ChangeKind::Add));
        assert_eq!(ChangeKind::parse("Delete"), Some(ChangeKind::Delete));
        assert_eq!(ChangeKind::parse("RENAME"), None);
        assert_eq!(ChangeKind::parse(""), None);
    }

    #[test]
    fn patch_field_unknown_is_not_an_error() {
        assert_eq!(PatchField::parse("answer"), PatchField::Answer);
        assert_eq!(PatchField::parse("TAGS"), PatchField::Tags);
        assert_eq!(PatchField::parse("colour"), PatchField::Unknown);
    }

    #[test]
    fn embed_text_joins_question_and_answer() {
        let chunk = ChunkRecord {
            id: "scb_faq_001".into(),
            category: "FAQ".into(),
            subcategory: "General".into(),
            location: "Main".into(),
            question: "What are your hours?".into(),
            answer: "Open 10am to 9pm daily.".into(),
            tags: vec![],
            embedding: None,
        };
        assert_eq!(
            chunk.embed_text(),
            "What are your hours?\nOpen 10am to 9pm daily."
        );
    }
}
