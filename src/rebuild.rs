//! Chunk reconstruction from the source-of-truth sheets.
//!
//! A change-log entry never carries enough data to rebuild a chunk; the
//! authoritative content lives in the workbook's source sheets. Two sheet
//! shapes exist:
//!
//! - **Simple**: a flat `id / category / question / answer` table (the
//!   FAQ sheet). One row per chunk.
//! - **Composite**: a sheet interleaving several record shapes. A row
//!   whose first cell repeats the id-column header label starts a new
//!   field schema for the rows below it. A chunk's rows may appear under
//!   any schema block; each is rendered against the most recent header.
//!
//! Rebuilding is pure and deterministic: the same sheet rows always yield
//! a byte-identical chunk, so re-running a sync over unchanged sources
//! produces identical embeddings input.

use crate::models::ChunkRecord;

/// Rebuild failure. Callers treat any variant as a group failure.
#[derive(Debug)]
pub enum RebuildError {
    /// No source row matches the chunk id.
    NotFound { chunk_id: String, sheet: String },
    /// Rows matched but carried no usable content.
    Empty { chunk_id: String, sheet: String },
}

impl std::fmt::Display for RebuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RebuildError::NotFound { chunk_id, sheet } => {
                write!(f, "no row for '{}' in sheet '{}'", chunk_id, sheet)
            }
            RebuildError::Empty { chunk_id, sheet } => {
                write!(f, "empty content for '{}' in sheet '{}'", chunk_id, sheet)
            }
        }
    }
}

impl std::error::Error for RebuildError {}

/// Which rebuild strategy a group resolves to.
///
/// Selection uses the group's authoritative sheet name, with the id
/// prefix convention as a fallback so an FAQ edit logged under the wrong
/// sheet still rebuilds from the flat table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Simple,
    Composite,
}

impl SourceKind {
    pub fn select(sheet_name: &str, chunk_id: &str, faq_sheet: &str) -> Self {
        if sheet_name == faq_sheet || prefix_segment(chunk_id) == Some("faq") {
            SourceKind::Simple
        } else {
            SourceKind::Composite
        }
    }
}

/// Second underscore-delimited segment of a chunk id
/// (`"scb_jump_003"` → `"jump"`).
pub fn prefix_segment(chunk_id: &str) -> Option<&str> {
    let mut parts = chunk_id.split('_');
    parts.next()?;
    parts.next()
}

/// Static prefix → (category, subcategory, question) table for chunks
/// rebuilt from composite sheets.
const PREFIX_META: &[(&str, &str, &str, &str)] = &[
    ("contact", "Contact", "General", "How can I contact the park?"),
    ("hours", "Contact", "Hours", "What are the opening hours?"),
    ("jump", "Pricing", "Jump Passes", "What do jump passes cost?"),
    ("socks", "Pricing", "Grip Socks", "What do grip socks cost?"),
    (
        "gokart",
        "Attractions",
        "Go-Karts",
        "What should I know about the go-karts?",
    ),
    ("glow", "Events", "Glow Nights", "What are the glow night details?"),
    (
        "toddler",
        "Events",
        "Toddler Time",
        "What are the toddler time details?",
    ),
    ("special", "Pricing", "Specials", "What specials are running?"),
    (
        "bday",
        "Birthday Parties",
        "Packages",
        "What birthday party packages are offered?",
    ),
    (
        "group",
        "Group Bookings",
        "Packages",
        "What group booking options are offered?",
    ),
    (
        "facility",
        "Group Bookings",
        "Facility",
        "What facility rentals are offered?",
    ),
    (
        "room",
        "Group Bookings",
        "Party Rooms",
        "What party rooms are available?",
    ),
    ("camp", "Aero Camp", "Programs", "What camp programs are offered?"),
    (
        "passes",
        "Passes",
        "Memberships",
        "What passes and memberships are offered?",
    ),
    ("faq", "FAQ", "General", "Frequently asked question"),
];

fn prefix_meta(chunk_id: &str) -> Option<(&'static str, &'static str, &'static str)> {
    let prefix = prefix_segment(chunk_id)?;
    PREFIX_META
        .iter()
        .find(|(p, _, _, _)| *p == prefix)
        .map(|(_, cat, sub, q)| (*cat, *sub, *q))
}

/// Rebuild a chunk from the flat question/answer table.
///
/// Columns: `chunk_id, category, question, answer`; row 0 is the header.
pub fn rebuild_simple(
    rows: &[Vec<String>],
    sheet_name: &str,
    chunk_id: &str,
    location: &str,
) -> Result<ChunkRecord, RebuildError> {
    for row in rows.iter().skip(1) {
        if row.first().map(|c| c.trim()) != Some(chunk_id) {
            continue;
        }

        let cell = |i: usize| row.get(i).map(|c| c.trim()).unwrap_or("").to_string();
        let category = cell(1);
        let question = cell(2);
        let answer = cell(3);

        if question.is_empty() && answer.is_empty() {
            return Err(RebuildError::Empty {
                chunk_id: chunk_id.to_string(),
                sheet: sheet_name.to_string(),
            });
        }

        return Ok(ChunkRecord {
            id: chunk_id.to_string(),
            category: if category.is_empty() {
                "FAQ".to_string()
            } else {
                category.clone()
            },
            subcategory: if category.is_empty() {
                "General".to_string()
            } else {
                category
            },
            location: location.to_string(),
            question,
            answer,
            tags: Vec::new(),
            embedding: None,
        });
    }

    Err(RebuildError::NotFound {
        chunk_id: chunk_id.to_string(),
        sheet: sheet_name.to_string(),
    })
}

/// Rebuild a chunk from a composite sheet.
///
/// Collects every row whose first cell equals the chunk id, anywhere in
/// the sheet, rendering each as `key: value` pairs under the most
/// recently seen header row. A row whose first cell equals the id-column
/// header label is a schema boundary, not data.
pub fn rebuild_composite(
    rows: &[Vec<String>],
    sheet_name: &str,
    chunk_id: &str,
    location: &str,
) -> Result<ChunkRecord, RebuildError> {
    let not_found = || RebuildError::NotFound {
        chunk_id: chunk_id.to_string(),
        sheet: sheet_name.to_string(),
    };

    let first_header = rows.first().ok_or_else(|| not_found())?;
    let id_label = first_header
        .first()
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    let mut header = first_header;
    let mut lines: Vec<String> = Vec::new();

    for row in rows.iter().skip(1) {
        let first = row.first().map(|c| c.trim()).unwrap_or("");
        if !id_label.is_empty() && first == id_label {
            header = row;
            continue;
        }
        if first == chunk_id {
            let line = render_row(header, row);
            if !line.is_empty() {
                lines.push(line);
            }
        }
    }

    if lines.is_empty() {
        return Err(not_found());
    }

    let answer = lines.join("\n");
    let (category, subcategory, question) = match prefix_meta(chunk_id) {
        Some(meta) => meta,
        None => {
            let category = if sheet_name.is_empty() {
                "General"
            } else {
                sheet_name
            };
            return Ok(composite_chunk(
                chunk_id,
                category,
                "General",
                &format!("Information about {}", chunk_id),
                answer,
                location,
            ));
        }
    };

    Ok(composite_chunk(
        chunk_id, category, subcategory, question, answer, location,
    ))
}

fn composite_chunk(
    chunk_id: &str,
    category: &str,
    subcategory: &str,
    question: &str,
    answer: String,
    location: &str,
) -> ChunkRecord {
    ChunkRecord {
        id: chunk_id.to_string(),
        category: category.to_string(),
        subcategory: subcategory.to_string(),
        location: location.to_string(),
        question: question.to_string(),
        answer,
        tags: Vec::new(),
        embedding: None,
    }
}

/// Render one data row as `key: value` pairs under its schema header.
/// The id column and any pair with a blank key or value are skipped.
fn render_row(header: &[String], row: &[String]) -> String {
    let width = header.len().max(row.len());
    let mut pairs = Vec::new();

    for col in 1..width {
        let key = header.get(col).map(|c| c.trim()).unwrap_or("");
        let value = row.get(col).map(|c| c.trim()).unwrap_or("");
        if key.is_empty() || value.is_empty() {
            continue;
        }
        pairs.push(format!("{}: {}", key, value));
    }

    pairs.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn select_prefers_faq_sheet_and_prefix() {
        assert_eq!(
            SourceKind::select("FAQs", "scb_glow_001", "FAQs"),
            SourceKind::Simple
        );
        assert_eq!(
            SourceKind::select("Pricing", "scb_faq_007", "FAQs"),
            SourceKind::Simple
        );
        assert_eq!(
            SourceKind::select("Pricing", "scb_jump_003", "FAQs"),
            SourceKind::Composite
        );
    }

    #[test]
    fn prefix_segment_wants_two_underscores() {
        assert_eq!(prefix_segment("scb_jump_003"), Some("jump"));
        assert_eq!(prefix_segment("scb_faq"), Some("faq"));
        assert_eq!(prefix_segment("plain"), None);
    }

    #[test]
    fn simple_rebuild_matches_by_id() {
        let sheet = rows(&[
            &["chunk_id", "category", "question", "answer"],
            &["scb_faq_001", "FAQ", "Q one?", "A one."],
            &["scb_faq_007", "Pricing", "Q seven?", "A seven."],
        ]);
        let chunk = rebuild_simple(&sheet, "FAQs", "scb_faq_007", "Scarborough").unwrap();
        assert_eq!(chunk.category, "Pricing");
        assert_eq!(chunk.subcategory, "Pricing");
        assert_eq!(chunk.question, "Q seven?");
        assert_eq!(chunk.answer, "A seven.");
        assert_eq!(chunk.location, "Scarborough");
    }

    #[test]
    fn simple_rebuild_defaults_blank_category() {
        let sheet = rows(&[
            &["chunk_id", "category", "question", "answer"],
            &["scb_faq_002", "", "Q?", "A."],
        ]);
        let chunk = rebuild_simple(&sheet, "FAQs", "scb_faq_002", "Main").unwrap();
        assert_eq!(chunk.category, "FAQ");
        assert_eq!(chunk.subcategory, "General");
    }

    #[test]
    fn simple_rebuild_not_found_and_empty() {
        let sheet = rows(&[
            &["chunk_id", "category", "question", "answer"],
            &["scb_faq_003", "FAQ", "", ""],
        ]);
        assert!(matches!(
            rebuild_simple(&sheet, "FAQs", "scb_faq_999", "Main"),
            Err(RebuildError::NotFound { .. })
        ));
        assert!(matches!(
            rebuild_simple(&sheet, "FAQs", "scb_faq_003", "Main"),
            Err(RebuildError::Empty { .. })
        ));
    }

    #[test]
    fn composite_rebuild_renders_key_value_pairs() {
        let sheet = rows(&[
            &["chunk_id", "Pass Type", "60 min", "90 min"],
            &["scb_jump_003", "Standard", "$20", "$26"],
        ]);
        let chunk = rebuild_composite(&sheet, "Pricing", "scb_jump_003", "Main").unwrap();
        assert_eq!(chunk.answer, "Pass Type: Standard | 60 min: $20 | 90 min: $26");
        assert_eq!(chunk.category, "Pricing");
        assert_eq!(chunk.subcategory, "Jump Passes");
        assert_eq!(chunk.question, "What do jump passes cost?");
    }

    #[test]
    fn composite_rebuild_uses_latest_header_schema() {
        // Rows after a header-repeat row render under the second schema.
        let sheet = rows(&[
            &["chunk_id", "Pass Type", "Price"],
            &["scb_jump_003", "Standard", "$20"],
            &["chunk_id", "Day", "Open", "Close"],
            &["scb_jump_003", "Saturday", "10am", "11pm"],
        ]);
        let chunk = rebuild_composite(&sheet, "Pricing", "scb_jump_003", "Main").unwrap();
        assert_eq!(
            chunk.answer,
            "Pass Type: Standard | Price: $20\nDay: Saturday | Open: 10am | Close: 11pm"
        );
    }

    #[test]
    fn composite_rebuild_skips_blank_pairs_and_other_ids() {
        let sheet = rows(&[
            &["chunk_id", "Option", "", "Notes"],
            &["scb_bday_001", "Basic", "ignored", ""],
            &["scb_bday_002", "Deluxe", "x", "Includes pizza"],
        ]);
        let chunk = rebuild_composite(&sheet, "Parties", "scb_bday_002", "Main").unwrap();
        assert_eq!(chunk.answer, "Option: Deluxe | Notes: Includes pizza");
        assert_eq!(chunk.category, "Birthday Parties");
    }

    #[test]
    fn composite_rebuild_unknown_prefix_falls_back_to_sheet() {
        let sheet = rows(&[
            &["chunk_id", "Detail"],
            &["scb_mystery_001", "Something"],
        ]);
        let chunk = rebuild_composite(&sheet, "Extras", "scb_mystery_001", "Main").unwrap();
        assert_eq!(chunk.category, "Extras");
        assert_eq!(chunk.subcategory, "General");
        assert_eq!(chunk.question, "Information about scb_mystery_001");
    }

    #[test]
    fn composite_rebuild_not_found() {
        let sheet = rows(&[&["chunk_id", "Detail"], &["scb_jump_001", "x"]]);
        assert!(matches!(
            rebuild_composite(&sheet, "Pricing", "scb_jump_999", "Main"),
            Err(RebuildError::NotFound { .. })
        ));
    }

    #[test]
    fn rebuild_is_deterministic() {
        let sheet = rows(&[
            &["chunk_id", "Pass Type", "Price"],
            &["scb_jump_003", "Standard", "$20"],
        ]);
        let a = rebuild_composite(&sheet, "Pricing", "scb_jump_003", "Main").unwrap();
        let b = rebuild_composite(&sheet, "Pricing", "scb_jump_003", "Main").unwrap();
        assert_eq!(a.question, b.question);
        assert_eq!(a.answer, b.answer);
        assert_eq!(a.category, b.category);
        assert_eq!(a.embed_text(), b.embed_text());
    }
}
