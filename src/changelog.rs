//! Change-log parsing and grouping.
//!
//! The change log is the system's inbox: every pending content edit is a
//! row in one sheet, appended by hand. This module is the strict parse
//! boundary between those loosely typed rows and the typed
//! [`ChangeEntry`] values the engine works with. Malformed rows are
//! quarantined here, never half-parsed.
//!
//! Row order is semantically significant: grouping preserves the order of
//! each chunk id's first appearance so repeated runs over identical input
//! process groups deterministically.

use anyhow::Result;

use crate::models::{ChangeEntry, ChangeKind, PatchField};
use crate::workbook::{CellUpdate, Workbook};

// Column indices in the change-log sheet (0-based)
pub const COL_CHANGE_ID: usize = 0;
pub const COL_TIMESTAMP: usize = 1;
pub const COL_SHEET_NAME: usize = 2;
pub const COL_CHUNK_ID: usize = 3;
pub const COL_CHANGE_TYPE: usize = 4;
pub const COL_FIELD: usize = 5;
pub const COL_OLD_VALUE: usize = 6;
pub const COL_NEW_VALUE: usize = 7;
pub const COL_SYNCED: usize = 8;
pub const COL_SYNCED_AT: usize = 9;

/// Full row width after defensive padding.
pub const LOG_WIDTH: usize = COL_SYNCED_AT + 1;

const HEADER_ROW: usize = 0;

/// Tokens in the synced column that mark a row as already processed.
const SYNCED_TOKENS: &[&str] = &["TRUE", "YES", "1", "DONE"];

/// Result of one pass over the change log.
pub struct LogRead {
    /// Unsynced entries in original row order.
    pub entries: Vec<ChangeEntry>,
    /// Rows quarantined at the parse boundary (blank id/type or an
    /// unrecognized change type). Not failures.
    pub skipped: usize,
}

/// Read all unsynced rows of the change log into typed entries.
///
/// Row 0 is the header. Short rows are padded to [`LOG_WIDTH`] before
/// field extraction so a hand-trimmed trailing cell never shifts columns.
pub fn read_unsynced(workbook: &dyn Workbook, sheet: &str) -> Result<LogRead> {
    let rows = workbook.read_sheet(sheet)?;

    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for (i, raw) in rows.iter().enumerate() {
        if i == HEADER_ROW {
            continue;
        }

        let row = pad_row(raw);

        let synced = row[COL_SYNCED].trim().to_uppercase();
        if SYNCED_TOKENS.contains(&synced.as_str()) {
            continue;
        }

        let chunk_id = row[COL_CHUNK_ID].trim();
        let raw_kind = row[COL_CHANGE_TYPE].trim();
        if chunk_id.is_empty() || raw_kind.is_empty() {
            skipped += 1;
            continue;
        }

        let kind = match ChangeKind::parse(raw_kind) {
            Some(kind) => kind,
            None => {
                eprintln!(
                    "Warning: row {}: unknown change type '{}' — skipping",
                    i, raw_kind
                );
                skipped += 1;
                continue;
            }
        };

        let field_changed = row[COL_FIELD].trim().to_string();
        let field = PatchField::parse(&field_changed);
        if field == PatchField::Unknown && !field_changed.is_empty() {
            eprintln!(
                "Warning: row {}: unknown field '{}' for {}",
                i, field_changed, chunk_id
            );
        }

        entries.push(ChangeEntry {
            change_id: row[COL_CHANGE_ID].trim().to_string(),
            timestamp: row[COL_TIMESTAMP].trim().to_string(),
            sheet_name: row[COL_SHEET_NAME].trim().to_string(),
            chunk_id: chunk_id.to_string(),
            kind,
            field_changed,
            field,
            old_value: row[COL_OLD_VALUE].trim().to_string(),
            new_value: row[COL_NEW_VALUE].trim().to_string(),
            row_index: i,
        });
    }

    Ok(LogRead { entries, skipped })
}

fn pad_row(raw: &[String]) -> Vec<String> {
    let mut row = raw.to_vec();
    if row.len() < LOG_WIDTH {
        row.resize(LOG_WIDTH, String::new());
    }
    row
}

/// All change entries targeting one chunk id within a single run.
#[derive(Debug)]
pub struct ChangeGroup {
    pub chunk_id: String,
    pub entries: Vec<ChangeEntry>,
}

impl ChangeGroup {
    /// Delete wins over everything else in the group, regardless of the
    /// order the entries were logged in.
    pub fn has_delete(&self) -> bool {
        self.entries.iter().any(|e| e.kind == ChangeKind::Delete)
    }

    /// The sheet the chunk is rebuilt from: the last entry's sheet is
    /// authoritative when entries disagree.
    pub fn source_sheet(&self) -> &str {
        self.entries
            .last()
            .map(|e| e.sheet_name.as_str())
            .unwrap_or("")
    }

    /// Change-log row positions backing this group, for mark-synced.
    pub fn row_indices(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.row_index).collect()
    }
}

/// Group entries by chunk id, preserving first-appearance order.
pub fn group_entries(entries: Vec<ChangeEntry>) -> Vec<ChangeGroup> {
    let mut index: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut groups: Vec<ChangeGroup> = Vec::new();

    for entry in entries {
        match index.get(&entry.chunk_id) {
            Some(&i) => groups[i].entries.push(entry),
            None => {
                index.insert(entry.chunk_id.clone(), groups.len());
                groups.push(ChangeGroup {
                    chunk_id: entry.chunk_id.clone(),
                    entries: vec![entry],
                });
            }
        }
    }

    groups
}

/// Cell writes that mark one group's rows as synced, applied in a single
/// batch strictly after the group's store transaction commits.
pub fn mark_synced_updates(rows: &[usize], stamp: &str) -> Vec<CellUpdate> {
    let mut updates = Vec::with_capacity(rows.len() * 2);
    for &row in rows {
        updates.push(CellUpdate {
            row,
            col: COL_SYNCED,
            value: "TRUE".to_string(),
        });
        updates.push(CellUpdate {
            row,
            col: COL_SYNCED_AT,
            value: stamp.to_string(),
        });
    }
    updates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::MemWorkbook;

    fn log_row(change_id: &str, chunk_id: &str, kind: &str) -> Vec<String> {
        vec![
            change_id.to_string(),
            "2026-07-01 09:00:00".to_string(),
            "FAQs".to_string(),
            chunk_id.to_string(),
            kind.to_string(),
            "answer".to_string(),
            "old".to_string(),
            "new".to_string(),
            String::new(),
            String::new(),
        ]
    }

    fn header() -> Vec<String> {
        [
            "change_id",
            "timestamp",
            "sheet_name",
            "chunk_id",
            "change_type",
            "field_changed",
            "old_value",
            "new_value",
            "synced",
            "synced_at",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn workbook_with(rows: Vec<Vec<String>>) -> MemWorkbook {
        let wb = MemWorkbook::new();
        wb.insert_sheet("Change Log", rows);
        wb
    }

    #[test]
    fn skips_header_and_synced_rows() {
        let mut done = log_row("chg_001", "scb_faq_001", "UPDATE");
        done[COL_SYNCED] = "true".to_string();
        let mut yes = log_row("chg_002", "scb_faq_002", "UPDATE");
        yes[COL_SYNCED] = "YES".to_string();
        let pending = log_row("chg_003", "scb_faq_003", "UPDATE");

        let wb = workbook_with(vec![header(), done, yes, pending]);
        let read = read_unsynced(&wb, "Change Log").unwrap();
        assert_eq!(read.entries.len(), 1);
        assert_eq!(read.entries[0].change_id, "chg_003");
        assert_eq!(read.entries[0].row_index, 3);
        assert_eq!(read.skipped, 0);
    }

    #[test]
    fn pads_short_rows() {
        let short = vec![
            "chg_001".to_string(),
            "ts".to_string(),
            "FAQs".to_string(),
            "scb_faq_001".to_string(),
            "DELETE".to_string(),
        ];
        let wb = workbook_with(vec![header(), short]);
        let read = read_unsynced(&wb, "Change Log").unwrap();
        assert_eq!(read.entries.len(), 1);
        assert_eq!(read.entries[0].kind, ChangeKind::Delete);
        assert_eq!(read.entries[0].new_value, "");
    }

    #[test]
    fn quarantines_blank_and_unknown_rows() {
        let blank_id = log_row("chg_001", "", "UPDATE");
        let blank_type = log_row("chg_002", "scb_faq_002", "");
        let bad_type = log_row("chg_003", "scb_faq_003", "RENAME");
        let ok = log_row("chg_004", "scb_faq_004", "ADD");

        let wb = workbook_with(vec![header(), blank_id, blank_type, bad_type, ok]);
        let read = read_unsynced(&wb, "Change Log").unwrap();
        assert_eq!(read.entries.len(), 1);
        assert_eq!(read.entries[0].change_id, "chg_004");
        assert_eq!(read.skipped, 3);
    }

    #[test]
    fn groups_preserve_first_appearance_order() {
        let rows = vec![
            header(),
            log_row("chg_1", "a", "UPDATE"),
            log_row("chg_2", "b", "UPDATE"),
            log_row("chg_3", "a", "UPDATE"),
            log_row("chg_4", "c", "ADD"),
        ];
        let wb = workbook_with(rows);
        let read = read_unsynced(&wb, "Change Log").unwrap();
        let groups = group_entries(read.entries);

        let ids: Vec<&str> = groups.iter().map(|g| g.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(groups[0].entries.len(), 2);
        assert_eq!(groups[0].row_indices(), vec![1, 3]);
    }

    #[test]
    fn last_entry_sheet_is_authoritative() {
        let mut first = log_row("chg_1", "a", "UPDATE");
        first[COL_SHEET_NAME] = "FAQs".to_string();
        let mut second = log_row("chg_2", "a", "UPDATE");
        second[COL_SHEET_NAME] = "Pricing".to_string();

        let wb = workbook_with(vec![header(), first, second]);
        let read = read_unsynced(&wb, "Change Log").unwrap();
        let groups = group_entries(read.entries);
        assert_eq!(groups[0].source_sheet(), "Pricing");
    }

    #[test]
    fn delete_anywhere_in_group_is_detected() {
        let rows = vec![
            header(),
            log_row("chg_1", "a", "UPDATE"),
            log_row("chg_2", "a", "DELETE"),
            log_row("chg_3", "a", "UPDATE"),
        ];
        let wb = workbook_with(rows);
        let read = read_unsynced(&wb, "Change Log").unwrap();
        let groups = group_entries(read.entries);
        assert!(groups[0].has_delete());
    }

    #[test]
    fn mark_synced_updates_cover_both_columns() {
        let updates = mark_synced_updates(&[2, 5], "2026-07-01 10:00:00 UTC");
        assert_eq!(updates.len(), 4);
        assert_eq!(updates[0].row, 2);
        assert_eq!(updates[0].col, COL_SYNCED);
        assert_eq!(updates[0].value, "TRUE");
        assert_eq!(updates[3].row, 5);
        assert_eq!(updates[3].col, COL_SYNCED_AT);
    }
}
