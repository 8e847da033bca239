//! Access to the externally edited workbook.
//!
//! The change log and its source-of-truth tables live in a workbook the
//! engine does not own: a directory holding one JSON file per sheet, each
//! file an array of rows. Cells may be JSON strings, numbers, booleans,
//! or null; everything is coerced to a string at this boundary so the
//! rest of the pipeline only sees `Vec<Vec<String>>`.
//!
//! Access goes through the [`Workbook`] trait so the engine can run
//! against an in-memory workbook in tests. The workbook has no
//! transactional guarantee; callers order their writes after the store
//! commit.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A single cell write, batched through [`Workbook::write_cells`].
#[derive(Debug, Clone)]
pub struct CellUpdate {
    pub row: usize,
    pub col: usize,
    pub value: String,
}

/// Read/write access to a workbook of named sheets.
pub trait Workbook: Send + Sync {
    /// Read a whole sheet as rows of cells. Missing sheet is an error.
    fn read_sheet(&self, name: &str) -> Result<Vec<Vec<String>>>;

    /// Apply a batch of cell writes to one sheet. Rows and columns beyond
    /// the sheet's current extent are created as needed.
    fn write_cells(&self, name: &str, updates: &[CellUpdate]) -> Result<()>;

    /// Read one cell, returning `""` when the address is out of range.
    fn cell(&self, name: &str, addr: (usize, usize)) -> Result<String> {
        let rows = self.read_sheet(name)?;
        let (row, col) = addr;
        Ok(rows
            .get(row)
            .and_then(|r| r.get(col))
            .cloned()
            .unwrap_or_default())
    }
}

/// Parse an A1-style cell address (e.g. `"M1"`) into 0-based (row, col).
pub fn parse_a1(addr: &str) -> Result<(usize, usize)> {
    let addr = addr.trim();
    let letters: String = addr.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let digits = &addr[letters.len()..];

    if letters.is_empty() || digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        bail!("invalid A1 address: '{}'", addr);
    }

    let mut col: usize = 0;
    for c in letters.chars() {
        col = col * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1);
    }

    let row: usize = digits.parse()?;
    if row == 0 {
        bail!("invalid A1 address: '{}' (rows start at 1)", addr);
    }

    Ok((row - 1, col - 1))
}

/// Workbook stored as a directory of `<Sheet Name>.json` files.
pub struct JsonWorkbook {
    root: PathBuf,
}

impl JsonWorkbook {
    /// Open a workbook directory. Fails fast if the directory is missing,
    /// so an unreachable workbook aborts the run before any work starts.
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            bail!("workbook directory does not exist: {}", root.display());
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn sheet_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", name))
    }

    fn read_raw(&self, name: &str) -> Result<Vec<Vec<Value>>> {
        let path = self.sheet_path(name);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read sheet: {}", path.display()))?;
        let rows: Vec<Vec<Value>> = serde_json::from_str(&content)
            .with_context(|| format!("Sheet is not an array of rows: {}", path.display()))?;
        Ok(rows)
    }
}

impl Workbook for JsonWorkbook {
    fn read_sheet(&self, name: &str) -> Result<Vec<Vec<String>>> {
        let raw = self.read_raw(name)?;
        Ok(raw
            .into_iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    fn write_cells(&self, name: &str, updates: &[CellUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut rows = self.read_raw(name)?;
        for update in updates {
            if rows.len() <= update.row {
                rows.resize(update.row + 1, Vec::new());
            }
            let row = &mut rows[update.row];
            if row.len() <= update.col {
                row.resize(update.col + 1, Value::String(String::new()));
            }
            row[update.col] = Value::String(update.value.clone());
        }

        let path = self.sheet_path(name);
        let content = serde_json::to_string_pretty(&rows)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write sheet: {}", path.display()))?;
        Ok(())
    }
}

/// In-memory workbook backend.
///
/// Holds sheets in a `RwLock`ed map; used by the engine tests and any
/// embedding host that materializes sheets itself.
#[derive(Default)]
pub struct MemWorkbook {
    sheets: std::sync::RwLock<std::collections::HashMap<String, Vec<Vec<String>>>>,
}

impl MemWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_sheet(&self, name: &str, rows: Vec<Vec<String>>) {
        self.sheets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), rows);
    }
}

impl Workbook for MemWorkbook {
    fn read_sheet(&self, name: &str) -> Result<Vec<Vec<String>>> {
        self.sheets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("sheet not found: {}", name))
    }

    fn write_cells(&self, name: &str, updates: &[CellUpdate]) -> Result<()> {
        let mut sheets = self.sheets.write().unwrap_or_else(|e| e.into_inner());
        let rows = sheets
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("sheet not found: {}", name))?;
        for update in updates {
            if rows.len() <= update.row {
                rows.resize(update.row + 1, Vec::new());
            }
            let row = &mut rows[update.row];
            if row.len() <= update.col {
                row.resize(update.col + 1, String::new());
            }
            row[update.col] = update.value.clone();
        }
        Ok(())
    }
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_a1_basic() {
        assert_eq!(parse_a1("A1").unwrap(), (0, 0));
        assert_eq!(parse_a1("M1").unwrap(), (0, 12));
        assert_eq!(parse_a1("B10").unwrap(), (9, 1));
        assert_eq!(parse_a1("AA3").unwrap(), (2, 26));
    }

    #[test]
    fn parse_a1_rejects_garbage() {
        assert!(parse_a1("").is_err());
        assert!(parse_a1("42").is_err());
        assert!(parse_a1("M").is_err());
        assert!(parse_a1("M0").is_err());
        assert!(parse_a1("1M").is_err());
    }

    #[test]
    fn json_workbook_coerces_cell_types() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("Prices.json"),
            r#"[["id", "amount", "active"], ["scb_jump_001", 25, true], ["scb_jump_002", null, false]]"#,
        )
        .unwrap();

        let wb = JsonWorkbook::open(tmp.path()).unwrap();
        let rows = wb.read_sheet("Prices").unwrap();
        assert_eq!(rows[1], vec!["scb_jump_001", "25", "true"]);
        assert_eq!(rows[2], vec!["scb_jump_002", "", "false"]);
    }

    #[test]
    fn write_cells_extends_short_rows() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("Log.json"), r#"[["a"], ["b"]]"#).unwrap();

        let wb = JsonWorkbook::open(tmp.path()).unwrap();
        wb.write_cells(
            "Log",
            &[
                CellUpdate {
                    row: 1,
                    col: 3,
                    value: "TRUE".into(),
                },
                CellUpdate {
                    row: 1,
                    col: 4,
                    value: "now".into(),
                },
            ],
        )
        .unwrap();

        let rows = wb.read_sheet("Log").unwrap();
        assert_eq!(rows[1], vec!["b", "", "", "TRUE", "now"]);
        // Untouched rows survive the rewrite
        assert_eq!(rows[0], vec!["a"]);
    }

    #[test]
    fn missing_sheet_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let wb = JsonWorkbook::open(tmp.path()).unwrap();
        assert!(wb.read_sheet("Nope").is_err());
    }

    #[test]
    fn cell_out_of_range_is_empty() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("Log.json"), r#"[["v2.3"]]"#).unwrap();
        let wb = JsonWorkbook::open(tmp.path()).unwrap();
        assert_eq!(wb.cell("Log", (0, 0)).unwrap(), "v2.3");
        assert_eq!(wb.cell("Log", (0, 12)).unwrap(), "");
        assert_eq!(wb.cell("Log", (9, 0)).unwrap(), "");
    }
}
