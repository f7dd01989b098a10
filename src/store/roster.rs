#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use encoding_rs::SHIFT_JIS;

use super::{Repository, write_atomic};
use crate::{constants::UTF8_BOM, error::ReviewError};

/// A roster as a header row plus string cells.
///
/// Cells are kept as written; an empty cell is an empty string. Short rows
/// are padded so every row has one cell per header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterTable {
    /// Column names, in file order.
    headers: Vec<String>,
    /// Data rows, each as long as `headers`.
    rows:    Vec<Vec<String>>,
}

/// Decodes roster bytes: UTF-8 (BOM optional), falling back to Shift_JIS.
pub fn decode_roster(bytes: &[u8]) -> Result<String, ReviewError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => {
            let (text, _, had_errors) = SHIFT_JIS.decode(bytes);
            if had_errors {
                Err(ReviewError::Encoding(
                    "the file is neither UTF-8 nor Shift_JIS".to_string(),
                ))
            } else {
                tracing::debug!("Roster decoded as Shift_JIS");
                Ok(text.into_owned())
            }
        }
    }
}

impl RosterTable {
    /// Creates a table from headers and rows, padding short rows.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width.max(row.len()), String::new());
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Parses CSV text with a header row.
    pub fn parse(text: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .context("Could not read the roster header row")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Could not read roster row {}", i + 2))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self::new(headers, rows))
    }

    /// Decodes and parses raw roster bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReviewError> {
        let text = decode_roster(bytes)?;
        Ok(Self::parse(&text)?)
    }

    /// Serializes the table as CSV, optionally preceded by a UTF-8 BOM.
    pub fn to_csv_bytes(&self, with_bom: bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if with_bom {
            out.extend_from_slice(UTF8_BOM);
        }
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(&mut out);
        writer
            .write_record(&self.headers)
            .context("Could not write roster header")?;
        for row in &self.rows {
            writer.write_record(row).context("Could not write roster row")?;
        }
        writer.flush().context("Could not flush roster")?;
        drop(writer);
        Ok(out)
    }

    /// Column names.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Index of the column called `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Adds an empty column called `name` unless it already exists.
    ///
    /// Returns whether a column was added.
    pub fn ensure_column(&mut self, name: &str) -> bool {
        if self.column(name).is_some() {
            return false;
        }
        self.headers.push(name.to_string());
        let width = self.headers.len();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
        true
    }

    /// Index of the first row whose `column` cell equals `value` (trimmed).
    pub fn find_row(&self, column: usize, value: &str) -> Option<usize> {
        let value = value.trim();
        self.rows
            .iter()
            .position(|row| row.get(column).is_some_and(|c| c.trim() == value))
    }

    /// Cell at `row`, `column`, or `""` out of range.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Overwrites one cell.
    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            *cell = value.into();
        }
    }
}

/// The instructor's roster and its feedback-augmented working copy.
#[derive(Debug, Clone)]
pub struct RosterStore {
    /// Roster as supplied; never written.
    original:        PathBuf,
    /// Working copy with the feedback column.
    working:         PathBuf,
    /// Name of the feedback column.
    feedback_column: String,
}

impl RosterStore {
    /// Creates a store over `original`, keeping edits in `working`.
    pub fn new(
        original: impl Into<PathBuf>,
        working: impl Into<PathBuf>,
        feedback_column: impl Into<String>,
    ) -> Self {
        Self {
            original:        original.into(),
            working:         working.into(),
            feedback_column: feedback_column.into(),
        }
    }

    /// Loads the working copy, creating it from the original on first use.
    ///
    /// The copy gets an empty feedback column if the original lacks one. Once
    /// it exists the original is never read again.
    pub fn open(&self) -> Result<RosterTable, ReviewError> {
        if let Some(table) = self.load()? {
            return Ok(table);
        }

        let bytes = fs::read(&self.original)
            .with_context(|| format!("Could not read roster {}", self.original.display()))?;
        let mut table = RosterTable::from_bytes(&bytes)?;
        if table.ensure_column(&self.feedback_column) {
            tracing::info!(
                "Added `{}` column to working copy of {}",
                self.feedback_column,
                self.original.display()
            );
        }
        self.save(&table)?;
        Ok(table)
    }
}

impl Repository for RosterStore {
    type Table = RosterTable;

    fn load(&self) -> Result<Option<RosterTable>> {
        if !self.working.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&self.working)
            .with_context(|| format!("Could not read {}", self.working.display()))?;
        let table = RosterTable::from_bytes(&bytes)
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("Could not parse {}", self.working.display()))?;
        Ok(Some(table))
    }

    fn save(&self, table: &RosterTable) -> Result<()> {
        write_atomic(&self.working, &table.to_csv_bytes(true)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bom_is_stripped_and_shift_jis_is_accepted() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("広大ID,ステータス\nB1,提出済み\n".as_bytes());
        let table = RosterTable::from_bytes(&bytes).unwrap();
        assert_eq!(table.headers(), ["広大ID", "ステータス"]);

        let (sjis, _, _) = SHIFT_JIS.encode("広大ID,ステータス\nB2,未提出\n");
        let table = RosterTable::from_bytes(&sjis).unwrap();
        assert_eq!(table.cell(0, 1), "未提出");
    }

    #[test]
    fn undecodable_roster_is_an_encoding_error() {
        let err = RosterTable::from_bytes(&[0x41, 0x2c, 0xff, 0xff, 0x0a]).unwrap_err();
        assert!(matches!(err, ReviewError::Encoding(_)));
    }

    #[test]
    fn ensure_column_is_idempotent() {
        let mut table = RosterTable::parse("id,status\n1,x\n2\n").unwrap();
        assert_eq!(table.cell(1, 1), "");
        assert!(table.ensure_column("feedback"));
        assert!(!table.ensure_column("feedback"));
        assert_eq!(table.headers().len(), 3);
        assert!(table.rows().iter().all(|r| r.len() == 3));
    }

    #[test]
    fn quoted_cells_survive_serialization() {
        let mut table = RosterTable::parse("id,feedback\n1,\n").unwrap();
        table.set_cell(0, 1, "よくできました, ただし\n\"注意\"");
        let bytes = table.to_csv_bytes(true).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        assert_eq!(RosterTable::from_bytes(&bytes).unwrap(), table);
    }
}
