//! Transient tabular payloads for write-then-read-back probes.
//!
//! A [`Table`] is the only data shape probes move through remote stores: a
//! handful of named columns over string-valued rows, built from literal
//! sample data, encoded as CSV for the data lake and as typed rows for SQL.
//! Nothing here persists past a probe run.

use serde_json::{Value, json};

use crate::errors::{Error, Result};

/// In-memory table: column names plus string-valued rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    /// The sample payload every write probe uses: one `hello` column with
    /// rows 1 and 2.
    pub fn sample() -> Self {
        let mut table = Table::new(vec!["hello".to_string()]);
        table.push_row(vec!["1".to_string()]);
        table.push_row(vec!["2".to_string()]);
        table
    }

    pub fn push_row(&mut self, row: Vec<String>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// A copy containing at most the first `limit` rows.
    pub fn first_n(&self, limit: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(limit).cloned().collect(),
        }
    }

    /// Encode as CSV with a header row.
    ///
    /// Probe payloads are literal sample values; rather than carry a quoting
    /// dialect for data that never needs one, refuse cells the plain
    /// encoding cannot represent.
    pub fn to_csv(&self) -> Result<String> {
        let mut out = String::new();
        for (i, line) in std::iter::once(&self.columns).chain(self.rows.iter()).enumerate() {
            for cell in line {
                if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
                    return Err(Error::config(format!(
                        "table cell {cell:?} (line {i}) contains a CSV delimiter; probe payloads must be plain values"
                    )));
                }
            }
            out.push_str(&line.join(","));
            out.push('\n');
        }
        Ok(out)
    }

    /// Decode the CSV produced by [`Table::to_csv`] (or any plain unquoted
    /// CSV with a header row).
    pub fn from_csv(text: &str) -> Result<Table> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .ok_or_else(|| Error::config("CSV payload is empty (expected a header row)"))?;
        let columns: Vec<String> = header.split(',').map(str::to_string).collect();

        let mut table = Table::new(columns);
        for (i, line) in lines.enumerate() {
            if line.is_empty() {
                continue;
            }
            let row: Vec<String> = line.split(',').map(str::to_string).collect();
            if row.len() != table.columns.len() {
                return Err(Error::config(format!(
                    "CSV row {} has {} fields, header has {}",
                    i + 1,
                    row.len(),
                    table.columns.len()
                )));
            }
            table.rows.push(row);
        }
        Ok(table)
    }

    /// Read-back comparison: same columns, same rows as a multiset. Remote
    /// stores are free to reorder rows, so ordering never counts.
    pub fn rows_match_unordered(&self, other: &Table) -> bool {
        if self.columns != other.columns || self.rows.len() != other.rows.len() {
            return false;
        }
        let mut mine = self.rows.clone();
        let mut theirs = other.rows.clone();
        mine.sort();
        theirs.sort();
        mine == theirs
    }

    /// Render as a JSON array of row objects for the probe report.
    pub fn to_json(&self) -> Value {
        let rows: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let fields: serde_json::Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(|cell| json!(cell)))
                    .collect();
                Value::Object(fields)
            })
            .collect();
        json!(rows)
    }
}
