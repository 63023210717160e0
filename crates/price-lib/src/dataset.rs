//! Tabular input for training and prediction
//!
//! A [`Table`] keeps column names in the order they were first seen and
//! stores each cell as an optional value so that sparse records and empty
//! CSV cells survive until imputation.

use crate::error::{PredictorError, Result};
use crate::models::FeatureMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
}

impl Table {
    /// Empty table with the given columns
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from dense rows, checking every row's width
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Option<f64>>>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(PredictorError::InvalidData(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from sparse records; columns appear in first-seen order
    pub fn from_records(records: &[FeatureMap]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for name in record.keys() {
                if !columns.contains(name) {
                    columns.push(name.clone());
                }
            }
        }
        let rows = records
            .iter()
            .map(|record| columns.iter().map(|c| record.get(c).copied()).collect())
            .collect();
        Self { columns, rows }
    }

    /// Parse CSV with a header row. Empty cells and `NaN` become missing.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let columns: Vec<String> = rdr
            .headers()
            .map_err(|e| PredictorError::InvalidData(format!("failed to read CSV header: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record
                .map_err(|e| PredictorError::InvalidData(format!("CSV row {}: {}", line + 1, e)))?;
            let mut row = Vec::with_capacity(columns.len());
            for (col, cell) in columns.iter().zip(record.iter()) {
                row.push(parse_cell(cell).ok_or_else(|| {
                    PredictorError::InvalidData(format!(
                        "CSV row {} column '{}': '{}' is not a finite number",
                        line + 1,
                        col,
                        cell
                    ))
                })?);
            }
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| PredictorError::io(path, e))?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn push_row(&mut self, row: Vec<Option<f64>>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(PredictorError::InvalidData(format!(
                "row has {} values, expected {}",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Cells of one column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// New table keeping only the rows at `indices`, in that order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// New table without the named column
    pub fn without_column(&self, name: &str) -> Self {
        match self.column_index(name) {
            None => self.clone(),
            Some(idx) => Self {
                columns: self
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != idx)
                    .map(|(_, c)| c.clone())
                    .collect(),
                rows: self
                    .rows
                    .iter()
                    .map(|r| {
                        r.iter()
                            .enumerate()
                            .filter(|(i, _)| *i != idx)
                            .map(|(_, v)| *v)
                            .collect()
                    })
                    .collect(),
            },
        }
    }

    /// Row-wise union. Columns are `self`'s followed by any new ones from
    /// `other`; cells a side does not have are left missing.
    pub fn concat(&self, other: &Table) -> Self {
        let mut columns = self.columns.clone();
        for c in &other.columns {
            if !columns.contains(c) {
                columns.push(c.clone());
            }
        }

        let remap = |table: &Table| -> Vec<Option<usize>> {
            columns.iter().map(|c| table.column_index(c)).collect()
        };
        let self_map = remap(self);
        let other_map = remap(other);

        let mut rows = Vec::with_capacity(self.rows.len() + other.rows.len());
        for (table, map) in [(self, &self_map), (other, &other_map)] {
            for row in &table.rows {
                rows.push(map.iter().map(|m| m.and_then(|i| row[i])).collect());
            }
        }

        Self { columns, rows }
    }
}

/// `Some(None)` for a missing cell, `None` for anything that is not a finite number
fn parse_cell(cell: &str) -> Option<Option<f64>> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("na") {
        return Some(None);
    }
    cell.parse::<f64>().ok().filter(|v| v.is_finite()).map(Some)
}
