//! In-memory tabular input.
//!
//! Spreadsheets (xlsx, xls, xlsb, ods) are read with calamine; CSV files with
//! the csv crate. Either way the whole sheet is materialized as a [`Table`]:
//! a header row of column names and the data rows in file order.

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, open_workbook_auto};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// A single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    /// Infers a cell from raw text the way a CSV reader would.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Cell::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_nan() {
                return Cell::Empty;
            }
            return Cell::Float(f);
        }
        Cell::Text(raw.to_string())
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::Int(i) => Cell::Int(*i),
            Data::Float(f) if f.is_nan() => Cell::Empty,
            Data::Float(f) => Cell::Float(*f),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => Cell::Float(dt.as_f64()),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A fully loaded sheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Builds a table, padding short rows with [`Cell::Empty`].
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, Cell::Empty);
                }
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Loads a table from `path`, choosing the reader by file extension.
    #[tracing::instrument(fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let table = match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Self::load_spreadsheet(path)?,
            "csv" => Self::load_csv(path)?,
            other => bail!(
                "unsupported input format '{}' for {}",
                other,
                path.display()
            ),
        };

        info!(
            rows = table.rows.len(),
            columns = table.columns.len(),
            "Input table loaded"
        );
        Ok(table)
    }

    /// Reads the first worksheet; its first row is the header.
    pub fn load_spreadsheet(path: &Path) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("failed to open workbook {}", path.display()))?;

        let sheet_names = workbook.sheet_names().to_vec();
        let Some(sheet_name) = sheet_names.first() else {
            bail!("workbook {} has no sheets", path.display());
        };
        debug!(sheet = %sheet_name, sheets = sheet_names.len(), "Reading first sheet");

        let range = workbook
            .worksheet_range(sheet_name)
            .with_context(|| format!("failed to read sheet '{sheet_name}'"))?;

        let mut rows = range.rows();
        let columns: Vec<String> = match rows.next() {
            Some(header) => header
                .iter()
                .map(|cell| match cell {
                    Data::String(s) => s.trim().to_string(),
                    Data::Empty => String::new(),
                    other => other.to_string(),
                })
                .collect(),
            None => bail!("sheet '{sheet_name}' has no header row"),
        };

        let rows = rows
            .map(|row| row.iter().map(Cell::from).collect())
            .collect();

        Ok(Self::new(columns, rows))
    }

    /// Reads a CSV file with a header row, inferring each cell's type.
    pub fn load_csv(path: &Path) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("failed to open CSV {}", path.display()))?;

        let columns = rdr
            .headers()
            .with_context(|| format!("failed to read CSV header of {}", path.display()))?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for (idx, result) in rdr.records().enumerate() {
            let record =
                result.with_context(|| format!("malformed CSV record at data row {}", idx + 1))?;
            rows.push(record.iter().map(Cell::infer).collect());
        }

        Ok(Self::new(columns, rows))
    }

    /// Index of the column named exactly `name` (ignoring surrounding whitespace).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.columns.iter().position(|c| c.trim() == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
