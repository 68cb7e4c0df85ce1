//! Tabular data source.
//!
//! Loads the first worksheet of a spreadsheet (or a CSV file) into a
//! [`Table`] and maps the configured columns onto [`VisitRecord`]s.

use std::fmt;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::config::Config;
use crate::error::{AttendanceError, Result};
use crate::models::{VisitRecord, VisitStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(text) => write!(f, "{text}"),
            Cell::Int(value) => write!(f, "{value}"),
            Cell::Float(value) => write!(f, "{value}"),
            Cell::Bool(value) => write!(f, "{value}"),
            Cell::DateTime(value) if value.time() == NaiveTime::MIN => {
                write!(f, "{}", value.format("%Y-%m-%d"))
            }
            Cell::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => Cell::Empty,
            Data::String(text) => Cell::Text(text.clone()),
            Data::Int(value) => Cell::Int(*value),
            Data::Float(value) => Cell::Float(*value),
            Data::Bool(value) => Cell::Bool(*value),
            Data::DateTime(value) if value.is_datetime() => value
                .as_datetime()
                .map(Cell::DateTime)
                .unwrap_or(Cell::Float(value.as_f64())),
            Data::DateTime(value) => Cell::Float(value.as_f64()),
            Data::DateTimeIso(text) => parse_iso_datetime(text)
                .map(Cell::DateTime)
                .unwrap_or_else(|| Cell::Text(text.clone())),
            other => Cell::Text(other.to_string()),
        }
    }
}

fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::Text(text.to_string())
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Cell::Text(text)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Int(value as i64)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Cell::DateTime(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

/// A header row plus data rows, every row padded to the header width.
///
/// `lines` holds the 1-based spreadsheet line of each row, so messages can
/// point at the original file even after blank rows were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    origin: PathBuf,
    header: Vec<String>,
    rows: Vec<Vec<Cell>>,
    lines: Vec<usize>,
}

impl Table {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            origin: PathBuf::new(),
            header,
            rows: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Appends a row on the line after the previous one.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        let line = self.lines.last().map_or(2, |line| line + 1);
        self.push_row_at(row, line);
    }

    fn push_row_at(&mut self, mut row: Vec<Cell>, line: usize) {
        if row.len() < self.header.len() {
            row.resize(self.header.len(), Cell::Empty);
        }
        self.rows.push(row);
        self.lines.push(line);
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Spreadsheet line the row at `index` was read from.
    pub fn line(&self, index: usize) -> usize {
        self.lines.get(index).copied().unwrap_or(index + 2)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|column| column == name)
    }

    pub fn trim_headers(&mut self) {
        for column in &mut self.header {
            *column = column.trim().to_string();
        }
    }

    /// Removes the named column from the header and every row. Returns
    /// `false` when the column does not exist.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        self.header.remove(index);
        for row in &mut self.rows {
            if index < row.len() {
                row.remove(index);
            }
        }
        true
    }

    pub fn select_rows(&self, indices: &[usize]) -> Table {
        let mut table = Table {
            origin: self.origin.clone(),
            header: self.header.clone(),
            ..Table::default()
        };
        for index in indices {
            if let Some(row) = self.rows.get(*index) {
                table.push_row_at(row.clone(), self.line(*index));
            }
        }
        table
    }

    /// Number of rows with nothing in `column`. Zero when the column is
    /// absent.
    pub fn count_blank(&self, column: &str) -> usize {
        let Some(index) = self.column_index(column) else {
            return 0;
        };
        self.rows
            .iter()
            .filter(|row| row.get(index).map_or(true, Cell::is_empty))
            .count()
    }

    fn required_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            AttendanceError::unreadable(&self.origin, format!("missing column '{name}'"))
        })
    }

    /// Maps the configured columns onto visit records.
    ///
    /// Rows without a patient name are skipped. Unknown statuses become
    /// [`VisitStatus::Other`] unless `analysis.strict_status` is set.
    pub fn records(&self, config: &Config) -> Result<Vec<VisitRecord>> {
        let patient_col = self.required_column(&config.columns.patient)?;
        let procedure_col = self.required_column(&config.columns.procedure)?;
        let status_col = self.required_column(&config.columns.status)?;

        let mut records = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.iter().enumerate() {
            let patient = row[patient_col].to_string().trim().to_string();
            if patient.is_empty() {
                debug!(row = self.line(index), "skipping row without a patient");
                continue;
            }

            let raw_status = row[status_col].to_string();
            let status = config.statuses.classify(raw_status.trim());
            if config.analysis.strict_status {
                if let VisitStatus::Other(label) = &status {
                    return Err(AttendanceError::InvalidRecord {
                        row: self.line(index),
                        status: label.clone(),
                    });
                }
            }

            records.push(VisitRecord {
                patient,
                procedure: row[procedure_col].to_string().trim().to_string(),
                status,
                source_row: index,
            });
        }

        Ok(records)
    }
}

pub fn load_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(AttendanceError::SourceNotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let mut table = match extension.as_deref() {
        Some("csv") => read_csv(path)?,
        _ => read_workbook(path)?,
    };
    table.origin = path.to_path_buf();
    table.trim_headers();

    debug!(
        path = %path.display(),
        rows = table.len(),
        columns = table.header.len(),
        "loaded table"
    );
    Ok(table)
}

fn read_workbook(path: &Path) -> Result<Table> {
    let mut workbook =
        open_workbook_auto(path).map_err(|err| AttendanceError::unreadable(path, err))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AttendanceError::unreadable(path, "workbook has no worksheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| AttendanceError::unreadable(path, err))?;

    let first_row = range.start().map_or(0, |(row, _)| row as usize);
    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| AttendanceError::unreadable(path, "worksheet has no header row"))?
        .iter()
        .map(|cell| cell.to_string())
        .collect();

    let mut table = Table::new(header);
    for (index, row) in rows.enumerate() {
        let cells: Vec<Cell> = row.iter().map(Cell::from).collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        table.push_row_at(cells, first_row + index + 2);
    }
    Ok(table)
}

fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|err| AttendanceError::unreadable(path, err))?;

    let header: Vec<String> = reader
        .headers()
        .map_err(|err| AttendanceError::unreadable(path, err))?
        .iter()
        .map(String::from)
        .collect();
    if header.iter().all(|column| column.trim().is_empty()) {
        return Err(AttendanceError::unreadable(path, "file has no header row"));
    }

    let mut table = Table::new(header);
    for result in reader.records() {
        let record = result.map_err(|err| AttendanceError::unreadable(path, err))?;
        let cells: Vec<Cell> = record
            .iter()
            .map(|value| {
                if value.is_empty() {
                    Cell::Empty
                } else {
                    Cell::from(value)
                }
            })
            .collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        let line = record
            .position()
            .map_or(table.len() + 2, |position| position.line() as usize);
        table.push_row_at(cells, line);
    }
    Ok(table)
}
