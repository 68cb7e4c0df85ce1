//! Report sink: where text reports, table exports and charts end up.

use std::fs;
use std::path::Path;

use chrono::NaiveTime;
use rust_xlsxwriter::{
    Chart, ChartDataLabel, ChartPoint, ChartSolidFill, ChartType, Format, Workbook, Worksheet,
    XlsxError,
};

use crate::error::{AttendanceError, Result};
use crate::models::VisitStatus;
use crate::source::{Cell, Table};

/// Excel caps worksheet names at 31 characters.
const SHEET_NAME_MAX: usize = 31;

/// One wedge of a pie chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSlice {
    pub status: VisitStatus,
    pub value: usize,
}

impl ChartSlice {
    pub fn new(status: VisitStatus, value: usize) -> Self {
        Self { status, value }
    }

    pub fn color(&self) -> &'static str {
        match self.status {
            VisitStatus::Attended => "#2E8B57",
            VisitStatus::NoShow => "#DC143C",
            VisitStatus::Cancelled | VisitStatus::Other(_) => "#A9A9A9",
        }
    }
}

pub trait ReportSink {
    fn write_text(&mut self, path: &Path, content: &str) -> Result<()>;

    /// Exports one table. `.csv` paths are written as CSV, anything else as xlsx.
    fn write_table(&mut self, path: &Path, table: &Table, sheet_name: Option<&str>) -> Result<()>;

    fn write_workbook(&mut self, path: &Path, sheets: &[(&str, &Table)]) -> Result<()>;

    fn write_chart(&mut self, path: &Path, title: &str, slices: &[ChartSlice]) -> Result<()>;
}

/// Writes artifacts to the local filesystem, creating parent directories.
#[derive(Debug, Default)]
pub struct FileSink;

impl FileSink {
    pub fn new() -> Self {
        Self
    }
}

impl ReportSink for FileSink {
    fn write_text(&mut self, path: &Path, content: &str) -> Result<()> {
        ensure_parent(path)?;
        fs::write(path, content).map_err(|err| AttendanceError::write_failure(path, err))
    }

    fn write_table(&mut self, path: &Path, table: &Table, sheet_name: Option<&str>) -> Result<()> {
        ensure_parent(path)?;
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        if is_csv {
            write_csv(path, table).map_err(|err| AttendanceError::write_failure(path, err))
        } else {
            let name = sheet_name.unwrap_or("Sheet1");
            save_workbook(path, &[(name, table)])
        }
    }

    fn write_workbook(&mut self, path: &Path, sheets: &[(&str, &Table)]) -> Result<()> {
        ensure_parent(path)?;
        save_workbook(path, sheets)
    }

    fn write_chart(&mut self, path: &Path, title: &str, slices: &[ChartSlice]) -> Result<()> {
        ensure_parent(path)?;
        save_chart(path, title, slices).map_err(|err| AttendanceError::write_failure(path, err))
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|err| AttendanceError::write_failure(path, err))
        }
        _ => Ok(()),
    }
}

fn write_csv(path: &Path, table: &Table) -> std::result::Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(table.header())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| match ch {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            other => other,
        })
        .take(SHEET_NAME_MAX)
        .collect();
    let cleaned = cleaned.trim_matches('\'').to_string();
    if cleaned.is_empty() {
        "Sheet".to_string()
    } else {
        cleaned
    }
}

fn save_workbook(path: &Path, sheets: &[(&str, &Table)]) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet();
        fill_worksheet(worksheet, name, table, &header_format)
            .map_err(|err| AttendanceError::write_failure(path, err))?;
    }

    workbook
        .save(path)
        .map_err(|err| AttendanceError::write_failure(path, err))
}

fn fill_worksheet(
    worksheet: &mut Worksheet,
    name: &str,
    table: &Table,
    header_format: &Format,
) -> std::result::Result<(), XlsxError> {
    worksheet.set_name(sanitize_sheet_name(name))?;
    let date_format = Format::new().set_num_format("dd/mm/yyyy");
    let datetime_format = Format::new().set_num_format("dd/mm/yyyy hh:mm");

    for (col, column) in table.header().iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, column, header_format)?;
    }

    for (index, row) in table.rows().iter().enumerate() {
        let row_num = index as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Empty => {}
                Cell::Text(text) => {
                    worksheet.write_string(row_num, col, text)?;
                }
                Cell::Int(value) => {
                    worksheet.write_number(row_num, col, *value as f64)?;
                }
                Cell::Float(value) => {
                    worksheet.write_number(row_num, col, *value)?;
                }
                Cell::Bool(value) => {
                    worksheet.write_boolean(row_num, col, *value)?;
                }
                Cell::DateTime(value) => {
                    let format = if value.time() == NaiveTime::MIN {
                        &date_format
                    } else {
                        &datetime_format
                    };
                    worksheet.write_datetime_with_format(row_num, col, value, format)?;
                }
            }
        }
    }

    worksheet.autofit();
    Ok(())
}

fn save_chart(
    path: &Path,
    title: &str,
    slices: &[ChartSlice],
) -> std::result::Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let sheet_name = "Chart";
    worksheet.set_name(sheet_name)?;

    for (index, slice) in slices.iter().enumerate() {
        let row = index as u32;
        worksheet.write_string(row, 0, slice.status.label())?;
        worksheet.write_number(row, 1, slice.value as f64)?;
    }

    let last_row = slices.len().saturating_sub(1) as u32;
    let points: Vec<ChartPoint> = slices
        .iter()
        .map(|slice| ChartPoint::new().set_format(ChartSolidFill::new().set_color(slice.color())))
        .collect();

    let mut chart = Chart::new(ChartType::Pie);
    chart
        .add_series()
        .set_categories((sheet_name, 0, 0, last_row, 0))
        .set_values((sheet_name, 0, 1, last_row, 1))
        .set_points(&points)
        .set_data_label(ChartDataLabel::new().show_percentage());
    chart.title().set_name(title);

    worksheet.insert_chart(0, 3, &chart)?;
    workbook.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        let mut table = Table::new(vec!["Paciente".to_string(), "Faltas".to_string()]);
        table.push_row(vec![Cell::from("Marina, Silva"), Cell::from(2usize)]);
        table.push_row(vec![Cell::from("Joao"), Cell::Empty]);
        table
    }

    #[test]
    fn text_write_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/marina_silva/report.txt");

        FileSink::new().write_text(&path, "hello").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn csv_export_quotes_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/table.csv");

        FileSink::new()
            .write_table(&path, &sample_table(), None)
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Paciente,Faltas\n\"Marina, Silva\",2\nJoao,\n");
    }

    #[test]
    fn xlsx_export_reads_back() {
        use calamine::{open_workbook_auto, Reader};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/table.xlsx");
        let table = sample_table();

        FileSink::new()
            .write_workbook(&path, &[("Per patient", &table), ("Raw", &table)])
            .unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Per patient", "Raw"]);
        let range = workbook.worksheet_range("Per patient").unwrap();
        assert_eq!(range.get_size(), (3, 2));
    }

    #[test]
    fn chart_workbook_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charts/chart.xlsx");
        let slices = vec![
            ChartSlice::new(VisitStatus::Attended, 1),
            ChartSlice::new(VisitStatus::NoShow, 2),
            ChartSlice::new(VisitStatus::Cancelled, 1),
        ];

        FileSink::new()
            .write_chart(&path, "Marina Silva", &slices)
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn write_into_a_file_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let err = FileSink::new()
            .write_text(&blocker.join("report.txt"), "hello")
            .unwrap_err();
        assert!(matches!(err, AttendanceError::WriteFailure { .. }));
    }

    #[test]
    fn slice_colors_are_fixed_per_status() {
        assert_eq!(ChartSlice::new(VisitStatus::Attended, 0).color(), "#2E8B57");
        assert_eq!(ChartSlice::new(VisitStatus::NoShow, 0).color(), "#DC143C");
        assert_eq!(ChartSlice::new(VisitStatus::Cancelled, 0).color(), "#A9A9A9");
    }

    #[test]
    fn sheet_names_are_sanitized() {
        assert_eq!(sanitize_sheet_name("a/b:c"), "a_b_c");
        assert_eq!(sanitize_sheet_name(""), "Sheet");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40)).len(), 31);
    }
}
