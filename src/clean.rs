use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::sink::ReportSink;
use crate::source::load_table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOutcome {
    pub rows: usize,
    pub column_removed: bool,
}

/// Reads the raw export, drops `column` and saves the result to `output`.
///
/// A missing column is only a warning; the table is saved either way.
pub fn clean_export<S: ReportSink>(
    sink: &mut S,
    input: &Path,
    output: &Path,
    column: &str,
) -> Result<CleanOutcome> {
    info!(path = %input.display(), "reading raw export");
    let mut table = load_table(input)?;
    if table.is_empty() {
        warn!(path = %input.display(), "raw export has no data rows");
    }

    let column_removed = table.drop_column(column);
    if column_removed {
        info!(column, "column removed");
    } else {
        warn!(column, "column not found, nothing removed");
    }

    sink.write_table(output, &table, None)?;

    Ok(CleanOutcome {
        rows: table.len(),
        column_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttendanceError;
    use crate::sink::FileSink;
    use crate::source::Cell;
    use std::fs;

    const RAW: &str = "\
Paciente,Procedimento,Status , Data e Hora agendada
Marina Silva,Fisioterapia,Finalizado,01/02/2026 10:00
Joao Souza,Pilates,Cancelado,09/02/2026 11:00
";

    #[test]
    fn strips_the_date_column() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        let output = dir.path().join("analysis/clean.csv");
        fs::write(&input, RAW).unwrap();

        let outcome = clean_export(&mut FileSink::new(), &input, &output, "Data e Hora agendada")
            .unwrap();
        assert_eq!(
            outcome,
            CleanOutcome {
                rows: 2,
                column_removed: true
            }
        );

        let cleaned = load_table(&output).unwrap();
        assert_eq!(cleaned.header(), ["Paciente", "Procedimento", "Status"]);
        assert_eq!(cleaned.len(), 2);
    }

    #[test]
    fn missing_column_still_saves() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.csv");
        let output = dir.path().join("clean.xlsx");
        fs::write(&input, RAW).unwrap();

        let outcome = clean_export(&mut FileSink::new(), &input, &output, "Agenda").unwrap();
        assert!(!outcome.column_removed);

        let cleaned = load_table(&output).unwrap();
        assert_eq!(cleaned.header().len(), 4);
    }

    #[test]
    fn other_date_columns_survive_cleaning() {
        use calamine::{open_workbook_auto, Data, Reader};
        use chrono::NaiveDate;
        use rust_xlsxwriter::{Format, Workbook};

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.xlsx");
        let born = NaiveDate::from_ymd_opt(1990, 5, 17)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let scheduled = NaiveDate::from_ymd_opt(2026, 2, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (col, name) in ["Paciente", "Nascimento", "Data e Hora agendada"]
            .iter()
            .enumerate()
        {
            sheet.write_string(0, col as u16, *name).unwrap();
        }
        sheet.write_string(1, 0, "Marina Silva").unwrap();
        sheet
            .write_datetime_with_format(1, 1, &born, &Format::new().set_num_format("dd/mm/yyyy"))
            .unwrap();
        sheet
            .write_datetime_with_format(
                1,
                2,
                &scheduled,
                &Format::new().set_num_format("dd/mm/yyyy hh:mm"),
            )
            .unwrap();
        workbook.save(&input).unwrap();

        let output = dir.path().join("clean.xlsx");
        clean_export(&mut FileSink::new(), &input, &output, "Data e Hora agendada").unwrap();

        let mut cleaned = open_workbook_auto(&output).unwrap();
        let range = cleaned.worksheet_range("Sheet1").unwrap();
        assert_eq!(range.get_size(), (2, 2));
        let cell = range.get_value((1, 1)).unwrap();
        assert!(matches!(cell, Data::DateTime(_)));
        assert_eq!(load_table(&output).unwrap().rows()[0][1], Cell::DateTime(born));

        let csv_output = dir.path().join("clean.csv");
        clean_export(&mut FileSink::new(), &input, &csv_output, "Data e Hora agendada").unwrap();
        assert_eq!(
            fs::read_to_string(&csv_output).unwrap(),
            "Paciente,Nascimento\nMarina Silva,1990-05-17\n"
        );
    }

    #[test]
    fn missing_input_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let err = clean_export(
            &mut FileSink::new(),
            &dir.path().join("absent.xlsx"),
            &dir.path().join("clean.xlsx"),
            "Data e Hora agendada",
        )
        .unwrap_err();
        assert!(matches!(err, AttendanceError::SourceNotFound(_)));
    }
}
