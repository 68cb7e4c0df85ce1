use std::fmt::Write;

use serde::Serialize;

use crate::models::{AttendanceSummary, GroupKey, SummaryRow};
use crate::source::{Cell, Table};

const NAME_WIDTH: usize = 40;
const RULE: &str = "=====================================================";

fn write_counts(output: &mut String, summary: &AttendanceSummary) {
    let _ = writeln!(output, "Completed visits (attended): {}", summary.attended);
    let _ = writeln!(output, "Missed visits (no-show): {}", summary.no_show);
    let _ = writeln!(output, "Cancelled visits: {}", summary.cancelled);
    if summary.other > 0 {
        let _ = writeln!(output, "Visits with another status: {}", summary.other);
    }
}

/// Short block printed to the terminal for a single patient.
pub fn console_summary(summary: &AttendanceSummary) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Scheduled visits: {}", summary.total());
    write_counts(&mut output, summary);
    let _ = writeln!(output, "No-show rate: {:.2}%", summary.no_show_rate());
    output
}

pub fn procedure_report(
    patient: &str,
    procedure: &str,
    summary: &AttendanceSummary,
    generated_at: &str,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "--- PROCEDURE REPORT: {procedure} ---");
    let _ = writeln!(output, "Patient: {patient}");
    let _ = writeln!(output, "Generated: {generated_at}");
    let _ = writeln!(output);
    write_counts(&mut output, summary);
    let _ = writeln!(output, "-------------------------------------------------");
    let _ = writeln!(
        output,
        "No-show rate (over valid visits): {:.2}%",
        summary.no_show_rate()
    );

    output.trim().to_string()
}

/// Overall totals for one patient followed by every procedure section.
pub fn patient_master_report(
    patient: &str,
    total: &AttendanceSummary,
    procedure_sections: &[String],
    generated_at: &str,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output, "    CONSOLIDATED PATIENT REPORT");
    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output, "Patient: {patient}");
    let _ = writeln!(output, "Generated: {generated_at}");
    let _ = writeln!(output);
    let _ = writeln!(output, "--- OVERALL SUMMARY (ALL PROCEDURES) ---");
    write_counts(&mut output, total);
    let _ = writeln!(output, "-------------------------------------------------");
    let _ = writeln!(output, "Overall no-show rate: {:.2}%", total.no_show_rate());
    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output);
    let _ = writeln!(output, "--- BREAKDOWN BY PROCEDURE ---");

    for section in procedure_sections {
        let _ = writeln!(output);
        let _ = writeln!(output, "{section}");
    }

    output.trim().to_string()
}

fn truncate_name(name: &str) -> String {
    name.chars().take(NAME_WIDTH - 1).collect()
}

fn write_group_table(
    output: &mut String,
    key_label: &str,
    rows: &[(GroupKey, AttendanceSummary)],
) {
    let _ = writeln!(
        output,
        "{:<width$} | {:^10} | {:^11} | {:^15}",
        key_label,
        "NO-SHOWS",
        "ATTENDED",
        "NO-SHOW RATE",
        width = NAME_WIDTH
    );
    let _ = writeln!(
        output,
        "{}+{}+{}+{}",
        "-".repeat(NAME_WIDTH),
        "-".repeat(12),
        "-".repeat(13),
        "-".repeat(17)
    );

    for (group, summary) in rows {
        let rate = format!("{:.1}%", summary.no_show_rate());
        let _ = writeln!(
            output,
            "{:<width$} | {:^10} | {:^11} | {:^15}",
            truncate_name(&group.to_string()),
            summary.no_show,
            summary.attended,
            rate,
            width = NAME_WIDTH
        );
    }
}

/// Clinic-wide report. `by_patient` and `by_procedure` are printed in the
/// order given. Rows without a patient are not part of any total; their
/// count is stated under the overall summary.
pub fn clinic_report(
    clinic: &AttendanceSummary,
    by_patient: &[(GroupKey, AttendanceSummary)],
    by_procedure: &[(GroupKey, AttendanceSummary)],
    rows_without_patient: usize,
    generated_at: &str,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output, "    CLINIC-WIDE ATTENDANCE REPORT");
    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output, "Generated: {generated_at}");
    let _ = writeln!(output);
    let _ = writeln!(output, "--- OVERALL SUMMARY (WHOLE CLINIC) ---");
    write_counts(&mut output, clinic);
    let _ = writeln!(output, "-----------------------------------------------------");
    let _ = writeln!(
        output,
        "Overall no-show rate (over valid visits): {:.2}%",
        clinic.no_show_rate()
    );
    if rows_without_patient > 0 {
        let _ = writeln!(
            output,
            "Rows without a patient (not counted): {rows_without_patient}"
        );
    }
    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output);

    let _ = writeln!(output, "--- PERFORMANCE BY PATIENT (SORTED BY NO-SHOWS) ---");
    let _ = writeln!(output);
    if by_patient.is_empty() {
        let _ = writeln!(output, "No visits recorded.");
    } else {
        write_group_table(&mut output, "PATIENT", by_patient);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "{RULE}");
    let _ = writeln!(output);
    let _ = writeln!(output, "--- ANALYSIS BY PROCEDURE (SORTED BY NO-SHOW RATE) ---");
    let _ = writeln!(output);
    if by_procedure.is_empty() {
        let _ = writeln!(output, "No visits recorded.");
    } else {
        write_group_table(&mut output, "PROCEDURE", by_procedure);
    }

    output.trim().to_string()
}

/// Spreadsheet form of a grouped summary, one row per group.
pub fn summary_table(key_label: &str, rows: &[(GroupKey, AttendanceSummary)]) -> Table {
    let mut table = Table::new(
        [
            key_label,
            "Attended",
            "No-shows",
            "Cancelled",
            "Other",
            "Valid total",
            "No-show rate %",
        ]
        .iter()
        .map(|column| column.to_string())
        .collect(),
    );

    for (group, summary) in rows {
        table.push_row(vec![
            Cell::from(group.to_string()),
            Cell::from(summary.attended),
            Cell::from(summary.no_show),
            Cell::from(summary.cancelled),
            Cell::from(summary.other),
            Cell::from(summary.valid_total()),
            Cell::from((summary.no_show_rate() * 100.0).round() / 100.0),
        ]);
    }

    table
}

#[derive(Serialize)]
struct ClinicSummaryJson<'a> {
    generated_at: &'a str,
    clinic: SummaryRow<'a>,
    rows_without_patient: usize,
    patients: Vec<SummaryRow<'a>>,
    procedures: Vec<SummaryRow<'a>>,
}

fn summary_rows(groups: &[(GroupKey, AttendanceSummary)]) -> Vec<SummaryRow<'_>> {
    groups
        .iter()
        .map(|(group, summary)| SummaryRow::new(group, summary))
        .collect()
}

pub fn clinic_summary_json(
    clinic: &(GroupKey, AttendanceSummary),
    by_patient: &[(GroupKey, AttendanceSummary)],
    by_procedure: &[(GroupKey, AttendanceSummary)],
    rows_without_patient: usize,
    generated_at: &str,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&ClinicSummaryJson {
        generated_at,
        clinic: SummaryRow::new(&clinic.0, &clinic.1),
        rows_without_patient,
        patients: summary_rows(by_patient),
        procedures: summary_rows(by_procedure),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(attended: usize, no_show: usize, cancelled: usize) -> AttendanceSummary {
        AttendanceSummary {
            attended,
            no_show,
            cancelled,
            other: 0,
        }
    }

    fn patient(name: &str) -> GroupKey {
        GroupKey::Patient {
            patient: name.to_string(),
        }
    }

    #[test]
    fn procedure_report_shows_counts_and_rate() {
        let text = procedure_report(
            "Marina Silva",
            "Fisioterapia",
            &summary(1, 2, 1),
            "01/03/2026 09:00",
        );

        assert!(text.starts_with("--- PROCEDURE REPORT: Fisioterapia ---"));
        assert!(text.contains("Patient: Marina Silva"));
        assert!(text.contains("Missed visits (no-show): 2"));
        assert!(text.contains("No-show rate (over valid visits): 66.67%"));
        assert!(!text.contains("another status"));
    }

    #[test]
    fn master_report_lists_sections_after_totals() {
        let sections = vec!["section one".to_string(), "section two".to_string()];
        let text = patient_master_report("Marina Silva", &summary(3, 1, 0), &sections, "now");

        let overall = text.find("Overall no-show rate: 25.00%").unwrap();
        let first = text.find("section one").unwrap();
        let second = text.find("section two").unwrap();
        assert!(overall < first && first < second);
    }

    #[test]
    fn clinic_report_aligns_and_truncates_names() {
        let long_name = "A".repeat(60);
        let by_patient = vec![(patient(&long_name), summary(1, 1, 0))];
        let by_procedure = vec![(
            GroupKey::Procedure {
                procedure: "Pilates".to_string(),
            },
            summary(0, 0, 2),
        )];
        let text = clinic_report(&summary(1, 1, 2), &by_patient, &by_procedure, 0, "now");

        assert!(text.contains("Overall no-show rate (over valid visits): 50.00%"));
        let row = text
            .lines()
            .find(|line| line.starts_with('A'))
            .unwrap();
        assert!(row.starts_with(&format!("{:<40} |", "A".repeat(39))));
        assert!(!text.contains("Rows without a patient"));
        assert!(row.contains("50.0%"));
        assert!(text.contains("Pilates"));
        assert!(text.contains("0.0%"));
    }

    #[test]
    fn clinic_report_states_rows_without_patient() {
        let text = clinic_report(&summary(1, 0, 0), &[], &[], 2, "now");
        assert!(text.contains("Rows without a patient (not counted): 2"));
    }

    #[test]
    fn clinic_report_handles_no_visits() {
        let text = clinic_report(&AttendanceSummary::default(), &[], &[], 0, "now");
        assert!(text.contains("Overall no-show rate (over valid visits): 0.00%"));
        assert_eq!(text.matches("No visits recorded.").count(), 2);
    }

    #[test]
    fn summary_table_has_one_row_per_group() {
        let rows = vec![(patient("Ana"), summary(2, 1, 0)), (patient("Bia"), summary(0, 0, 1))];
        let table = summary_table("Patient", &rows);

        assert_eq!(table.header()[0], "Patient");
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0][6], Cell::Float(33.33));
        assert_eq!(table.rows()[1][5], Cell::Int(0));
    }

    #[test]
    fn json_summary_includes_rates() {
        let clinic = (GroupKey::Clinic, summary(1, 1, 0));
        let by_patient = vec![(patient("Ana"), summary(1, 1, 0))];
        let json = clinic_summary_json(&clinic, &by_patient, &[], 3, "now").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["clinic"]["key"]["kind"], "clinic");
        assert_eq!(value["clinic"]["no_show_rate"], 50.0);
        assert_eq!(value["rows_without_patient"], 3);
        assert_eq!(value["patients"][0]["key"]["patient"], "Ana");
        assert_eq!(value["patients"][0]["no_show"], 1);
        assert_eq!(value["patients"][0]["valid_total"], 2);
        assert!(value["procedures"].as_array().unwrap().is_empty());
    }
}
