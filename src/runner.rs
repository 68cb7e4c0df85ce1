//! Report jobs.
//!
//! Each job aggregates the loaded records and hands the resulting artifacts
//! to a [`ReportSink`]. A failed write is logged and counted; it never stops
//! the remaining artifacts or patients.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{error, info, warn};

use crate::aggregate::{self, filter_by_patient, filter_by_procedure, summarize, unique_values};
use crate::config::Config;
use crate::error::{AttendanceError, Result};
use crate::models::{
    AttendanceSummary, GroupBy, GroupKey, RecordField, SortOrder, VisitRecord, VisitStatus,
};
use crate::report;
use crate::sink::{ChartSlice, ReportSink};
use crate::source::Table;

const FALLBACK_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Outcome of a job: artifacts saved, artifacts that failed and patients
/// that had to be skipped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub written: usize,
    pub failed: usize,
    pub skipped_patients: Vec<String>,
}

impl RunSummary {
    fn track(&mut self, what: &str, path: &Path, result: Result<()>) {
        match result {
            Ok(()) => {
                self.written += 1;
                info!(path = %path.display(), "{what} saved");
            }
            Err(err) => {
                self.failed += 1;
                error!("{what} not saved: {err}");
            }
        }
    }
}

pub fn format_timestamp(at: NaiveDateTime, format: &str) -> String {
    let mut output = String::new();
    if write!(output, "{}", at.format(format)).is_err() {
        warn!(format, "invalid timestamp format, using default");
        output = at.format(FALLBACK_TIMESTAMP_FORMAT).to_string();
    }
    output
}

/// Lowercase name with spaces replaced by underscores.
pub fn patient_slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Like [`patient_slug`], after dropping characters that are not allowed in
/// file names.
pub fn procedure_slug(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|ch| !matches!(ch, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect();
    patient_slug(&kept)
}

fn chart_slices(summary: &AttendanceSummary) -> Vec<ChartSlice> {
    vec![
        ChartSlice::new(VisitStatus::Attended, summary.attended),
        ChartSlice::new(VisitStatus::NoShow, summary.no_show),
        ChartSlice::new(VisitStatus::Cancelled, summary.cancelled),
    ]
}

fn source_rows(records: &[VisitRecord]) -> Vec<usize> {
    records.iter().map(|record| record.source_row).collect()
}

pub struct ReportJob<'a, S: ReportSink> {
    sink: &'a mut S,
    config: &'a Config,
    table: &'a Table,
    records: &'a [VisitRecord],
    generated_at: String,
    outcome: RunSummary,
}

impl<'a, S: ReportSink> ReportJob<'a, S> {
    pub fn new(
        sink: &'a mut S,
        config: &'a Config,
        table: &'a Table,
        records: &'a [VisitRecord],
        generated_at: String,
    ) -> Self {
        Self {
            sink,
            config,
            table,
            records,
            generated_at,
            outcome: RunSummary::default(),
        }
    }

    pub fn finish(self) -> RunSummary {
        self.outcome
    }

    fn save_text(&mut self, what: &str, path: PathBuf, content: &str) {
        let result = self.sink.write_text(&path, content);
        self.outcome.track(what, &path, result);
    }

    fn save_rows(&mut self, what: &str, path: PathBuf, records: &[VisitRecord]) {
        let rows = self.table.select_rows(&source_rows(records));
        let result = self.sink.write_table(&path, &rows, None);
        self.outcome.track(what, &path, result);
    }

    fn save_chart(&mut self, path: PathBuf, title: &str, summary: &AttendanceSummary) {
        if summary.valid_total() == 0 {
            return;
        }
        let result = self.sink.write_chart(&path, title, &chart_slices(summary));
        self.outcome.track("chart", &path, result);
    }

    /// Single-patient report: the patient's rows as a spreadsheet plus a pie
    /// chart. Returns the patient's overall counts.
    pub fn patient_report(&mut self, name: &str) -> Result<AttendanceSummary> {
        let visits = filter_by_patient(self.records, name);
        if visits.is_empty() {
            return Err(AttendanceError::PatientNotFound(name.to_string()));
        }

        let summary = aggregate::total(&summarize(&visits, GroupBy::ByPatient));
        let slug = patient_slug(name);
        let reports_dir = &self.config.paths.reports_dir;
        let charts_dir = &self.config.paths.charts_dir;
        let table_path = reports_dir.join(format!("report_{slug}.xlsx"));
        let chart_path = charts_dir.join(format!("chart_{slug}.xlsx"));

        self.save_rows("spreadsheet report", table_path, &visits);
        self.save_chart(chart_path, &format!("Visit summary for\n{name}"), &summary);

        Ok(summary)
    }

    /// Full kit for one patient: per procedure a text report, a spreadsheet
    /// and a chart, then a master report with the overall totals.
    pub fn patient_kit(&mut self, name: &str) -> Result<AttendanceSummary> {
        let visits = filter_by_patient(self.records, name);
        if visits.is_empty() {
            return Err(AttendanceError::PatientNotFound(name.to_string()));
        }

        let slug = patient_slug(name);
        let reports_dir = self.config.paths.reports_dir.join(&slug);
        let charts_dir = self.config.paths.charts_dir.join(&slug);

        let by_procedure = summarize(&visits, GroupBy::ByPatientProcedure);
        let mut sections = Vec::with_capacity(by_procedure.len());

        for (group, summary) in &by_procedure {
            let procedure = group.procedure().unwrap_or_default();
            let file_stem = procedure_slug(procedure);
            let section =
                report::procedure_report(name, procedure, summary, &self.generated_at);

            self.save_text(
                "procedure report",
                reports_dir.join(format!("report_{file_stem}.txt")),
                &section,
            );
            self.save_rows(
                "procedure spreadsheet",
                reports_dir.join(format!("report_{file_stem}.xlsx")),
                &filter_by_procedure(&visits, procedure),
            );
            self.save_chart(
                charts_dir.join(format!("chart_{file_stem}.xlsx")),
                &format!("Summary of: {procedure}\nPatient: {name}"),
                summary,
            );

            sections.push(section);
        }

        let total = aggregate::total(&by_procedure);
        let master = report::patient_master_report(name, &total, &sections, &self.generated_at);
        self.save_text(
            "patient summary",
            reports_dir.join(format!("summary_{slug}.txt")),
            &master,
        );

        Ok(total)
    }

    /// Runs [`Self::patient_kit`] for every patient in first-seen order.
    pub fn individual_reports(&mut self) {
        let patients = unique_values(self.records, RecordField::Patient);
        let procedures = unique_values(self.records, RecordField::Procedure);
        info!(
            "found {} distinct patients across {} procedures",
            patients.len(),
            procedures.len()
        );

        for patient in patients {
            match self.patient_kit(&patient) {
                Ok(total) => info!(
                    patient = %patient,
                    no_show_rate = total.no_show_rate(),
                    "patient kit finished"
                ),
                Err(err) => {
                    warn!("{err}, skipping");
                    self.outcome.skipped_patients.push(patient);
                }
            }
        }
    }

    /// Clinic-wide text report, a three-sheet workbook and, when enabled, a
    /// JSON summary.
    pub fn consolidated_report(&mut self) -> AttendanceSummary {
        let dir = self.config.consolidated_dir();

        let by_pair = summarize(self.records, GroupBy::ByPatientProcedure);
        let clinic = aggregate::regroup(&by_pair, GroupBy::WholeClinic)
            .into_iter()
            .next()
            .unwrap_or((GroupKey::Clinic, AttendanceSummary::default()));

        let mut by_patient = aggregate::regroup(&by_pair, GroupBy::ByPatient);
        aggregate::sort_summaries(&mut by_patient, SortOrder::NoShowCountDesc);
        let mut by_procedure = aggregate::regroup(&by_pair, GroupBy::ByProcedure);
        aggregate::sort_summaries(&mut by_procedure, SortOrder::NoShowRateDesc);

        let unnamed = self.table.count_blank(&self.config.columns.patient);
        if unnamed > 0 {
            warn!(rows = unnamed, "rows without a patient left out of the clinic totals");
        }
        let text = report::clinic_report(
            &clinic.1,
            &by_patient,
            &by_procedure,
            unnamed,
            &self.generated_at,
        );
        self.save_text(
            "consolidated report",
            dir.join("consolidated_report.txt"),
            &text,
        );

        let patient_sheet = report::summary_table(&self.config.columns.patient, &by_patient);
        let procedure_sheet = report::summary_table(&self.config.columns.procedure, &by_procedure);
        let workbook_path = dir.join("consolidated_report.xlsx");
        let result = self.sink.write_workbook(
            &workbook_path,
            &[
                ("Summary_by_Patient", &patient_sheet),
                ("Summary_by_Procedure", &procedure_sheet),
                ("Full_Data", self.table),
            ],
        );
        self.outcome.track("consolidated workbook", &workbook_path, result);

        if self.config.output.json_summary {
            let json_path = dir.join("summary.json");
            let stamp = self.generated_at.as_str();
            match report::clinic_summary_json(&clinic, &by_patient, &by_procedure, unnamed, stamp) {
                Ok(json) => self.save_text("JSON summary", json_path, &json),
                Err(err) => {
                    let result = Err(AttendanceError::write_failure(&json_path, err));
                    self.outcome.track("JSON summary", &json_path, result);
                }
            }
        }

        clinic.1
    }
}
