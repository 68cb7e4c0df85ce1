//! Configuration file handling.
//!
//! Column names, status labels and output locations live in an
//! `attendance.toml` file. Every field has a default matching the clinic
//! management export, so the file is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AttendanceError, Result};
use crate::models::VisitStatus;

pub const DEFAULT_CONFIG_FILE: &str = "attendance.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub columns: ColumnConfig,

    #[serde(default)]
    pub statuses: StatusConfig,

    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Spreadsheet header names mapped onto visit record fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    #[serde(default = "default_patient_column")]
    pub patient: String,

    #[serde(default = "default_procedure_column")]
    pub procedure: String,

    #[serde(default = "default_status_column")]
    pub status: String,

    /// Column removed by the clean stage.
    #[serde(default = "default_scheduled_at_column")]
    pub scheduled_at: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            patient: default_patient_column(),
            procedure: default_procedure_column(),
            status: default_status_column(),
            scheduled_at: default_scheduled_at_column(),
        }
    }
}

fn default_patient_column() -> String {
    "Paciente".to_string()
}

fn default_procedure_column() -> String {
    "Procedimento".to_string()
}

fn default_status_column() -> String {
    "Status".to_string()
}

fn default_scheduled_at_column() -> String {
    "Data e Hora agendada".to_string()
}

/// Raw status labels as they appear in the export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_attended")]
    pub attended: String,

    #[serde(default = "default_no_show")]
    pub no_show: String,

    #[serde(default = "default_cancelled")]
    pub cancelled: String,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            attended: default_attended(),
            no_show: default_no_show(),
            cancelled: default_cancelled(),
        }
    }
}

fn default_attended() -> String {
    "Finalizado".to_string()
}

fn default_no_show() -> String {
    "Ncompareceu".to_string()
}

fn default_cancelled() -> String {
    "Cancelado".to_string()
}

impl StatusConfig {
    /// Exact, case-sensitive match against the configured labels.
    pub fn classify(&self, raw: &str) -> VisitStatus {
        if raw == self.attended {
            VisitStatus::Attended
        } else if raw == self.no_show {
            VisitStatus::NoShow
        } else if raw == self.cancelled {
            VisitStatus::Cancelled
        } else {
            VisitStatus::Other(raw.to_string())
        }
    }
}

/// Input files and output directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Raw export read by the clean stage.
    #[serde(default = "default_raw_input")]
    pub raw_input: PathBuf,

    /// Cleaned table read by the report commands.
    #[serde(default = "default_input")]
    pub input: PathBuf,

    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,

    #[serde(default = "default_charts_dir")]
    pub charts_dir: PathBuf,

    /// Folder under `reports_dir` holding the clinic-wide report.
    #[serde(default = "default_consolidated_dir")]
    pub consolidated_dir: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            raw_input: default_raw_input(),
            input: default_input(),
            reports_dir: default_reports_dir(),
            charts_dir: default_charts_dir(),
            consolidated_dir: default_consolidated_dir(),
        }
    }
}

fn default_raw_input() -> PathBuf {
    PathBuf::from("raw_export.xlsx")
}

fn default_input() -> PathBuf {
    PathBuf::from("clean_data.xlsx")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_charts_dir() -> PathBuf {
    PathBuf::from("charts")
}

fn default_consolidated_dir() -> String {
    "clinic_totals".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Reject rows whose status matches none of the known labels instead of
    /// silently leaving them out of the counts.
    #[serde(default)]
    pub strict_status: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Write `summary.json` next to the consolidated report.
    #[serde(default = "default_true")]
    pub json_summary: bool,

    /// chrono format string for the "generated at" line.
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_summary: true,
            timestamp_format: default_timestamp_format(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timestamp_format() -> String {
    "%d/%m/%Y %H:%M".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| AttendanceError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

        toml::from_str(&content).map_err(|err| AttendanceError::Config {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    /// Load `path` when given, otherwise `attendance.toml` if it exists,
    /// otherwise the built-in defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }

    pub fn consolidated_dir(&self) -> PathBuf {
        self.paths.reports_dir.join(&self.paths.consolidated_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_clinic_export() {
        let config = Config::default();
        assert_eq!(config.columns.patient, "Paciente");
        assert_eq!(config.columns.scheduled_at, "Data e Hora agendada");
        assert_eq!(config.statuses.no_show, "Ncompareceu");
        assert!(!config.analysis.strict_status);
        assert!(config.output.json_summary);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let content = r#"
[columns]
patient = "Patient"

[statuses]
attended = "Done"

[analysis]
strict_status = true
"#;

        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.columns.patient, "Patient");
        assert_eq!(config.columns.status, "Status");
        assert_eq!(config.statuses.attended, "Done");
        assert_eq!(config.statuses.cancelled, "Cancelado");
        assert!(config.analysis.strict_status);
        assert_eq!(config.paths.reports_dir, PathBuf::from("reports"));
    }

    #[test]
    fn classify_is_exact_and_case_sensitive() {
        let statuses = StatusConfig::default();
        assert_eq!(statuses.classify("Finalizado"), VisitStatus::Attended);
        assert_eq!(statuses.classify("Ncompareceu"), VisitStatus::NoShow);
        assert_eq!(statuses.classify("Cancelado"), VisitStatus::Cancelled);
        assert_eq!(
            statuses.classify("finalizado"),
            VisitStatus::Other("finalizado".to_string())
        );
    }

    #[test]
    fn default_toml_round_trips() {
        let rendered = Config::default_toml();
        assert!(rendered.contains("[columns]"));
        assert!(rendered.contains("[paths]"));
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.paths.consolidated_dir, "clinic_totals");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::load(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(matches!(err, AttendanceError::Config { .. }));
    }
}
