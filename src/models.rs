use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitStatus {
    Attended,
    NoShow,
    Cancelled,
    /// Any label that matches none of the configured statuses.
    Other(String),
}

impl VisitStatus {
    pub fn label(&self) -> &str {
        match self {
            VisitStatus::Attended => "Attended",
            VisitStatus::NoShow => "No-show",
            VisitStatus::Cancelled => "Cancelled",
            VisitStatus::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitRecord {
    pub patient: String,
    pub procedure: String,
    pub status: VisitStatus,
    /// Index of the data row this record was read from.
    pub source_row: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    ByPatient,
    ByPatientProcedure,
    ByProcedure,
    WholeClinic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Patient,
    Procedure,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GroupKey {
    Patient { patient: String },
    PatientProcedure { patient: String, procedure: String },
    Procedure { procedure: String },
    Clinic,
}

impl GroupKey {
    pub fn for_record(record: &VisitRecord, group_by: GroupBy) -> Self {
        match group_by {
            GroupBy::ByPatient => GroupKey::Patient {
                patient: record.patient.clone(),
            },
            GroupBy::ByPatientProcedure => GroupKey::PatientProcedure {
                patient: record.patient.clone(),
                procedure: record.procedure.clone(),
            },
            GroupBy::ByProcedure => GroupKey::Procedure {
                procedure: record.procedure.clone(),
            },
            GroupBy::WholeClinic => GroupKey::Clinic,
        }
    }

    pub fn patient(&self) -> Option<&str> {
        match self {
            GroupKey::Patient { patient } | GroupKey::PatientProcedure { patient, .. } => {
                Some(patient.as_str())
            }
            _ => None,
        }
    }

    pub fn procedure(&self) -> Option<&str> {
        match self {
            GroupKey::Procedure { procedure } | GroupKey::PatientProcedure { procedure, .. } => {
                Some(procedure.as_str())
            }
            _ => None,
        }
    }

    fn parts(&self) -> Vec<&str> {
        match self {
            GroupKey::Patient { patient } => vec![patient.as_str()],
            GroupKey::PatientProcedure { patient, procedure } => {
                vec![patient.as_str(), procedure.as_str()]
            }
            GroupKey::Procedure { procedure } => vec![procedure.as_str()],
            GroupKey::Clinic => Vec::new(),
        }
    }

    /// Case-insensitive lexical order, falling back to the exact text so that
    /// keys differing only in case still compare deterministically.
    pub fn natural_cmp(&self, other: &GroupKey) -> Ordering {
        let lhs = self.parts();
        let rhs = other.parts();
        let folded = lhs
            .iter()
            .map(|part| part.to_lowercase())
            .cmp(rhs.iter().map(|part| part.to_lowercase()));
        folded.then_with(|| lhs.cmp(&rhs))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Patient { patient } => write!(f, "{patient}"),
            GroupKey::PatientProcedure { patient, procedure } => {
                write!(f, "{patient} / {procedure}")
            }
            GroupKey::Procedure { procedure } => write!(f, "{procedure}"),
            GroupKey::Clinic => write!(f, "Whole clinic"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub attended: usize,
    pub no_show: usize,
    pub cancelled: usize,
    /// Visits whose status matched no known label.
    pub other: usize,
}

impl AttendanceSummary {
    pub fn record(&mut self, status: &VisitStatus) {
        match status {
            VisitStatus::Attended => self.attended += 1,
            VisitStatus::NoShow => self.no_show += 1,
            VisitStatus::Cancelled => self.cancelled += 1,
            VisitStatus::Other(_) => self.other += 1,
        }
    }

    pub fn valid_total(&self) -> usize {
        self.attended + self.no_show
    }

    pub fn total(&self) -> usize {
        self.valid_total() + self.cancelled + self.other
    }

    /// Percentage of valid visits that were no-shows; 0 when there are none.
    pub fn no_show_rate(&self) -> f64 {
        let valid = self.valid_total();
        if valid == 0 {
            0.0
        } else {
            self.no_show as f64 / valid as f64 * 100.0
        }
    }
}

impl Add for AttendanceSummary {
    type Output = AttendanceSummary;

    fn add(mut self, rhs: AttendanceSummary) -> AttendanceSummary {
        self += rhs;
        self
    }
}

impl AddAssign for AttendanceSummary {
    fn add_assign(&mut self, rhs: AttendanceSummary) {
        self.attended += rhs.attended;
        self.no_show += rhs.no_show;
        self.cancelled += rhs.cancelled;
        self.other += rhs.other;
    }
}

impl Sum for AttendanceSummary {
    fn sum<I: Iterator<Item = AttendanceSummary>>(iter: I) -> Self {
        iter.fold(AttendanceSummary::default(), Add::add)
    }
}

impl<'a> Sum<&'a AttendanceSummary> for AttendanceSummary {
    fn sum<I: Iterator<Item = &'a AttendanceSummary>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    NoShowCountDesc,
    NoShowRateDesc,
}

/// Serializable view of one summarized group, used for the JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow<'a> {
    pub key: &'a GroupKey,
    #[serde(flatten)]
    pub summary: &'a AttendanceSummary,
    pub valid_total: usize,
    pub no_show_rate: f64,
}

impl<'a> SummaryRow<'a> {
    pub fn new(key: &'a GroupKey, summary: &'a AttendanceSummary) -> Self {
        Self {
            key,
            summary,
            valid_total: summary.valid_total(),
            no_show_rate: summary.no_show_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_excludes_cancelled_visits() {
        let summary = AttendanceSummary {
            attended: 1,
            no_show: 2,
            cancelled: 1,
            other: 0,
        };
        assert_eq!(summary.valid_total(), 3);
        assert!((summary.no_show_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn rate_is_zero_without_valid_visits() {
        let summary = AttendanceSummary {
            cancelled: 2,
            ..Default::default()
        };
        assert_eq!(summary.valid_total(), 0);
        assert_eq!(summary.no_show_rate(), 0.0);
    }

    #[test]
    fn summaries_add_field_by_field() {
        let a = AttendanceSummary {
            attended: 1,
            no_show: 1,
            cancelled: 0,
            other: 1,
        };
        let b = AttendanceSummary {
            attended: 2,
            no_show: 0,
            cancelled: 3,
            other: 0,
        };
        let total: AttendanceSummary = [a, b].iter().sum();
        assert_eq!(total, a + b);
        assert_eq!(total.total(), 8);
    }

    #[test]
    fn natural_order_ignores_case_first() {
        let lower = GroupKey::Patient {
            patient: "ana".to_string(),
        };
        let upper = GroupKey::Patient {
            patient: "Bruno".to_string(),
        };
        assert_eq!(lower.natural_cmp(&upper), Ordering::Less);

        let a = GroupKey::Patient {
            patient: "Ana".to_string(),
        };
        let b = GroupKey::Patient {
            patient: "ana".to_string(),
        };
        assert_eq!(a.natural_cmp(&b), Ordering::Less);
    }

    #[test]
    fn pair_keys_expose_both_parts() {
        let key = GroupKey::PatientProcedure {
            patient: "Marina Silva".to_string(),
            procedure: "Fisioterapia".to_string(),
        };
        assert_eq!(key.patient(), Some("Marina Silva"));
        assert_eq!(key.procedure(), Some("Fisioterapia"));
        assert_eq!(key.to_string(), "Marina Silva / Fisioterapia");
        assert_eq!(GroupKey::Clinic.patient(), None);
    }
}
