use std::collections::{HashMap, HashSet};

use crate::models::{AttendanceSummary, GroupBy, GroupKey, RecordField, SortOrder, VisitRecord};

/// Groups in first-appearance order.
#[derive(Default)]
struct Groups {
    positions: HashMap<GroupKey, usize>,
    rows: Vec<(GroupKey, AttendanceSummary)>,
}

impl Groups {
    fn entry(&mut self, key: GroupKey) -> &mut AttendanceSummary {
        let index = match self.positions.get(&key) {
            Some(index) => *index,
            None => {
                let index = self.rows.len();
                self.positions.insert(key.clone(), index);
                self.rows.push((key, AttendanceSummary::default()));
                index
            }
        };
        &mut self.rows[index].1
    }

    fn finish(mut self, group_by: GroupBy) -> Vec<(GroupKey, AttendanceSummary)> {
        if self.rows.is_empty() && group_by == GroupBy::WholeClinic {
            self.rows.push((GroupKey::Clinic, AttendanceSummary::default()));
        }
        self.rows
    }
}

/// Counts attended, no-show, cancelled and unrecognized visits per group.
///
/// Groups come back in the order their first record appears. A clinic-wide
/// summary always yields exactly one row, even for an empty input.
pub fn summarize(
    records: &[VisitRecord],
    group_by: GroupBy,
) -> Vec<(GroupKey, AttendanceSummary)> {
    let mut groups = Groups::default();
    for record in records {
        groups
            .entry(GroupKey::for_record(record, group_by))
            .record(&record.status);
    }
    groups.finish(group_by)
}

/// Folds already summarized groups into a coarser grouping, e.g. patient and
/// procedure pairs into patients. Rows whose key lacks the requested
/// dimension are left out.
pub fn regroup(
    rows: &[(GroupKey, AttendanceSummary)],
    group_by: GroupBy,
) -> Vec<(GroupKey, AttendanceSummary)> {
    let mut groups = Groups::default();
    for (key, summary) in rows {
        let target = match group_by {
            GroupBy::ByPatient => key.patient().map(|patient| GroupKey::Patient {
                patient: patient.to_string(),
            }),
            GroupBy::ByProcedure => key.procedure().map(|procedure| GroupKey::Procedure {
                procedure: procedure.to_string(),
            }),
            GroupBy::ByPatientProcedure => {
                key.patient()
                    .zip(key.procedure())
                    .map(|(patient, procedure)| GroupKey::PatientProcedure {
                        patient: patient.to_string(),
                        procedure: procedure.to_string(),
                    })
            }
            GroupBy::WholeClinic => Some(GroupKey::Clinic),
        };
        if let Some(target) = target {
            *groups.entry(target) += *summary;
        }
    }
    groups.finish(group_by)
}

pub fn sort_summaries(rows: &mut [(GroupKey, AttendanceSummary)], order: SortOrder) {
    match order {
        SortOrder::NoShowCountDesc => rows.sort_by(|a, b| {
            b.1.no_show
                .cmp(&a.1.no_show)
                .then_with(|| a.0.natural_cmp(&b.0))
        }),
        SortOrder::NoShowRateDesc => rows.sort_by(|a, b| {
            b.1.no_show_rate()
                .total_cmp(&a.1.no_show_rate())
                .then_with(|| a.0.natural_cmp(&b.0))
        }),
    }
}

pub fn total(rows: &[(GroupKey, AttendanceSummary)]) -> AttendanceSummary {
    rows.iter().map(|(_, summary)| summary).sum()
}

pub fn filter_by_patient(records: &[VisitRecord], name: &str) -> Vec<VisitRecord> {
    records
        .iter()
        .filter(|record| record.patient == name)
        .cloned()
        .collect()
}

pub fn filter_by_procedure(records: &[VisitRecord], procedure: &str) -> Vec<VisitRecord> {
    records
        .iter()
        .filter(|record| record.procedure == procedure)
        .cloned()
        .collect()
}

/// Distinct values of `field`, in the order they first appear.
pub fn unique_values(records: &[VisitRecord], field: RecordField) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut values = Vec::new();

    for record in records {
        let value = match field {
            RecordField::Patient => record.patient.as_str(),
            RecordField::Procedure => record.procedure.as_str(),
        };
        if seen.insert(value) {
            values.push(value.to_string());
        }
    }

    values
}
