use crate::ingest::Snapshot;
use crate::reconcile::ReconcileAudit;
use crate::types::{
    ActivityRecord, RecordRow, ResolvedSlot, SlotRow, SourceKind, Status, StatusSummary, SummaryStats,
};
use crate::util::format_number;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Filter selections, all optional and combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Matched by containment, e.g. `"II"` against `"II (16.00 - 00.00)"`.
    pub shift: Option<String>,
    /// Exact terminal names. Empty means no restriction.
    pub terminals: BTreeSet<String>,
}

impl FilterCriteria {
    /// Single-day range, the dashboard's starting view.
    pub fn for_day(day: NaiveDate) -> Self {
        Self {
            start_date: Some(day),
            end_date: Some(day),
            ..Self::default()
        }
    }

    pub fn matches(&self, r: &ActivityRecord) -> bool {
        if self.start_date.is_some() || self.end_date.is_some() {
            let Some(date) = r.date else {
                return false;
            };
            if self.start_date.is_some_and(|s| date < s) || self.end_date.is_some_and(|e| date > e) {
                return false;
            }
        }
        if let Some(shift) = self.shift.as_deref().filter(|s| !s.is_empty()) {
            if !r.shift.contains(shift) {
                return false;
            }
        }
        self.terminals.is_empty() || self.terminals.contains(&r.terminal)
    }
}

pub fn filter(records: &[ActivityRecord], criteria: &FilterCriteria) -> Vec<ActivityRecord> {
    records.iter().filter(|r| criteria.matches(r)).cloned().collect()
}

/// Count delay/on-schedule records. Records without derived metrics count
/// toward neither.
pub fn summarize(records: &[ActivityRecord]) -> StatusSummary {
    let mut summary = StatusSummary::default();
    for r in records {
        match r.status() {
            Some(Status::Delay) => summary.delay_count += 1,
            Some(Status::OnSchedule) => summary.on_schedule_count += 1,
            None => {}
        }
    }
    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    Date,
    Terminal,
    Shift,
    VesselName,
    Berth,
    PlannedTonnage,
    ActualTonnage,
    PlannedShiftCount,
    ActualShiftCount,
    TotalTarget,
    Balance,
    Status,
}

impl SortKey {
    pub const ALL: [SortKey; 12] = [
        SortKey::Date,
        SortKey::Terminal,
        SortKey::Shift,
        SortKey::VesselName,
        SortKey::Berth,
        SortKey::PlannedTonnage,
        SortKey::ActualTonnage,
        SortKey::PlannedShiftCount,
        SortKey::ActualShiftCount,
        SortKey::TotalTarget,
        SortKey::Balance,
        SortKey::Status,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

// Runtime-typed sort value. Values of different kinds order by kind
// (text, number, day) and missing values always sort last.
#[derive(Debug)]
enum SortValue<'a> {
    Text(&'a str),
    Number(f64),
    Day(NaiveDate),
    Missing,
}

impl SortValue<'_> {
    fn rank(&self) -> u8 {
        match self {
            SortValue::Text(_) => 0,
            SortValue::Number(_) => 1,
            SortValue::Day(_) => 2,
            SortValue::Missing => 3,
        }
    }
}

fn sort_value(r: &ActivityRecord, key: SortKey) -> SortValue<'_> {
    match key {
        SortKey::Date => r.date.map_or(SortValue::Missing, SortValue::Day),
        SortKey::Terminal => SortValue::Text(&r.terminal),
        SortKey::Shift => SortValue::Text(&r.shift),
        SortKey::VesselName => SortValue::Text(&r.vessel_name),
        SortKey::Berth => SortValue::Text(&r.berth_token),
        SortKey::PlannedTonnage => SortValue::Number(r.planned_tonnage),
        SortKey::ActualTonnage => SortValue::Number(r.actual_tonnage),
        SortKey::PlannedShiftCount => SortValue::Number(r.planned_shift_count),
        SortKey::ActualShiftCount => SortValue::Number(r.actual_shift_count),
        SortKey::TotalTarget => r
            .metrics
            .map_or(SortValue::Missing, |m| SortValue::Number(m.total_target)),
        SortKey::Balance => SortValue::Number(r.balance()),
        SortKey::Status => match r.status() {
            Some(Status::OnSchedule) => SortValue::Text("ON SCHEDULE"),
            Some(Status::Delay) => SortValue::Text("DELAY"),
            None => SortValue::Missing,
        },
    }
}

fn compare(a: &SortValue<'_>, b: &SortValue<'_>, direction: SortDirection) -> Ordering {
    let ord = match (a, b) {
        (SortValue::Text(x), SortValue::Text(y)) => x.cmp(y),
        (SortValue::Number(x), SortValue::Number(y)) => x.total_cmp(y),
        (SortValue::Day(x), SortValue::Day(y)) => x.cmp(y),
        _ => a.rank().cmp(&b.rank()),
    };
    let has_missing = matches!(a, SortValue::Missing) || matches!(b, SortValue::Missing);
    match direction {
        SortDirection::Descending if !has_missing => ord.reverse(),
        _ => ord,
    }
}

/// Stable sort; records comparing equal keep their relative order.
pub fn sort_records(records: &mut [ActivityRecord], key: SortKey, direction: SortDirection) {
    records.sort_by(|a, b| compare(&sort_value(a, key), &sort_value(b, key), direction));
}

pub fn record_rows(records: &[ActivityRecord]) -> Vec<RecordRow> {
    records
        .iter()
        .map(|r| RecordRow {
            date: r.date.map(|d| d.to_string()).unwrap_or_default(),
            terminal: r.terminal.clone(),
            shift: r.shift.clone(),
            vessel_name: r.vessel_name.clone(),
            berth: r.berth_token.clone(),
            throughput_rate: r.throughput_rate.clone(),
            achievement: r.achievement.clone(),
            planned_tonnage: format_number(r.planned_tonnage, 2),
            actual_tonnage: format_number(r.actual_tonnage, 2),
            planned_shift_count: format_number(r.planned_shift_count, 2),
            actual_shift_count: format_number(r.actual_shift_count, 2),
            total_target: r
                .metrics
                .map(|m| format_number(m.total_target, 2))
                .unwrap_or_default(),
            balance: format_number(r.balance(), 2),
            status: r.status().map(|s| s.to_string()).unwrap_or_default(),
            source: r.source_kind.to_string(),
        })
        .collect()
}

pub fn slot_rows(slots: &[ResolvedSlot]) -> Vec<SlotRow> {
    slots
        .iter()
        .map(|s| match &s.occupant {
            Some(o) => SlotRow {
                slot: s.slot.id,
                position: s.slot.position.to_string(),
                vessel_name: o.vessel_name.clone(),
                planned_tonnage: format_number(o.planned_tonnage, 2),
                planned_shift_count: format_number(o.planned_shift_count, 2),
                status: o.metrics.map(|m| m.status.to_string()).unwrap_or_default(),
                candidates: s.candidate_count,
            },
            None => SlotRow {
                slot: s.slot.id,
                position: s.slot.position.to_string(),
                vessel_name: "N/A".to_string(),
                planned_tonnage: String::new(),
                planned_shift_count: String::new(),
                status: String::new(),
                candidates: 0,
            },
        })
        .collect()
}

pub fn generate_summary(
    snapshot: &Snapshot,
    filtered: &[ActivityRecord],
    slots: &[ResolvedSlot],
    audit: &ReconcileAudit,
) -> SummaryStats {
    let counts = summarize(filtered);
    let from = |kind: SourceKind| filtered.iter().filter(|r| r.source_kind == kind).count();
    SummaryStats {
        total_records: filtered.len(),
        document_store_records: from(SourceKind::DocumentStore),
        tabular_export_records: from(SourceKind::TabularExport),
        dropped_records: snapshot.reports.iter().map(|r| r.dropped_rows).sum(),
        delay_count: counts.delay_count,
        on_schedule_count: counts.on_schedule_count,
        occupied_slots: slots.iter().filter(|s| s.occupant.is_some()).count(),
        reconciliation_ties: audit.tied_slots.len(),
        vessels_in_multiple_slots: audit.vessels_in_multiple_slots.len(),
        failed_sources: snapshot.failures.iter().map(|f| f.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::attach_metrics;

    fn record(vessel: &str, terminal: &str, shift: &str, day: u32, actual: f64) -> ActivityRecord {
        ActivityRecord {
            source_kind: SourceKind::TabularExport,
            date: NaiveDate::from_ymd_opt(2025, 11, day),
            timestamp: None,
            terminal: terminal.into(),
            berth_token: String::new(),
            shift: shift.into(),
            vessel_name: vessel.into(),
            planned_tonnage: 1000.0,
            actual_tonnage: actual,
            planned_shift_count: 4.0,
            actual_shift_count: 2.0,
            throughput_rate: String::new(),
            achievement: String::new(),
            remark: String::new(),
            attachments: Vec::new(),
            metrics: None,
        }
    }

    fn sample() -> Vec<ActivityRecord> {
        let mut rs = vec![
            record("MV A", "Jamrud Utara", "I (08.00 - 16.00)", 3, 600.0),
            record("MV B", "Nilam", "II (16.00 - 00.00)", 4, 100.0),
            record("MV C", "Mirah", "III (00.00 - 08.00)", 5, 900.0),
            record("MV D", "Jamrud Utara", "II (16.00 - 00.00)", 6, 200.0),
        ];
        attach_metrics(&mut rs);
        rs
    }

    fn names(rs: &[ActivityRecord]) -> Vec<&str> {
        rs.iter().map(|r| r.vessel_name.as_str()).collect()
    }

    #[test]
    fn empty_terminal_set_means_all() {
        let rs = sample();
        assert_eq!(filter(&rs, &FilterCriteria::default()), rs);
    }

    #[test]
    fn terminal_set_is_exact() {
        let rs = sample();
        let c = FilterCriteria {
            terminals: ["Jamrud Utara".to_string()].into(),
            ..Default::default()
        };
        assert_eq!(names(&filter(&rs, &c)), vec!["MV A", "MV D"]);

        let c = FilterCriteria {
            terminals: ["Jamrud".to_string()].into(),
            ..Default::default()
        };
        assert!(filter(&rs, &c).is_empty());
    }

    #[test]
    fn date_range_is_inclusive() {
        let rs = sample();
        let c = FilterCriteria {
            start_date: NaiveDate::from_ymd_opt(2025, 11, 4),
            end_date: NaiveDate::from_ymd_opt(2025, 11, 5),
            ..Default::default()
        };
        assert_eq!(names(&filter(&rs, &c)), vec!["MV B", "MV C"]);
        assert_eq!(
            names(&filter(&rs, &FilterCriteria::for_day(NaiveDate::from_ymd_opt(2025, 11, 6).unwrap()))),
            vec!["MV D"]
        );
    }

    #[test]
    fn undated_records_fall_outside_any_range() {
        let mut r = record("MV X", "Nilam", "I", 3, 0.0);
        r.date = None;
        let c = FilterCriteria::for_day(NaiveDate::from_ymd_opt(2025, 11, 3).unwrap());
        assert!(!c.matches(&r));
        assert!(FilterCriteria::default().matches(&r));
    }

    #[test]
    fn shift_is_containment() {
        let rs = sample();
        let c = FilterCriteria {
            shift: Some("II".into()),
            ..Default::default()
        };
        // "III" contains "II" as well
        assert_eq!(names(&filter(&rs, &c)), vec!["MV B", "MV C", "MV D"]);
    }

    #[test]
    fn criteria_combine() {
        let rs = sample();
        let c = FilterCriteria {
            shift: Some("II".into()),
            terminals: ["Jamrud Utara".to_string()].into(),
            ..Default::default()
        };
        assert_eq!(names(&filter(&rs, &c)), vec!["MV D"]);
    }

    #[test]
    fn summary_counts_and_skips_underived() {
        let mut rs = sample();
        let s = summarize(&rs);
        assert_eq!(s.on_schedule_count, 2);
        assert_eq!(s.delay_count, 2);

        rs[0].metrics = None;
        let s = summarize(&rs);
        assert_eq!(s.on_schedule_count + s.delay_count, 3);
    }

    #[test]
    fn sorting_is_stable_and_directional() {
        let mut rs = sample();
        sort_records(&mut rs, SortKey::ActualTonnage, SortDirection::Descending);
        assert_eq!(names(&rs), vec!["MV C", "MV A", "MV D", "MV B"]);

        // A and D share a terminal and keep their relative order.
        let mut rs = sample();
        sort_records(&mut rs, SortKey::Terminal, SortDirection::Ascending);
        assert_eq!(names(&rs), vec!["MV A", "MV D", "MV C", "MV B"]);

        let mut rs = sample();
        sort_records(&mut rs, SortKey::Status, SortDirection::Ascending);
        assert_eq!(names(&rs), vec!["MV B", "MV D", "MV A", "MV C"]);
    }

    #[test]
    fn missing_values_sort_last_in_both_directions() {
        let mut rs: Vec<ActivityRecord> = (0..40u32)
            .map(|i| {
                let mut r = record(&format!("MV {}", i), "Nilam", "I", i * 7 % 28 + 1, f64::from(i));
                if i % 4 == 0 {
                    r.date = None;
                }
                if i % 3 != 0 {
                    r.metrics = Some(crate::metrics::derive_metrics(&r));
                }
                r
            })
            .collect();

        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            sort_records(&mut rs, SortKey::Date, direction);
            let dated: Vec<NaiveDate> = rs.iter().map_while(|r| r.date).collect();
            assert_eq!(dated.len(), 30);
            assert!(rs[30..].iter().all(|r| r.date.is_none()));
            let in_order = dated.windows(2).all(|w| match direction {
                SortDirection::Ascending => w[0] <= w[1],
                SortDirection::Descending => w[0] >= w[1],
            });
            assert!(in_order);

            sort_records(&mut rs, SortKey::TotalTarget, direction);
            let with_metrics = rs.iter().take_while(|r| r.metrics.is_some()).count();
            assert_eq!(with_metrics, 26);
            assert!(rs[26..].iter().all(|r| r.metrics.is_none()));
        }
    }

    #[test]
    fn rows_render_derived_fields() {
        let rows = record_rows(&sample());
        assert_eq!(rows[0].total_target, "500.00");
        assert_eq!(rows[0].balance, "400.00");
        assert_eq!(rows[0].status, "ON SCHEDULE");
        assert_eq!(rows[0].date, "2025-11-03");
    }
}
