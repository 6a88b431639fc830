use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// Where a record came from. Set once by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    DocumentStore,
    TabularExport,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::DocumentStore => write!(f, "document store"),
            SourceKind::TabularExport => write!(f, "tabular export"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    #[serde(rename = "ON SCHEDULE")]
    OnSchedule,
    #[serde(rename = "DELAY")]
    Delay,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::OnSchedule => write!(f, "ON SCHEDULE"),
            Status::Delay => write!(f, "DELAY"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    pub target_per_shift: f64,
    pub total_target: f64,
    pub status: Status,
    pub balance: f64,
}

/// One shift-activity report for one vessel, in canonical shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub source_kind: SourceKind,
    /// Local calendar date the activity is attributed to. `None` when the
    /// source value did not parse.
    pub date: Option<NaiveDate>,
    /// Creation/submission time, only used for recency. `None` sorts as epoch start.
    pub timestamp: Option<NaiveDateTime>,
    pub terminal: String,
    pub berth_token: String,
    pub shift: String,
    pub vessel_name: String,
    pub planned_tonnage: f64,
    pub actual_tonnage: f64,
    pub planned_shift_count: f64,
    pub actual_shift_count: f64,
    pub throughput_rate: String,
    pub achievement: String,
    pub remark: String,
    pub attachments: Vec<String>,
    /// Filled in by `metrics::attach_metrics`.
    pub metrics: Option<Metrics>,
}

impl ActivityRecord {
    pub fn status(&self) -> Option<Status> {
        self.metrics.map(|m| m.status)
    }

    pub fn balance(&self) -> f64 {
        self.planned_tonnage - self.actual_tonnage
    }
}

/// Layout placement of a slot on the quay diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionTag {
    Top,
    Left,
    Bottom,
}

impl fmt::Display for PositionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionTag::Top => write!(f, "top"),
            PositionTag::Left => write!(f, "left"),
            PositionTag::Bottom => write!(f, "bottom"),
        }
    }
}

/// Which side of the quay a slot belongs to. Terminal names are matched
/// against the group's keywords, case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminalGroup {
    North,
    South,
}

impl TerminalGroup {
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            TerminalGroup::North => &["utara", "north"],
            TerminalGroup::South => &["selatan", "south"],
        }
    }

    pub fn accepts(self, terminal: &str) -> bool {
        let terminal = terminal.to_lowercase();
        self.keywords().iter().any(|k| terminal.contains(k))
    }
}

/// A fixed physical mooring position. The set is static configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BerthSlot {
    pub id: u32,
    pub position: PositionTag,
    pub group: TerminalGroup,
}

impl BerthSlot {
    pub fn new(id: u32, position: PositionTag, group: TerminalGroup) -> Self {
        Self { id, position, group }
    }

    pub fn accepts_terminal(&self, terminal: &str) -> bool {
        self.group.accepts(terminal)
    }
}

/// Fields carried from the winning record into a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Occupant {
    pub vessel_name: String,
    pub terminal: String,
    pub berth_token: String,
    pub source_kind: SourceKind,
    pub timestamp: Option<NaiveDateTime>,
    pub planned_tonnage: f64,
    pub planned_shift_count: f64,
    pub metrics: Option<Metrics>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSlot {
    pub slot: BerthSlot,
    /// `None` means unoccupied.
    pub occupant: Option<Occupant>,
    pub candidate_count: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RecordRow {
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Terminal")]
    #[tabled(rename = "Terminal")]
    pub terminal: String,
    #[serde(rename = "Shift")]
    #[tabled(rename = "Shift")]
    pub shift: String,
    #[serde(rename = "Vessel")]
    #[tabled(rename = "Vessel")]
    pub vessel_name: String,
    #[serde(rename = "Berth")]
    #[tabled(rename = "Berth")]
    pub berth: String,
    #[serde(rename = "ThroughputRate")]
    #[tabled(rename = "ThroughputRate")]
    pub throughput_rate: String,
    #[serde(rename = "Achievement")]
    #[tabled(rename = "Achievement")]
    pub achievement: String,
    #[serde(rename = "PlannedTonnage")]
    #[tabled(rename = "PlannedTonnage")]
    pub planned_tonnage: String,
    #[serde(rename = "ActualTonnage")]
    #[tabled(rename = "ActualTonnage")]
    pub actual_tonnage: String,
    #[serde(rename = "PlannedShifts")]
    #[tabled(rename = "PlannedShifts")]
    pub planned_shift_count: String,
    #[serde(rename = "ActualShifts")]
    #[tabled(rename = "ActualShifts")]
    pub actual_shift_count: String,
    #[serde(rename = "TotalTarget")]
    #[tabled(rename = "TotalTarget")]
    pub total_target: String,
    #[serde(rename = "Balance")]
    #[tabled(rename = "Balance")]
    pub balance: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "Source")]
    #[tabled(rename = "Source")]
    pub source: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct SlotRow {
    #[serde(rename = "Slot")]
    #[tabled(rename = "Slot")]
    pub slot: u32,
    #[serde(rename = "Position")]
    #[tabled(rename = "Position")]
    pub position: String,
    #[serde(rename = "Vessel")]
    #[tabled(rename = "Vessel")]
    pub vessel_name: String,
    #[serde(rename = "PlannedTonnage")]
    #[tabled(rename = "PlannedTonnage")]
    pub planned_tonnage: String,
    #[serde(rename = "PlannedShifts")]
    #[tabled(rename = "PlannedShifts")]
    pub planned_shift_count: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "Candidates")]
    #[tabled(rename = "Candidates")]
    pub candidates: usize,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusSummary {
    pub delay_count: usize,
    pub on_schedule_count: usize,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total_records: usize,
    pub document_store_records: usize,
    pub tabular_export_records: usize,
    pub dropped_records: usize,
    pub delay_count: usize,
    pub on_schedule_count: usize,
    pub occupied_slots: usize,
    pub reconciliation_ties: usize,
    pub vessels_in_multiple_slots: usize,
    pub failed_sources: Vec<String>,
}
