use crate::dates::DateParser;
use crate::error::{AppError, AppResult};
use crate::types::{ActivityRecord, SourceKind};
use crate::util::{cell, number_from_value, parse_csv, parse_number};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Layout of the tabular export. The file carries no usable header names,
/// so the position table is picked explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SheetSchema {
    /// Older form revision, 13 leading columns.
    Legacy13,
    /// Current form revision, 17 leading columns.
    #[default]
    Extended17,
}

/// Zero-based column positions for one sheet schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetColumns {
    pub timestamp: usize,
    pub terminal: usize,
    pub shift: usize,
    pub vessel_name: usize,
    pub throughput_rate: usize,
    pub achievement: usize,
    pub remark: usize,
    pub attachment: usize,
    pub planned_tonnage: usize,
    pub actual_tonnage: usize,
    pub planned_shift_count: usize,
    pub actual_shift_count: usize,
    pub berth: usize,
    /// Number of leading columns the schema defines.
    pub width: usize,
}

const LEGACY_13: SheetColumns = SheetColumns {
    timestamp: 0,
    terminal: 1,
    shift: 2,
    vessel_name: 3,
    throughput_rate: 4,
    achievement: 5,
    remark: 6,
    planned_tonnage: 7,
    actual_tonnage: 8,
    planned_shift_count: 9,
    actual_shift_count: 10,
    berth: 11,
    attachment: 12,
    width: 13,
};

const EXTENDED_17: SheetColumns = SheetColumns {
    timestamp: 0,
    terminal: 1,
    shift: 3,
    vessel_name: 5,
    throughput_rate: 8,
    achievement: 9,
    remark: 10,
    attachment: 11,
    planned_tonnage: 12,
    actual_tonnage: 13,
    planned_shift_count: 14,
    actual_shift_count: 15,
    berth: 16,
    width: 17,
};

impl SheetSchema {
    pub fn columns(self) -> SheetColumns {
        match self {
            SheetSchema::Legacy13 => LEGACY_13,
            SheetSchema::Extended17 => EXTENDED_17,
        }
    }
}

impl SheetColumns {
    fn positions(&self) -> [usize; 13] {
        [
            self.timestamp,
            self.terminal,
            self.shift,
            self.vessel_name,
            self.throughput_rate,
            self.achievement,
            self.remark,
            self.attachment,
            self.planned_tonnage,
            self.actual_tonnage,
            self.planned_shift_count,
            self.actual_shift_count,
            self.berth,
        ]
    }

    /// Every position must be in range and used once.
    pub fn validate(&self) -> AppResult<()> {
        let mut seen = HashSet::new();
        for pos in self.positions() {
            if pos >= self.width {
                return Err(AppError::Config(format!(
                    "sheet column {} is outside the {}-column schema",
                    pos, self.width
                )));
            }
            if !seen.insert(pos) {
                return Err(AppError::Config(format!("sheet column {} mapped twice", pos)));
            }
        }
        Ok(())
    }
}

/// Field names in the document store. Unknown extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DocumentFields {
    pub date: String,
    pub created_at: String,
    pub terminal: String,
    pub berth: String,
    pub shift: String,
    pub vessel_name: String,
    pub planned_tonnage: String,
    pub actual_tonnage: String,
    pub planned_shift_count: String,
    pub actual_shift_count: String,
    pub throughput_rate: String,
    pub achievement: String,
    pub remark: String,
    pub attachments: String,
}

impl Default for DocumentFields {
    fn default() -> Self {
        Self {
            date: "tanggal".into(),
            created_at: "createdAt".into(),
            terminal: "terminal".into(),
            berth: "tambatan".into(),
            shift: "shift".into(),
            vessel_name: "namaKapal".into(),
            planned_tonnage: "jumlahMuatan".into(),
            actual_tonnage: "realisasiBongkar".into(),
            planned_shift_count: "perencanaanShift".into(),
            actual_shift_count: "realisasiShift".into(),
            throughput_rate: "realisasiTgh".into(),
            achievement: "ketercapaian".into(),
            remark: "remark".into(),
            attachments: "lampiran".into(),
        }
    }
}

impl DocumentFields {
    fn names(&self) -> [&str; 14] {
        [
            self.date.as_str(),
            self.created_at.as_str(),
            self.terminal.as_str(),
            self.berth.as_str(),
            self.shift.as_str(),
            self.vessel_name.as_str(),
            self.planned_tonnage.as_str(),
            self.actual_tonnage.as_str(),
            self.planned_shift_count.as_str(),
            self.actual_shift_count.as_str(),
            self.throughput_rate.as_str(),
            self.achievement.as_str(),
            self.remark.as_str(),
            self.attachments.as_str(),
        ]
    }

    pub fn validate(&self) -> AppResult<()> {
        let mut seen = HashSet::new();
        for name in self.names() {
            if name.trim().is_empty() {
                return Err(AppError::Config("document field name is empty".into()));
            }
            if !seen.insert(name) {
                return Err(AppError::Config(format!("document field `{}` mapped twice", name)));
            }
        }
        Ok(())
    }
}

/// One raw item from either source.
#[derive(Debug, Clone, Copy)]
pub enum RawItem<'a> {
    SheetRow(&'a [String]),
    Document(&'a Value),
}

impl RawItem<'_> {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            RawItem::SheetRow(_) => SourceKind::TabularExport,
            RawItem::Document(_) => SourceKind::DocumentStore,
        }
    }
}

/// Per-source mapping tables plus the date policy each source uses.
#[derive(Debug, Clone)]
pub struct Normalizer {
    pub sheet_columns: SheetColumns,
    pub sheet_dates: DateParser,
    pub document_fields: DocumentFields,
    pub document_dates: DateParser,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            sheet_columns: SheetSchema::default().columns(),
            sheet_dates: DateParser::default(),
            document_fields: DocumentFields::default(),
            document_dates: DateParser::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub source: SourceKind,
    pub total_rows: usize,
    pub kept_rows: usize,
    /// Rows without a vessel name.
    pub dropped_rows: usize,
    /// Kept rows whose date did not parse.
    pub undated_rows: usize,
}

impl LoadReport {
    fn new(source: SourceKind) -> Self {
        Self {
            source,
            total_rows: 0,
            kept_rows: 0,
            dropped_rows: 0,
            undated_rows: 0,
        }
    }
}

impl Normalizer {
    /// Map one raw item into the canonical shape. `None` means the item has
    /// no vessel name and is dropped.
    pub fn normalize(&self, item: RawItem<'_>) -> Option<ActivityRecord> {
        match item {
            RawItem::SheetRow(row) => self.normalize_sheet_row(row),
            RawItem::Document(doc) => self.normalize_document(doc),
        }
    }

    pub fn normalize_sheet_row(&self, row: &[String]) -> Option<ActivityRecord> {
        let c = &self.sheet_columns;
        let vessel_name = cell(row, c.vessel_name).trim().to_string();
        if vessel_name.is_empty() {
            return None;
        }

        // The form timestamp doubles as the activity date.
        let timestamp = self.sheet_dates.parse_checked(cell(row, c.timestamp));
        let number = |idx: usize| parse_number(Some(cell(row, idx)));
        let attachment = cell(row, c.attachment).trim();

        Some(ActivityRecord {
            source_kind: SourceKind::TabularExport,
            date: timestamp.map(|t| t.date()),
            timestamp,
            terminal: cell(row, c.terminal).trim().to_string(),
            berth_token: cell(row, c.berth).trim().to_string(),
            shift: cell(row, c.shift).trim().to_string(),
            vessel_name,
            planned_tonnage: number(c.planned_tonnage),
            actual_tonnage: number(c.actual_tonnage),
            planned_shift_count: number(c.planned_shift_count),
            actual_shift_count: number(c.actual_shift_count),
            throughput_rate: cell(row, c.throughput_rate).trim().to_string(),
            achievement: cell(row, c.achievement).trim().to_string(),
            remark: cell(row, c.remark).trim().to_string(),
            attachments: if attachment.is_empty() {
                Vec::new()
            } else {
                vec![attachment.to_string()]
            },
            metrics: None,
        })
    }

    pub fn normalize_document(&self, doc: &Value) -> Option<ActivityRecord> {
        let f = &self.document_fields;
        let vessel_name = text_field(doc, &f.vessel_name);
        if vessel_name.is_empty() {
            return None;
        }

        let created_at = doc
            .get(&f.created_at)
            .and_then(|v| self.document_dates.parse_value(v));
        let explicit_date = doc
            .get(&f.date)
            .and_then(|v| self.document_dates.parse_value(v));
        let number = |name: &str| doc.get(name).and_then(number_from_value).unwrap_or(0.0);

        Some(ActivityRecord {
            source_kind: SourceKind::DocumentStore,
            date: explicit_date.or(created_at).map(|t| t.date()),
            timestamp: created_at.or(explicit_date),
            terminal: text_field(doc, &f.terminal),
            berth_token: text_field(doc, &f.berth),
            shift: text_field(doc, &f.shift),
            vessel_name,
            planned_tonnage: number(&f.planned_tonnage),
            actual_tonnage: number(&f.actual_tonnage),
            planned_shift_count: number(&f.planned_shift_count),
            actual_shift_count: number(&f.actual_shift_count),
            throughput_rate: text_field(doc, &f.throughput_rate),
            achievement: text_field(doc, &f.achievement),
            remark: text_field(doc, &f.remark),
            attachments: attachment_list(doc.get(&f.attachments)),
            metrics: None,
        })
    }
}

fn text_field(doc: &Value, name: &str) -> String {
    match doc.get(name) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn attachment_list(v: Option<&Value>) -> Vec<String> {
    match v {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn collect<'a, I>(
    normalizer: &Normalizer,
    source: SourceKind,
    items: I,
) -> (Vec<ActivityRecord>, LoadReport)
where
    I: IntoIterator<Item = RawItem<'a>>,
{
    let mut report = LoadReport::new(source);
    let mut records = Vec::new();
    for (idx, item) in items.into_iter().enumerate() {
        report.total_rows += 1;
        match normalizer.normalize(item) {
            Some(record) => {
                if record.date.is_none() {
                    report.undated_rows += 1;
                }
                records.push(record);
            }
            None => {
                debug!(%source, item = idx, "dropping item without vessel name");
                report.dropped_rows += 1;
            }
        }
    }
    report.kept_rows = records.len();
    (records, report)
}

/// Normalize a CSV export. The first row is the header and is skipped.
pub fn load_sheet(text: &str, normalizer: &Normalizer) -> (Vec<ActivityRecord>, LoadReport) {
    let rows = parse_csv(text);
    let items = rows.iter().skip(1).map(|r| RawItem::SheetRow(r.as_slice()));
    collect(normalizer, SourceKind::TabularExport, items)
}

pub fn load_documents(
    docs: &[Value],
    normalizer: &Normalizer,
) -> (Vec<ActivityRecord>, LoadReport) {
    let items = docs.iter().map(RawItem::Document);
    collect(normalizer, SourceKind::DocumentStore, items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn extended_row(vessel: &str) -> Vec<String> {
        let mut row = vec![String::new(); 17];
        row[0] = "11/04/2025 12:46:56".into();
        row[1] = "Jamrud Utara".into();
        row[3] = "I (08.00 - 16.00)".into();
        row[5] = vessel.into();
        row[8] = "35,5".into();
        row[9] = "OK".into();
        row[10] = "crane slow".into();
        row[12] = "1.200,50".into();
        row[13] = "600".into();
        row[14] = "4".into();
        row[15] = "2".into();
        row[16] = "Berth 3".into();
        row
    }

    #[test]
    fn schemas_are_consistent() {
        SheetSchema::Legacy13.columns().validate().unwrap();
        SheetSchema::Extended17.columns().validate().unwrap();
        DocumentFields::default().validate().unwrap();
    }

    #[test]
    fn bad_column_table_is_rejected() {
        let mut cols = SheetSchema::Extended17.columns();
        cols.berth = 20;
        assert!(cols.validate().is_err());
        cols.berth = cols.terminal;
        assert!(cols.validate().is_err());

        let mut fields = DocumentFields::default();
        fields.remark = fields.shift.clone();
        assert!(fields.validate().is_err());
    }

    #[test]
    fn sheet_row_maps_by_position() {
        let n = Normalizer::default();
        let r = n.normalize(RawItem::SheetRow(&extended_row("MV Kartini"))).unwrap();
        assert_eq!(r.source_kind, SourceKind::TabularExport);
        assert_eq!(r.vessel_name, "MV Kartini");
        assert_eq!(r.terminal, "Jamrud Utara");
        assert_eq!(r.berth_token, "Berth 3");
        assert_eq!(r.date, Some(ymd(2025, 11, 4)));
        assert_eq!(r.planned_tonnage, 1200.5);
        assert_eq!(r.planned_shift_count, 4.0);
        assert_eq!(r.remark, "crane slow");
        assert!(r.attachments.is_empty());
        assert!(r.metrics.is_none());
    }

    #[test]
    fn short_rows_default_to_empty_and_zero() {
        let n = Normalizer::default();
        let row: Vec<String> = ["", "Nilam", "", "", "", "MV Short"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let r = n.normalize_sheet_row(&row).unwrap();
        assert_eq!(r.berth_token, "");
        assert_eq!(r.actual_tonnage, 0.0);
        assert_eq!(r.date, None);
        assert_eq!(r.timestamp, None);
    }

    #[test]
    fn legacy_schema_reads_other_positions() {
        let n = Normalizer {
            sheet_columns: SheetSchema::Legacy13.columns(),
            ..Normalizer::default()
        };
        let row: Vec<String> = [
            "2025-01-02", "Mirah", "II", "MV Legacy", "", "", "", "800", "800", "2", "2", "dock 7", "",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let r = n.normalize_sheet_row(&row).unwrap();
        assert_eq!(r.vessel_name, "MV Legacy");
        assert_eq!(r.berth_token, "dock 7");
        assert_eq!(r.planned_tonnage, 800.0);
        assert_eq!(r.date, Some(ymd(2025, 1, 2)));
    }

    #[test]
    fn document_maps_by_name() {
        let n = Normalizer::default();
        let doc = json!({
            "namaKapal": "MV Doc",
            "terminal": "Jamrud Selatan",
            "tambatan": "berth 8",
            "shift": "III (00.00 - 08.00)",
            "jumlahMuatan": 1000,
            "realisasiBongkar": "600",
            "perencanaanShift": 4,
            "realisasiShift": 2,
            "lampiran": "https://img.example/1.jpg",
            "createdAt": {"seconds": 1_735_689_600, "nanoseconds": 0},
            "extra": "ignored"
        });
        let r = n.normalize(RawItem::Document(&doc)).unwrap();
        assert_eq!(r.source_kind, SourceKind::DocumentStore);
        assert_eq!(r.actual_tonnage, 600.0);
        assert_eq!(r.berth_token, "berth 8");
        assert_eq!(r.attachments, vec!["https://img.example/1.jpg"]);
        // 2025-01-01T00:00Z at UTC+7
        assert_eq!(r.date, Some(ymd(2025, 1, 1)));
        assert_eq!(r.remark, "");
    }

    #[test]
    fn explicit_document_date_wins_over_creation_day() {
        let n = Normalizer::default();
        let doc = json!({
            "namaKapal": "MV Late Entry",
            "tanggal": "2024-12-30",
            "createdAt": "2025-01-01T10:00:00"
        });
        let r = n.normalize_document(&doc).unwrap();
        assert_eq!(r.date, Some(ymd(2024, 12, 30)));
        assert_eq!(r.timestamp.unwrap().date(), ymd(2025, 1, 1));
    }

    #[test]
    fn drops_are_counted() {
        let n = Normalizer::default();
        let text = "h0,h1\n\"11/04/2025 12:00:00\",Nilam,,,,MV One\n\"11/04/2025 13:00:00\",Nilam,,,,\n";
        let (records, report) = load_sheet(text, &n);
        assert_eq!(records.len(), 1);
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.kept_rows, 1);
        assert_eq!(report.dropped_rows, 1);

        let docs = vec![json!({"namaKapal": "  "}), json!({"namaKapal": "MV Two"})];
        let (records, report) = load_documents(&docs, &n);
        assert_eq!(records.len(), 1);
        assert_eq!(report.dropped_rows, 1);
        assert_eq!(report.undated_rows, 1);
    }

    #[test]
    fn stray_quote_only_costs_its_own_row() {
        let n = Normalizer::default();
        let text = "h0,h1\n\"11/04/2025 12:00:00,Nilam,,,,MV Broken\n\"11/04/2025 13:00:00\",Nilam,,,,MV Two\n\"11/04/2025 14:00:00\",Nilam,,,,MV Three\n";
        let (records, report) = load_sheet(text, &n);
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.dropped_rows, 1);
        let names: Vec<&str> = records.iter().map(|r| r.vessel_name.as_str()).collect();
        assert_eq!(names, vec!["MV Two", "MV Three"]);
    }
}
