//! Runtime configuration.
//!
//! Read from `berth_report.toml` (or `--config <path>`). A missing file means
//! defaults; an unreadable or inconsistent one is an error. Everything is
//! validated once here so the per-record code never re-checks its tables.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::dates::{DateParser, SlashOrder};
use crate::error::{AppError, AppResult};
use crate::loader::{DocumentFields, Normalizer, SheetSchema};
use crate::reconcile::{jamrud_slots, BerthMatching};
use crate::types::BerthSlot;

pub const DEFAULT_CONFIG_FILE: &str = "berth_report.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// CSV export URL of the tabular source. Takes precedence over `sheet-path`.
    pub sheet_url: Option<String>,
    pub sheet_path: Option<PathBuf>,
    pub sheet_schema: SheetSchema,
    pub sheet_date_order: SlashOrder,
    /// JSON export of the document collection.
    pub documents_path: Option<PathBuf>,
    pub documents_date_order: SlashOrder,
    /// Local time of both sources, in hours east of UTC.
    pub utc_offset_hours: i32,
    pub berth_matching: BerthMatching,
    pub output_dir: PathBuf,
    pub document_fields: DocumentFields,
    pub slots: Vec<BerthSlot>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sheet_url: None,
            sheet_path: None,
            sheet_schema: SheetSchema::default(),
            sheet_date_order: SlashOrder::MonthFirst,
            documents_path: None,
            documents_date_order: SlashOrder::MonthFirst,
            utc_offset_hours: 7,
            berth_matching: BerthMatching::default(),
            output_dir: PathBuf::from("."),
            document_fields: DocumentFields::default(),
            slots: jamrud_slots(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.slots.is_empty() {
            return Err(AppError::Config("no berth slots defined".into()));
        }
        let mut ids: Vec<u32> = self.slots.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        if ids[0] == 0 {
            return Err(AppError::Config("slot ids must be positive".into()));
        }
        if let Some(w) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(AppError::Config(format!("slot id {} defined twice", w[0])));
        }
        self.utc_offset()?;
        self.sheet_schema.columns().validate()?;
        self.document_fields.validate()?;
        Ok(())
    }

    pub fn utc_offset(&self) -> AppResult<FixedOffset> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                AppError::Config(format!("utc-offset-hours {} out of range", self.utc_offset_hours))
            })
    }

    /// Mapping tables and date policies for both sources.
    pub fn normalizer(&self) -> AppResult<Normalizer> {
        let offset = self.utc_offset()?;
        Ok(Normalizer {
            sheet_columns: self.sheet_schema.columns(),
            sheet_dates: DateParser::new(self.sheet_date_order, offset),
            document_fields: self.document_fields.clone(),
            document_dates: DateParser::new(self.documents_date_order, offset),
        })
    }
}
