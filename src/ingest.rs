//! One ingestion cycle: pull both sources, normalize, derive metrics.
//!
//! A cycle produces a fresh [`Snapshot`]; callers swap it in whole and never
//! merge it with an earlier one.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::loader::{load_documents, load_sheet, LoadReport, Normalizer};
use crate::metrics::attach_metrics;
use crate::sources::Sources;
use crate::types::{ActivityRecord, SourceKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub kind: SourceKind,
    pub message: String,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl SourceFailure {
    fn from_error(kind: SourceKind, err: &AppError) -> Self {
        let message = match err {
            AppError::Source { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self { kind, message }
    }
}

/// Immutable working set for one cycle.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Document-store records first, then tabular-export records, each in
    /// source order. Every record has metrics attached.
    pub records: Vec<ActivityRecord>,
    pub reports: Vec<LoadReport>,
    /// Sources that could not be read this cycle.
    pub failures: Vec<SourceFailure>,
}

impl Snapshot {
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn report_for(&self, kind: SourceKind) -> Option<&LoadReport> {
        self.reports.iter().find(|r| r.source == kind)
    }
}

/// Turn fetched payloads into a snapshot. Fails only when neither source
/// produced anything usable.
pub fn build_snapshot(
    documents: AppResult<Vec<Value>>,
    sheet: AppResult<String>,
    normalizer: &Normalizer,
) -> AppResult<Snapshot> {
    let mut snapshot = Snapshot::default();

    match documents {
        Ok(docs) => {
            let (records, report) = load_documents(&docs, normalizer);
            snapshot.records.extend(records);
            snapshot.reports.push(report);
        }
        Err(e) => {
            warn!(source = %SourceKind::DocumentStore, error = %e, "source unavailable");
            snapshot
                .failures
                .push(SourceFailure::from_error(SourceKind::DocumentStore, &e));
        }
    }

    match sheet.map(|text| load_sheet(&text, normalizer)) {
        Ok((records, report)) => {
            snapshot.records.extend(records);
            snapshot.reports.push(report);
        }
        Err(e) => {
            warn!(source = %SourceKind::TabularExport, error = %e, "source unavailable");
            snapshot
                .failures
                .push(SourceFailure::from_error(SourceKind::TabularExport, &e));
        }
    }

    if snapshot.reports.is_empty() {
        return Err(AppError::AllSourcesFailed);
    }

    attach_metrics(&mut snapshot.records);

    for r in &snapshot.reports {
        info!(
            source = %r.source,
            total = r.total_rows,
            kept = r.kept_rows,
            dropped = r.dropped_rows,
            undated = r.undated_rows,
            "source normalized"
        );
    }
    Ok(snapshot)
}

/// Run a full cycle against the configured sources.
pub async fn refresh(sources: &Sources, normalizer: &Normalizer) -> AppResult<Snapshot> {
    let (documents, sheet) = sources.fetch_all().await;
    build_snapshot(documents, sheet, normalizer)
}
