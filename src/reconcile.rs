//! Berth reconciliation: one current occupant per physical slot.
//!
//! For each slot the candidates are the records whose terminal belongs to the
//! slot's quay side and whose berth token mentions the slot id. The candidate
//! with the latest timestamp wins; equal timestamps (including two missing
//! ones) keep the first candidate in input order. Slots resolve independently,
//! so a vessel can come out in more than one slot. That case and timestamp
//! ties are reported in [`ReconcileAudit`] rather than corrected.

use crate::dates::epoch_start;
use crate::types::{ActivityRecord, BerthSlot, Occupant, PositionTag, ResolvedSlot, TerminalGroup};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// How a free-text berth token is compared with a slot id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BerthMatching {
    /// Token contains the id's digits anywhere. Slot 1 also matches "berth 11".
    #[default]
    Substring,
    /// Some run of digits in the token equals the id.
    WholeNumber,
}

impl BerthMatching {
    pub fn matches(self, token: &str, id: u32) -> bool {
        let token = token.to_lowercase();
        match self {
            BerthMatching::Substring => token.contains(&id.to_string()),
            BerthMatching::WholeNumber => token
                .split(|c: char| !c.is_ascii_digit())
                .filter(|run| !run.is_empty())
                .any(|run| run.parse::<u32>().ok() == Some(id)),
        }
    }
}

/// The ten Jamrud slots: 1-4 along the north quay, 5 on the west end
/// (served from the north side), 6-10 along the south quay.
pub fn jamrud_slots() -> Vec<BerthSlot> {
    let mut slots: Vec<BerthSlot> = (1..=4)
        .map(|id| BerthSlot::new(id, PositionTag::Top, TerminalGroup::North))
        .collect();
    slots.push(BerthSlot::new(5, PositionTag::Left, TerminalGroup::North));
    slots.extend((6..=10).map(|id| BerthSlot::new(id, PositionTag::Bottom, TerminalGroup::South)));
    slots
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileAudit {
    /// Slots whose winner shared its timestamp with another candidate.
    pub tied_slots: Vec<u32>,
    /// Vessel name → slots it was resolved into, for vessels in more than one.
    pub vessels_in_multiple_slots: BTreeMap<String, Vec<u32>>,
}

fn recency(record: &ActivityRecord) -> NaiveDateTime {
    record.timestamp.unwrap_or_else(epoch_start)
}

fn occupant_of(record: &ActivityRecord) -> Occupant {
    Occupant {
        vessel_name: record.vessel_name.clone(),
        terminal: record.terminal.clone(),
        berth_token: record.berth_token.clone(),
        source_kind: record.source_kind,
        timestamp: record.timestamp,
        planned_tonnage: record.planned_tonnage,
        planned_shift_count: record.planned_shift_count,
        metrics: record.metrics,
    }
}

/// Resolve every slot with the default substring matching.
pub fn resolve(slots: &[BerthSlot], records: &[ActivityRecord]) -> Vec<ResolvedSlot> {
    resolve_with_audit(slots, records, BerthMatching::default()).0
}

pub fn resolve_with_audit(
    slots: &[BerthSlot],
    records: &[ActivityRecord],
    matching: BerthMatching,
) -> (Vec<ResolvedSlot>, ReconcileAudit) {
    let mut audit = ReconcileAudit::default();
    let mut resolved = Vec::with_capacity(slots.len());

    for slot in slots {
        let candidates: Vec<&ActivityRecord> = records
            .iter()
            .filter(|r| slot.accepts_terminal(&r.terminal) && matching.matches(&r.berth_token, slot.id))
            .collect();

        let mut winner: Option<&ActivityRecord> = None;
        for &c in &candidates {
            // Strictly later only: ties keep the earlier candidate.
            if winner.map_or(true, |w| recency(c) > recency(w)) {
                winner = Some(c);
            }
        }

        if let Some(w) = winner {
            let latest = recency(w);
            let tied = candidates.iter().filter(|c| recency(c) == latest).count();
            if tied > 1 {
                warn!(slot = slot.id, tied, vessel = %w.vessel_name, "equally recent candidates for slot");
                audit.tied_slots.push(slot.id);
            }
        }

        resolved.push(ResolvedSlot {
            slot: *slot,
            occupant: winner.map(occupant_of),
            candidate_count: candidates.len(),
        });
    }

    let mut by_vessel: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for r in &resolved {
        if let Some(o) = &r.occupant {
            by_vessel.entry(o.vessel_name.clone()).or_default().push(r.slot.id);
        }
    }
    for (vessel, ids) in by_vessel {
        if ids.len() > 1 {
            warn!(%vessel, slots = ?ids, "vessel resolved into more than one slot");
            audit.vessels_in_multiple_slots.insert(vessel, ids);
        }
    }

    (resolved, audit)
}
