use crate::types::{ActivityRecord, Metrics, Status};

/// Derive the schedule metrics for one record.
///
/// `target_per_shift` is planned tonnage spread over the planned shifts and is
/// `0` when no shifts were planned. In that case `total_target` is also `0`, so
/// any non-negative actual tonnage counts as on schedule.
pub fn derive_metrics(record: &ActivityRecord) -> Metrics {
    let target_per_shift = if record.planned_shift_count != 0.0 {
        record.planned_tonnage / record.planned_shift_count
    } else {
        0.0
    };
    let total_target = target_per_shift * record.actual_shift_count;
    let status = if record.actual_tonnage >= total_target {
        Status::OnSchedule
    } else {
        Status::Delay
    };
    Metrics {
        target_per_shift,
        total_target,
        status,
        balance: record.balance(),
    }
}

pub fn attach_metrics(records: &mut [ActivityRecord]) {
    for r in records.iter_mut() {
        r.metrics = Some(derive_metrics(r));
    }
}
