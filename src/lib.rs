//! Vessel berth activity: ingest two sources, derive schedule metrics, and
//! resolve the current occupant of every berth slot.
pub mod config;
pub mod dates;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod output;
pub mod reconcile;
pub mod reports;
pub mod sources;
pub mod types;
pub mod util;
