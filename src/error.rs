//! Error types for the off-peak tracker

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while configuring or driving a tracker
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Invalid peak window: start {start} must be before end {end}")]
    InvalidWindow { start: String, end: String },

    #[error("Cannot parse time of day {0:?}: expected HH:MM or HH:MM:SS")]
    InvalidTimeOfDay(String),

    #[error("Source value {value} went backwards (last known {last_value}) on the same day")]
    SourceAnomaly { last_value: f64, value: f64 },

    #[error("Source value {0} is not a usable kWh reading")]
    InvalidSourceValue(f64),

    #[error("Snapshot store failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TrackerError {
    /// Whether the tracker remains usable after this error.
    ///
    /// Anomalies and persistence failures leave the in-memory state valid;
    /// window and time-of-day errors are fatal to the instance being
    /// constructed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            TrackerError::InvalidWindow { .. } | TrackerError::InvalidTimeOfDay(_)
        )
    }
}
