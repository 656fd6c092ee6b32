//! Tracker configuration
//!
//! A `TrackerConfig` is produced once by an external setup flow and consumed
//! at construction. Peak times are accepted in `HH:MM` or `HH:MM:SS` form.

use chrono::NaiveTime;
use uuid::Uuid;

use crate::error::TrackerError;
use crate::window::PeakWindow;

/// Default peak window start
pub const DEFAULT_PEAK_START: &str = "11:00";
/// Default peak window end
pub const DEFAULT_PEAK_END: &str = "14:00";

/// Parse a time of day in `HH:MM` or `HH:MM:SS` form.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, TrackerError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| TrackerError::InvalidTimeOfDay(value.to_string()))
}

/// Configuration for one tracker instance.
///
/// Instances are fully independent; each gets its own id, used to key its
/// snapshot storage.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Opaque identifier of the upstream cumulative-import sensor
    pub source_entity: String,
    /// Peak time range during which import accumulation is frozen
    pub window: PeakWindow,
    /// Unique id for this configured instance
    pub instance_id: Uuid,
}

impl TrackerConfig {
    /// Build a config from an already validated window.
    pub fn new(source_entity: impl Into<String>, window: PeakWindow) -> Self {
        Self {
            source_entity: source_entity.into(),
            window,
            instance_id: Uuid::new_v4(),
        }
    }

    /// Build a config from `HH:MM`-style peak times, validating the window.
    pub fn from_times(
        source_entity: impl Into<String>,
        peak_start: &str,
        peak_end: &str,
    ) -> Result<Self, TrackerError> {
        let start = parse_time_of_day(peak_start)?;
        let end = parse_time_of_day(peak_end)?;
        Ok(Self::new(source_entity, PeakWindow::new(start, end)?))
    }
}
