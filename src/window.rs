//! Peak window definition and time-of-day classification
//!
//! A `PeakWindow` is an immutable same-day time range. `classify` maps a
//! wall-clock time to one of three phases; it is the only place boundary
//! semantics live: the instant equal to `start` is already during the window,
//! the instant equal to `end` is already after it.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Temporal phase relative to the configured peak window.
///
/// Ordered so that a single event crossing several boundaries can walk the
/// phases in sequence (`BeforePeak < DuringPeak < AfterPeak`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    BeforePeak,
    DuringPeak,
    AfterPeak,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::BeforePeak => "before_peak",
            Phase::DuringPeak => "during_peak",
            Phase::AfterPeak => "after_peak",
        }
    }
}

/// Immutable same-day peak time range, `start < end`.
///
/// Only constructible through [`PeakWindow::new`], which enforces the
/// ordering invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl PeakWindow {
    /// Create a window, rejecting `start >= end` (overnight windows are out
    /// of scope).
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, TrackerError> {
        if start >= end {
            return Err(TrackerError::InvalidWindow {
                start: start.format("%H:%M:%S").to_string(),
                end: end.format("%H:%M:%S").to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    /// Classify a time of day relative to this window.
    ///
    /// Half-open on the start side, closed on the advance side:
    /// `now < start` is before, `start <= now < end` is during,
    /// `now >= end` is after.
    pub fn classify(&self, now: NaiveTime) -> Phase {
        if now < self.start {
            Phase::BeforePeak
        } else if now < self.end {
            Phase::DuringPeak
        } else {
            Phase::AfterPeak
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    fn window() -> PeakWindow {
        PeakWindow::new(t(11, 0, 0), t(14, 0, 0)).unwrap()
    }

    #[test]
    fn test_classify_before_window() {
        assert_eq!(window().classify(t(0, 0, 0)), Phase::BeforePeak);
        assert_eq!(window().classify(t(10, 59, 59)), Phase::BeforePeak);
    }

    #[test]
    fn test_classify_start_boundary_is_during() {
        assert_eq!(window().classify(t(11, 0, 0)), Phase::DuringPeak);
    }

    #[test]
    fn test_classify_inside_window() {
        assert_eq!(window().classify(t(12, 30, 0)), Phase::DuringPeak);
        assert_eq!(window().classify(t(13, 59, 59)), Phase::DuringPeak);
    }

    #[test]
    fn test_classify_end_boundary_is_after() {
        assert_eq!(window().classify(t(14, 0, 0)), Phase::AfterPeak);
        assert_eq!(window().classify(t(23, 59, 59)), Phase::AfterPeak);
    }

    #[test]
    fn test_inverted_window_rejected() {
        let result = PeakWindow::new(t(14, 0, 0), t(11, 0, 0));
        assert!(matches!(result, Err(TrackerError::InvalidWindow { .. })));
    }

    #[test]
    fn test_empty_window_rejected() {
        let result = PeakWindow::new(t(11, 0, 0), t(11, 0, 0));
        assert!(matches!(result, Err(TrackerError::InvalidWindow { .. })));
    }

    #[test]
    fn test_phase_ordering() {
        assert!(Phase::BeforePeak < Phase::DuringPeak);
        assert!(Phase::DuringPeak < Phase::AfterPeak);
    }

    #[test]
    fn test_phase_labels() {
        assert_eq!(Phase::BeforePeak.as_str(), "before_peak");
        assert_eq!(Phase::DuringPeak.as_str(), "during_peak");
        assert_eq!(Phase::AfterPeak.as_str(), "after_peak");
    }
}
