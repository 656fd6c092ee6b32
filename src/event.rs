//! Typed input events
//!
//! The external scheduler drives a tracker with exactly two kinds of event:
//! a source-value change and a periodic time tick. Both carry the wall-clock
//! timestamp at which they were observed.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Input event delivered by the external scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackerEvent {
    /// The upstream cumulative-import reading changed.
    SourceUpdate { value: f64, at: NaiveDateTime },
    /// Periodic clock tick (recommended at most 60s apart so both window
    /// boundaries are observed).
    Tick { at: NaiveDateTime },
}

impl TrackerEvent {
    /// Timestamp the event was observed at.
    pub fn at(&self) -> NaiveDateTime {
        match self {
            TrackerEvent::SourceUpdate { at, .. } | TrackerEvent::Tick { at } => *at,
        }
    }

    /// Validate the event payload.
    ///
    /// Source readings must be finite, non-negative kWh; monotonicity is the
    /// tracker's concern, not the event's.
    pub fn validate(&self) -> Result<(), TrackerError> {
        match self {
            TrackerEvent::SourceUpdate { value, .. } => {
                if !value.is_finite() || *value < 0.0 {
                    return Err(TrackerError::InvalidSourceValue(*value));
                }
                Ok(())
            }
            TrackerEvent::Tick { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(11, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_source_update_round_trip() {
        let event = TrackerEvent::SourceUpdate {
            value: 12.5,
            at: at(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"source_update""#));
        let parsed: TrackerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_tick_parses_from_tagged_json() {
        let parsed: TrackerEvent =
            serde_json::from_str(r#"{"type":"tick","at":"2024-01-15T11:00:00"}"#).unwrap();
        assert_eq!(parsed, TrackerEvent::Tick { at: at() });
    }

    #[test]
    fn test_validate_rejects_negative_and_nan() {
        let negative = TrackerEvent::SourceUpdate {
            value: -0.5,
            at: at(),
        };
        assert!(matches!(
            negative.validate(),
            Err(TrackerError::InvalidSourceValue(_))
        ));

        let nan = TrackerEvent::SourceUpdate {
            value: f64::NAN,
            at: at(),
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_zero_reading() {
        let event = TrackerEvent::SourceUpdate {
            value: 0.0,
            at: at(),
        };
        assert!(event.validate().is_ok());
    }
}
