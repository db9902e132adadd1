//! Time-regime bands for predicates that gate on market activity.
//!
//! The mapping is computed by the caller from the wall clock and passed in,
//! so predicates themselves stay clock-free.

use chrono::{DateTime, Timelike, Utc};

/// Coarse activity level by UTC hour of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityBand {
    Low,
    Medium,
    High,
}

/// Position within the hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinutePhase {
    /// First ten minutes of the hour.
    Opening,
    Other,
}

/// The regime snapshot passed to the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Regime {
    pub band: ActivityBand,
    pub phase: MinutePhase,
}

impl Regime {
    #[must_use]
    pub fn at(ts: DateTime<Utc>) -> Self {
        let band = match ts.hour() {
            0..=5 => ActivityBand::Low,
            6..=11 | 22..=23 => ActivityBand::Medium,
            _ => ActivityBand::High,
        };
        let phase = if ts.minute() < 10 {
            MinutePhase::Opening
        } else {
            MinutePhase::Other
        };
        Self { band, phase }
    }

    #[must_use]
    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hour_bands() {
        let at = |h| Regime::at(Utc.with_ymd_and_hms(2026, 3, 10, h, 30, 0).unwrap());
        assert_eq!(at(3).band, ActivityBand::Low);
        assert_eq!(at(9).band, ActivityBand::Medium);
        assert_eq!(at(15).band, ActivityBand::High);
        assert_eq!(at(23).band, ActivityBand::Medium);
    }

    #[test]
    fn opening_phase_is_first_ten_minutes() {
        let at = |m| Regime::at(Utc.with_ymd_and_hms(2026, 3, 10, 14, m, 0).unwrap());
        assert_eq!(at(0).phase, MinutePhase::Opening);
        assert_eq!(at(9).phase, MinutePhase::Opening);
        assert_eq!(at(10).phase, MinutePhase::Other);
    }
}
