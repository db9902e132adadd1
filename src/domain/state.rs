//! In-memory radar state, owned exclusively by the radar task.
//!
//! Kept as fields of one value passed explicitly, so every mutation site
//! is visible.

use chrono::{DateTime, Utc};

use super::{PatternMatch, TradeResult};

/// Which branch the next radar pass takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BotState {
    #[default]
    Analyzing,
    Monitoring,
}

/// The pattern currently being tracked, plus the row it is attributed to.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivePattern {
    pub pattern: PatternMatch,
    pub execution_id: i64,
    pub detected_at: DateTime<Utc>,
}

/// Process-local radar state.
///
/// Invariants: `bot_state == Monitoring` implies `active_signal` is set;
/// `monitoring_count` never exceeds the configured post-operation count;
/// the cursor never moves backward.
#[derive(Debug, Default)]
pub struct RadarState {
    pub bot_state: BotState,
    pub active_signal: Option<ActivePattern>,
    pub last_seen_outcome_id: i64,
    pub monitoring_count: u8,
    pub monitoring_started_at: Option<DateTime<Utc>>,
    /// Post-pattern results observed so far, oldest first.
    pub observed: Vec<TradeResult>,
}

impl RadarState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter MONITORING for a freshly fired pattern.
    pub fn start_monitoring(&mut self, pattern: PatternMatch, execution_id: i64, latest_id: i64) {
        let now = Utc::now();
        self.bot_state = BotState::Monitoring;
        self.active_signal = Some(ActivePattern {
            pattern,
            execution_id,
            detected_at: now,
        });
        self.advance_cursor(latest_id);
        self.monitoring_count = 0;
        self.monitoring_started_at = Some(now);
        self.observed.clear();
    }

    /// Record one post-pattern result.
    pub fn record_observation(&mut self, result: TradeResult) {
        self.observed.push(result);
        self.monitoring_count = self.observed.len() as u8;
    }

    /// Return to ANALYZING, clearing the tracked pattern.
    pub fn reset(&mut self) {
        self.bot_state = BotState::Analyzing;
        self.active_signal = None;
        self.monitoring_count = 0;
        self.monitoring_started_at = None;
        self.observed.clear();
    }

    /// Advance the outcome cursor; a regressed id (store rollback) is
    /// ignored so the cursor stays monotone.
    pub fn advance_cursor(&mut self, latest_id: i64) {
        if latest_id > self.last_seen_outcome_id {
            self.last_seen_outcome_id = latest_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some_match() -> PatternMatch {
        PatternMatch {
            strategy_name: "LLL",
            confidence: 75.0,
            trigger_type: "LLL",
            reason: "three losses".into(),
            last_operations: "L L L".into(),
        }
    }

    #[test]
    fn cursor_never_regresses() {
        let mut state = RadarState::new();
        state.advance_cursor(10);
        state.advance_cursor(7);
        assert_eq!(state.last_seen_outcome_id, 10);
        state.advance_cursor(11);
        assert_eq!(state.last_seen_outcome_id, 11);
    }

    #[test]
    fn reset_restores_defaults_but_keeps_cursor() {
        let mut state = RadarState::new();
        state.start_monitoring(some_match(), 42, 9);
        state.monitoring_count = 1;
        state.reset();
        assert_eq!(state.bot_state, BotState::Analyzing);
        assert!(state.active_signal.is_none());
        assert_eq!(state.monitoring_count, 0);
        assert!(state.monitoring_started_at.is_none());
        assert_eq!(state.last_seen_outcome_id, 9);
    }

    #[test]
    fn monitoring_implies_active_signal() {
        let mut state = RadarState::new();
        state.start_monitoring(some_match(), 1, 5);
        assert_eq!(state.bot_state, BotState::Monitoring);
        assert!(state.active_signal.is_some());
        assert_eq!(state.last_seen_outcome_id, 5);
    }
}
