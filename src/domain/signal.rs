//! The per-bot signal row, upserted on every radar pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PatternMatch;

/// Idle value for `last_pattern_found`, kept verbatim from the operator UI.
pub const AWAITING_PATTERN: &str = "Aguardando";

/// One row per `bot_name` in the `signal` table.
///
/// Created on the first upsert, mutated in place afterwards, never deleted.
/// `last_update` is refreshed on every radar pass so a stalled radar is
/// detectable by absence of updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub bot_name: String,
    pub is_safe_to_operate: bool,
    pub reason: String,
    pub strategy_used: String,
    pub strategy_confidence: f64,
    pub last_pattern_found: String,
    pub pattern_found_at: Option<DateTime<Utc>>,
    pub last_update: DateTime<Utc>,
    pub last_operations: String,
}

impl Signal {
    /// A "nothing actionable" signal with an explanatory reason.
    #[must_use]
    pub fn idle(bot_name: impl Into<String>, reason: impl Into<String>, last_operations: String) -> Self {
        Self {
            bot_name: bot_name.into(),
            is_safe_to_operate: false,
            reason: reason.into(),
            strategy_used: String::new(),
            strategy_confidence: 0.0,
            last_pattern_found: AWAITING_PATTERN.to_string(),
            pattern_found_at: None,
            last_update: Utc::now(),
            last_operations,
        }
    }

    /// The signal emitted when a pattern fires.
    #[must_use]
    pub fn fired(bot_name: impl Into<String>, pattern: &PatternMatch, found_at: DateTime<Utc>) -> Self {
        Self {
            bot_name: bot_name.into(),
            is_safe_to_operate: true,
            reason: pattern.reason.clone(),
            strategy_used: pattern.strategy_name.to_string(),
            strategy_confidence: pattern.confidence,
            last_pattern_found: pattern.trigger_type.to_string(),
            pattern_found_at: Some(found_at),
            last_update: Utc::now(),
            last_operations: pattern.last_operations.clone(),
        }
    }

    /// Refresh the heartbeat without changing any other field.
    pub fn touch(&mut self) {
        self.last_update = Utc::now();
    }
}
