//! Strategy execution records: the attribution of post-pattern outcomes
//! to the pattern that fired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TradeResult;

/// Lifecycle of a `strategy_execution` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    /// Pattern fired, no post-pattern outcome observed yet.
    Waiting,
    /// At least one post-pattern outcome observed, more required.
    Monitoring,
    Completed,
    /// Abandoned by the startup cleanup pass after going stale.
    Timeout,
    Error,
}

impl ExecutionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Monitoring => "MONITORING",
            Self::Completed => "COMPLETED",
            Self::Timeout => "TIMEOUT",
            Self::Error => "ERROR",
        }
    }

    /// Whether the tracker is still in flight (blocks new pattern fires).
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Waiting | Self::Monitoring)
    }
}

/// Terminal attribution of a tracked window.
///
/// `Tie` only occurs on a two-outcome track with mixed results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FinalResult {
    Win,
    Loss,
    Tie,
}

impl FinalResult {
    /// Fold the observed post-pattern results into a terminal attribution:
    /// WIN iff every operation won, LOSS iff every operation lost, TIE for
    /// a mixed two-outcome track.
    #[must_use]
    pub fn from_operations(ops: &[TradeResult]) -> Self {
        let wins = ops.iter().filter(|r| r.is_win()).count();
        if wins == ops.len() {
            Self::Win
        } else if wins == 0 {
            Self::Loss
        } else {
            Self::Tie
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Win => "WIN",
            Self::Loss => "LOSS",
            Self::Tie => "TIE",
        }
    }
}

/// A new `strategy_execution` row, created the moment a pattern fires.
#[derive(Debug, Clone, Serialize)]
pub struct NewStrategyExecution {
    pub bot_name: String,
    pub strategy_name: String,
    pub confidence_level: f64,
    pub trigger_type: String,
    pub pattern_detected_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub created_at: DateTime<Utc>,
}

impl NewStrategyExecution {
    #[must_use]
    pub fn waiting(
        bot_name: impl Into<String>,
        strategy_name: impl Into<String>,
        confidence_level: f64,
        trigger_type: impl Into<String>,
        pattern_detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            bot_name: bot_name.into(),
            strategy_name: strategy_name.into(),
            confidence_level,
            trigger_type: trigger_type.into(),
            pattern_detected_at,
            status: ExecutionStatus::Waiting,
            created_at: Utc::now(),
        }
    }
}

/// A full `strategy_execution` row as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyExecution {
    pub id: i64,
    pub bot_name: String,
    pub strategy_name: String,
    pub confidence_level: f64,
    pub trigger_type: String,
    pub pattern_detected_at: DateTime<Utc>,
    pub operation_1_result: Option<TradeResult>,
    pub operation_1_completed_at: Option<DateTime<Utc>>,
    pub operation_2_result: Option<TradeResult>,
    pub operation_2_completed_at: Option<DateTime<Utc>>,
    pub final_result: Option<FinalResult>,
    pub pattern_success: Option<bool>,
    pub status: ExecutionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A partial update to a `strategy_execution` row.
///
/// `None` fields are omitted from the serialized patch so the store only
/// touches the columns the radar intends to change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_1_result: Option<TradeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_1_completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_2_result: Option<TradeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_2_completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_result: Option<FinalResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern_success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionPatch {
    /// Record the `n`-th post-pattern operation (1-based).
    #[must_use]
    pub fn operation(n: u8, result: TradeResult, at: DateTime<Utc>) -> Self {
        let mut patch = Self {
            status: Some(ExecutionStatus::Monitoring),
            updated_at: Some(Utc::now()),
            ..Self::default()
        };
        match n {
            1 => {
                patch.operation_1_result = Some(result);
                patch.operation_1_completed_at = Some(at);
            }
            _ => {
                patch.operation_2_result = Some(result);
                patch.operation_2_completed_at = Some(at);
            }
        }
        patch
    }

    /// Terminal patch closing the tracker.
    #[must_use]
    pub fn completed(final_result: FinalResult) -> Self {
        let now = Utc::now();
        Self {
            final_result: Some(final_result),
            pattern_success: Some(final_result == FinalResult::Win),
            status: Some(ExecutionStatus::Completed),
            updated_at: Some(now),
            completed_at: Some(now),
            ..Self::default()
        }
    }
}
