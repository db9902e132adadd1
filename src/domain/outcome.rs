//! Settled contract outcomes, one row per contract in `operation_log`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The single fact patterns consume: did the contract win or lose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeResult {
    Win,
    Loss,
}

impl TradeResult {
    /// Derive the result from realized profit: positive profit wins.
    #[must_use]
    pub fn from_profit(profit: Decimal) -> Self {
        if profit > Decimal::ZERO {
            Self::Win
        } else {
            Self::Loss
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Win => "WIN",
            Self::Loss => "LOSS",
        }
    }

    #[must_use]
    pub const fn is_win(self) -> bool {
        matches!(self, Self::Win)
    }

    /// Single-letter code used in operator-facing snapshots ("W L L").
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Win => 'W',
            Self::Loss => 'L',
        }
    }
}

impl std::fmt::Display for TradeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A settled contract as read back from `operation_log`.
///
/// Rows are immutable once inserted; `id` is the authoritative total order
/// (most recent first when read through the store adapter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub id: i64,
    pub bot_id: String,
    pub bot_name: String,
    pub result: TradeResult,
    pub profit_percentage: Decimal,
    pub stake_value: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// An outcome about to be appended; the store assigns the id.
#[derive(Debug, Clone, Serialize)]
pub struct NewOutcome {
    pub bot_id: String,
    pub bot_name: String,
    pub result: TradeResult,
    pub profit_percentage: Decimal,
    pub stake_value: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl NewOutcome {
    #[must_use]
    pub fn new(
        bot_id: impl Into<String>,
        bot_name: impl Into<String>,
        profit_percentage: Decimal,
        stake_value: Decimal,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            bot_name: bot_name.into(),
            result: TradeResult::from_profit(profit_percentage),
            profit_percentage,
            stake_value,
            timestamp: Utc::now(),
        }
    }
}

/// Render the most recent `n` outcomes as a display snapshot,
/// most recent first: `"W L L L W"`.
#[must_use]
pub fn render_last_operations(outcomes: &[Outcome], n: usize) -> String {
    let mut s = String::with_capacity(n * 2);
    for (i, o) in outcomes.iter().take(n).enumerate() {
        if i > 0 {
            s.push(' ');
        }
        s.push(o.result.letter());
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn outcome(id: i64, result: TradeResult) -> Outcome {
        Outcome {
            id,
            bot_id: "bot-1".into(),
            bot_name: "alpha".into(),
            result,
            profit_percentage: dec!(1.5),
            stake_value: dec!(1.0),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn result_from_profit_sign() {
        assert_eq!(TradeResult::from_profit(dec!(0.42)), TradeResult::Win);
        assert_eq!(TradeResult::from_profit(dec!(-1.0)), TradeResult::Loss);
        assert_eq!(TradeResult::from_profit(dec!(0)), TradeResult::Loss);
    }

    #[test]
    fn result_serializes_to_store_text() {
        assert_eq!(
            serde_json::to_string(&TradeResult::Win).unwrap(),
            "\"WIN\""
        );
        assert_eq!(
            serde_json::from_str::<TradeResult>("\"LOSS\"").unwrap(),
            TradeResult::Loss
        );
    }

    #[test]
    fn last_operations_snapshot_is_most_recent_first() {
        let window = vec![
            outcome(5, TradeResult::Win),
            outcome(4, TradeResult::Loss),
            outcome(3, TradeResult::Loss),
            outcome(2, TradeResult::Win),
        ];
        assert_eq!(render_last_operations(&window, 3), "W L L");
        assert_eq!(render_last_operations(&window, 10), "W L L W");
        assert_eq!(render_last_operations(&[], 5), "");
    }
}
