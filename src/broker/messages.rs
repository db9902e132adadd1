//! Broker wire envelopes: JSON frames correlated by integer `req_id`.
//!
//! Only the envelopes the core uses are modeled: `authorize`,
//! `ticks_history`, `proposal`, `buy`, `proposal_open_contract` and
//! `ping`. Monetary fields travel as JSON numbers except `growth_rate`,
//! which the broker requires as a decimal string.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::BrokerError;

/// Contract families the executor knows how to propose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContractType {
    Accu,
    DigitDiff,
    DigitOver,
    DigitUnder,
    Call,
    Put,
    ResetCall,
    ResetPut,
}

impl ContractType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accu => "ACCU",
            Self::DigitDiff => "DIGITDIFF",
            Self::DigitOver => "DIGITOVER",
            Self::DigitUnder => "DIGITUNDER",
            Self::Call => "CALL",
            Self::Put => "PUT",
            Self::ResetCall => "RESETCALL",
            Self::ResetPut => "RESETPUT",
        }
    }

    #[must_use]
    pub const fn is_accumulator(self) -> bool {
        matches!(self, Self::Accu)
    }

    #[must_use]
    pub const fn is_digit(self) -> bool {
        matches!(self, Self::DigitDiff | Self::DigitOver | Self::DigitUnder)
    }
}

/// How the ACCU proposal body is laid out.
///
/// Some broker backends reject the flat layout with a "use nested
/// parameters" error; the executor retries with the other shape while
/// keeping the same string growth rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProposalShape {
    #[default]
    Flat,
    Nested,
}

/// Validated parameters for a `proposal` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalParams {
    pub contract_type: ContractType,
    pub symbol: String,
    /// Stake amount; the broker floor is 0.35.
    pub amount: Decimal,
    pub currency: String,
    pub duration: Option<u32>,
    pub duration_unit: Option<String>,
    /// String digit for digit contracts. The wire field is `barrier`,
    /// never `prediction`.
    pub barrier: Option<String>,
    /// ACCU per-tick accumulation as a fraction (`0.01..=0.05`).
    pub growth_rate: Option<Decimal>,
    /// Absolute-currency take profit, sent as `limit_order.take_profit`.
    pub take_profit: Option<Decimal>,
}

pub const MIN_STAKE: Decimal = dec!(0.35);
pub const MIN_GROWTH_RATE: Decimal = dec!(0.01);
pub const MAX_GROWTH_RATE: Decimal = dec!(0.05);

impl ProposalParams {
    /// Reject malformed parameters before any network call.
    pub fn validate(&self) -> Result<(), BrokerError> {
        if self.symbol.is_empty() {
            return Err(BrokerError::Validation {
                field: "symbol",
                reason: "must not be empty".into(),
            });
        }
        if self.currency.is_empty() {
            return Err(BrokerError::Validation {
                field: "currency",
                reason: "must not be empty".into(),
            });
        }
        if self.amount < MIN_STAKE {
            return Err(BrokerError::Validation {
                field: "amount",
                reason: format!("{} is below the {MIN_STAKE} floor", self.amount),
            });
        }
        if self.contract_type.is_accumulator() {
            match self.growth_rate {
                None => {
                    return Err(BrokerError::Validation {
                        field: "growth_rate",
                        reason: "required for ACCU".into(),
                    })
                }
                Some(rate) if !(MIN_GROWTH_RATE..=MAX_GROWTH_RATE).contains(&rate) => {
                    return Err(BrokerError::Validation {
                        field: "growth_rate",
                        reason: format!("{rate} outside {MIN_GROWTH_RATE}..{MAX_GROWTH_RATE}"),
                    })
                }
                Some(_) => {}
            }
        }
        if self.contract_type.is_digit() {
            match self.barrier.as_deref() {
                Some(b) if b.len() == 1 && b.chars().all(|c| c.is_ascii_digit()) => {}
                Some(b) => {
                    return Err(BrokerError::Validation {
                        field: "barrier",
                        reason: format!("'{b}' is not a single digit"),
                    })
                }
                None => {
                    return Err(BrokerError::Validation {
                        field: "barrier",
                        reason: "required for digit contracts".into(),
                    })
                }
            }
        }
        if !self.contract_type.is_accumulator() && self.duration.is_none() {
            return Err(BrokerError::Validation {
                field: "duration",
                reason: "required for non-ACCU contracts".into(),
            });
        }
        Ok(())
    }

    /// The `growth_rate` wire value: a decimal string like `"0.02"`.
    #[must_use]
    pub fn growth_rate_wire(&self) -> Option<String> {
        self.growth_rate.map(|r| r.normalize().to_string())
    }

    /// Build the proposal envelope (without `req_id`).
    #[must_use]
    pub fn to_wire(&self, shape: ProposalShape) -> Value {
        let mut body = json!({
            "proposal": 1,
            "amount": self.amount.to_f64(),
            "basis": "stake",
            "contract_type": self.contract_type.as_str(),
            "currency": self.currency,
            "symbol": self.symbol,
        });
        let obj = body.as_object_mut().expect("object literal");

        if let Some(duration) = self.duration {
            obj.insert("duration".into(), json!(duration));
            obj.insert(
                "duration_unit".into(),
                json!(self.duration_unit.as_deref().unwrap_or("t")),
            );
        }
        if let Some(barrier) = &self.barrier {
            obj.insert("barrier".into(), json!(barrier));
        }

        let mut accu = serde_json::Map::new();
        if let Some(rate) = self.growth_rate_wire() {
            accu.insert("growth_rate".into(), json!(rate));
        }
        if let Some(tp) = self.take_profit {
            accu.insert("limit_order".into(), json!({ "take_profit": tp.to_f64() }));
        }

        match shape {
            ProposalShape::Flat => obj.extend(accu),
            ProposalShape::Nested => {
                if !accu.is_empty() {
                    obj.insert("parameters".into(), Value::Object(accu));
                }
            }
        }
        body
    }
}

/// `authorize` envelope.
#[must_use]
pub fn authorize(token: &str) -> Value {
    json!({ "authorize": token })
}

/// `ticks_history` envelope for the most recent `count` ticks.
#[must_use]
pub fn ticks_history(symbol: &str, count: usize) -> Value {
    json!({
        "ticks_history": symbol,
        "adjust_start_time": 1,
        "count": count,
        "end": "latest",
        "style": "ticks",
    })
}

/// `ticks` subscription envelope.
#[must_use]
pub fn subscribe_ticks(symbol: &str) -> Value {
    json!({ "ticks": symbol, "subscribe": 1 })
}

/// `buy` envelope.
#[must_use]
pub fn buy(proposal_id: &str, price: Decimal) -> Value {
    json!({ "buy": proposal_id, "price": price.to_f64() })
}

/// `proposal_open_contract` poll envelope (no subscription).
#[must_use]
pub fn poll_contract(contract_id: i64) -> Value {
    json!({ "proposal_open_contract": 1, "contract_id": contract_id })
}

/// `ping` envelope.
#[must_use]
pub fn ping() -> Value {
    json!({ "ping": 1 })
}

/// Error payload inside a broker response frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorFrame {
    pub code: String,
    pub message: String,
}

/// Business rejections the admission logic must observe rather than retry.
const BUSINESS_CODES: &[&str] = &[
    "InsufficientBalance",
    "MarketIsClosed",
    "OpenPositionLimitExceeded",
    "DailyTurnoverLimitExceeded",
    "ClientUnwelcome",
];

/// Map a broker error frame to the crate error taxonomy.
#[must_use]
pub fn classify_api_error(frame: ApiErrorFrame) -> BrokerError {
    if frame.code.contains("Authoriz") || frame.code == "InvalidToken" {
        return BrokerError::Auth(frame.message);
    }
    if BUSINESS_CODES.contains(&frame.code.as_str()) {
        return BrokerError::Business {
            code: frame.code,
            message: frame.message,
        };
    }
    BrokerError::Api {
        code: frame.code,
        message: frame.message,
    }
}

/// A priced quote returned by `proposal`.
#[derive(Debug, Clone, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub ask_price: Decimal,
    #[serde(default)]
    pub payout: Option<Decimal>,
}

/// Receipt returned by `buy`.
#[derive(Debug, Clone, Deserialize)]
pub struct BuyReceipt {
    pub contract_id: i64,
    pub buy_price: Decimal,
    #[serde(default)]
    pub transaction_id: Option<i64>,
}

/// Snapshot of an open (or settled) contract.
#[derive(Debug, Clone, Deserialize)]
pub struct ContractStatus {
    pub contract_id: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_sold: Option<u8>,
    #[serde(default)]
    pub profit: Option<Decimal>,
}

impl ContractStatus {
    /// Settled means sold or carrying a terminal status.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        if self.is_sold == Some(1) {
            return true;
        }
        matches!(self.status.as_deref(), Some("won" | "lost" | "sold"))
    }

    #[must_use]
    pub fn profit(&self) -> Decimal {
        self.profit.unwrap_or(Decimal::ZERO)
    }
}

/// A pushed tick from a `ticks` subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub quote: Decimal,
    pub epoch: i64,
}
