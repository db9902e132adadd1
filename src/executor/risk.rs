//! Pre-trade admission and stake management for one bot.
//!
//! Tracks consecutive losses, the martingale stake, and rolling daily
//! totals. Daily totals roll over at UTC midnight; breaching either the
//! loss floor or the profit ceiling ends the bot's trading day.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::domain::Signal;
use crate::error::RiskError;

/// Risk knobs from the bot configuration.
#[derive(Debug, Clone)]
pub struct RiskSettings {
    pub active: bool,
    pub base_stake: Decimal,
    /// Loss-doubling multiplier; `1.0` (or less) disables martingale.
    pub martingale_factor: Decimal,
    /// Positive magnitude; the day ends when cumulative loss reaches it.
    pub daily_loss_floor: Decimal,
    /// Positive magnitude; the day ends when cumulative profit reaches it.
    pub daily_profit_ceiling: Decimal,
    pub max_open_contracts: usize,
}

/// Mutable risk state, owned by the executor.
#[derive(Debug)]
pub struct RiskTracker {
    settings: RiskSettings,
    consecutive_losses: u32,
    next_stake: Decimal,
    daily_profit: Decimal,
    day: NaiveDate,
}

impl RiskTracker {
    #[must_use]
    pub fn new(settings: RiskSettings) -> Self {
        let next_stake = settings.base_stake;
        Self {
            settings,
            consecutive_losses: 0,
            next_stake,
            daily_profit: Decimal::ZERO,
            day: Utc::now().date_naive(),
        }
    }

    /// Pre-trade admission: inactive bot, open-contract cap, daily floors,
    /// and the signal gate (when signal-driven).
    pub fn admit(
        &mut self,
        open_contracts: usize,
        signal: Option<&Signal>,
    ) -> Result<(), RiskError> {
        self.rollover();

        if !self.settings.active {
            return Err(RiskError::BotInactive);
        }
        if open_contracts >= self.settings.max_open_contracts {
            return Err(RiskError::OpenContractCap {
                open: open_contracts,
                cap: self.settings.max_open_contracts,
            });
        }
        if self.daily_profit <= -self.settings.daily_loss_floor {
            return Err(RiskError::DailyLossFloor {
                loss: self.daily_profit,
                floor: self.settings.daily_loss_floor,
            });
        }
        if self.settings.daily_profit_ceiling > Decimal::ZERO
            && self.daily_profit >= self.settings.daily_profit_ceiling
        {
            return Err(RiskError::DailyProfitCeiling {
                profit: self.daily_profit,
                ceiling: self.settings.daily_profit_ceiling,
            });
        }
        if let Some(signal) = signal {
            if !signal.is_safe_to_operate {
                return Err(RiskError::SignalUnsafe {
                    reason: signal.reason.clone(),
                });
            }
        }
        Ok(())
    }

    /// The stake for the next contract.
    #[must_use]
    pub fn stake(&self) -> Decimal {
        self.next_stake
    }

    #[must_use]
    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    #[must_use]
    pub fn daily_profit(&self) -> Decimal {
        self.daily_profit
    }

    /// Fold one settlement into the risk state: martingale on loss
    /// (`next = |loss| x factor`), reset to base on win.
    pub fn record_settlement(&mut self, profit: Decimal) {
        self.rollover();
        self.daily_profit += profit;

        if profit > Decimal::ZERO {
            self.consecutive_losses = 0;
            self.next_stake = self.settings.base_stake;
        } else {
            self.consecutive_losses += 1;
            // A break-even settlement has no loss to multiply.
            self.next_stake = if self.settings.martingale_factor > Decimal::ONE
                && profit < Decimal::ZERO
            {
                profit.abs() * self.settings.martingale_factor
            } else {
                self.settings.base_stake
            };
        }
    }

    fn rollover(&mut self) {
        let today = Utc::now().date_naive();
        if today != self.day {
            self.day = today;
            self.daily_profit = Decimal::ZERO;
        }
    }
}
