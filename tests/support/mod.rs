#![allow(dead_code)]

//! Shared helpers for the integration tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tickradar::broker::{
    BrokerApi, BuyReceipt, ContractStatus, ContractType, Proposal, ProposalParams, ProposalShape,
};
use tickradar::domain::TradeResult;
use tickradar::error::BrokerError;
use tickradar::executor::{Executor, ExecutorSettings, RiskSettings, RiskTracker};
use tickradar::notifier::NotifierRegistry;
use tickradar::store::MemoryStore;

/// Parse `"W L L W"` (oldest first) into results, matching the order
/// [`MemoryStore::seed_history`] expects.
pub fn results(sequence: &str) -> Vec<TradeResult> {
    sequence
        .split_whitespace()
        .map(|token| match token {
            "W" => TradeResult::Win,
            "L" => TradeResult::Loss,
            other => panic!("unknown result token {other:?}"),
        })
        .collect()
}

/// A settled winning poll snapshot.
pub fn settled(contract_id: i64, profit: Decimal) -> ContractStatus {
    ContractStatus {
        contract_id,
        status: Some(if profit > Decimal::ZERO { "won" } else { "lost" }.into()),
        is_sold: Some(1),
        profit: Some(profit),
    }
}

/// A still-open poll snapshot.
pub fn open(contract_id: i64) -> ContractStatus {
    ContractStatus {
        contract_id,
        status: Some("open".into()),
        is_sold: Some(0),
        profit: None,
    }
}

/// Scripted broker double: records every proposal, hands out queued
/// errors first, then succeeds; polls pop queued snapshots.
#[derive(Default)]
pub struct ScriptedBroker {
    pub proposals: Mutex<Vec<(ProposalParams, ProposalShape)>>,
    propose_errors: Mutex<VecDeque<BrokerError>>,
    polls: Mutex<VecDeque<ContractStatus>>,
    next_contract_id: AtomicI64,
}

impl ScriptedBroker {
    pub fn new() -> Self {
        Self {
            next_contract_id: AtomicI64::new(1000),
            ..Self::default()
        }
    }

    /// Queue an error for the next `propose` call.
    pub fn fail_propose(&self, error: BrokerError) {
        self.propose_errors.lock().push_back(error);
    }

    /// Queue a poll snapshot, consumed in order.
    pub fn push_poll(&self, status: ContractStatus) {
        self.polls.lock().push_back(status);
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.lock().len()
    }
}

#[async_trait]
impl BrokerApi for ScriptedBroker {
    async fn get_ticks(&self, _symbol: &str, count: usize) -> Result<Vec<Decimal>, BrokerError> {
        Ok(vec![dec!(100); count])
    }

    async fn propose(
        &self,
        params: &ProposalParams,
        shape: ProposalShape,
    ) -> Result<Proposal, BrokerError> {
        params.validate()?;
        self.proposals.lock().push((params.clone(), shape));
        if let Some(error) = self.propose_errors.lock().pop_front() {
            return Err(error);
        }
        Ok(Proposal {
            id: format!("prop-{}", self.proposal_count()),
            ask_price: params.amount,
            payout: None,
        })
    }

    async fn buy(&self, _proposal_id: &str, price: Decimal) -> Result<BuyReceipt, BrokerError> {
        Ok(BuyReceipt {
            contract_id: self.next_contract_id.fetch_add(1, Ordering::SeqCst),
            buy_price: price,
            transaction_id: Some(1),
        })
    }

    async fn poll_contract(&self, contract_id: i64) -> Result<ContractStatus, BrokerError> {
        match self.polls.lock().pop_front() {
            Some(mut status) => {
                status.contract_id = contract_id;
                Ok(status)
            }
            None => Ok(open(contract_id)),
        }
    }
}

/// Executor settings for a plain ACCU bot, not gated on the signal row.
pub fn accu_settings(bot_name: &str) -> ExecutorSettings {
    ExecutorSettings {
        bot_name: bot_name.to_string(),
        bot_id: format!("{bot_name}-id"),
        symbol: "R_75".into(),
        currency: "USD".into(),
        contract_type: ContractType::Accu,
        growth_rate_percent: dec!(2),
        take_profit_percent: Some(dec!(10)),
        duration: None,
        duration_unit: None,
        barrier_no_loss: "8".into(),
        barrier_after_loss: "5".into(),
        signal_driven: false,
        cycle_interval_secs: 1,
        poll_interval_secs: 1,
        monitor_deadline_secs: 60,
    }
}

pub fn risk_settings() -> RiskSettings {
    RiskSettings {
        active: true,
        base_stake: dec!(1.00),
        martingale_factor: dec!(2),
        daily_loss_floor: dec!(25.00),
        daily_profit_ceiling: dec!(50.00),
        max_open_contracts: 1,
    }
}

/// Wire a full executor around the scripted broker and a fresh store.
pub fn build_executor(
    broker: Arc<ScriptedBroker>,
    store: Arc<MemoryStore>,
    settings: ExecutorSettings,
) -> Executor {
    Executor::new(
        broker,
        store,
        Arc::new(NotifierRegistry::default()),
        settings,
        RiskTracker::new(risk_settings()),
    )
}
