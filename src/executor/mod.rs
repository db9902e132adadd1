//! The executor: admission, placement, settlement monitoring, recording.
//!
//! One cycle is propose -> buy -> poll-until-settled -> append outcome ->
//! risk update. All broker calls of one bot serialize through the bot's
//! own lock; different bots share only the connection pool and its global
//! in-flight cap.

mod risk;

pub use risk::{RiskSettings, RiskTracker};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::broker::{BrokerApi, ContractStatus, ContractType, ProposalParams, ProposalShape, MIN_STAKE};
use crate::domain::NewOutcome;
use crate::error::{BrokerError, Error, RiskError};
use crate::notifier::{Event, NotifierRegistry};
use crate::store::{RetryPolicy, Store};

/// Executor tuning, derived from the bot configuration.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub bot_name: String,
    pub bot_id: String,
    pub symbol: String,
    pub currency: String,
    pub contract_type: ContractType,
    /// ACCU growth rate as a percent; divided by 100 on the wire.
    pub growth_rate_percent: Decimal,
    /// Take profit as a percent of the stake; sent in absolute currency.
    pub take_profit_percent: Option<Decimal>,
    pub duration: Option<u32>,
    pub duration_unit: Option<String>,
    /// Digit barrier schedule: no losses yet vs. inside a loss run.
    pub barrier_no_loss: String,
    pub barrier_after_loss: String,
    /// Consume the signal row before trading; a self-driving executor
    /// skips the gate.
    pub signal_driven: bool,
    pub cycle_interval_secs: u64,
    pub poll_interval_secs: u64,
    /// Per-contract monitor deadline, at least 60 s.
    pub monitor_deadline_secs: u64,
}

/// What one executor cycle did.
#[derive(Debug)]
pub enum Cycle {
    /// Admission refused; carries the reason.
    Skipped(RiskError),
    /// Contract settled within the monitor deadline.
    Settled { contract_id: i64, profit: Decimal },
    /// Monitoring hit its deadline; a detached task keeps polling and
    /// records the outcome when it is eventually observed.
    MonitorDetached { contract_id: i64 },
}

/// The execution component for one bot.
pub struct Executor {
    broker: Arc<dyn BrokerApi>,
    store: Arc<dyn Store>,
    notifiers: Arc<NotifierRegistry>,
    settings: ExecutorSettings,
    /// Shared with detached monitors so late settlements still count.
    risk: Arc<Mutex<RiskTracker>>,
    retry: RetryPolicy,
    /// Serializes all broker activity of this bot.
    trade_lock: tokio::sync::Mutex<()>,
    /// Contracts bought but not yet observed settled.
    open_contracts: Arc<Mutex<Vec<i64>>>,
}

impl Executor {
    #[must_use]
    pub fn new(
        broker: Arc<dyn BrokerApi>,
        store: Arc<dyn Store>,
        notifiers: Arc<NotifierRegistry>,
        settings: ExecutorSettings,
        risk: RiskTracker,
    ) -> Self {
        Self {
            broker,
            store,
            notifiers,
            settings,
            risk: Arc::new(Mutex::new(risk)),
            retry: RetryPolicy::default(),
            trade_lock: tokio::sync::Mutex::new(()),
            open_contracts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Override the store retry policy (tests use an immediate one).
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn risk(&self) -> parking_lot::MutexGuard<'_, RiskTracker> {
        self.risk.lock()
    }

    /// Digit barrier by the configured schedule.
    #[must_use]
    pub fn barrier(&self) -> String {
        if self.risk.lock().consecutive_losses() == 0 {
            self.settings.barrier_no_loss.clone()
        } else {
            self.settings.barrier_after_loss.clone()
        }
    }

    /// Concrete proposal parameters for the next contract.
    #[must_use]
    pub fn build_proposal(&self) -> ProposalParams {
        let stake = self.risk.lock().stake().max(MIN_STAKE);
        let contract_type = self.settings.contract_type;
        ProposalParams {
            contract_type,
            symbol: self.settings.symbol.clone(),
            amount: stake,
            currency: self.settings.currency.clone(),
            duration: self.settings.duration,
            duration_unit: self.settings.duration_unit.clone(),
            barrier: contract_type.is_digit().then(|| self.barrier()),
            growth_rate: contract_type
                .is_accumulator()
                .then(|| self.settings.growth_rate_percent / dec!(100)),
            take_profit: self
                .settings
                .take_profit_percent
                .map(|pct| (stake * pct / dec!(100)).round_dp(2)),
        }
    }

    /// Run cycles until the shutdown flag flips.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), Error> {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.settings.cycle_interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => match self.run_cycle().await {
                    Ok(Cycle::Skipped(
                        reason @ (RiskError::DailyLossFloor { .. }
                        | RiskError::DailyProfitCeiling { .. }),
                    )) => {
                        self.notifiers.notify_all(&Event::BotStopped {
                            bot_name: self.settings.bot_name.clone(),
                            reason: reason.to_string(),
                        });
                        info!(bot = %self.settings.bot_name, %reason, "trading day over");
                        return Ok(());
                    }
                    Ok(cycle) => debug!(bot = %self.settings.bot_name, ?cycle, "cycle done"),
                    Err(Error::Broker(e)) if e.is_fatal() => {
                        self.notifiers.notify_all(&Event::BotStopped {
                            bot_name: self.settings.bot_name.clone(),
                            reason: e.to_string(),
                        });
                        return Err(Error::Broker(e));
                    }
                    Err(Error::Broker(e)) if e.is_business() => {
                        // Portfolio cap, market closed: wait and re-check.
                        warn!(bot = %self.settings.bot_name, error = %e, "broker refused, backing off");
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                    Err(e) => {
                        warn!(bot = %self.settings.bot_name, error = %e, "cycle failed");
                    }
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(bot = %self.settings.bot_name, "executor shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// One full trade cycle under the per-bot lock.
    pub async fn run_cycle(&mut self) -> Result<Cycle, Error> {
        let _guard = self.trade_lock.lock().await;

        // Verify-and-sweep before any new proposal: poll known open
        // contracts once and drop the settled ones.
        let open = self.sweep_open_contracts().await;

        let signal = if self.settings.signal_driven {
            let store = &self.store;
            let bot = self.settings.bot_name.clone();
            self.retry
                .run("read_signal", || {
                    let store = Arc::clone(store);
                    let bot = bot.clone();
                    async move { store.read_signal(&bot).await }
                })
                .await?
        } else {
            None
        };

        if let Err(refusal) = self.risk.lock().admit(open, signal.as_ref()) {
            debug!(bot = %self.settings.bot_name, %refusal, "admission refused");
            return Ok(Cycle::Skipped(refusal));
        }

        let params = self.build_proposal();
        let stake = params.amount;
        let proposal = self.propose_with_shape_fallback(&params).await?;
        let receipt = self.broker.buy(&proposal.id, proposal.ask_price).await?;
        info!(
            bot = %self.settings.bot_name,
            contract_id = receipt.contract_id,
            %stake,
            price = %receipt.buy_price,
            "contract bought"
        );
        self.open_contracts.lock().push(receipt.contract_id);

        match self.monitor(receipt.contract_id).await {
            Ok(status) => {
                let profit = status.profit();
                self.record_outcome(profit, stake).await?;
                self.open_contracts
                    .lock()
                    .retain(|&id| id != receipt.contract_id);
                self.risk.lock().record_settlement(profit);
                self.notifiers.notify_all(&Event::TradeSettled {
                    bot_name: self.settings.bot_name.clone(),
                    profit,
                    stake,
                });
                Ok(Cycle::Settled {
                    contract_id: receipt.contract_id,
                    profit,
                })
            }
            Err(BrokerError::Timeout { .. }) => {
                warn!(
                    bot = %self.settings.bot_name,
                    contract_id = receipt.contract_id,
                    "monitor deadline hit, detaching"
                );
                self.detach_monitor(receipt.contract_id, stake);
                Ok(Cycle::MonitorDetached {
                    contract_id: receipt.contract_id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Propose, falling back across body shapes when the broker demands
    /// nested parameters. The growth rate stays the same string either way.
    async fn propose_with_shape_fallback(
        &self,
        params: &ProposalParams,
    ) -> Result<crate::broker::Proposal, BrokerError> {
        match self.broker.propose(params, ProposalShape::Flat).await {
            Err(e) if is_nested_shape_error(&e) => {
                warn!(bot = %self.settings.bot_name, error = %e, "flat proposal rejected, retrying");
                match self.broker.propose(params, ProposalShape::Flat).await {
                    Err(e) if is_nested_shape_error(&e) => {
                        self.broker.propose(params, ProposalShape::Nested).await
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Poll each known open contract once, keeping only the unsettled.
    /// Returns how many remain open.
    async fn sweep_open_contracts(&self) -> usize {
        let ids: Vec<i64> = self.open_contracts.lock().clone();
        if ids.is_empty() {
            return 0;
        }
        let mut still_open = Vec::new();
        for id in ids {
            match self.broker.poll_contract(id).await {
                Ok(status) if status.is_settled() => {
                    debug!(contract_id = id, "swept settled contract");
                }
                Ok(_) => still_open.push(id),
                Err(e) => {
                    // Unknown state counts as open; we must not over-trade.
                    warn!(contract_id = id, error = %e, "sweep poll failed");
                    still_open.push(id);
                }
            }
        }
        let open = still_open.len();
        *self.open_contracts.lock() = still_open;
        open
    }

    /// Poll at most 1 Hz until settlement or the per-contract deadline.
    async fn monitor(&self, contract_id: i64) -> Result<ContractStatus, BrokerError> {
        let deadline = Duration::from_secs(self.settings.monitor_deadline_secs.max(60));
        let interval = Duration::from_secs(self.settings.poll_interval_secs.max(1));
        let started = tokio::time::Instant::now();

        loop {
            match self.broker.poll_contract(contract_id).await {
                Ok(status) if status.is_settled() => return Ok(status),
                Ok(_) => {}
                Err(e) if e.is_transient() => {
                    warn!(contract_id, error = %e, "poll failed, will retry");
                }
                Err(e) => return Err(e),
            }
            if started.elapsed() >= deadline {
                return Err(BrokerError::Timeout {
                    endpoint: "proposal_open_contract",
                    seconds: deadline.as_secs(),
                });
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Keep polling on a detached task and record the outcome when the
    /// contract is eventually observed settled.
    fn detach_monitor(&self, contract_id: i64, stake: Decimal) {
        let broker = Arc::clone(&self.broker);
        let store = Arc::clone(&self.store);
        let retry = self.retry;
        let risk = Arc::clone(&self.risk);
        let open_contracts = Arc::clone(&self.open_contracts);
        let bot_id = self.settings.bot_id.clone();
        let bot_name = self.settings.bot_name.clone();
        let interval = Duration::from_secs(self.settings.poll_interval_secs.max(1));

        tokio::spawn(async move {
            // Bounded: give a stuck contract ten more minutes.
            let give_up = tokio::time::Instant::now() + Duration::from_secs(600);
            loop {
                tokio::time::sleep(interval).await;
                match broker.poll_contract(contract_id).await {
                    Ok(status) if status.is_settled() => {
                        let profit = status.profit();
                        // A late loss still moves the martingale stake and
                        // the daily floor; fold it in before anything else.
                        risk.lock().record_settlement(profit);
                        let outcome = new_outcome(&bot_id, &bot_name, profit, stake);
                        let result = retry
                            .run("append_outcome", || {
                                let store = Arc::clone(&store);
                                let outcome = outcome.clone();
                                async move { store.append_outcome(&outcome).await }
                            })
                            .await;
                        if let Err(e) = result {
                            warn!(contract_id, error = %e, "late outcome not recorded");
                        }
                        open_contracts.lock().retain(|&id| id != contract_id);
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => debug!(contract_id, error = %e, "late poll failed"),
                }
                if tokio::time::Instant::now() >= give_up {
                    warn!(contract_id, "gave up on detached monitor");
                    return;
                }
            }
        });
    }

    async fn record_outcome(&self, profit: Decimal, stake: Decimal) -> Result<(), Error> {
        let outcome = new_outcome(
            &self.settings.bot_id,
            &self.settings.bot_name,
            profit,
            stake,
        );
        let store = &self.store;
        self.retry
            .run("append_outcome", || {
                let store = Arc::clone(store);
                let outcome = outcome.clone();
                async move { store.append_outcome(&outcome).await }
            })
            .await?;
        Ok(())
    }
}

/// Result and realized profit share derive from the settlement.
fn new_outcome(bot_id: &str, bot_name: &str, profit: Decimal, stake: Decimal) -> NewOutcome {
    let profit_percentage = if stake > Decimal::ZERO {
        (profit / stake * dec!(100)).round_dp(2)
    } else {
        Decimal::ZERO
    };
    NewOutcome::new(bot_id, bot_name, profit_percentage, stake)
}

/// The broker rejected the flat ACCU body and wants nested parameters.
fn is_nested_shape_error(err: &BrokerError) -> bool {
    match err {
        BrokerError::Api { code, message } => {
            message.to_ascii_lowercase().contains("nested")
                || code == "ContractCreationFailure"
        }
        _ => false,
    }
}
