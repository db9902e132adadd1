//! Pooled, rate-limited, auto-reconnecting WebSocket client for the
//! binary-options broker.
//!
//! Public surface: [`BrokerClient`] with `get_ticks`, `propose`, `buy`,
//! `poll_contract` and `subscribe_ticks`, plus the [`BrokerApi`] trait the
//! executor is written against so tests can script the broker.

mod connection;
mod messages;
mod pool;
mod rate_limit;

pub use messages::{
    classify_api_error, ApiErrorFrame, BuyReceipt, ContractStatus, ContractType, Proposal,
    ProposalParams, ProposalShape, Tick, MAX_GROWTH_RATE, MIN_GROWTH_RATE, MIN_STAKE,
};
pub use pool::BrokerPool;
pub use rate_limit::{RateLimits, SlidingWindowLimiter};

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::BrokerError;

/// The request families the client issues, each with its own deadline and
/// rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Authorize,
    TicksHistory,
    Proposal,
    Buy,
    PollContract,
    Subscribe,
    Ping,
}

impl Endpoint {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Authorize => "authorize",
            Self::TicksHistory => "ticks_history",
            Self::Proposal => "proposal",
            Self::Buy => "buy",
            Self::PollContract => "proposal_open_contract",
            Self::Subscribe => "ticks",
            Self::Ping => "ping",
        }
    }

    /// Per-endpoint request deadline.
    #[must_use]
    pub const fn deadline(self) -> Duration {
        match self {
            Self::Authorize => Duration::from_secs(30),
            Self::TicksHistory | Self::PollContract | Self::Subscribe => Duration::from_secs(10),
            Self::Proposal | Self::Buy => Duration::from_secs(15),
            Self::Ping => Duration::from_secs(5),
        }
    }
}

/// Broker operations the executor depends on.
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// Recent tick history, oldest first.
    async fn get_ticks(&self, symbol: &str, count: usize) -> Result<Vec<Decimal>, BrokerError>;

    /// Build a price quote for a contract.
    async fn propose(
        &self,
        params: &ProposalParams,
        shape: ProposalShape,
    ) -> Result<Proposal, BrokerError>;

    /// Buy a previously proposed contract at the intended price.
    async fn buy(&self, proposal_id: &str, price: Decimal) -> Result<BuyReceipt, BrokerError>;

    /// Poll an open contract until the caller observes settlement.
    async fn poll_contract(&self, contract_id: i64) -> Result<ContractStatus, BrokerError>;
}

/// Connection settings for the pool.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub ws_url: String,
    pub token: String,
    pub pool_size: usize,
    pub max_in_flight: usize,
    pub limits: RateLimits,
}

/// Pooled, rate-limited broker client.
///
/// One value per bot: the sliding-window limiter inside is the bot's own,
/// while the pool and its global semaphore may be shared across bots.
pub struct BrokerClient {
    pool: std::sync::Arc<BrokerPool>,
    limiter: SlidingWindowLimiter,
}

impl BrokerClient {
    /// Connect a fresh pool and wrap it for a single bot.
    pub async fn connect(settings: &BrokerSettings) -> Result<Self, BrokerError> {
        let pool = BrokerPool::connect(
            &settings.ws_url,
            &settings.token,
            settings.pool_size,
            settings.max_in_flight,
        )
        .await?;
        Ok(Self::with_pool(
            std::sync::Arc::new(pool),
            settings.limits.clone(),
        ))
    }

    /// Wrap a shared pool with this bot's own limiter.
    #[must_use]
    pub fn with_pool(pool: std::sync::Arc<BrokerPool>, limits: RateLimits) -> Self {
        Self {
            pool,
            limiter: SlidingWindowLimiter::new(limits),
        }
    }

    #[must_use]
    pub fn live_connections(&self) -> usize {
        self.pool.live_connections()
    }

    async fn request(&self, endpoint: Endpoint, payload: Value) -> Result<Value, BrokerError> {
        self.limiter.acquire(endpoint).await;
        self.pool.request(endpoint, payload).await
    }

    /// Long-lived tick stream for `symbol`; pushes arrive on the returned
    /// receiver, which owns the subscription.
    pub async fn subscribe_ticks(&self, symbol: &str) -> Result<mpsc::Receiver<Tick>, BrokerError> {
        self.limiter.acquire(Endpoint::Subscribe).await;
        let (raw_tx, mut raw_rx) = mpsc::channel::<Value>(64);
        self.pool
            .subscribe(symbol, messages::subscribe_ticks(symbol), raw_tx)
            .await?;

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            while let Some(value) = raw_rx.recv().await {
                let Some(tick) = value
                    .get("tick")
                    .and_then(|t| serde_json::from_value::<Tick>(t.clone()).ok())
                else {
                    continue;
                };
                if tx.send(tick).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

fn decode_field<T: serde::de::DeserializeOwned>(
    value: &Value,
    field: &'static str,
) -> Result<T, BrokerError> {
    let inner = value.get(field).ok_or_else(|| BrokerError::Api {
        code: "MalformedResponse".into(),
        message: format!("missing '{field}' in response"),
    })?;
    serde_json::from_value(inner.clone()).map_err(BrokerError::Json)
}

#[async_trait]
impl BrokerApi for BrokerClient {
    async fn get_ticks(&self, symbol: &str, count: usize) -> Result<Vec<Decimal>, BrokerError> {
        let response = self
            .request(Endpoint::TicksHistory, messages::ticks_history(symbol, count))
            .await?;
        let history = response.get("history").ok_or_else(|| BrokerError::Api {
            code: "MalformedResponse".into(),
            message: "missing 'history'".into(),
        })?;
        decode_field(history, "prices")
    }

    async fn propose(
        &self,
        params: &ProposalParams,
        shape: ProposalShape,
    ) -> Result<Proposal, BrokerError> {
        params.validate()?;
        let response = self
            .request(Endpoint::Proposal, params.to_wire(shape))
            .await?;
        decode_field(&response, "proposal")
    }

    async fn buy(&self, proposal_id: &str, price: Decimal) -> Result<BuyReceipt, BrokerError> {
        let response = self
            .request(Endpoint::Buy, messages::buy(proposal_id, price))
            .await?;
        decode_field(&response, "buy")
    }

    async fn poll_contract(&self, contract_id: i64) -> Result<ContractStatus, BrokerError> {
        let response = self
            .request(Endpoint::PollContract, messages::poll_contract(contract_id))
            .await?;
        decode_field(&response, "proposal_open_contract")
    }
}
