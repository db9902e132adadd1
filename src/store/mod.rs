//! Store adapter: typed operations against the hosted row store.
//!
//! The [`Store`] trait is the seam between the radar/executor and the
//! hosted relational surface. [`RestStore`] speaks the PostgREST-style
//! HTTP dialect the hosted store exposes; the in-memory implementation
//! (behind the `testkit` feature) backs the tests.
//!
//! Callers wrap individual operations in a [`RetryPolicy`]; the adapter
//! itself performs exactly one attempt per call and never swallows a
//! failed write.

mod rest;
mod retry;

#[cfg(feature = "testkit")]
mod memory;

pub use rest::RestStore;
pub use retry::RetryPolicy;

#[cfg(feature = "testkit")]
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ExecutionPatch, NewOutcome, NewStrategyExecution, Outcome, Signal};
use crate::error::StoreError;

/// Typed row operations over the three logical tables.
#[async_trait]
pub trait Store: Send + Sync {
    /// Most recent outcomes ordered by `id` descending, optionally
    /// filtered to one bot.
    async fn read_recent_outcomes(
        &self,
        bot_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Outcome>, StoreError>;

    /// Upsert the per-bot signal row, keyed on `bot_name`. Returns the
    /// row id.
    async fn upsert_signal(&self, signal: &Signal) -> Result<i64, StoreError>;

    /// Current signal row for a bot, if one has ever been upserted.
    async fn read_signal(&self, bot_name: &str) -> Result<Option<Signal>, StoreError>;

    /// Append a new strategy execution row, returning its id.
    async fn insert_strategy_execution(
        &self,
        execution: &NewStrategyExecution,
    ) -> Result<i64, StoreError>;

    /// Patch an existing strategy execution row.
    async fn update_strategy_execution(
        &self,
        id: i64,
        patch: &ExecutionPatch,
    ) -> Result<(), StoreError>;

    /// Append a settled outcome to the operation log, returning its id.
    async fn append_outcome(&self, outcome: &NewOutcome) -> Result<i64, StoreError>;

    /// Mark this bot's WAITING/MONITORING executions created before
    /// `older_than` as TIMEOUT. Returns how many rows were touched.
    async fn timeout_stale_executions(
        &self,
        bot_name: &str,
        older_than: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}
