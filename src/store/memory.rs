//! In-memory store used by tests and the `testkit` feature.
//!
//! Behaves like the hosted store: monotonic ids, upsert keyed on
//! `bot_name`, patches merged field-wise. Failures can be injected per
//! operation to exercise the retry policy and crash-ordering invariants.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::domain::{
    ExecutionPatch, ExecutionStatus, NewOutcome, NewStrategyExecution, Outcome, Signal,
    StrategyExecution, TradeResult,
};
use crate::error::StoreError;

use super::Store;

#[derive(Default)]
struct Inner {
    outcomes: Vec<Outcome>,
    signals: HashMap<String, (i64, Signal)>,
    executions: Vec<StrategyExecution>,
    next_outcome_id: i64,
    next_signal_id: i64,
    next_execution_id: i64,
    /// Remaining injected failures per operation name.
    failures: HashMap<&'static str, u32>,
}

/// Deterministic in-memory [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls to `operation` fail with a transient
    /// error.
    pub fn fail_next(&self, operation: &'static str, times: u32) {
        self.inner.lock().failures.insert(operation, times);
    }

    /// Seed one settled outcome and return its id.
    pub fn seed_outcome(&self, bot_name: &str, result: TradeResult) -> i64 {
        let profit = match result {
            TradeResult::Win => Decimal::ONE,
            TradeResult::Loss => -Decimal::ONE,
        };
        let mut inner = self.inner.lock();
        inner.next_outcome_id += 1;
        let id = inner.next_outcome_id;
        inner.outcomes.push(Outcome {
            id,
            bot_id: format!("{bot_name}-id"),
            bot_name: bot_name.to_string(),
            result,
            profit_percentage: profit,
            stake_value: Decimal::ONE,
            timestamp: Utc::now(),
        });
        id
    }

    /// Seed a whole history, oldest first.
    pub fn seed_history(&self, bot_name: &str, results: &[TradeResult]) {
        for &r in results {
            self.seed_outcome(bot_name, r);
        }
    }

    #[must_use]
    pub fn signal_for(&self, bot_name: &str) -> Option<Signal> {
        self.inner
            .lock()
            .signals
            .get(bot_name)
            .map(|(_, s)| s.clone())
    }

    #[must_use]
    pub fn signal_row_count(&self) -> usize {
        self.inner.lock().signals.len()
    }

    #[must_use]
    pub fn executions(&self) -> Vec<StrategyExecution> {
        self.inner.lock().executions.clone()
    }

    #[must_use]
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.inner.lock().outcomes.clone()
    }

    /// Push a pre-shaped execution row, for startup-cleanup tests.
    pub fn seed_execution(&self, mut row: StrategyExecution) -> i64 {
        let mut inner = self.inner.lock();
        inner.next_execution_id += 1;
        row.id = inner.next_execution_id;
        let id = row.id;
        inner.executions.push(row);
        id
    }

    fn take_failure(inner: &mut Inner, operation: &'static str) -> Result<(), StoreError> {
        if let Some(left) = inner.failures.get_mut(operation) {
            if *left > 0 {
                *left -= 1;
                return Err(StoreError::Timeout { operation });
            }
        }
        Ok(())
    }
}

fn apply_patch(row: &mut StrategyExecution, patch: &ExecutionPatch) {
    if let Some(r) = patch.operation_1_result {
        row.operation_1_result = Some(r);
    }
    if let Some(at) = patch.operation_1_completed_at {
        row.operation_1_completed_at = Some(at);
    }
    if let Some(r) = patch.operation_2_result {
        row.operation_2_result = Some(r);
    }
    if let Some(at) = patch.operation_2_completed_at {
        row.operation_2_completed_at = Some(at);
    }
    if let Some(f) = patch.final_result {
        row.final_result = Some(f);
    }
    if let Some(s) = patch.pattern_success {
        row.pattern_success = Some(s);
    }
    if let Some(s) = patch.status {
        row.status = s;
    }
    if let Some(at) = patch.updated_at {
        row.updated_at = Some(at);
    }
    if let Some(at) = patch.completed_at {
        row.completed_at = Some(at);
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn read_recent_outcomes(
        &self,
        bot_name: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Outcome>, StoreError> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner, "read_recent_outcomes")?;
        let mut rows: Vec<Outcome> = inner
            .outcomes
            .iter()
            .filter(|o| bot_name.map_or(true, |b| o.bot_name == b))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn upsert_signal(&self, signal: &Signal) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner, "upsert_signal")?;
        if let Some((id, existing)) = inner.signals.get_mut(&signal.bot_name) {
            *existing = signal.clone();
            return Ok(*id);
        }
        inner.next_signal_id += 1;
        let id = inner.next_signal_id;
        inner
            .signals
            .insert(signal.bot_name.clone(), (id, signal.clone()));
        Ok(id)
    }

    async fn read_signal(&self, bot_name: &str) -> Result<Option<Signal>, StoreError> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner, "read_signal")?;
        Ok(inner.signals.get(bot_name).map(|(_, s)| s.clone()))
    }

    async fn insert_strategy_execution(
        &self,
        execution: &NewStrategyExecution,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner, "insert_strategy_execution")?;
        inner.next_execution_id += 1;
        let id = inner.next_execution_id;
        inner.executions.push(StrategyExecution {
            id,
            bot_name: execution.bot_name.clone(),
            strategy_name: execution.strategy_name.clone(),
            confidence_level: execution.confidence_level,
            trigger_type: execution.trigger_type.clone(),
            pattern_detected_at: execution.pattern_detected_at,
            operation_1_result: None,
            operation_1_completed_at: None,
            operation_2_result: None,
            operation_2_completed_at: None,
            final_result: None,
            pattern_success: None,
            status: execution.status,
            created_at: execution.created_at,
            updated_at: None,
            completed_at: None,
        });
        Ok(id)
    }

    async fn update_strategy_execution(
        &self,
        id: i64,
        patch: &ExecutionPatch,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner, "update_strategy_execution")?;
        let row = inner
            .executions
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| StoreError::Schema(format!("no strategy_execution row {id}")))?;
        apply_patch(row, patch);
        Ok(())
    }

    async fn append_outcome(&self, outcome: &NewOutcome) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner, "append_outcome")?;
        inner.next_outcome_id += 1;
        let id = inner.next_outcome_id;
        inner.outcomes.push(Outcome {
            id,
            bot_id: outcome.bot_id.clone(),
            bot_name: outcome.bot_name.clone(),
            result: outcome.result,
            profit_percentage: outcome.profit_percentage,
            stake_value: outcome.stake_value,
            timestamp: outcome.timestamp,
        });
        Ok(id)
    }

    async fn timeout_stale_executions(
        &self,
        bot_name: &str,
        older_than: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        Self::take_failure(&mut inner, "timeout_stale_executions")?;
        let now = Utc::now();
        let mut touched = 0;
        for row in inner
            .executions
            .iter_mut()
            .filter(|e| e.bot_name == bot_name && e.status.is_active() && e.created_at < older_than)
        {
            row.status = ExecutionStatus::Timeout;
            row.updated_at = Some(now);
            touched += 1;
        }
        Ok(touched)
    }
}
