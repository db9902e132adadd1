//! The signal radar: periodic pattern analysis and post-pattern tracking.
//!
//! One pass every Δ seconds: read the recent outcome window, then either
//! look for a pattern (ANALYZING) or attribute newly settled outcomes to
//! the pattern being tracked (MONITORING). Every pass upserts the bot's
//! signal row so downstream subscribers can detect liveness.
//!
//! Within one pass, reads of the operation log strictly precede writes of
//! `signal` and `strategy_execution`, and the in-memory state is mutated
//! only after the corresponding store write succeeds.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::domain::{
    BotState, ExecutionPatch, FinalResult, NewStrategyExecution, Outcome, RadarState, Signal,
    TradeResult,
};
use crate::error::Error;
use crate::notifier::{Event, NotifierRegistry};
use crate::pattern::{PatternCatalog, Regime, Verdict, Window};
use crate::store::{RetryPolicy, Store};

/// Radar tuning, derived from the bot configuration.
#[derive(Debug, Clone)]
pub struct RadarSettings {
    pub bot_name: String,
    /// Seconds between passes (Δ).
    pub analysis_interval_secs: u64,
    /// Outcomes required before pattern evaluation is enabled.
    pub min_history: usize,
    /// Post-pattern outcomes to attribute (1 or 2).
    pub required_post_operations: u8,
    /// How many recent outcomes each pass reads (at most 35).
    pub window_size: usize,
}

impl RadarSettings {
    #[must_use]
    pub fn for_bot(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            analysis_interval_secs: 5,
            min_history: 10,
            required_post_operations: 1,
            window_size: 35,
        }
    }
}

/// The radar component. Owns its [`RadarState`] and its bot's signal row.
pub struct Radar {
    store: Arc<dyn Store>,
    catalog: PatternCatalog,
    notifiers: Arc<NotifierRegistry>,
    retry: RetryPolicy,
    settings: RadarSettings,
    state: RadarState,
    /// Last upserted signal, reused for pure heartbeat refreshes.
    last_signal: Option<Signal>,
}

impl Radar {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        catalog: PatternCatalog,
        notifiers: Arc<NotifierRegistry>,
        settings: RadarSettings,
    ) -> Self {
        Self {
            store,
            catalog,
            notifiers,
            retry: RetryPolicy::default(),
            settings,
            state: RadarState::new(),
            last_signal: None,
        }
    }

    /// Override the store retry policy (tests use an immediate one).
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read-only view of the radar state, for diagnostics and tests.
    #[must_use]
    pub fn state(&self) -> &RadarState {
        &self.state
    }

    /// Mark this bot's stale WAITING/MONITORING trackers as TIMEOUT.
    ///
    /// Runs once on process start; a tracker older than one hour cannot be
    /// resumed because the in-memory state that owned it is gone.
    pub async fn startup_cleanup(&self) -> Result<u64, Error> {
        let cutoff = Utc::now() - ChronoDuration::hours(1);
        let store = &self.store;
        let bot = self.settings.bot_name.clone();
        let stale = self
            .retry
            .run("timeout_stale_executions", || {
                let store = Arc::clone(store);
                let bot = bot.clone();
                async move { store.timeout_stale_executions(&bot, cutoff).await }
            })
            .await?;
        if stale > 0 {
            warn!(bot = %self.settings.bot_name, stale, "timed out stale strategy executions");
        }
        Ok(stale)
    }

    /// Run the radar loop until the shutdown flag flips.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), Error> {
        self.startup_cleanup().await?;
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
            self.settings.analysis_interval_secs,
        ));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.pass().await {
                        error!(bot = %self.settings.bot_name, error = %e, "radar pass failed");
                        if matches!(e, Error::Store(ref s) if !s.is_transient()) {
                            // Schema contract broken: stop the bot.
                            self.notifiers.notify_all(&Event::BotStopped {
                                bot_name: self.settings.bot_name.clone(),
                                reason: e.to_string(),
                            });
                            return Err(e);
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(bot = %self.settings.bot_name, "radar shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// One radar pass.
    pub async fn pass(&mut self) -> Result<(), Error> {
        let window_size = self.settings.window_size.min(35);
        let store = &self.store;
        let bot = self.settings.bot_name.clone();
        let outcomes = self
            .retry
            .run("read_recent_outcomes", || {
                let store = Arc::clone(store);
                let bot = bot.clone();
                async move { store.read_recent_outcomes(Some(&bot), window_size).await }
            })
            .await?;
        let latest_id = outcomes.first().map_or(0, |o| o.id);

        match self.state.bot_state {
            BotState::Monitoring => self.monitoring_pass(&outcomes, latest_id).await,
            BotState::Analyzing => self.analyzing_pass(&outcomes, latest_id).await,
        }
    }

    /// MONITORING: attribute newly settled outcomes to the active pattern.
    /// No pattern re-evaluation happens here.
    async fn monitoring_pass(&mut self, outcomes: &[Outcome], latest_id: i64) -> Result<(), Error> {
        let Some(active) = self.state.active_signal.clone() else {
            // Should be unreachable; recover by dropping back to analysis.
            warn!(bot = %self.settings.bot_name, "monitoring without an active signal, resetting");
            self.state.reset();
            return Ok(());
        };

        if latest_id <= self.state.last_seen_outcome_id {
            // Nothing new settled; refresh liveness only.
            return self.heartbeat().await;
        }

        // New outcomes, oldest first, beyond the cursor.
        let mut fresh: Vec<&Outcome> = outcomes
            .iter()
            .filter(|o| o.id > self.state.last_seen_outcome_id)
            .collect();
        fresh.sort_by_key(|o| o.id);

        for outcome in fresh {
            let slot = self.state.monitoring_count + 1;
            debug!(
                bot = %self.settings.bot_name,
                outcome_id = outcome.id,
                slot,
                result = outcome.result.as_str(),
                "post-pattern outcome observed"
            );

            let patch = ExecutionPatch::operation(slot, outcome.result, outcome.timestamp);
            self.update_execution(active.execution_id, patch).await?;
            self.state.record_observation(outcome.result);
            self.state.advance_cursor(outcome.id);

            if self.state.monitoring_count >= self.settings.required_post_operations {
                let final_result = FinalResult::from_operations(&self.state.observed);
                self.update_execution(active.execution_id, ExecutionPatch::completed(final_result))
                    .await?;

                let signal = Signal::idle(
                    self.settings.bot_name.clone(),
                    "awaiting pattern",
                    last_operations(outcomes),
                );
                self.upsert_signal(signal).await?;

                self.notifiers.notify_all(&Event::TrackingCompleted {
                    bot_name: self.settings.bot_name.clone(),
                    strategy: active.pattern.strategy_name.to_string(),
                    final_result,
                });
                info!(
                    bot = %self.settings.bot_name,
                    strategy = active.pattern.strategy_name,
                    result = final_result.as_str(),
                    "pattern tracking completed"
                );
                self.state.reset();
                break;
            }
        }

        self.state.advance_cursor(latest_id);
        Ok(())
    }

    /// ANALYZING: evaluate the catalog and fire at most one pattern.
    async fn analyzing_pass(&mut self, outcomes: &[Outcome], latest_id: i64) -> Result<(), Error> {
        if outcomes.len() < self.settings.min_history {
            let signal = Signal::idle(
                self.settings.bot_name.clone(),
                format!(
                    "awaiting minimum history ({}/{})",
                    outcomes.len(),
                    self.settings.min_history
                ),
                last_operations(outcomes),
            );
            self.upsert_signal(signal).await?;
            self.state.advance_cursor(latest_id);
            return Ok(());
        }

        let results: Vec<TradeResult> = outcomes.iter().map(|o| o.result).collect();
        let window = Window::new(&results, latest_id);
        let verdict = self.catalog.evaluate(&window, Regime::now());

        match verdict {
            Verdict::Matched(pattern) => {
                let detected_at = Utc::now();
                let row = NewStrategyExecution::waiting(
                    self.settings.bot_name.clone(),
                    pattern.strategy_name,
                    pattern.confidence,
                    pattern.trigger_type,
                    detected_at,
                );
                let store = &self.store;
                let execution_id = self
                    .retry
                    .run("insert_strategy_execution", || {
                        let store = Arc::clone(store);
                        let row = row.clone();
                        async move { store.insert_strategy_execution(&row).await }
                    })
                    .await?;

                self.notifiers.notify_all(&Event::PatternDetected {
                    bot_name: self.settings.bot_name.clone(),
                    strategy: pattern.strategy_name.to_string(),
                    confidence: pattern.confidence,
                    reason: pattern.reason.clone(),
                });
                info!(
                    bot = %self.settings.bot_name,
                    strategy = pattern.strategy_name,
                    confidence = pattern.confidence,
                    "pattern fired, tracking next {} operation(s)",
                    self.settings.required_post_operations
                );

                // The insert is the write this state change belongs to:
                // enter MONITORING as soon as it lands, so a failed signal
                // publish cannot leave two live trackers. The heartbeat
                // republishes the fired signal on the next pass.
                let signal = Signal::fired(self.settings.bot_name.clone(), &pattern, detected_at);
                self.state.start_monitoring(pattern, execution_id, latest_id);
                if let Err(e) = self.upsert_signal(signal).await {
                    warn!(
                        bot = %self.settings.bot_name,
                        error = %e,
                        "fired signal not published, heartbeat will retry"
                    );
                }
            }
            Verdict::Rejected(rejection) => {
                let signal = Signal::idle(
                    self.settings.bot_name.clone(),
                    format!("{}: {}", rejection.strategy_name, rejection.reason),
                    last_operations(outcomes),
                );
                self.upsert_signal(signal).await?;
                self.state.advance_cursor(latest_id);
            }
            Verdict::Quiet => {
                let signal = Signal::idle(
                    self.settings.bot_name.clone(),
                    "awaiting pattern",
                    last_operations(outcomes),
                );
                self.upsert_signal(signal).await?;
                self.state.advance_cursor(latest_id);
            }
        }
        Ok(())
    }

    /// Refresh `last_update` on the current signal row without changing
    /// any other field. While a tracker is active the fired signal is
    /// rebuilt from it, which also repairs a publish that failed at fire
    /// time.
    async fn heartbeat(&mut self) -> Result<(), Error> {
        let mut signal = match &self.state.active_signal {
            Some(active) => Signal::fired(
                self.settings.bot_name.clone(),
                &active.pattern,
                active.detected_at,
            ),
            None => match &self.last_signal {
                Some(s) => s.clone(),
                None => Signal::idle(self.settings.bot_name.clone(), "awaiting pattern", String::new()),
            },
        };
        signal.touch();
        self.upsert_signal(signal).await
    }

    async fn upsert_signal(&mut self, signal: Signal) -> Result<(), Error> {
        let store = &self.store;
        self.retry
            .run("upsert_signal", || {
                let store = Arc::clone(store);
                let signal = signal.clone();
                async move { store.upsert_signal(&signal).await }
            })
            .await?;
        self.last_signal = Some(signal);
        Ok(())
    }

    async fn update_execution(&self, id: i64, patch: ExecutionPatch) -> Result<(), Error> {
        let store = &self.store;
        self.retry
            .run("update_strategy_execution", || {
                let store = Arc::clone(store);
                let patch = patch.clone();
                async move { store.update_strategy_execution(id, &patch).await }
            })
            .await?;
        Ok(())
    }
}

fn last_operations(outcomes: &[Outcome]) -> String {
    crate::domain::render_last_operations(outcomes, 5)
}
