//! Integration tests for the radar loop: pattern fire, post-pattern
//! tracking, heartbeat and startup cleanup.

mod support;

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tickradar::domain::{ExecutionStatus, FinalResult, StrategyExecution, TradeResult};
use tickradar::notifier::NotifierRegistry;
use tickradar::pattern::{CatalogSettings, PatternCatalog};
use tickradar::radar::{Radar, RadarSettings};
use tickradar::store::{MemoryStore, RetryPolicy};

const BOT: &str = "radar-test-bot";

fn build_radar(store: Arc<MemoryStore>) -> Radar {
    Radar::new(
        store,
        PatternCatalog::standard(&CatalogSettings::default()),
        Arc::new(NotifierRegistry::default()),
        RadarSettings::for_bot(BOT),
    )
    .with_retry(RetryPolicy::immediate(3))
}

fn stale_waiting_row(bot_name: &str, hours_old: i64) -> StrategyExecution {
    let created = Utc::now() - ChronoDuration::hours(hours_old);
    StrategyExecution {
        id: 0,
        bot_name: bot_name.to_string(),
        strategy_name: "LLL".into(),
        confidence_level: 75.0,
        trigger_type: "LLL".into(),
        pattern_detected_at: created,
        operation_1_result: None,
        operation_1_completed_at: None,
        operation_2_result: None,
        operation_2_completed_at: None,
        final_result: None,
        pattern_success: None,
        status: ExecutionStatus::Waiting,
        created_at: created,
        updated_at: None,
        completed_at: None,
    }
}

#[tokio::test]
async fn triple_loss_fires_then_completes_on_next_win() {
    let store = Arc::new(MemoryStore::new());
    store.seed_history(BOT, &support::results("W W W W W W W L L L"));
    let mut radar = build_radar(Arc::clone(&store));

    radar.pass().await.unwrap();

    let signal = store.signal_for(BOT).expect("signal row exists");
    assert!(signal.is_safe_to_operate);
    assert_eq!(signal.strategy_used, "LLL");
    assert_eq!(signal.strategy_confidence, 75.0);
    assert!(signal.pattern_found_at.is_some());

    let executions = store.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].status, ExecutionStatus::Waiting);

    // The next settled operation is attributed and closes the tracker.
    store.seed_outcome(BOT, TradeResult::Win);
    radar.pass().await.unwrap();

    let execution = &store.executions()[0];
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.operation_1_result, Some(TradeResult::Win));
    assert_eq!(execution.final_result, Some(FinalResult::Win));
    assert_eq!(execution.pattern_success, Some(true));
    assert!(execution.completed_at.is_some());

    let signal = store.signal_for(BOT).unwrap();
    assert!(!signal.is_safe_to_operate);
    assert!(signal.strategy_used.is_empty());
}

#[tokio::test]
async fn losing_post_operation_grades_the_pattern_a_loss() {
    let store = Arc::new(MemoryStore::new());
    store.seed_history(BOT, &support::results("W W W W W W W L L L"));
    let mut radar = build_radar(Arc::clone(&store));

    radar.pass().await.unwrap();
    store.seed_outcome(BOT, TradeResult::Loss);
    radar.pass().await.unwrap();

    let execution = &store.executions()[0];
    assert_eq!(execution.final_result, Some(FinalResult::Loss));
    assert_eq!(execution.pattern_success, Some(false));
}

#[tokio::test]
async fn monitoring_pass_without_new_outcomes_only_touches_heartbeat() {
    let store = Arc::new(MemoryStore::new());
    store.seed_history(BOT, &support::results("W W W W W W W L L L"));
    let mut radar = build_radar(Arc::clone(&store));

    radar.pass().await.unwrap();
    let fired = store.signal_for(BOT).unwrap();

    radar.pass().await.unwrap();

    let refreshed = store.signal_for(BOT).unwrap();
    assert!(refreshed.is_safe_to_operate, "fired signal survives");
    assert_eq!(refreshed.strategy_used, fired.strategy_used);
    assert!(refreshed.last_update >= fired.last_update);
    // No operation was attributed.
    assert_eq!(store.executions()[0].operation_1_result, None);
}

#[tokio::test]
async fn exactly_one_signal_row_per_bot() {
    let store = Arc::new(MemoryStore::new());
    store.seed_history(BOT, &support::results("W W W W W W W W W W"));
    let mut radar = build_radar(Arc::clone(&store));

    for _ in 0..4 {
        radar.pass().await.unwrap();
        store.seed_outcome(BOT, TradeResult::Win);
    }
    assert_eq!(store.signal_row_count(), 1);
}

#[tokio::test]
async fn short_history_reports_progress_and_stays_unsafe() {
    let store = Arc::new(MemoryStore::new());
    store.seed_history(BOT, &support::results("W L W"));
    let mut radar = build_radar(Arc::clone(&store));

    radar.pass().await.unwrap();

    let signal = store.signal_for(BOT).unwrap();
    assert!(!signal.is_safe_to_operate);
    assert!(signal.reason.contains("3/10"), "reason: {}", signal.reason);
    assert!(store.executions().is_empty());
}

#[tokio::test]
async fn filtered_trigger_surfaces_the_rejection_reason() {
    let store = Arc::new(MemoryStore::new());
    // Newest-first this reads L L W W W W W W W W: the double-loss
    // trigger matches but its own filter and every other candidate fail.
    store.seed_history(BOT, &support::results("W W W W W W W W L L"));
    let mut radar = build_radar(Arc::clone(&store));

    radar.pass().await.unwrap();

    let signal = store.signal_for(BOT).unwrap();
    assert!(!signal.is_safe_to_operate);
    assert!(signal.reason.starts_with("LL:"), "reason: {}", signal.reason);
    assert!(store.executions().is_empty());
}

#[tokio::test]
async fn startup_cleanup_times_out_stale_trackers_only() {
    let store = Arc::new(MemoryStore::new());
    store.seed_execution(stale_waiting_row(BOT, 2));
    store.seed_execution(stale_waiting_row(BOT, 0));
    store.seed_execution(stale_waiting_row("other-bot", 2));
    let radar = build_radar(Arc::clone(&store));

    let stale = radar.startup_cleanup().await.unwrap();
    assert_eq!(stale, 1);

    let executions = store.executions();
    assert_eq!(executions[0].status, ExecutionStatus::Timeout);
    assert_eq!(executions[1].status, ExecutionStatus::Waiting);
    assert_eq!(executions[2].status, ExecutionStatus::Waiting, "other bots untouched");
}

#[tokio::test]
async fn failed_signal_publish_does_not_duplicate_the_tracker() {
    let store = Arc::new(MemoryStore::new());
    store.seed_history(BOT, &support::results("W W W W W W W L L L"));
    // The tracker insert succeeds, every publish attempt fails.
    store.fail_next("upsert_signal", 3);
    let mut radar = build_radar(Arc::clone(&store));

    radar.pass().await.unwrap();
    assert_eq!(store.executions().len(), 1);
    assert!(store.signal_for(BOT).is_none(), "publish was lost");

    // The next pass must heartbeat the tracker, never fire a second one.
    radar.pass().await.unwrap();
    assert_eq!(store.executions().len(), 1, "one active tracker per bot");

    let signal = store.signal_for(BOT).expect("republished by the heartbeat");
    assert!(signal.is_safe_to_operate);
    assert_eq!(signal.strategy_used, "LLL");
}

#[tokio::test(start_paused = true)]
async fn run_cleans_up_stale_trackers_before_the_first_pass() {
    let store = Arc::new(MemoryStore::new());
    store.seed_execution(stale_waiting_row(BOT, 2));
    let radar = build_radar(Arc::clone(&store));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = tokio::spawn(radar.run(shutdown_rx));
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(store.executions()[0].status, ExecutionStatus::Timeout);
}

#[tokio::test]
async fn transient_store_failures_are_retried() {
    let store = Arc::new(MemoryStore::new());
    store.seed_history(BOT, &support::results("W W W W W W W W W W"));
    store.fail_next("read_recent_outcomes", 2);
    let mut radar = build_radar(Arc::clone(&store));

    radar.pass().await.unwrap();
    assert!(store.signal_for(BOT).is_some());
}

#[tokio::test]
async fn monitoring_cursor_never_regresses() {
    let store = Arc::new(MemoryStore::new());
    store.seed_history(BOT, &support::results("W W W W W W W L L L"));
    let mut radar = build_radar(Arc::clone(&store));

    radar.pass().await.unwrap();
    let cursor = radar.state().last_seen_outcome_id;
    assert_eq!(cursor, 10);

    radar.pass().await.unwrap();
    assert_eq!(radar.state().last_seen_outcome_id, cursor);
}
