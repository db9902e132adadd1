//! Integration tests for the per-endpoint sliding-window rate limiter.
//!
//! Over-limit callers wait for window capacity; requests are never
//! dropped or failed.

use std::sync::Arc;
use std::time::Duration;

use tickradar::broker::{Endpoint, RateLimits, SlidingWindowLimiter};

#[tokio::test(start_paused = true)]
async fn endpoints_have_independent_budgets() {
    let limiter = SlidingWindowLimiter::new(RateLimits::default());
    let start = tokio::time::Instant::now();

    limiter.acquire(Endpoint::Buy).await;
    limiter.acquire(Endpoint::Buy).await;

    // Buys are exhausted; polls still pass immediately.
    for _ in 0..10 {
        limiter.acquire(Endpoint::PollContract).await;
    }
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(limiter.in_window(Endpoint::Buy), 2);
    assert_eq!(limiter.in_window(Endpoint::PollContract), 10);
}

#[tokio::test(start_paused = true)]
async fn concurrent_bots_do_not_share_windows() {
    // Each bot carries its own limiter even when they share one pool.
    let bots: Vec<Arc<SlidingWindowLimiter>> = (0..3)
        .map(|_| Arc::new(SlidingWindowLimiter::new(RateLimits::default())))
        .collect();

    // Every bot spends its full buy budget concurrently, without waiting.
    let mut handles = Vec::new();
    for limiter in &bots {
        let limiter = Arc::clone(limiter);
        handles.push(tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            limiter.acquire(Endpoint::Buy).await;
            limiter.acquire(Endpoint::Buy).await;
            start.elapsed()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), Duration::ZERO);
    }

    // One bot going over its cap waits out the window alone; the others
    // keep admitting immediately.
    let start = tokio::time::Instant::now();
    let greedy = Arc::clone(&bots[0]);
    let waiter = tokio::spawn(async move {
        greedy.acquire(Endpoint::Buy).await;
        start.elapsed()
    });
    let calm = Arc::clone(&bots[1]);
    let immediate = tokio::spawn(async move {
        calm.acquire(Endpoint::PollContract).await;
        start.elapsed()
    });

    assert_eq!(immediate.await.unwrap(), Duration::ZERO);
    assert_eq!(bots[2].in_window(Endpoint::Buy), 2, "untouched bot unchanged");

    let waited = waiter.await.unwrap();
    assert!(
        waited >= Duration::from_secs(59) && waited <= Duration::from_secs(61),
        "waited {waited:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn capacity_returns_as_old_requests_age_out() {
    let limiter = SlidingWindowLimiter::new(RateLimits::default());

    limiter.acquire(Endpoint::Buy).await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    limiter.acquire(Endpoint::Buy).await;

    // The first buy ages out half a window before the second.
    let start = tokio::time::Instant::now();
    limiter.acquire(Endpoint::Buy).await;
    let waited = start.elapsed();
    assert!(
        waited >= Duration::from_secs(29) && waited <= Duration::from_secs(31),
        "waited {waited:?}"
    );
}
