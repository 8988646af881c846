use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;

#[tokio::test(start_paused = true)]
async fn abort_then_stop_fire_in_order() {
    let mut timers = OrphanTimers::new();
    let aborted = Arc::new(AtomicBool::new(false));
    let stopped = Arc::new(AtomicBool::new(false));

    let aborted_w = Arc::clone(&aborted);
    let stopped_w = Arc::clone(&stopped);
    timers.schedule(
        Duration::from_millis(60_000),
        Duration::from_millis(5_000),
        move || aborted_w.store(true, Ordering::SeqCst),
        move || stopped_w.store(true, Ordering::SeqCst),
    );

    tokio::time::advance(Duration::from_millis(60_001)).await;
    tokio::task::yield_now().await;
    assert!(aborted.load(Ordering::SeqCst));
    assert!(!stopped.load(Ordering::SeqCst));

    tokio::time::advance(Duration::from_millis(5_001)).await;
    tokio::task::yield_now().await;
    assert!(stopped.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn cancel_before_grace_elapses_prevents_abort() {
    let mut timers = OrphanTimers::new();
    let aborted = Arc::new(AtomicBool::new(false));
    let aborted_w = Arc::clone(&aborted);

    timers.schedule(
        Duration::from_millis(60_000),
        Duration::from_millis(5_000),
        move || aborted_w.store(true, Ordering::SeqCst),
        || {},
    );
    timers.cancel();

    tokio::time::advance(Duration::from_millis(60_001)).await;
    tokio::task::yield_now().await;
    assert!(!aborted.load(Ordering::SeqCst));
    assert!(!timers.is_scheduled());
}
