//! Tests for run cancellation and engine drain.

use std::sync::Arc;
use std::time::Duration;

use dpi_verify::shutdown::{EngineTracker, ShutdownCoordinator, ShutdownResult, ShutdownState};

#[tokio::test]
async fn test_initial_state_is_running() {
    let coordinator = ShutdownCoordinator::new(EngineTracker::new());
    assert_eq!(coordinator.state().await, ShutdownState::Running);
    assert!(!coordinator.token().is_cancelled());
}

#[tokio::test]
async fn test_tracker_clones_share_counts() {
    let tracker = EngineTracker::new();
    let shared = tracker.clone();

    let g1 = tracker.acquire();
    let g2 = shared.acquire();
    assert_eq!(tracker.live(), 2);

    drop(g1);
    assert_eq!(shared.live(), 1);
    drop(g2);
    assert_eq!(tracker.live(), 0);
    assert_eq!(shared.peak(), 2);
}

#[tokio::test]
async fn test_state_is_draining_while_engine_alive() {
    let tracker = EngineTracker::new();
    let guard = tracker.acquire();
    let coordinator = Arc::new(ShutdownCoordinator::new(tracker));
    let token = coordinator.token();

    let drain = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.initiate(Duration::from_secs(2)).await }
    });

    token.cancelled().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(coordinator.state().await, ShutdownState::Draining);

    drop(guard);
    assert_eq!(drain.await.unwrap(), ShutdownResult::Complete);
    assert_eq!(coordinator.state().await, ShutdownState::Stopped);
}

#[tokio::test]
async fn test_timeout_reports_live_engines() {
    let tracker = EngineTracker::new();
    let _a = tracker.acquire();
    let _b = tracker.acquire();
    let coordinator = ShutdownCoordinator::new(tracker);

    let result = coordinator.initiate(Duration::from_millis(50)).await;
    assert_eq!(result, ShutdownResult::Timeout { live: 2 });
    assert_eq!(coordinator.state().await, ShutdownState::Stopped);
}

#[tokio::test]
async fn test_child_tokens_observe_cancellation() {
    let coordinator = ShutdownCoordinator::new(EngineTracker::new());
    let probe_token = coordinator.token().child_token();
    coordinator.initiate(Duration::from_millis(10)).await;
    assert!(probe_token.is_cancelled());
}
