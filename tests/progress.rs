//! ProgressTracker and cancellation tests.

use std::sync::Arc;
use std::thread;

use posterize::{CancellationToken, ProgressTracker, Stage};

// ── CancellationToken ──────────────────────────────────────────────

#[test]
fn cancellation_token_default_not_cancelled() {
    let token = CancellationToken::new();
    assert!(!token.is_cancelled());
}

#[test]
fn cancellation_token_cancel() {
    let token = CancellationToken::new();
    token.cancel();
    assert!(token.is_cancelled());
}

#[test]
fn cancellation_token_clone_shares_state() {
    let token = CancellationToken::new();
    let clone = token.clone();
    assert!(!clone.is_cancelled());

    token.cancel();
    assert!(clone.is_cancelled());
}

#[test]
fn cancellation_token_default_trait() {
    let token = CancellationToken::default();
    assert!(!token.is_cancelled());
}

// ── ProgressTracker ────────────────────────────────────────────────

#[test]
fn tracker_starts_at_zero() {
    let tracker = ProgressTracker::new(10, 2);
    assert_eq!(tracker.completed(), 0);
    assert_eq!(tracker.percentage(), 0.0);
    assert_eq!(tracker.outstanding_workers(), 2);
    assert!(!tracker.is_complete());
}

#[test]
fn tracker_holds_below_100_until_workers_finish() {
    let tracker = ProgressTracker::new(4, 2);
    for _ in 0..4 {
        tracker.record_frame();
    }
    assert_eq!(tracker.completed(), 4);
    assert!(tracker.percentage() < 100.0);

    tracker.worker_finished();
    assert!(tracker.percentage() < 100.0);

    tracker.worker_finished();
    assert_eq!(tracker.percentage(), 100.0);
}

#[test]
fn tracker_count_is_bounded_by_total() {
    let tracker = ProgressTracker::new(2, 1);
    assert_eq!(tracker.record_frame(), 1);
    assert_eq!(tracker.record_frame(), 2);
    assert_eq!(tracker.record_frame(), 2);
    assert_eq!(tracker.completed(), 2);
}

#[test]
fn extra_worker_finishes_are_ignored() {
    let tracker = ProgressTracker::new(1, 1);
    tracker.worker_finished();
    tracker.worker_finished();
    assert_eq!(tracker.outstanding_workers(), 0);
    assert_eq!(tracker.percentage(), 100.0);
}

#[test]
fn zero_frame_tracker_completes_with_no_workers() {
    let tracker = ProgressTracker::new(0, 0);
    assert!(tracker.is_complete());
    assert_eq!(tracker.percentage(), 100.0);
}

#[test]
fn percentage_is_monotonic_under_concurrency() {
    let total = 4_000;
    let workers = 4;
    let tracker = Arc::new(ProgressTracker::new(total, workers));

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for _ in 0..total / workers as u64 {
                    tracker.record_frame();
                }
                tracker.worker_finished();
            })
        })
        .collect();

    let mut last = 0.0f32;
    while !tracker.is_complete() {
        let current = tracker.percentage();
        assert!(current >= last, "{current} < {last}");
        assert!(current < 100.0 || tracker.is_complete());
        last = current;
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(tracker.completed(), total);
    assert_eq!(tracker.percentage(), 100.0);
}

// ── Stage ──────────────────────────────────────────────────────────

#[test]
fn stage_display_names() {
    assert_eq!(Stage::Extracting.to_string(), "extract");
    assert_eq!(Stage::Filtering.to_string(), "filter");
    assert_eq!(Stage::Reassembling.to_string(), "reassemble");
    assert_eq!(Stage::Cleaning.to_string(), "clean");
}
