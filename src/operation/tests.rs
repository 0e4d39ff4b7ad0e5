use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::{advance, sleep, Instant};

use super::{AttemptTimeout, Exhaustion, RetryOperation};
use crate::{
    config::{OperationOptions, RetryConfig},
    schedule::TimeoutSchedule,
};

fn operation(delays: &[u64], options: OperationOptions) -> RetryOperation<String> {
    RetryOperation::from_schedule(TimeoutSchedule::from_delays(delays), options)
}

fn recording(op: &RetryOperation<String>) -> UnboundedReceiver<u32> {
    let (tx, rx) = unbounded_channel();
    op.attempt(move |attempt| {
        let _ = tx.send(attempt);
    });
    rx
}

fn boom(msg: &str) -> Option<String> {
    Some(msg.to_string())
}

#[tokio::test(start_paused = true)]
async fn first_attempt_runs_synchronously() {
    let op = operation(&[10], OperationOptions::default());
    let mut rx = recording(&op);

    assert_eq!(rx.try_recv().ok(), Some(1));
    assert_eq!(op.attempts(), 1);
    assert!(!op.is_pending());
}

#[tokio::test(start_paused = true)]
async fn success_is_never_retried() {
    let op = operation(&[10], OperationOptions::default());
    let _rx = recording(&op);

    assert!(!op.retry(None));
    assert!(!op.retry_result(Ok::<_, String>(())));
    assert!(op.errors().is_empty());
    assert_eq!(op.main_error(), None);
}

#[tokio::test(start_paused = true)]
async fn retries_follow_the_schedule_until_exhausted() {
    let op = operation(&[10, 20, 30], OperationOptions::default());
    let start = Instant::now();
    let mut rx = recording(&op);
    let mut seen = vec![rx.recv().await.unwrap()];

    while op.retry(boom("flaky")) {
        assert_eq!(op.attempts() as usize, seen.len());
        seen.push(rx.recv().await.unwrap());
        assert_eq!(op.attempts() as usize, seen.len());
    }

    assert_eq!(seen, vec![1, 2, 3, 4]);
    assert!(Instant::now() - start >= Duration::from_millis(60));
    assert_eq!(op.errors().len(), 4);
    assert_eq!(op.exhaustion(), Some(Exhaustion::ScheduleSpent));
    assert_eq!(op.main_error().as_deref(), Some("flaky"));
}

#[tokio::test(start_paused = true)]
async fn only_one_timer_is_pending() {
    let op = operation(&[100, 100], OperationOptions::default());
    let mut rx = recording(&op);
    rx.recv().await.unwrap();

    assert!(op.retry(boom("a")));
    assert!(op.is_pending());
    assert_eq!(op.attempts(), 1);

    assert_eq!(rx.recv().await, Some(2));
    assert!(!op.is_pending());
}

#[tokio::test(start_paused = true)]
async fn main_error_breaks_ties_toward_latest() {
    let op = operation(&[1, 1, 1, 1], OperationOptions::default());
    let mut rx = recording(&op);
    rx.recv().await.unwrap();

    for msg in ["A", "B", "A", "B"] {
        assert!(op.retry(boom(msg)));
        rx.recv().await.unwrap();
    }
    assert_eq!(op.main_error().as_deref(), Some("B"));
}

#[tokio::test(start_paused = true)]
async fn deadline_stops_retries_with_delays_left() {
    let options = OperationOptions {
        max_retry_time: Some(Duration::from_millis(50)),
        ..OperationOptions::default()
    };
    let op = operation(&[10_000, 20_000, 30_000], options);
    let _rx = recording(&op);

    sleep(Duration::from_millis(50)).await;

    assert!(!op.retry(boom("slow")));
    assert_eq!(op.exhaustion(), Some(Exhaustion::DeadlineExceeded));
    assert_eq!(op.errors(), vec!["slow".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn forever_keeps_retrying_until_deadline() {
    let config = RetryConfig::default()
        .with_retries(0)
        .with_forever(true)
        .with_min_timeout_ms(100)
        .with_max_retry_time_ms(1_000);
    let op = RetryOperation::new(&config).unwrap();
    assert_eq!(op.schedule().as_slice(), &[100]);
    let mut rx = recording(&op);
    rx.recv().await.unwrap();

    let mut retries = 0;
    while op.retry(boom("down")) {
        retries += 1;
        rx.recv().await.unwrap();
    }

    assert_eq!(retries, 10);
    assert_eq!(op.exhaustion(), Some(Exhaustion::DeadlineExceeded));
    assert!(op.errors().len() <= 2);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_pending_retry() {
    let op = operation(&[100, 100], OperationOptions::default());
    let mut rx = recording(&op);
    rx.recv().await.unwrap();

    assert!(op.retry(boom("x")));
    op.stop();
    sleep(Duration::from_secs(1)).await;

    assert!(rx.try_recv().is_err());
    assert_eq!(op.attempts(), 1);
    assert!(!op.retry(boom("x")));
    assert_eq!(op.exhaustion(), Some(Exhaustion::Stopped));
    assert!(op.cancellation_token().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn reset_allows_reuse() {
    let op = operation(&[5], OperationOptions::default());
    let mut rx = recording(&op);
    rx.recv().await.unwrap();
    assert!(op.retry(boom("x")));
    rx.recv().await.unwrap();
    assert!(!op.retry(boom("x")));
    assert_eq!(op.attempts(), 2);

    op.reset();
    assert_eq!(op.attempts(), 1);
    assert_eq!(op.exhaustion(), None);
    assert!(op.retry(boom("y")));
    assert_eq!(rx.recv().await, Some(2));
}

#[tokio::test(start_paused = true)]
async fn attempt_timeout_reports_slow_attempts() {
    let op = operation(&[10], OperationOptions::default());
    let (timeout_tx, mut timeouts) = unbounded_channel();
    let timeout = AttemptTimeout::new(Duration::from_millis(50), move |attempt| {
        let _ = timeout_tx.send(attempt);
    });
    let (tx, mut rx) = unbounded_channel();
    op.attempt_with_timeout(
        move |attempt| {
            let _ = tx.send(attempt);
        },
        timeout,
    );
    rx.recv().await.unwrap();

    // reporting before the deadline disarms it for attempt 1
    assert!(op.retry(boom("x")));
    assert_eq!(rx.recv().await, Some(2));
    assert_eq!(timeouts.recv().await, Some(2));
    assert!(timeouts.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn unref_timer_does_not_outlive_the_operation() {
    let options = OperationOptions {
        unref: true,
        ..OperationOptions::default()
    };
    let op = operation(&[100], options);
    let mut rx = recording(&op);
    rx.recv().await.unwrap();

    assert!(op.retry(boom("x")));
    drop(op);
    sleep(Duration::from_secs(1)).await;

    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn referenced_timer_fires_after_handle_drop() {
    let op = operation(&[100], OperationOptions::default());
    let mut rx = recording(&op);
    rx.recv().await.unwrap();

    assert!(op.retry(boom("x")));
    drop(op);

    assert_eq!(rx.recv().await, Some(2));
}

#[tokio::test(start_paused = true)]
async fn action_can_report_through_its_own_handle() {
    let op = operation(&[10, 10, 10], OperationOptions::default());
    let (tx, mut rx) = unbounded_channel();
    let reporter = op.clone();
    op.attempt(move |attempt| {
        if attempt < 3 {
            assert!(reporter.retry(Some(format!("failure {attempt}"))));
        } else {
            assert!(!reporter.retry(None));
            let _ = tx.send(attempt);
        }
    });

    assert_eq!(rx.recv().await, Some(3));
    assert_eq!(op.errors().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn run_returns_first_success() {
    let op = operation(&[10, 10, 10], OperationOptions::default());
    let result = op
        .run(|attempt, _cancel| async move {
            if attempt < 3 {
                Err(format!("failure {attempt}"))
            } else {
                Ok(attempt * 10)
            }
        })
        .await;

    assert_eq!(result, Ok(30));
    assert_eq!(op.attempts(), 3);
    assert_eq!(op.errors().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn run_reports_main_error_on_exhaustion() {
    let op = operation(&[1, 1, 1], OperationOptions::default());
    let messages = ["A", "B", "A", "B"];
    let result: Result<(), String> = op
        .run(|attempt, _cancel| async move { Err(messages[attempt as usize - 1].to_string()) })
        .await;

    assert_eq!(result, Err("B".to_string()));
    assert_eq!(op.attempts(), 4);
    assert_eq!(op.exhaustion(), Some(Exhaustion::ScheduleSpent));
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_run_between_attempts() {
    let op = operation(&[10_000, 10_000], OperationOptions::default());
    let calls = Arc::new(AtomicU32::new(0));
    let runner = op.clone();
    let counter = Arc::clone(&calls);
    let task = tokio::spawn(async move {
        runner
            .run(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("unreachable host".to_string()) }
            })
            .await
    });

    sleep(Duration::from_millis(5)).await;
    op.stop();
    let result = task.await.unwrap();

    assert_eq!(result, Err("unreachable host".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn run_deadline_cancels_attempt_token() {
    let op = operation(&[], OperationOptions::default());
    let fired = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&fired);
    let timeout = AttemptTimeout::new(Duration::from_millis(20), move |attempt| {
        seen.store(attempt, Ordering::SeqCst);
    });

    let result: Result<(), String> = op
        .run_with_timeout(
            |_, cancel| async move {
                cancel.cancelled().await;
                Err("attempt abandoned".to_string())
            },
            timeout,
        )
        .await;

    assert_eq!(result, Err("attempt abandoned".to_string()));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn advancing_clock_counts_toward_deadline() {
    let options = OperationOptions {
        max_retry_time: Some(Duration::from_millis(50)),
        ..OperationOptions::default()
    };
    let op = operation(&[1_000], options);
    let _rx = recording(&op);
    advance(Duration::from_millis(49)).await;
    assert!(op.retry(boom("x")));
    op.stop();
}

#[test]
fn retry_outside_runtime_leaves_state_untouched() {
    let op = operation(&[10, 20], OperationOptions::default());

    assert!(!op.retry(boom("offline")));
    assert_eq!(op.exhaustion(), None);
    assert!(op.errors().is_empty());
    assert_eq!(op.attempts(), 1);
    assert!(format!("{op:?}").contains("remaining: 2"));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();
    runtime.block_on(async {
        let mut rx = recording(&op);
        assert_eq!(rx.recv().await, Some(1));
        assert!(op.retry(boom("online")));
        assert_eq!(rx.recv().await, Some(2));
        assert_eq!(op.errors(), vec!["online".to_string()]);
    });
}

#[tokio::test(start_paused = true)]
async fn plain_attempt_clears_earlier_timeout() {
    let op = operation(&[10], OperationOptions::default());
    let fired = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&fired);
    let timeout = AttemptTimeout::new(Duration::from_millis(50), move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    op.attempt_with_timeout(|_| {}, timeout);
    assert!(!op.retry(None));

    op.reset();
    let mut rx = recording(&op);
    assert_eq!(rx.recv().await, Some(1));
    assert!(op.retry(boom("slow")));
    assert_eq!(rx.recv().await, Some(2));
    sleep(Duration::from_millis(200)).await;

    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn plain_run_clears_earlier_timeout() {
    let op = operation(&[10], OperationOptions::default());
    let fired = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&fired);
    let timeout = AttemptTimeout::new(Duration::from_millis(20), move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let first: Result<u32, String> = op
        .run_with_timeout(|attempt, _| async move { Ok(attempt) }, timeout)
        .await;
    assert_eq!(first, Ok(1));

    op.reset();
    let second: Result<u32, String> = op
        .run(|attempt, _| async move {
            sleep(Duration::from_millis(100)).await;
            Ok(attempt)
        })
        .await;

    assert_eq!(second, Ok(1));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}
