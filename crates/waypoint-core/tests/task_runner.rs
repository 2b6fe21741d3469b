use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use waypoint_core::models::{CoreError, CoreErrorKind, TaskOutcome};
use waypoint_core::orchestration::{
    Batch, CancellationToken, FallbackRegistry, TaskDescriptor, TaskRunner,
};

const POLL: Duration = Duration::from_millis(20);

fn sleeper(name: &str, priority: i32, delay: Duration) -> TaskDescriptor<u32, String> {
    let label = name.to_string();
    TaskDescriptor::new(name, priority, 7, move |_input, _token| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, CoreError>(format!("{label} done"))
    })
}

fn explode() -> String {
    panic!("lookup exploded")
}

fn runner() -> TaskRunner<u32, String> {
    TaskRunner::new(POLL)
}

#[tokio::test]
async fn every_submitted_task_gets_exactly_one_outcome() {
    let batch = Batch::new()
        .with_task(sleeper("fast", 1, Duration::from_millis(5)))
        .unwrap()
        .with_task(sleeper("slow", 2, Duration::from_secs(5)))
        .unwrap()
        .with_task(TaskDescriptor::new("broken", 3, 0, |_input, _token| async {
            Err::<String, _>(CoreError::lookup("upstream unavailable"))
        }))
        .unwrap();

    let report = runner().run_batch(batch, Duration::from_millis(150)).await;

    let keys: BTreeSet<&str> = report.outcomes.keys().map(String::as_str).collect();
    assert_eq!(keys, BTreeSet::from(["broken", "fast", "slow"]));
}

#[tokio::test]
async fn tasks_finishing_before_the_deadline_succeed_and_stragglers_time_out() {
    let batch = Batch::new()
        .with_task(sleeper("hotels", 1, Duration::from_millis(50)))
        .unwrap()
        .with_task(sleeper("poi", 2, Duration::from_millis(600)))
        .unwrap();

    let report = runner().run_batch(batch, Duration::from_millis(300)).await;

    assert_eq!(
        report.outcome("hotels"),
        Some(&TaskOutcome::Success("hotels done".to_string()))
    );
    assert_eq!(report.outcome("poi"), Some(&TaskOutcome::TimedOut));
    assert!(report.fallbacks_used.is_empty());
}

#[tokio::test]
async fn run_batch_returns_within_deadline_plus_one_poll_interval() {
    let runner: TaskRunner<u32, String> = TaskRunner::new(Duration::from_millis(100));
    let batch = Batch::new()
        .with_task(sleeper("stuck", 1, Duration::from_secs(30)))
        .unwrap();

    let started = Instant::now();
    let report = runner.run_batch(batch, Duration::from_millis(200)).await;
    let elapsed = started.elapsed();

    assert_eq!(report.outcome("stuck"), Some(&TaskOutcome::TimedOut));
    assert!(elapsed >= Duration::from_millis(200));
    assert!(
        elapsed < Duration::from_millis(200 + 100 + 150),
        "batch took {elapsed:?}"
    );
}

#[tokio::test]
async fn registered_fallback_replaces_a_timed_out_task_using_the_task_input() {
    let mut fallbacks = FallbackRegistry::new();
    fallbacks.register("poi", |input: &u32| Ok(format!("fallback for {input}")));
    let runner = runner().with_fallbacks(Arc::new(fallbacks));

    let batch = Batch::new()
        .with_task(sleeper("hotels", 1, Duration::from_millis(20)))
        .unwrap()
        .with_task(sleeper("poi", 2, Duration::from_secs(5)))
        .unwrap();

    let report = runner.run_batch(batch, Duration::from_millis(200)).await;

    assert_eq!(
        report.outcome("poi"),
        Some(&TaskOutcome::Success("fallback for 7".to_string()))
    );
    assert!(report.used_fallback("poi"));
    assert!(!report.used_fallback("hotels"));
}

#[tokio::test]
async fn fallback_is_found_by_task_kind_when_no_name_entry_exists() {
    let mut fallbacks = FallbackRegistry::new();
    fallbacks.register("search", |_input: &u32| Ok("by kind".to_string()));
    let runner = runner().with_fallbacks(Arc::new(fallbacks));

    let batch = Batch::new()
        .with_task(sleeper("nearby", 1, Duration::from_secs(5)).with_kind("search"))
        .unwrap();

    let report = runner.run_batch(batch, Duration::from_millis(60)).await;
    assert_eq!(report.success("nearby"), Some(&"by kind".to_string()));
}

#[tokio::test]
async fn completed_tasks_never_use_their_fallback() {
    let mut fallbacks = FallbackRegistry::new();
    fallbacks.register("hotels", |_input: &u32| Ok("fallback".to_string()));
    let runner = runner().with_fallbacks(Arc::new(fallbacks));

    let batch = Batch::new()
        .with_task(sleeper("hotels", 1, Duration::from_millis(5)))
        .unwrap();

    let report = runner.run_batch(batch, Duration::from_millis(500)).await;
    assert_eq!(report.success("hotels"), Some(&"hotels done".to_string()));
    assert!(!report.used_fallback("hotels"));
}

#[tokio::test]
async fn zero_deadline_resolves_every_task_without_starting_any() {
    let started = Arc::new(AtomicBool::new(false));
    let mut fallbacks = FallbackRegistry::new();
    fallbacks.register("with_fallback", |_input: &u32| Ok("cached".to_string()));
    let runner = runner().with_fallbacks(Arc::new(fallbacks));

    let mut batch = Batch::new();
    for name in ["with_fallback", "without_fallback"] {
        let started = started.clone();
        batch
            .insert(TaskDescriptor::new(name, 1, 0, move |_input, _token| async move {
                started.store(true, Ordering::SeqCst);
                Ok::<_, CoreError>("live".to_string())
            }))
            .unwrap();
    }

    let clock = Instant::now();
    let report = runner.run_batch(batch, Duration::ZERO).await;

    assert!(clock.elapsed() < Duration::from_millis(50));
    assert!(!started.load(Ordering::SeqCst));
    assert_eq!(report.success("with_fallback"), Some(&"cached".to_string()));
    assert_eq!(
        report.outcome("without_fallback"),
        Some(&TaskOutcome::TimedOut)
    );
}

#[tokio::test]
async fn task_errors_and_panics_are_recovered_into_error_outcomes() {
    let batch = Batch::new()
        .with_task(TaskDescriptor::new("fails", 1, 0, |_input, _token| async {
            Err::<String, _>(CoreError::lookup("lodging backend returned 503"))
        }))
        .unwrap()
        .with_task(TaskDescriptor::new("panics", 2, 0, |_input, _token| async {
            Ok::<_, CoreError>(explode())
        }))
        .unwrap();

    let report = runner().run_batch(batch, Duration::from_secs(2)).await;

    assert_eq!(
        report.outcome("fails"),
        Some(&TaskOutcome::Error("lodging backend returned 503".to_string()))
    );
    assert_eq!(
        report.outcome("panics"),
        Some(&TaskOutcome::Error("task panicked".to_string()))
    );
}

#[tokio::test]
async fn closure_panicking_before_returning_its_future_is_an_error_outcome() {
    let batch = Batch::new()
        .with_task(TaskDescriptor::new("eager", 1, 0, |_input, _token| {
            let value = explode();
            async move { Ok::<_, CoreError>(value) }
        }))
        .unwrap()
        .with_task(sleeper("steady", 2, Duration::from_millis(5)))
        .unwrap();

    let report = runner().run_batch(batch, Duration::from_secs(1)).await;

    assert_eq!(
        report.outcome("eager"),
        Some(&TaskOutcome::Error("task panicked".to_string()))
    );
    assert_eq!(
        report.outcome("steady"),
        Some(&TaskOutcome::Success("steady done".to_string()))
    );
}

#[tokio::test]
async fn failing_or_panicking_fallbacks_leave_the_timed_out_marker() {
    let mut fallbacks = FallbackRegistry::new();
    fallbacks.register("errs", |_input: &u32| {
        Err(CoreError::lookup("cache is empty"))
    });
    fallbacks.register("panics", |_input: &u32| -> Result<String, CoreError> {
        panic!("fallback exploded")
    });
    let runner = runner().with_fallbacks(Arc::new(fallbacks));

    let batch = Batch::new()
        .with_task(sleeper("errs", 1, Duration::from_secs(5)))
        .unwrap()
        .with_task(sleeper("panics", 2, Duration::from_secs(5)))
        .unwrap();

    let report = runner.run_batch(batch, Duration::from_millis(50)).await;

    assert_eq!(report.outcome("errs"), Some(&TaskOutcome::TimedOut));
    assert_eq!(report.outcome("panics"), Some(&TaskOutcome::TimedOut));
    assert!(report.fallbacks_used.is_empty());
}

#[tokio::test]
async fn caller_cancellation_marks_unresolved_tasks_cancelled() {
    let cancellation = CancellationToken::new();
    let trigger = cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(80)).await;
        trigger.cancel();
    });

    let batch = Batch::new()
        .with_task(sleeper("quick", 1, Duration::from_millis(10)))
        .unwrap()
        .with_task(sleeper("endless", 2, Duration::from_secs(30)))
        .unwrap();

    let started = Instant::now();
    let report = runner()
        .run_batch_with_cancellation(batch, Duration::from_secs(10), &cancellation)
        .await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(report.outcome("quick").is_some_and(TaskOutcome::is_success));
    assert_eq!(report.outcome("endless"), Some(&TaskOutcome::Cancelled));
}

#[tokio::test]
async fn concurrency_limit_starts_tasks_in_priority_then_name_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let mut batch = Batch::new();
    for (name, priority) in [("transit", 3), ("lodging", 1), ("sights", 2), ("a_sights", 2)] {
        let order = order.clone();
        batch
            .insert(TaskDescriptor::new(
                name,
                priority,
                0,
                move |_input, _token| async move {
                    order.lock().unwrap().push(name);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    Ok::<_, CoreError>(name.to_string())
                },
            ))
            .unwrap();
    }

    let report = runner()
        .with_max_concurrency(Some(1))
        .run_batch(batch, Duration::from_secs(2))
        .await;

    assert!(report.outcomes.values().all(TaskOutcome::is_success));
    assert_eq!(
        *order.lock().unwrap(),
        vec!["lodging", "a_sights", "sights", "transit"]
    );
}

#[tokio::test]
async fn tasks_still_queued_at_the_deadline_time_out() {
    let batch = Batch::new()
        .with_task(sleeper("first", 1, Duration::from_secs(5)))
        .unwrap()
        .with_task(sleeper("second", 2, Duration::from_millis(1)))
        .unwrap();

    let report = runner()
        .with_max_concurrency(Some(1))
        .run_batch(batch, Duration::from_millis(80))
        .await;

    assert_eq!(report.outcome("first"), Some(&TaskOutcome::TimedOut));
    assert_eq!(report.outcome("second"), Some(&TaskOutcome::TimedOut));
}

#[test]
fn duplicate_task_names_are_rejected_within_a_batch() {
    let mut batch = Batch::new();
    batch
        .insert(sleeper("lodging", 1, Duration::ZERO))
        .unwrap();
    let error = batch
        .insert(sleeper("lodging", 2, Duration::ZERO))
        .unwrap_err();

    assert_eq!(error.kind, CoreErrorKind::InvalidInput);
    assert_eq!(error.task.as_deref(), Some("lodging"));
    assert_eq!(batch.len(), 1);
}

#[tokio::test]
async fn empty_batch_returns_an_empty_report_immediately() {
    let report = runner()
        .run_batch(Batch::new(), Duration::from_secs(5))
        .await;
    assert!(report.outcomes.is_empty());
    assert!(report.elapsed < Duration::from_millis(50));
}
