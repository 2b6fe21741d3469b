use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::{Id as JoinId, JoinError, JoinSet};
use tokio::time::timeout;

use crate::models::{CoreError, CoreErrorKind, TaskOutcome, TaskPriority};
use crate::orchestration::{
    CancellationToken, DEFAULT_POLL_INTERVAL, FallbackFn, FallbackRegistry, OrchestrationResult,
    TaskFuture,
};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub type TaskWork<I, T> = Box<dyn FnOnce(I, CancellationToken) -> TaskFuture<T> + Send>;

/// A named, prioritised unit of deferred work.
///
/// `input` is handed to the work closure when the task starts and, if the task runs out of
/// time, to the fallback registered for its name or kind.
pub struct TaskDescriptor<I, T> {
    name: String,
    kind: String,
    priority: TaskPriority,
    input: I,
    work: TaskWork<I, T>,
}

impl<I, T> TaskDescriptor<I, T>
where
    I: 'static,
    T: 'static,
{
    pub fn new<F, Fut>(name: impl Into<String>, priority: TaskPriority, input: I, work: F) -> Self
    where
        F: FnOnce(I, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = OrchestrationResult<T>> + Send + 'static,
    {
        let name = name.into();
        Self {
            kind: name.clone(),
            name,
            priority,
            input,
            work: Box::new(move |input, token| Box::pin(work(input, token)) as TaskFuture<T>),
        }
    }
}

impl<I, T> TaskDescriptor<I, T> {
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub fn input(&self) -> &I {
        &self.input
    }
}

impl<I: fmt::Debug, T> fmt::Debug for TaskDescriptor<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

/// Tasks submitted together under one deadline. Names are unique.
pub struct Batch<I, T> {
    tasks: BTreeMap<String, TaskDescriptor<I, T>>,
}

impl<I, T> Default for Batch<I, T> {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }
}

impl<I, T> Batch<I, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: TaskDescriptor<I, T>) -> OrchestrationResult<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("task '{}' is already part of this batch", task.name),
            )
            .for_task(task.name.clone()));
        }
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    pub fn with_task(mut self, task: TaskDescriptor<I, T>) -> OrchestrationResult<Self> {
        self.insert(task)?;
        Ok(self)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchReport<T> {
    /// Exactly one outcome per submitted task.
    pub outcomes: BTreeMap<String, TaskOutcome<T>>,
    pub elapsed: Duration,
    /// Tasks whose `Success` came from a fallback rather than the task itself.
    pub fallbacks_used: BTreeSet<String>,
}

impl<T> BatchReport<T> {
    pub fn outcome(&self, name: &str) -> Option<&TaskOutcome<T>> {
        self.outcomes.get(name)
    }

    pub fn success(&self, name: &str) -> Option<&T> {
        self.outcome(name).and_then(TaskOutcome::success)
    }

    pub fn used_fallback(&self, name: &str) -> bool {
        self.fallbacks_used.contains(name)
    }

    pub fn into_outcomes(self) -> BTreeMap<String, TaskOutcome<T>> {
        self.outcomes
    }
}

/// Runs batches of tasks concurrently under a shared wall-clock deadline.
pub struct TaskRunner<I, T> {
    poll_interval: Duration,
    max_concurrency: Option<usize>,
    fallbacks: Arc<FallbackRegistry<I, T>>,
}

impl<I, T> Clone for TaskRunner<I, T> {
    fn clone(&self) -> Self {
        Self {
            poll_interval: self.poll_interval,
            max_concurrency: self.max_concurrency,
            fallbacks: self.fallbacks.clone(),
        }
    }
}

impl<I, T> Default for TaskRunner<I, T> {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl<I, T> TaskRunner<I, T> {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            max_concurrency: None,
            fallbacks: Arc::new(FallbackRegistry::new()),
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: Arc<FallbackRegistry<I, T>>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Caps how many tasks of one batch run at once. Queued tasks start in priority order.
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit.map(|limit| limit.max(1));
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn fallbacks(&self) -> &FallbackRegistry<I, T> {
        &self.fallbacks
    }
}

impl<I, T> TaskRunner<I, T>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
{
    pub async fn run_batch(&self, batch: Batch<I, T>, deadline: Duration) -> BatchReport<T> {
        self.run_batch_with_cancellation(batch, deadline, &CancellationToken::new())
            .await
    }

    /// Never fails: every task in `batch` gets an outcome, and the call returns within
    /// `deadline` plus one poll interval.
    pub async fn run_batch_with_cancellation(
        &self,
        batch: Batch<I, T>,
        deadline: Duration,
        cancellation: &CancellationToken,
    ) -> BatchReport<T> {
        let started = Instant::now();
        let task_token = CancellationToken::new();
        let mut state = BatchState::new(batch);

        tracing::debug!(
            tasks = state.unresolved.len(),
            deadline_ms = deadline.as_millis() as u64,
            "starting task batch"
        );

        let stop = loop {
            if cancellation.is_cancelled() {
                break StopReason::Cancelled;
            }
            let elapsed = started.elapsed();
            if elapsed >= deadline {
                break StopReason::Deadline;
            }

            state.launch_ready(self.max_concurrency, &task_token);
            if state.join_set.is_empty() {
                break StopReason::Drained;
            }

            let wait = self.poll_interval.min(deadline - elapsed);
            if let Ok(Some(joined)) = timeout(wait, state.join_set.join_next_with_id()).await {
                state.record_joined(joined);
            }
        };

        while let Some(joined) = state.join_set.try_join_next_with_id() {
            state.record_joined(joined);
        }

        if !state.unresolved.is_empty() {
            task_token.cancel();
            state.join_set.abort_all();
        }

        let mut fallbacks_used = BTreeSet::new();
        let unresolved = std::mem::take(&mut state.unresolved);
        for (name, pending) in unresolved {
            let substitute = self
                .fallbacks
                .resolve(&name, &pending.kind)
                .map(|fallback| invoke_fallback(&fallback, &pending.input));

            let outcome = match substitute {
                Some(Ok(value)) => {
                    fallbacks_used.insert(name.clone());
                    TaskOutcome::Success(value)
                }
                Some(Err(error)) => {
                    tracing::warn!(
                        task = %name,
                        kind = ?error.kind,
                        message = %error.message,
                        "fallback failed; keeping the cutoff marker"
                    );
                    stop.marker()
                }
                None => stop.marker(),
            };

            tracing::warn!(
                task = %name,
                outcome = outcome.label(),
                fallback = fallbacks_used.contains(&name),
                reason = ?stop,
                "task unresolved at batch cutoff"
            );
            state.outcomes.insert(name, outcome);
        }

        let elapsed = started.elapsed();
        tracing::info!(
            tasks = state.outcomes.len(),
            fallbacks = fallbacks_used.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            reason = ?stop,
            "task batch resolved"
        );

        BatchReport {
            outcomes: state.outcomes,
            elapsed,
            fallbacks_used,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum StopReason {
    Drained,
    Deadline,
    Cancelled,
}

impl StopReason {
    fn marker<T>(self) -> TaskOutcome<T> {
        match self {
            StopReason::Cancelled => TaskOutcome::Cancelled,
            StopReason::Drained | StopReason::Deadline => TaskOutcome::TimedOut,
        }
    }
}

struct Unresolved<I> {
    kind: String,
    input: I,
}

struct BatchState<I, T> {
    queued: VecDeque<TaskDescriptor<I, T>>,
    unresolved: BTreeMap<String, Unresolved<I>>,
    running: HashMap<JoinId, String>,
    join_set: JoinSet<OrchestrationResult<T>>,
    outcomes: BTreeMap<String, TaskOutcome<T>>,
}

impl<I, T> BatchState<I, T>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
{
    fn new(batch: Batch<I, T>) -> Self {
        let mut queued: Vec<TaskDescriptor<I, T>> = batch.tasks.into_values().collect();
        queued.sort_by(|first, second| {
            first
                .priority
                .cmp(&second.priority)
                .then_with(|| first.name.cmp(&second.name))
        });

        let unresolved = queued
            .iter()
            .map(|task| {
                (
                    task.name.clone(),
                    Unresolved {
                        kind: task.kind.clone(),
                        input: task.input.clone(),
                    },
                )
            })
            .collect();

        Self {
            queued: queued.into(),
            unresolved,
            running: HashMap::new(),
            join_set: JoinSet::new(),
            outcomes: BTreeMap::new(),
        }
    }

    fn launch_ready(&mut self, limit: Option<usize>, token: &CancellationToken) {
        while limit.is_none_or(|limit| self.running.len() < limit) {
            let Some(task) = self.queued.pop_front() else {
                break;
            };
            let TaskDescriptor {
                name,
                priority,
                input,
                work,
                ..
            } = task;

            // Built inside the spawned task so a panicking closure is caught at the join.
            let token = token.clone();
            let handle = self
                .join_set
                .spawn(async move { work(input, token).await });
            tracing::debug!(task = %name, priority, "launched task");
            self.running.insert(handle.id(), name);
        }
    }

    fn record_joined(&mut self, joined: Result<(JoinId, OrchestrationResult<T>), JoinError>) {
        let (id, outcome) = match joined {
            Ok((id, Ok(value))) => (id, TaskOutcome::Success(value)),
            Ok((id, Err(error))) => (id, TaskOutcome::Error(error.message)),
            Err(join_error) if join_error.is_panic() => (
                join_error.id(),
                TaskOutcome::Error("task panicked".to_string()),
            ),
            Err(join_error) => (join_error.id(), TaskOutcome::Cancelled),
        };

        let Some(name) = self.running.remove(&id) else {
            return;
        };
        self.unresolved.remove(&name);
        tracing::debug!(task = %name, outcome = outcome.label(), "task resolved");
        self.outcomes.insert(name, outcome);
    }
}

fn invoke_fallback<I, T>(fallback: &FallbackFn<I, T>, input: &I) -> OrchestrationResult<T> {
    catch_unwind(AssertUnwindSafe(|| fallback(input))).unwrap_or_else(|_| {
        Err(CoreError::new(
            CoreErrorKind::Internal,
            "fallback panicked",
        ))
    })
}
