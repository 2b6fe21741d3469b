use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    InProgress,
    Completed,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgressSnapshot<T> {
    pub status: ProgressStatus,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub fraction: f64,
    pub elapsed_time: Duration,
    /// Completed steps in update order, each offset from tracker creation.
    pub step_times: Vec<(String, Duration)>,
    pub partial_results: BTreeMap<String, T>,
}

/// Called with `(completed_steps, total_steps, step_name, result)` after every update.
pub type ProgressObserver<T> = Box<dyn FnMut(usize, usize, &str, &T) + Send>;

/// Accumulates step completions for one query. Observability only; it never influences
/// scheduling.
pub struct ProgressTracker<T> {
    total_steps: usize,
    completed_steps: usize,
    started: Instant,
    step_times: Vec<(String, Duration)>,
    status: ProgressStatus,
    partial_results: BTreeMap<String, T>,
    observer: Option<ProgressObserver<T>>,
}

impl<T> fmt::Debug for ProgressTracker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("total_steps", &self.total_steps)
            .field("completed_steps", &self.completed_steps)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<T: Clone> ProgressTracker<T> {
    pub fn new(total_steps: usize) -> Self {
        Self {
            total_steps,
            completed_steps: 0,
            started: Instant::now(),
            step_times: Vec::new(),
            status: ProgressStatus::InProgress,
            partial_results: BTreeMap::new(),
            observer: None,
        }
    }

    pub fn with_observer(total_steps: usize, observer: ProgressObserver<T>) -> Self {
        let mut tracker = Self::new(total_steps);
        tracker.observer = Some(observer);
        tracker
    }

    /// A tracker whose observer reports each step through `tracing`.
    pub fn logging(total_steps: usize) -> Self
    where
        T: 'static,
    {
        Self::with_observer(
            total_steps,
            Box::new(|completed: usize, total: usize, step_name: &str, _result: &T| {
                tracing::info!(step = step_name, "progress: {completed}/{total}");
            }),
        )
    }

    /// Grows the plan by `additional` steps, e.g. when the next phase is scheduled.
    pub fn expect_more_steps(&mut self, additional: usize) {
        self.total_steps = self.total_steps.saturating_add(additional);
        if self.completed_steps < self.total_steps {
            self.status = ProgressStatus::InProgress;
        }
    }

    pub fn update(&mut self, step_name: &str, result: T) -> ProgressSnapshot<T> {
        self.completed_steps += 1;
        self.step_times
            .push((step_name.to_string(), self.started.elapsed()));

        if let Some(observer) = self.observer.as_mut() {
            observer(self.completed_steps, self.total_steps, step_name, &result);
        }
        self.partial_results.insert(step_name.to_string(), result);

        if self.completed_steps >= self.total_steps {
            self.status = ProgressStatus::Completed;
        }

        self.snapshot()
    }

    pub fn snapshot(&self) -> ProgressSnapshot<T> {
        let fraction = if self.total_steps == 0 {
            1.0
        } else {
            self.completed_steps as f64 / self.total_steps as f64
        };

        ProgressSnapshot {
            status: self.status,
            completed_steps: self.completed_steps,
            total_steps: self.total_steps,
            fraction,
            elapsed_time: self.started.elapsed(),
            step_times: self.step_times.clone(),
            partial_results: self.partial_results.clone(),
        }
    }

    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    pub fn completed_steps(&self) -> usize {
        self.completed_steps
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }
}
