pub mod fallback;
pub mod progress;
pub mod task_runner;

pub use fallback::{FallbackFn, FallbackRegistry};
pub use progress::{ProgressObserver, ProgressSnapshot, ProgressStatus, ProgressTracker};
pub use task_runner::{Batch, BatchReport, TaskDescriptor, TaskRunner, TaskWork};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::models::CoreError;

pub type OrchestrationResult<T> = Result<T, CoreError>;

pub type TaskFuture<T> = Pin<Box<dyn Future<Output = OrchestrationResult<T>> + Send>>;

/// Design value for how often a running batch re-checks its deadline.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cooperative stop signal shared between a batch and its task bodies.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
