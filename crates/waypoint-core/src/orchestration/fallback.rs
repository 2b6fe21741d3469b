use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::orchestration::OrchestrationResult;

/// Cheap substitute for a task that ran out of time. Receives the task's own input.
pub type FallbackFn<I, T> = Arc<dyn Fn(&I) -> OrchestrationResult<T> + Send + Sync>;

/// Fallbacks keyed by task name or task kind. Populated at startup and only read while
/// batches run.
pub struct FallbackRegistry<I, T> {
    entries: HashMap<String, FallbackFn<I, T>>,
}

impl<I, T> Default for FallbackRegistry<I, T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<I, T> fmt::Debug for FallbackRegistry<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("FallbackRegistry")
            .field("keys", &keys)
            .finish()
    }
}

impl<I, T> FallbackRegistry<I, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `fallback` under `key`, returning the entry it replaced.
    pub fn register<F>(&mut self, key: impl Into<String>, fallback: F) -> Option<FallbackFn<I, T>>
    where
        F: Fn(&I) -> OrchestrationResult<T> + Send + Sync + 'static,
    {
        self.entries.insert(key.into(), Arc::new(fallback))
    }

    pub fn lookup(&self, key: &str) -> Option<FallbackFn<I, T>> {
        self.entries.get(key).cloned()
    }

    /// Exact task name wins over the task's kind.
    pub fn resolve(&self, task_name: &str, task_kind: &str) -> Option<FallbackFn<I, T>> {
        self.lookup(task_name).or_else(|| self.lookup(task_kind))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
