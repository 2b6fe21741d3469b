use serde::Serialize;

pub type TaskPriority = i32;

/// Resolved state of one task after its batch returns.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum TaskOutcome<T> {
    Success(T),
    Error(String),
    TimedOut,
    Cancelled,
}

impl<T> TaskOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            TaskOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_success(self) -> Option<T> {
        match self {
            TaskOutcome::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Success(_) => "success",
            TaskOutcome::Error(_) => "error",
            TaskOutcome::TimedOut => "timed_out",
            TaskOutcome::Cancelled => "cancelled",
        }
    }
}
