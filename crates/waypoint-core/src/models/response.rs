use std::time::Duration;

use serde::Serialize;

use crate::models::{CoreError, CoreErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePhase {
    Idle,
    Phase1,
    Phase2,
    Done,
}

/// Per-query response state. Owned by the caller; phases only move forward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResponseState {
    quick_response: Option<String>,
    complete_response: Option<String>,
    phase: ResponsePhase,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseState {
    pub fn new() -> Self {
        Self {
            quick_response: None,
            complete_response: None,
            phase: ResponsePhase::Idle,
        }
    }

    pub fn phase(&self) -> ResponsePhase {
        self.phase
    }

    pub fn quick_response(&self) -> Option<&str> {
        self.quick_response.as_deref()
    }

    pub fn complete_response(&self) -> Option<&str> {
        self.complete_response.as_deref()
    }

    pub fn advance(&mut self, next: ResponsePhase) -> Result<(), CoreError> {
        if next <= self.phase {
            return Err(CoreError::new(
                CoreErrorKind::Coordination,
                format!(
                    "response phase cannot move from '{:?}' to '{next:?}'",
                    self.phase
                ),
            ));
        }
        self.phase = next;
        Ok(())
    }

    pub(crate) fn record_quick(&mut self, text: String) {
        self.quick_response = Some(text);
    }

    pub(crate) fn record_complete(&mut self, text: String) {
        self.complete_response = Some(text);
    }

    /// Jumps to `Done` from any earlier phase.
    pub(crate) fn finish(&mut self) {
        self.phase = ResponsePhase::Done;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Acknowledgement,
    Quick,
    Complete,
}

/// The one message shape crossing the coordinator/UI boundary.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AssistantMessage {
    pub kind: MessageKind,
    pub text: String,
}

impl AssistantMessage {
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct PhaseTimings {
    /// Time from query receipt until the quick response was delivered.
    pub quick: Duration,
    /// Time from query receipt until the complete response was delivered.
    pub complete: Duration,
    pub phase1_budget: Duration,
    pub phase2_budget: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CoordinatedResponse {
    pub state: ResponseState,
    pub timings: PhaseTimings,
}

impl CoordinatedResponse {
    pub fn quick_response(&self) -> &str {
        self.state.quick_response().unwrap_or_default()
    }

    pub fn complete_response(&self) -> &str {
        self.state.complete_response().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{ResponsePhase, ResponseState};

    #[test]
    fn phases_only_move_forward() {
        let mut state = ResponseState::new();
        state.advance(ResponsePhase::Phase1).unwrap();
        state.advance(ResponsePhase::Phase2).unwrap();
        assert!(state.advance(ResponsePhase::Phase1).is_err());
        assert!(state.advance(ResponsePhase::Phase2).is_err());
        state.advance(ResponsePhase::Done).unwrap();
        assert_eq!(state.phase(), ResponsePhase::Done);
    }
}
