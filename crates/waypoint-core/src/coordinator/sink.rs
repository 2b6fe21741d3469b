use tokio::sync::mpsc::UnboundedSender;

use crate::models::AssistantMessage;

/// Where the coordinator delivers messages as each phase finishes.
pub trait ResponseSink: Send {
    fn deliver(&mut self, message: AssistantMessage);
}

impl ResponseSink for Vec<AssistantMessage> {
    fn deliver(&mut self, message: AssistantMessage) {
        self.push(message);
    }
}

impl ResponseSink for UnboundedSender<AssistantMessage> {
    fn deliver(&mut self, message: AssistantMessage) {
        if let Err(error) = self.send(message) {
            tracing::debug!(
                kind = ?error.0.kind,
                "response receiver closed; dropping message"
            );
        }
    }
}
