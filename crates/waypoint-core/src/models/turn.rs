use std::time::SystemTime;

use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct TurnId(pub u64);

/// One persisted query/response exchange.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TurnRecord {
    pub id: TurnId,
    pub query: String,
    pub quick_response: String,
    pub complete_response: String,
    pub quick_ms: u64,
    pub complete_ms: u64,
    pub created_at: SystemTime,
}
