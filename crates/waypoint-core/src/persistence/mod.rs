use crate::models::{CoreError, TurnId, TurnRecord};

pub type PersistenceResult<T> = Result<T, CoreError>;

pub trait MigrationStore: Send + Sync {
    fn current_version(&self) -> PersistenceResult<i64>;

    fn apply_migration(&self, target_version: i64) -> PersistenceResult<()>;
}

/// Conversation history: one record per coordinated query.
pub trait TurnStore: Send + Sync {
    fn record_turn(&self, turn: &TurnRecord) -> PersistenceResult<()>;

    /// Newest first.
    fn list_recent_turns(&self, limit: usize) -> PersistenceResult<Vec<TurnRecord>>;

    fn next_turn_id(&self) -> PersistenceResult<TurnId>;

    fn delete_all_turns(&self) -> PersistenceResult<()>;
}
