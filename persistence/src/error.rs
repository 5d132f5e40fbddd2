use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("no row found for {0}")]
    NotFound(String),
    #[error("wallet {0} is already locked")]
    WalletLocked(EntityIdDisplay),
    #[error("serializable transaction conflicted after retries")]
    SerializationConflict,
    #[error("another instance is syncing payment source {0}")]
    SyncInProgress(EntityIdDisplay),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("backing store error: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Newtype purely so `EntityId` (a bare `i64`) reads naturally inside error messages.
#[derive(Debug, Clone, Copy)]
pub struct EntityIdDisplay(pub crate::entities::EntityId);

impl std::fmt::Display for EntityIdDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
