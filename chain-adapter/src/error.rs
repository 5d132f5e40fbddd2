use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    /// Network / RPC 5xx errors — already retried internally; surfaced only
    /// after the retry budget (spec §4.1: 500ms, x2, cap 15s, 5 attempts) is
    /// exhausted.
    #[error("transient adapter failure: {0}")]
    Transient(String),
    #[error("not found")]
    NotFound,
    #[error("rejected by indexer: {0}")]
    Rejected(String),
    #[error("adapter call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl AdapterError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdapterError::Transient(_) | AdapterError::Timeout(_))
    }
}
