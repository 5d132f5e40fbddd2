use thiserror::Error;

use escrow_chain_adapter::AdapterError;
use escrow_codec::CodecError;
use escrow_persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    /// Codec failures are fatal to the one entity (spec §7): never retried,
    /// always routed to `WaitingForManualAction`.
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("another worker holds the {0} lock this cycle")]
    LockContended(&'static str),
    #[error("{entity} invariant violated: {detail}")]
    Invariant { entity: String, detail: String },
    #[error("UTXO list at {address} is empty")]
    NoUtxos { address: String },
    /// Field-level rejection from a downstream API entrypoint (spec §6, §7):
    /// the request never reaches persistence or the chain.
    #[error("validation failed on {field}: {message}")]
    Validation { field: String, message: String },
}

impl EngineError {
    /// Maps to the entity's `next_action.error_type` field (spec §7: "chain
    /// failures are reported asynchronously via next_action.error_type").
    pub fn error_type(&self) -> &'static str {
        match self {
            EngineError::Adapter(_) => "adapter",
            EngineError::Codec(_) => "codec",
            EngineError::Persistence(_) => "persistence",
            EngineError::LockContended(_) => "lock_contended",
            EngineError::Invariant { .. } => "invariant",
            EngineError::NoUtxos { .. } => "no_utxos",
            EngineError::Validation { .. } => "validation",
        }
    }
}
