pub mod address;
pub mod constructor;
pub mod datum;
pub mod metadata;
pub mod redeemer;

pub use constructor::ConstructorTerm;
pub use datum::{EscrowDatum, SmartContractState};
pub use metadata::string_to_metadata;
pub use redeemer::Redeemer;

use escrow_common::{CryptoError, ReaderError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("unexpected data shape: {0}")]
    UnexpectedShape(String),
    #[error("unknown redeemer constructor tag {0}")]
    UnknownRedeemerTag(u64),
}
