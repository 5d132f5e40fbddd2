pub mod blockfrost;
pub mod error;
pub mod retry;
pub mod trait_;
pub mod types;

pub use blockfrost::BlockfrostAdapter;
pub use error::AdapterError;
pub use trait_::ChainAdapter;
pub use types::{
    Amount, DerivedScript, ExecutionUnits, Order, ScriptParameters, TxInfo, TxListEntry, Utxo,
};
