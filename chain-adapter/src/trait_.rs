use async_trait::async_trait;

use crate::error::AdapterError;
use crate::types::{
    DerivedScript, ExecutionUnits, Order, ScriptParameters, TxInfo, TxListEntry, Utxo,
};

/// Abstracts a UTXO-chain indexer (spec §4.1). The only component allowed to
/// import an indexer SDK is the concrete implementation of this trait.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// List transactions touching `addr`, paginated, newest-first by default.
    async fn list_txs_at(
        &self,
        addr: &str,
        page: u32,
        order: Order,
    ) -> Result<Vec<TxListEntry>, AdapterError>;

    /// List unspent outputs currently sitting at `addr`, used by the Action
    /// Dispatchers' largest-first coin selection (spec §4.4 step 1). Not
    /// part of the original §4.1 table, which only names the script
    /// address's transaction history — hot wallets need their own UTXO set
    /// to fund a build, so the indexer's `/addresses/{addr}/utxos` endpoint
    /// is exposed here too.
    async fn list_utxos_at(&self, addr: &str) -> Result<Vec<Utxo>, AdapterError>;

    /// Fetch inputs, outputs, confirmations and the raw body for a transaction.
    async fn get_tx(&self, tx_hash: &str) -> Result<TxInfo, AdapterError>;

    /// Submit a signed, CBOR-encoded transaction. Returns the tx hash.
    async fn submit_tx(&self, signed_bytes: &[u8]) -> Result<String, AdapterError>;

    /// Evaluate a built transaction's execution units per attached script.
    async fn evaluate_tx(&self, bytes: &[u8]) -> Result<Vec<ExecutionUnits>, AdapterError>;

    /// Resolve the script address and policy id from the compiled script and
    /// its applied parameters.
    async fn derive_script_addr(
        &self,
        params: &ScriptParameters,
    ) -> Result<DerivedScript, AdapterError>;
}
