use escrow_common::Hash;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// One entry from `list_txs_at` — just enough to drive cursor discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxListEntry {
    pub tx_hash: String,
    pub block_time: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// "lovelace" for the native asset, or `policy_id + asset_name` hex otherwise.
    pub unit: String,
    pub quantity: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub tx_hash: String,
    pub output_index: u32,
    pub address: String,
    pub amounts: Vec<Amount>,
    pub inline_datum: Option<String>,
    pub reference_script_hash: Option<Hash>,
    pub collateral: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInfo {
    pub tx_hash: String,
    pub block_hash: String,
    pub confirmations: u64,
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<Utxo>,
    pub raw_body_bytes: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionUnits {
    pub mem: u64,
    pub steps: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptParameters {
    pub policy_id_seed: String,
    pub compiled_code_hex: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedScript {
    pub address: String,
    pub policy_id: String,
}
