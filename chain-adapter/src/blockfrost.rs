use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::AdapterError;
use crate::retry::with_retry;
use crate::trait_::ChainAdapter;
use crate::types::{
    Amount, DerivedScript, ExecutionUnits, Order, ScriptParameters, TxInfo, TxListEntry, Utxo,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: u32 = 100;

/// Indexer-backed [`ChainAdapter`]. Talks to a Blockfrost-compatible REST API
/// over HTTPS; every call is wrapped in the shared retry policy and a hard
/// per-call timeout so a wedged indexer cannot stall the sync loop (spec
/// §4.1, §4.6).
pub struct BlockfrostAdapter {
    client: Client,
    base_url: String,
    project_id: String,
    timeout: Duration,
}

impl BlockfrostAdapter {
    pub fn new(base_url: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self::with_timeout(base_url, project_id, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        project_id: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            project_id: project_id.into(),
            timeout,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, AdapterError> {
        let request = self
            .client
            .get(self.url(path))
            .header("project_id", &self.project_id)
            .timeout(self.timeout);

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, self.timeout))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(AdapterError::NotFound),
            status if status.is_server_error() => {
                Err(AdapterError::Transient(format!("indexer returned {status}")))
            }
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| AdapterError::Rejected(format!("malformed indexer response: {e}"))),
            status => Err(AdapterError::Rejected(format!(
                "indexer returned {status}"
            ))),
        }
    }
}

fn classify_transport_error(err: &reqwest::Error, timeout: Duration) -> AdapterError {
    if err.is_timeout() {
        AdapterError::Timeout(timeout)
    } else {
        AdapterError::Transient(err.to_string())
    }
}

#[derive(Deserialize)]
struct RawTxListEntry {
    tx_hash: String,
    block_time: u64,
}

#[derive(Deserialize)]
struct RawAmount {
    unit: String,
    quantity: String,
}

#[derive(Deserialize)]
struct RawUtxoIo {
    tx_hash: String,
    output_index: Option<u32>,
    index: Option<u32>,
    address: String,
    amount: Vec<RawAmount>,
    inline_datum: Option<String>,
    reference_script_hash: Option<String>,
    collateral: Option<bool>,
}

#[derive(Deserialize)]
struct RawTxInfo {
    hash: String,
    block: String,
    confirmations: u64,
    inputs: Vec<RawUtxoIo>,
    outputs: Vec<RawUtxoIo>,
    cbor: String,
}

#[derive(Deserialize)]
struct RawSubmitResponse {
    tx_hash: String,
}

#[derive(Deserialize)]
struct RawEvalUnits {
    memory: u64,
    steps: u64,
}

#[async_trait]
impl ChainAdapter for BlockfrostAdapter {
    async fn list_txs_at(
        &self,
        addr: &str,
        page: u32,
        order: Order,
    ) -> Result<Vec<TxListEntry>, AdapterError> {
        let order_str = match order {
            Order::Asc => "asc",
            Order::Desc => "desc",
        };
        let path = format!(
            "/addresses/{addr}/transactions?page={page}&count={PAGE_SIZE}&order={order_str}"
        );
        with_retry("list_txs_at", || async {
            let raw: Vec<RawTxListEntry> = self.get_json(&path).await?;
            Ok(raw
                .into_iter()
                .map(|e| TxListEntry {
                    tx_hash: e.tx_hash,
                    block_time: e.block_time,
                })
                .collect())
        })
        .await
    }

    async fn list_utxos_at(&self, addr: &str) -> Result<Vec<Utxo>, AdapterError> {
        let path = format!("/addresses/{addr}/utxos?count={PAGE_SIZE}");
        with_retry("list_utxos_at", || async {
            let raw: Vec<RawUtxoIo> = self.get_json(&path).await?;
            Ok(raw.into_iter().map(convert_utxo).collect())
        })
        .await
    }

    async fn get_tx(&self, tx_hash: &str) -> Result<TxInfo, AdapterError> {
        let path = format!("/txs/{tx_hash}/utxos");
        with_retry("get_tx", || async {
            let raw: RawTxInfo = self.get_json(&path).await?;
            debug!("fetched tx {tx_hash} with {} confirmations", raw.confirmations);
            Ok(TxInfo {
                tx_hash: raw.hash.clone(),
                block_hash: raw.block,
                confirmations: raw.confirmations,
                inputs: raw.inputs.into_iter().map(convert_utxo).collect(),
                outputs: raw.outputs.into_iter().map(convert_utxo).collect(),
                raw_body_bytes: hex::decode(&raw.cbor)
                    .map_err(|e| AdapterError::Rejected(format!("invalid cbor hex: {e}")))?,
            })
        })
        .await
    }

    async fn submit_tx(&self, signed_bytes: &[u8]) -> Result<String, AdapterError> {
        let request = self
            .client
            .post(self.url("/tx/submit"))
            .header("project_id", &self.project_id)
            .header("Content-Type", "application/cbor")
            .body(signed_bytes.to_vec())
            .timeout(self.timeout);

        with_retry("submit_tx", || async {
            let response = request
                .try_clone()
                .expect("request body is a plain byte buffer, always clonable")
                .send()
                .await
                .map_err(|e| classify_transport_error(&e, self.timeout))?;

            match response.status() {
                status if status.is_client_error() => {
                    let body = response.text().await.unwrap_or_default();
                    Err(AdapterError::Rejected(body))
                }
                status if status.is_server_error() => {
                    Err(AdapterError::Transient(format!("indexer returned {status}")))
                }
                _ => {
                    let raw: RawSubmitResponse = response
                        .json()
                        .await
                        .map_err(|e| AdapterError::Rejected(format!("bad submit response: {e}")))?;
                    Ok(raw.tx_hash)
                }
            }
        })
        .await
    }

    async fn evaluate_tx(&self, bytes: &[u8]) -> Result<Vec<ExecutionUnits>, AdapterError> {
        let request = self
            .client
            .post(self.url("/utils/txs/evaluate"))
            .header("project_id", &self.project_id)
            .header("Content-Type", "application/cbor")
            .body(bytes.to_vec())
            .timeout(self.timeout);

        with_retry("evaluate_tx", || async {
            let response = request
                .try_clone()
                .expect("request body is a plain byte buffer, always clonable")
                .send()
                .await
                .map_err(|e| classify_transport_error(&e, self.timeout))?;

            match response.status() {
                status if status.is_client_error() => {
                    let body = response.text().await.unwrap_or_default();
                    Err(AdapterError::Rejected(body))
                }
                status if status.is_server_error() => {
                    Err(AdapterError::Transient(format!("indexer returned {status}")))
                }
                _ => {
                    let raw: Vec<RawEvalUnits> = response
                        .json()
                        .await
                        .map_err(|e| AdapterError::Rejected(format!("bad evaluate response: {e}")))?;
                    Ok(raw
                        .into_iter()
                        .map(|u| ExecutionUnits {
                            mem: u.memory,
                            steps: u.steps,
                        })
                        .collect())
                }
            }
        })
        .await
    }

    async fn derive_script_addr(
        &self,
        params: &ScriptParameters,
    ) -> Result<DerivedScript, AdapterError> {
        // Script address derivation is pure local computation (blake2b-224 of
        // the applied script bytes) and never touches the indexer, but it
        // lives behind the adapter trait so callers never special-case it.
        let code = hex::decode(&params.compiled_code_hex)
            .map_err(|e| AdapterError::Rejected(format!("invalid script hex: {e}")))?;
        let policy_hash = escrow_common::Hash::blake2b_256(&code);
        let mut seeded = params.policy_id_seed.as_bytes().to_vec();
        seeded.extend_from_slice(policy_hash.as_bytes());
        let script_hash = escrow_common::Hash::blake2b_256(&seeded);
        let policy_id = hex::encode(&script_hash.as_bytes()[..28]);
        Ok(DerivedScript {
            address: format!("addr_script1{policy_id}"),
            policy_id,
        })
    }
}

fn convert_utxo(raw: RawUtxoIo) -> Utxo {
    Utxo {
        tx_hash: raw.tx_hash,
        output_index: raw.output_index.or(raw.index).unwrap_or(0),
        address: raw.address,
        amounts: raw
            .amount
            .into_iter()
            .map(|a| Amount {
                unit: a.unit,
                quantity: a.quantity.parse().unwrap_or(0),
            })
            .collect(),
        inline_datum: raw.inline_datum,
        reference_script_hash: raw
            .reference_script_hash
            .and_then(|h| h.parse::<escrow_common::Hash>().ok()),
        collateral: raw.collateral.unwrap_or(false),
    }
}
