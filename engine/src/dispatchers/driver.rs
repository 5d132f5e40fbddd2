//! Shared `run_once` driver (spec §4.4) all ten dispatchers build on: fetch
//! UTXOs, build, evaluate, rebuild with execution-unit budgets, persist a
//! placeholder transaction, sign, submit. Each dispatcher supplies only the
//! bits that differ — how to build the unsigned tx bytes for its redeemer —
//! through the [`TxBuilder`] trait.

use async_trait::async_trait;
use log::{error, info};
use metrics::counter;

use escrow_chain_adapter::{ExecutionUnits, Order, Utxo};
use escrow_persistence::{EntityId, TransactionOwner, TransactionStatus};

use crate::context::DispatcherContext;
use crate::error::EngineError;

/// The validity window and collateral every authored transaction carries
/// (spec §4.4: "All transactions set tx.valid_before = now − 150s,
/// tx.valid_after = now + 150s ... Collateral is a single UTXO of at least
/// MIN_COLLATERAL_LOVELACE"). Slots are expressed in epoch seconds here; the
/// concrete network's slot arithmetic is the Chain Adapter's concern.
pub struct TxEnvelope<'a> {
    pub valid_before: i64,
    pub valid_after: i64,
    pub collateral: &'a Utxo,
}

#[async_trait]
pub trait TxBuilder: Send + Sync {
    /// Build the transaction. `budgets` is `None` on the first pass (used
    /// only to obtain execution units) and `Some` on the rebuild pass that
    /// bakes them in (spec §4.4 steps 2-3).
    async fn build(
        &self,
        ctx: &DispatcherContext,
        utxos: &[Utxo],
        envelope: &TxEnvelope<'_>,
        budgets: Option<&[ExecutionUnits]>,
    ) -> Result<Vec<u8>, EngineError>;
}

pub struct DispatchOutcome {
    pub transaction_id: EntityId,
    pub tx_hash: String,
}

/// Runs the shared build -> evaluate -> rebuild -> persist -> sign -> submit
/// sequence against `wallet_id`, under that wallet's exclusive lock.
pub async fn run_once(
    ctx: &DispatcherContext,
    wallet_id: EntityId,
    owner: TransactionOwner,
    now_ms: i64,
    builder: &dyn TxBuilder,
) -> Result<DispatchOutcome, EngineError> {
    let wallet = ctx
        .store
        .get_hot_wallet(wallet_id)
        .await?
        .ok_or_else(|| EngineError::Invariant {
            entity: "HotWallet".into(),
            detail: format!("wallet {wallet_id} not found"),
        })?;

    let mut all_utxos = ctx.chain.list_utxos_at(&wallet.address).await?;
    if all_utxos.is_empty() {
        return Err(EngineError::NoUtxos {
            address: wallet.address.clone(),
        });
    }
    all_utxos.sort_by(|a, b| lovelace_of(b).cmp(&lovelace_of(a)));

    let mut utxos = all_utxos.clone();
    utxos.truncate(ctx.max_utxos_per_tx);

    // A single pure-ADA UTXO at least MIN_COLLATERAL_LOVELACE, distinct from
    // the spending inputs, is required on every authored transaction (spec
    // §4.4). Prefer one the indexer already marks collateral-eligible.
    let collateral = all_utxos
        .iter()
        .filter(|u| !utxos.iter().any(|i| i.tx_hash == u.tx_hash && i.output_index == u.output_index))
        .filter(|u| lovelace_of(u) >= ctx.min_collateral_lovelace)
        .max_by_key(|u| u.collateral as u8)
        .or_else(|| utxos.iter().find(|u| lovelace_of(u) >= ctx.min_collateral_lovelace))
        .ok_or_else(|| EngineError::NoUtxos {
            address: format!("{} (no UTXO ≥ collateral minimum)", wallet.address),
        })?;

    let envelope = TxEnvelope {
        valid_before: now_ms / 1000 - escrow_common::config::TX_VALIDITY_WINDOW_SECS as i64,
        valid_after: now_ms / 1000 + escrow_common::config::TX_VALIDITY_WINDOW_SECS as i64,
        collateral,
    };

    let Some(transaction_id) = ctx
        .store
        .try_lock_wallet(wallet_id, owner, now_ms, ctx.lock_timeout_secs)
        .await?
    else {
        return Err(EngineError::LockContended("wallet"));
    };

    match run_build_and_submit(ctx, &utxos, &envelope, builder).await {
        Ok(tx_hash) => {
            ctx.store
                .set_transaction_hash(transaction_id, tx_hash.clone())
                .await?;
            counter!("escrow_dispatch_submitted").increment(1);
            info!("dispatched tx {tx_hash} from wallet {wallet_id}, awaiting confirmation");
            Ok(DispatchOutcome {
                transaction_id,
                tx_hash,
            })
        }
        Err(e) => {
            counter!("escrow_dispatch_failed").increment(1);
            error!("dispatch from wallet {wallet_id} failed: {e}");
            ctx.store
                .release_wallet_lock(wallet_id, transaction_id, TransactionStatus::RolledBack, None)
                .await?;
            Err(e)
        }
    }
}

async fn run_build_and_submit(
    ctx: &DispatcherContext,
    utxos: &[Utxo],
    envelope: &TxEnvelope<'_>,
    builder: &dyn TxBuilder,
) -> Result<String, EngineError> {
    let draft = builder.build(ctx, utxos, envelope, None).await?;
    let budgets = ctx.chain.evaluate_tx(&draft).await?;
    let final_bytes = builder.build(ctx, utxos, envelope, Some(&budgets)).await?;
    let tx_hash = ctx.chain.submit_tx(&final_bytes).await?;
    Ok(tx_hash)
}

fn lovelace_of(utxo: &Utxo) -> u64 {
    utxo.amounts
        .iter()
        .find(|a| a.unit == "lovelace")
        .map(|a| a.quantity)
        .unwrap_or(0)
}
