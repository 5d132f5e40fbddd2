//! Register Agent dispatcher (spec §4.4): mints a single agent identifier
//! NFT under the payment source's minting policy. Unlike the escrow
//! redeemer dispatchers, this path has no counterparty — there is no
//! `EscrowSide` row, just a [`RegistryRequest`] owned entirely by the
//! selling wallet that is registering.
//!
//! The asset name is a one-shot derivation from the first UTXO the
//! transaction consumes (`blake2b_256(tx_hash ‖ output_index_be32)`), the
//! same scheme Cardano minting policies use to guarantee a fresh name per
//! mint without a central counter. `agent_identifier = policy_id ‖
//! asset_name`, 120 hex characters (28-byte policy id, 32-byte asset name).
//!
//! The generic Sync Loop (spec §4.3.1) only discovers transactions at a
//! `PaymentSource`'s script address, not at the minting policy's own
//! address space, so a mint's on-chain confirmation is not observed there.
//! This dispatcher instead self-confirms: once `submit_tx` succeeds the
//! registration is recorded as `RegistrationInitiated`, and a later pass of
//! this same dispatcher promotes it to `RegistrationConfirmed` once the
//! indexer reports the mint transaction has reached
//! `block_confirmations_threshold` (see DESIGN.md, resolved Open Question).

use log::{error, info};

use escrow_codec::metadata::string_to_metadata;
use escrow_common::Hash;
use escrow_persistence::{RegistrationState, TransactionOwner};

use crate::context::DispatcherContext;
use crate::dispatchers::driver::run_once;
use crate::dispatchers::tx_builders::MintAssetBuilder;
use crate::error::EngineError;

pub async fn run_cycle(
    ctx: &DispatcherContext,
    payment_source_id: escrow_persistence::EntityId,
    now_ms: i64,
) -> Result<usize, EngineError> {
    let mut processed = 0;
    processed += submit_pending(ctx, payment_source_id, now_ms).await?;
    processed += confirm_initiated(ctx, payment_source_id).await?;
    Ok(processed)
}

async fn submit_pending(
    ctx: &DispatcherContext,
    payment_source_id: escrow_persistence::EntityId,
    now_ms: i64,
) -> Result<usize, EngineError> {
    let rows = ctx
        .store
        .list_registry_requests_in_state(
            payment_source_id,
            RegistrationState::RegistrationRequested,
            ctx.max_parallel_tx,
        )
        .await?;

    let mut processed = 0;
    for mut request in rows {
        let Some(wallet) = ctx.store.get_hot_wallet(request.selling_wallet_id).await? else {
            error!("register-agent for {}: selling wallet not found", request.name);
            continue;
        };

        let utxos = ctx.chain.list_utxos_at(&wallet.address).await?;
        let Some(seed) = utxos.first() else {
            error!("register-agent for {}: wallet {} has no UTXOs to seed the asset name", request.name, wallet.address);
            continue;
        };
        let mut seed_bytes = hex::decode(&seed.tx_hash).unwrap_or_else(|_| seed.tx_hash.as_bytes().to_vec());
        seed_bytes.extend_from_slice(&seed.output_index.to_be_bytes());
        let asset_name = Hash::blake2b_256(&seed_bytes);

        let metadata = vec![
            ("name".to_string(), string_to_metadata(&request.name)),
            ("description".to_string(), string_to_metadata(&request.description)),
            ("api_base_url".to_string(), string_to_metadata(&request.api_base_url)),
            ("author".to_string(), string_to_metadata(&request.author)),
            ("legal".to_string(), string_to_metadata(&request.legal)),
            (
                "msg".to_string(),
                vec!["Masumi".to_string(), "RegisterAgent".to_string()],
            ),
        ];

        let builder = MintAssetBuilder {
            asset_name,
            burn: false,
            metadata,
        };

        match run_once(ctx, request.selling_wallet_id, TransactionOwner::RegistryCurrent, now_ms, &builder).await {
            Ok(outcome) => {
                let identifier = format!("{}{}", source_policy_id(ctx, payment_source_id).await?, asset_name.to_hex());
                request.agent_identifier = Some(identifier);
                request.current_transaction_id = Some(outcome.transaction_id);
                request.state = RegistrationState::RegistrationInitiated;
                request.error = None;
                info!("register-agent dispatched for {} as {}", request.name, outcome.tx_hash);
            }
            Err(e) => {
                error!("register-agent failed for {}: {e}", request.name);
                request.state = RegistrationState::RegistrationFailed;
                request.error = Some(e.to_string());
            }
        }
        ctx.store.update_registry_request(request).await?;
        processed += 1;
    }
    Ok(processed)
}

async fn confirm_initiated(
    ctx: &DispatcherContext,
    payment_source_id: escrow_persistence::EntityId,
) -> Result<usize, EngineError> {
    let rows = ctx
        .store
        .list_registry_requests_in_state(
            payment_source_id,
            RegistrationState::RegistrationInitiated,
            ctx.max_parallel_tx,
        )
        .await?;

    let mut processed = 0;
    for mut request in rows {
        let Some(tx_id) = request.current_transaction_id else {
            continue;
        };
        let Some(tx) = ctx.store.get_transaction(tx_id).await? else {
            continue;
        };
        if tx.tx_hash.is_empty() {
            continue;
        }
        let info = match ctx.chain.get_tx(&tx.tx_hash).await {
            Ok(info) => info,
            Err(_) => continue,
        };
        if info.confirmations >= ctx.block_confirmations_threshold {
            request.state = RegistrationState::RegistrationConfirmed;
            ctx.store.update_registry_request(request).await?;
            processed += 1;
        }
    }
    Ok(processed)
}

async fn source_policy_id(
    ctx: &DispatcherContext,
    payment_source_id: escrow_persistence::EntityId,
) -> Result<String, EngineError> {
    let source = ctx.store.get_payment_source(payment_source_id).await?.ok_or_else(|| EngineError::Invariant {
        entity: "PaymentSource".into(),
        detail: format!("payment source {payment_source_id} not found"),
    })?;
    Ok(source.policy_id)
}
