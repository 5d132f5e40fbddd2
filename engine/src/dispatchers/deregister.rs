//! Deregister Agent dispatcher (spec §4.4): burns the agent identifier NFT
//! minted by [`crate::dispatchers::register`]. Only acts on registrations
//! already `RegistrationConfirmed`; like registration, this path self-
//! confirms rather than relying on the generic Sync Loop.

use log::{error, info};

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
            RegistrationState::DeregistrationRequested,
            ctx.max_parallel_tx,
        )
        .await?;

    let mut processed = 0;
    for mut request in rows {
        let Some(identifier) = request.agent_identifier.clone() else {
            error!("deregister-agent for {}: no agent_identifier on record", request.name);
            continue;
        };
        if identifier.len() != 120 {
            error!(
                "deregister-agent for {}: agent_identifier {} is not 120 hex chars",
                request.name, identifier
            );
            continue;
        }
        let asset_name_hex = &identifier[identifier.len() - 64..];
        let Ok(asset_name) = Hash::from_hex(asset_name_hex) else {
            error!("deregister-agent for {}: asset name portion is not valid hex", request.name);
            continue;
        };

        let builder = MintAssetBuilder {
            asset_name,
            burn: true,
            metadata: vec![("msg".to_string(), vec!["Masumi".to_string(), "DeregisterAgent".to_string()])],
        };

        match run_once(ctx, request.selling_wallet_id, TransactionOwner::RegistryCurrent, now_ms, &builder).await {
            Ok(outcome) => {
                request.current_transaction_id = Some(outcome.transaction_id);
                request.state = RegistrationState::DeregistrationInitiated;
                request.error = None;
                info!("deregister-agent dispatched for {} as {}", request.name, outcome.tx_hash);
            }
            Err(e) => {
                error!("deregister-agent failed for {}: {e}", request.name);
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
            RegistrationState::DeregistrationInitiated,
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
            request.state = RegistrationState::DeregistrationConfirmed;
            ctx.store.update_registry_request(request).await?;
            processed += 1;
        }
    }
    Ok(processed)
}
