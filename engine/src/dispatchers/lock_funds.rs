//! Lock Funds dispatcher (spec §4.4): produces the Initial transaction that
//! opens a new escrow. Buyer-side (`PurchaseRequest`) only — datum fields
//! are populated from the `PurchaseRequest` row. The Sync Loop (§4.3.1)
//! promotes `FundsLockingInitiated` to `WaitingForExternalAction` once it
//! observes the resulting script output.

use log::{error, info};

use escrow_codec::SmartContractState;
use escrow_persistence::{PurchasingAction, TransactionOwner};

use crate::context::DispatcherContext;
use crate::dispatchers::driver::run_once;
use crate::dispatchers::tx_builders::{datum_skeleton, InitialLockBuilder};
use crate::error::EngineError;

pub async fn run_cycle(
    ctx: &DispatcherContext,
    payment_source_id: escrow_persistence::EntityId,
    now_ms: i64,
) -> Result<usize, EngineError> {
    let rows = ctx
        .store
        .list_purchase_requests_with_action(
            payment_source_id,
            PurchasingAction::FundsLockingRequested,
            ctx.max_parallel_tx,
        )
        .await?;

    let mut processed = 0;
    for mut request in rows {
        let Some(seller) = ctx.store.get_hot_wallet(request.seller_wallet_id).await? else {
            error!("lock-funds for {}: seller wallet not found", request.side.blockchain_identifier);
            continue;
        };
        let Some(buyer) = ctx.store.get_hot_wallet(request.purchasing_wallet_id).await? else {
            error!("lock-funds for {}: purchasing wallet not found", request.side.blockchain_identifier);
            continue;
        };

        let seller_vkey = escrow_common::VerificationKey::from_hex(&seller.vkey).map_err(|e| EngineError::Invariant {
            entity: "HotWallet".into(),
            detail: format!("seller vkey {} is not valid hex: {e}", seller.vkey),
        })?;
        let buyer_vkey = escrow_common::VerificationKey::from_hex(&buyer.vkey).map_err(|e| EngineError::Invariant {
            entity: "HotWallet".into(),
            detail: format!("buyer vkey {} is not valid hex: {e}", buyer.vkey),
        })?;

        let mut datum = datum_skeleton(&request.side, SmartContractState::FundsLocked);
        datum.seller_address = escrow_common::AddressComponents::new(seller_vkey.to_key_hash(), None);
        datum.buyer_address = escrow_common::AddressComponents::new(buyer_vkey.to_key_hash(), None);
        datum.seller_vkey = seller_vkey;
        datum.buyer_vkey = buyer_vkey;
        datum.buyer_cooldown_time = 0;
        datum.seller_cooldown_time = 0;

        let builder = InitialLockBuilder { datum };

        match run_once(ctx, request.purchasing_wallet_id, TransactionOwner::PurchaseCurrent, now_ms, &builder).await {
            Ok(outcome) => {
                request.side.current_transaction_id = Some(outcome.transaction_id);
                request.next_action.requested_action = PurchasingAction::FundsLockingInitiated;
                info!(
                    "lock-funds dispatched for {} as {}",
                    request.side.blockchain_identifier, outcome.tx_hash
                );
            }
            Err(e) => {
                error!("lock-funds failed for {}: {e}", request.side.blockchain_identifier);
                request.next_action.requested_action = PurchasingAction::FundsLockingRequested;
                request.next_action.error_type = Some(e.error_type().to_string());
                request.next_action.append_note("lock_funds", &e.to_string());
            }
        }
        ctx.store.update_purchase_request(request).await?;
        processed += 1;
    }
    Ok(processed)
}
