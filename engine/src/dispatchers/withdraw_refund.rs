//! Withdraw Refund dispatcher (spec §4.4): redeemer 3, buyer-side, after
//! `unlock_time` and only when `on_chain_state = RefundRequested`.

use log::{error, info, warn};

use escrow_codec::Redeemer;
use escrow_persistence::{OnChainState, PurchasingAction, TransactionOwner};

use crate::context::DispatcherContext;
use crate::dispatchers::driver::run_once;
use crate::dispatchers::tx_builders::RedeemerBuilder;
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
            PurchasingAction::WithdrawRefundRequested,
            ctx.max_parallel_tx,
        )
        .await?;

    let mut processed = 0;
    for mut request in rows {
        if request.side.on_chain_state != Some(OnChainState::RefundRequested) {
            warn!(
                "withdraw-refund requested for {} but on_chain_state is {:?}, not RefundRequested; deferring",
                request.side.blockchain_identifier, request.side.on_chain_state
            );
            continue;
        }
        if request.side.unlock_time > now_ms {
            continue;
        }

        let builder = RedeemerBuilder {
            redeemer: Redeemer::WithdrawRefund,
            new_datum: None,
        };

        match run_once(ctx, request.purchasing_wallet_id, TransactionOwner::PurchaseCurrent, now_ms, &builder).await {
            Ok(outcome) => {
                request.side.current_transaction_id = Some(outcome.transaction_id);
                request.next_action.requested_action = PurchasingAction::WithdrawRefundInitiated;
                info!(
                    "withdraw-refund dispatched for {} as {}",
                    request.side.blockchain_identifier, outcome.tx_hash
                );
            }
            Err(e) => {
                error!("withdraw-refund failed for {}: {e}", request.side.blockchain_identifier);
                request.next_action.requested_action = PurchasingAction::WithdrawRefundRequested;
                request.next_action.error_type = Some(e.error_type().to_string());
                request.next_action.append_note("withdraw_refund", &e.to_string());
            }
        }
        ctx.store.update_purchase_request(request).await?;
        processed += 1;
    }
    Ok(processed)
}
