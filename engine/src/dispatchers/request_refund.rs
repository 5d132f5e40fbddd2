//! Request Refund dispatcher (spec §4.4): redeemer 1. Buyer-side
//! (`PurchaseRequest`) only.
//!
//! `PurchasingAction` (spec §3) has a single `SetRefundRequestedRequested`
//! slot shared by both the "request" and "cancel" directions of this
//! toggle — there is no separate enum value for each, and the API surface
//! (§6) exposes `request_refund`/`cancel_refund_request` as two calls onto
//! the same field. This module and [`crate::dispatchers::cancel_refund`]
//! split the one queue by the escrow's current `on_chain_state`: this one
//! only claims rows that are not already `RefundRequested`/`Disputed` (see
//! DESIGN.md).

use log::{error, info};

use escrow_codec::{Redeemer, SmartContractState};
use escrow_persistence::{OnChainState, PurchasingAction, TransactionOwner};

use crate::context::DispatcherContext;
use crate::dispatchers::driver::run_once;
use crate::dispatchers::tx_builders::{datum_skeleton, RedeemerBuilder};
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
            PurchasingAction::SetRefundRequestedRequested,
            ctx.max_parallel_tx,
        )
        .await?
        .into_iter()
        .filter(|r| {
            !matches!(
                r.side.on_chain_state,
                Some(OnChainState::RefundRequested) | Some(OnChainState::Disputed)
            )
        });

    let mut processed = 0;
    for mut request in rows {
        // §4.3.2: RequestRefund produces Disputed when the consumed datum
        // already carries a result hash, else RefundRequested — the
        // dispatcher preserves whichever applies, it does not itself decide.
        let already_has_result = !request.side.result_hash.is_empty();
        let new_state = if already_has_result {
            SmartContractState::Disputed
        } else {
            SmartContractState::RefundRequested
        };
        let builder = RedeemerBuilder {
            redeemer: Redeemer::RequestRefund,
            new_datum: Some(datum_skeleton(&request.side, new_state)),
        };

        match run_once(ctx, request.purchasing_wallet_id, TransactionOwner::PurchaseCurrent, now_ms, &builder).await {
            Ok(outcome) => {
                request.side.current_transaction_id = Some(outcome.transaction_id);
                request.next_action.requested_action = PurchasingAction::SetRefundRequestedInitiated;
                info!(
                    "request-refund dispatched for {} as {}",
                    request.side.blockchain_identifier, outcome.tx_hash
                );
            }
            Err(e) => {
                error!("request-refund failed for {}: {e}", request.side.blockchain_identifier);
                request.next_action.requested_action = PurchasingAction::SetRefundRequestedRequested;
                request.next_action.error_type = Some(e.error_type().to_string());
                request.next_action.append_note("request_refund", &e.to_string());
            }
        }
        ctx.store.update_purchase_request(request).await?;
        processed += 1;
    }
    Ok(processed)
}
