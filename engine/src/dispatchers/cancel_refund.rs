//! Cancel Refund Request dispatcher (spec §4.4): redeemer 2. Buyer-side
//! (`PurchaseRequest`) only — cancels a refund request the buyer themself
//! placed, reverting the escrow toward `FundsLocked`/`ResultSubmitted`.
//!
//! Shares the `SetRefundRequestedRequested` queue slot with
//! [`crate::dispatchers::request_refund`] (see that module's doc comment
//! and DESIGN.md); this one claims only rows whose escrow is currently
//! `RefundRequested` or `Disputed` — the states a cancel makes sense from.

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
            matches!(
                r.side.on_chain_state,
                Some(OnChainState::RefundRequested) | Some(OnChainState::Disputed)
            )
        });

    let mut processed = 0;
    for mut request in rows {
        // §4.3.2: CancelRefundRequest yields ResultSubmitted if the seller
        // had already submitted a result before the refund was requested,
        // else reverts to FundsLocked.
        let target_state = if !request.side.result_hash.is_empty() {
            SmartContractState::ResultSubmitted
        } else {
            SmartContractState::FundsLocked
        };
        let builder = RedeemerBuilder {
            redeemer: Redeemer::CancelRefundRequest,
            new_datum: Some(datum_skeleton(&request.side, target_state)),
        };

        match run_once(ctx, request.purchasing_wallet_id, TransactionOwner::PurchaseCurrent, now_ms, &builder).await {
            Ok(outcome) => {
                request.side.current_transaction_id = Some(outcome.transaction_id);
                request.next_action.requested_action = PurchasingAction::SetRefundRequestedInitiated;
                info!(
                    "cancel-refund dispatched for {} as {}",
                    request.side.blockchain_identifier, outcome.tx_hash
                );
            }
            Err(e) => {
                error!("cancel-refund failed for {}: {e}", request.side.blockchain_identifier);
                request.next_action.requested_action = PurchasingAction::SetRefundRequestedRequested;
                request.next_action.error_type = Some(e.error_type().to_string());
                request.next_action.append_note("cancel_refund", &e.to_string());
            }
        }
        ctx.store.update_purchase_request(request).await?;
        processed += 1;
    }
    Ok(processed)
}
