//! Submit Result dispatcher (spec §4.4): redeemer 5, includes the seller's
//! `result_hash` in the new datum. Seller-side (`PaymentRequest`) only.

use log::{error, info};

use escrow_codec::{Redeemer, SmartContractState};
use escrow_persistence::{PaymentAction, TransactionOwner};

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
        .list_payment_requests_with_action(
            payment_source_id,
            PaymentAction::SubmitResultRequested,
            ctx.max_parallel_tx,
        )
        .await?;

    let mut processed = 0;
    for mut request in rows {
        let mut new_datum = datum_skeleton(&request.side, SmartContractState::ResultSubmitted);
        new_datum.result_time = now_ms as u64;
        let builder = RedeemerBuilder {
            redeemer: Redeemer::SubmitResult,
            new_datum: Some(new_datum),
        };

        match run_once(ctx, request.selling_wallet_id, TransactionOwner::PaymentCurrent, now_ms, &builder).await {
            Ok(outcome) => {
                request.side.current_transaction_id = Some(outcome.transaction_id);
                request.next_action.requested_action = PaymentAction::SubmitResultInitiated;
                info!(
                    "submit-result dispatched for {} as {}",
                    request.side.blockchain_identifier, outcome.tx_hash
                );
            }
            Err(e) => {
                error!("submit-result failed for {}: {e}", request.side.blockchain_identifier);
                request.next_action.requested_action = PaymentAction::SubmitResultRequested;
                request.next_action.error_type = Some(e.error_type().to_string());
                request.next_action.append_note("submit_result", &e.to_string());
            }
        }
        ctx.store.update_payment_request(request).await?;
        processed += 1;
    }
    Ok(processed)
}
