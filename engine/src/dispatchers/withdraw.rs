//! Withdraw dispatcher (spec §4.4): redeemer 0, seller-side, after
//! `unlock_time` and only when `on_chain_state = ResultSubmitted`. No new
//! script output — the escrow UTXO is fully spent to the seller.

use log::{error, info, warn};

use escrow_codec::Redeemer;
use escrow_persistence::{OnChainState, PaymentAction, TransactionOwner};

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
        .list_payment_requests_with_action(
            payment_source_id,
            PaymentAction::WithdrawRequested,
            ctx.max_parallel_tx,
        )
        .await?;

    let mut processed = 0;
    for mut request in rows {
        if request.side.on_chain_state != Some(OnChainState::ResultSubmitted) {
            warn!(
                "withdraw requested for {} but on_chain_state is {:?}, not ResultSubmitted; deferring",
                request.side.blockchain_identifier, request.side.on_chain_state
            );
            continue;
        }
        if request.side.unlock_time > now_ms {
            continue;
        }

        let builder = RedeemerBuilder {
            redeemer: Redeemer::Withdraw,
            new_datum: None,
        };

        match run_once(ctx, request.selling_wallet_id, TransactionOwner::PaymentCurrent, now_ms, &builder).await {
            Ok(outcome) => {
                request.side.current_transaction_id = Some(outcome.transaction_id);
                request.next_action.requested_action = PaymentAction::WithdrawInitiated;
                info!(
                    "withdraw dispatched for {} as {}",
                    request.side.blockchain_identifier, outcome.tx_hash
                );
            }
            Err(e) => {
                error!("withdraw failed for {}: {e}", request.side.blockchain_identifier);
                request.next_action.requested_action = PaymentAction::WithdrawRequested;
                request.next_action.error_type = Some(e.error_type().to_string());
                request.next_action.append_note("withdraw", &e.to_string());
            }
        }
        ctx.store.update_payment_request(request).await?;
        processed += 1;
    }
    Ok(processed)
}
