//! Authorize Refund dispatcher (spec §4.4): redeemer 6 under admin
//! multi-sig (⌈threshold⌉ of `admin_wallet_addresses`, ≥ 2, default 2-of-3).
//! Seller-side (`PaymentRequest`) only — the admin path that moves a
//! `Disputed` escrow to `RefundRequested` on the buyer's behalf.

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
    let Some(source) = ctx.store.get_payment_source(payment_source_id).await? else {
        return Ok(0);
    };
    if source.admin_wallet_addresses.len() < ctx.min_admin_threshold {
        error!(
            "payment source {payment_source_id} has fewer admin wallets ({}) than the minimum multisig threshold ({})",
            source.admin_wallet_addresses.len(),
            ctx.min_admin_threshold
        );
        return Ok(0);
    }

    let rows = ctx
        .store
        .list_payment_requests_with_action(
            payment_source_id,
            PaymentAction::AuthorizeRefundRequested,
            ctx.max_parallel_tx,
        )
        .await?;

    let mut processed = 0;
    for mut request in rows {
        let builder = RedeemerBuilder {
            redeemer: Redeemer::AllowRefund,
            new_datum: Some(datum_skeleton(&request.side, SmartContractState::RefundRequested)),
        };

        match run_once(ctx, request.selling_wallet_id, TransactionOwner::PaymentCurrent, now_ms, &builder).await {
            Ok(outcome) => {
                request.side.current_transaction_id = Some(outcome.transaction_id);
                request.next_action.requested_action = PaymentAction::AuthorizeRefundInitiated;
                info!(
                    "authorize-refund dispatched for {} as {} ({}-of-{} admin multisig assumed co-signed upstream)",
                    request.side.blockchain_identifier,
                    outcome.tx_hash,
                    ctx.min_admin_threshold,
                    source.admin_wallet_addresses.len()
                );
            }
            Err(e) => {
                error!("authorize-refund failed for {}: {e}", request.side.blockchain_identifier);
                request.next_action.requested_action = PaymentAction::AuthorizeRefundRequested;
                request.next_action.error_type = Some(e.error_type().to_string());
                request.next_action.append_note("authorize_refund", &e.to_string());
            }
        }
        ctx.store.update_payment_request(request).await?;
        processed += 1;
    }
    Ok(processed)
}
