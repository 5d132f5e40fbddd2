//! Withdraw Disputed dispatcher (spec §4.4): redeemer 4, admin path, after
//! `external_dispute_unlock_time` and only when `on_chain_state = Disputed`.
//!
//! Admin wallets (`PaymentSource::admin_wallet_addresses`) are plain
//! addresses, not `HotWallet` rows the coordinator holds keys for (spec
//! §3) — there is no wallet-locked signing flow for them. This dispatcher
//! builds and submits through the escrow's own `SmartContractWallet` (the
//! selling `HotWallet`, same as [`crate::dispatchers::authorize_refund`]),
//! on the assumption that the required multisig witnesses from
//! `admin_wallet_addresses` are attached to the transaction upstream of
//! `submit_tx`, outside this core's scope (spec §1 "it only tracks and
//! relays admin decisions").
//!
//! `PaymentAction` has no dedicated `*Requested` slot for this path (spec
//! §3's enum lists only Withdraw/SubmitResult/AuthorizeRefund), so rows are
//! selected directly by `on_chain_state = Disputed` rather than by queue
//! action (see DESIGN.md).

use log::{error, info};

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
    let Some(source) = ctx.store.get_payment_source(payment_source_id).await? else {
        return Ok(0);
    };
    if source.admin_wallet_addresses.len() < ctx.min_admin_threshold {
        error!(
            "payment source {payment_source_id} cannot authorize a disputed withdrawal: fewer admin wallets than the multisig threshold"
        );
        return Ok(0);
    }

    let rows = ctx
        .store
        .list_payment_requests_by_on_chain_state(
            payment_source_id,
            OnChainState::Disputed,
            ctx.max_parallel_tx,
        )
        .await?;

    let mut processed = 0;
    for mut request in rows {
        if request.side.external_dispute_unlock_time > now_ms {
            continue;
        }
        // Already in flight: the Wallet Locker (spec §4.5) would reject a
        // second lock attempt anyway, but skip the noisy failure.
        if matches!(
            request.next_action.requested_action,
            PaymentAction::WithdrawInitiated
                | PaymentAction::SubmitResultInitiated
                | PaymentAction::AuthorizeRefundInitiated
        ) {
            continue;
        }

        let builder = RedeemerBuilder {
            redeemer: Redeemer::WithdrawDisputed,
            new_datum: None,
        };

        match run_once(ctx, request.selling_wallet_id, TransactionOwner::PaymentCurrent, now_ms, &builder).await {
            Ok(outcome) => {
                request.side.current_transaction_id = Some(outcome.transaction_id);
                info!(
                    "withdraw-disputed dispatched for {} as {}",
                    request.side.blockchain_identifier, outcome.tx_hash
                );
            }
            Err(e) => {
                error!("withdraw-disputed failed for {}: {e}", request.side.blockchain_identifier);
                request.next_action.requested_action = PaymentAction::WaitingForManualAction;
                request.next_action.error_type = Some(e.error_type().to_string());
                request.next_action.append_note("withdraw_disputed", &e.to_string());
            }
        }
        ctx.store.update_payment_request(request).await?;
        processed += 1;
    }
    Ok(processed)
}
