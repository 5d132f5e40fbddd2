//! Sync Loop — the heart of the State Engine (spec §4.3). Invoked
//! periodically per `PaymentSource`: pulls new chain activity, reconciles
//! rollbacks, classifies and applies each transaction, then advances the
//! cursor.

use log::{error, info, warn};
use metrics::counter;

use escrow_chain_adapter::{Order, TxInfo, TxListEntry};
use escrow_codec::EscrowDatum;
use escrow_persistence::{
    EntityId, EscrowSide, OnChainState, PaymentAction, PaymentRequest, PaymentSource,
    PurchaseRequest, PurchasingAction, Transaction, TransactionStatus,
};

use crate::classify::{classify, TxClass};
use crate::context::DispatcherContext;
use crate::error::EngineError;
use crate::initial::{try_match_payment_request, try_match_purchase_request};
use crate::rawtx::extract_redeemers;
use crate::transition::{amount_is_correct, next_payment_action, next_purchasing_action, resolve_on_chain_state};

pub struct DiscoveryResult {
    pub new_txs_chronological: Vec<TxListEntry>,
    pub rolled_back_hashes: Vec<String>,
}

/// Spec §4.3 step 1: page through `list_txs_at` newest-first, accumulating
/// hashes until `last_identifier_checked` is found. If it is never found and
/// a cursor existed, a rollback occurred: find the latest trail entry that
/// still appears in the fresh page set (the fork point) and treat everything
/// newer in the trail as rolled back.
pub async fn discover_new_txs(
    ctx: &DispatcherContext,
    source: &PaymentSource,
) -> Result<DiscoveryResult, EngineError> {
    let mut page = 1u32;
    let mut accumulated: Vec<TxListEntry> = Vec::new();
    let mut found_cursor = false;

    loop {
        let batch = ctx
            .chain
            .list_txs_at(&source.smart_contract_address, page, Order::Desc)
            .await?;
        if batch.is_empty() {
            break;
        }
        for entry in &batch {
            if Some(&entry.tx_hash) == source.last_identifier_checked.as_ref() {
                found_cursor = true;
                break;
            }
            accumulated.push(entry.clone());
        }
        if found_cursor {
            break;
        }
        page += 1;
    }

    accumulated.reverse(); // newest-first -> chronological

    if found_cursor || source.last_identifier_checked.is_none() {
        return Ok(DiscoveryResult {
            new_txs_chronological: accumulated,
            rolled_back_hashes: Vec::new(),
        });
    }

    // Rollback: walk the trail newest-first, looking for the first entry
    // that still appears somewhere in the freshly observed chain history.
    let trail = ctx
        .store
        .list_identifiers_desc(source.id, ctx.max_history_levels)
        .await?;
    let fresh_hashes: std::collections::HashSet<&str> =
        accumulated.iter().map(|e| e.tx_hash.as_str()).collect();

    let fork_point = trail.iter().find(|entry| fresh_hashes.contains(entry.tx_hash.as_str()));

    let rolled_back_hashes = match fork_point {
        Some(fork) => ctx.store.truncate_identifiers_after(source.id, &fork.tx_hash).await?,
        None => trail.into_iter().map(|e| e.tx_hash).collect(),
    };

    Ok(DiscoveryResult {
        new_txs_chronological: accumulated,
        rolled_back_hashes,
    })
}

/// Spec §4.3 step 2: standardized rollback handling. Never auto-resyncs.
pub async fn handle_rollback_set(
    ctx: &DispatcherContext,
    rolled_back_hashes: &[String],
) -> Result<(), EngineError> {
    if !rolled_back_hashes.is_empty() {
        counter!("escrow_sync_rollbacks_detected").increment(rolled_back_hashes.len() as u64);
    }
    for hash in rolled_back_hashes {
        let Some(tx) = ctx.store.find_transaction_by_hash(hash).await? else {
            continue;
        };
        if tx.status == TransactionStatus::Pending {
            if let Some(wallet_id) = tx.blocks_wallet {
                ctx.store.mark_transaction_rolled_back(tx.id).await?;
                warn!("released wallet {wallet_id} lock held by rolled-back tx {hash}");
            } else {
                ctx.store.mark_transaction_rolled_back(tx.id).await?;
            }
        }

        let (payments, purchases) = ctx.store.find_entities_by_current_transaction(tx.id).await?;
        for mut p in payments {
            p.next_action.requested_action = PaymentAction::WaitingForManualAction;
            p.next_action
                .append_note("rollback", "Rolled back transaction detected.");
            ctx.store.update_payment_request(p).await?;
        }
        for mut p in purchases {
            p.next_action.requested_action = PurchasingAction::WaitingForManualAction;
            p.next_action
                .append_note("rollback", "Rolled back transaction detected.");
            ctx.store.update_purchase_request(p).await?;
        }
    }
    Ok(())
}

/// One full cycle for one `PaymentSource`: try to claim the sync slot, run
/// discovery + rollback handling + per-tx dispatch, then release.
pub async fn run_sync_cycle(
    ctx: &DispatcherContext,
    source: &PaymentSource,
    now_ms: i64,
) -> Result<(), EngineError> {
    if !ctx
        .store
        .try_begin_sync(source.id, now_ms, ctx.sync_lock_timeout_secs)
        .await?
    {
        info!("payment source {} already syncing, skipping cycle", source.id);
        return Ok(());
    }

    let result = run_sync_cycle_inner(ctx, source).await;

    // Sync always ends even on error, so the flag never wedges a source —
    // the next cycle retries from the unchanged cursor (spec §7 propagation policy).
    let last_checked = match &result {
        Ok(Some(last)) => Some(last.clone()),
        _ => None,
    };
    ctx.store.end_sync(source.id, last_checked, now_ms).await?;

    result.map(|_| ())
}

async fn run_sync_cycle_inner(
    ctx: &DispatcherContext,
    source: &PaymentSource,
) -> Result<Option<String>, EngineError> {
    let discovery = discover_new_txs(ctx, source).await?;
    handle_rollback_set(ctx, &discovery.rolled_back_hashes).await?;

    let mut last_applied_hash = None;

    for chunk in discovery.new_txs_chronological.chunks(ctx.max_parallel_tx) {
        for entry in chunk {
            let tx = match ctx.chain.get_tx(&entry.tx_hash).await {
                Ok(tx) => tx,
                Err(e) => {
                    error!("failed to fetch tx {}: {e}", entry.tx_hash);
                    return Err(e.into());
                }
            };

            if tx.confirmations < ctx.block_confirmations_threshold {
                // Not yet confirmed: gates all later txs in this cycle.
                break;
            }

            apply_tx(ctx, source, &tx, entry.block_time).await?;
            counter!("escrow_sync_txs_applied").increment(1);

            ctx.store
                .append_identifier(source.id, &entry.tx_hash, entry.block_time as i64)
                .await?;
            last_applied_hash = Some(entry.tx_hash.clone());
        }
    }

    Ok(last_applied_hash)
}

async fn apply_tx(
    ctx: &DispatcherContext,
    source: &PaymentSource,
    tx: &TxInfo,
    block_time: u64,
) -> Result<(), EngineError> {
    let redeemers = match extract_redeemers(&tx.raw_body_bytes) {
        Ok(r) => r,
        Err(e) => {
            error!("fatal: malformed redeemer envelope in tx {}: {e}", tx.tx_hash);
            return Ok(()); // Codec failures are fatal to the one tx, not the cycle.
        }
    };

    match classify(tx, &source.smart_contract_address, redeemers.len()) {
        TxClass::Invalid => {
            warn!("tx {} classified invalid, cursor still advances", tx.tx_hash);
        }
        TxClass::Initial { script_outputs } => {
            for output in script_outputs {
                let Some(datum_hex) = &output.inline_datum else {
                    continue;
                };
                let Ok(datum_bytes) = hex::decode(datum_hex) else {
                    continue;
                };
                let Ok(datum) = EscrowDatum::decode(&datum_bytes) else {
                    continue;
                };

                try_match_purchase_request(ctx, source, tx, output, &datum, block_time).await?;
                try_match_payment_request(ctx, source, tx, output, &datum, block_time).await?;
            }
        }
        TxClass::Transition {
            script_input,
            script_output,
        } => {
            apply_transition(ctx, source, tx, &redeemers, script_input, script_output).await?;
        }
    }
    Ok(())
}

async fn apply_transition(
    ctx: &DispatcherContext,
    source: &PaymentSource,
    tx: &TxInfo,
    redeemers: &[escrow_codec::Redeemer],
    script_input: &escrow_chain_adapter::Utxo,
    script_output: Option<&escrow_chain_adapter::Utxo>,
) -> Result<(), EngineError> {
    let Some(redeemer) = redeemers.first().copied() else {
        return Ok(());
    };

    let old_datum = decode_input_datum(script_input);
    let Some(old_datum) = old_datum else {
        warn!("transition tx {} has no decodable consumed datum, skipping", tx.tx_hash);
        return Ok(());
    };

    let Some(mut payment) = ctx
        .store
        .find_payment_request_by_identifier(source.id, &old_datum.blockchain_identifier)
        .await?
    else {
        warn!(
            "transition tx {} references unknown blockchain_identifier {}",
            tx.tx_hash, old_datum.blockchain_identifier
        );
        return Ok(());
    };
    let mut purchase = ctx
        .store
        .find_purchase_request_by_identifier(source.id, &old_datum.blockchain_identifier)
        .await?;

    if !is_legitimate_successor(
        ctx,
        source,
        &payment.side,
        purchase.as_ref().map(|p| &p.side),
        &script_input.tx_hash,
    )
    .await?
    {
        warn!(
            "tx {} does not extend the recorded transaction chain for {}, ignoring",
            tx.tx_hash, old_datum.blockchain_identifier
        );
        return Ok(());
    }

    let new_datum = script_output.and_then(decode_output_datum);
    let amount_ok = match &new_datum {
        Some(_) => amount_is_correct(
            &payment.side.requested_funds,
            payment.side.collateral_return_lovelace,
            &script_output.map(amounts_of).unwrap_or_default(),
        ),
        None => true,
    };

    let new_state = resolve_on_chain_state(redeemer, new_datum.as_ref().map(|d| d.state), amount_ok);

    // Confirm whichever mirror's own in-flight transaction this is, before
    // the new on-chain state is recorded (spec I2, I6): the Action Dispatcher
    // that authored this transition left a Pending `Transaction` row stamped
    // with this hash and still holding its wallet's lock.
    if let Some(pending) = ctx.store.find_transaction_by_hash(&tx.tx_hash).await? {
        if pending.status == TransactionStatus::Pending {
            confirm_pending_transaction(ctx, &mut payment.side, &pending, &tx.tx_hash).await?;
            if let Some(purchase) = purchase.as_mut() {
                confirm_pending_transaction(ctx, &mut purchase.side, &pending, &tx.tx_hash).await?;
            }
        }
    }

    let (payment_action, payment_err_type, payment_err_note) =
        next_payment_action(payment.next_action.requested_action, new_state);
    payment.side.on_chain_state = Some(new_state);
    payment.next_action.requested_action = payment_action;
    payment.next_action.error_type = payment_err_type.map(str::to_string);
    if let Some(note) = payment_err_note {
        payment.next_action.append_note("transition", note);
    }

    if new_state == OnChainState::DisputedWithdrawn {
        // spec §4.3.2: WithdrawDisputed splits the locked funds between
        // seller and buyer; record each side's net take on both mirrors.
        apply_withdrawn_amounts(ctx, &mut payment, purchase.as_mut(), tx).await?;
    }

    if let Some(p) = purchase.as_mut() {
        let (action, err_type, err_note) = next_purchasing_action(p.next_action.requested_action, new_state);
        p.side.on_chain_state = Some(new_state);
        p.next_action.requested_action = action;
        p.next_action.error_type = err_type.map(str::to_string);
        if let Some(note) = err_note {
            p.next_action.append_note("transition", note);
        }
    }

    ctx.store.apply_mirror_transition(Some(payment), purchase).await?;
    Ok(())
}

/// Marks `pending` `Confirmed` and releases the wallet lock it holds, then
/// moves it from `side.current_transaction_id` into `side.transaction_history`
/// — a no-op unless `side` is the mirror that actually dispatched it.
async fn confirm_pending_transaction(
    ctx: &DispatcherContext,
    side: &mut EscrowSide,
    pending: &Transaction,
    observed_tx_hash: &str,
) -> Result<(), EngineError> {
    if side.current_transaction_id != Some(pending.id) {
        return Ok(());
    }
    if let Some(wallet_id) = pending.blocks_wallet {
        ctx.store
            .release_wallet_lock(
                wallet_id,
                pending.id,
                TransactionStatus::Confirmed,
                Some(observed_tx_hash.to_string()),
            )
            .await?;
    }
    side.current_transaction_id = None;
    side.transaction_history.push(pending.id);
    Ok(())
}

/// Diffs `tx`'s inputs/outputs per native-asset unit against the seller's and
/// buyer's hot wallet addresses and records each side's net take (spec
/// §4.3.2, the `DisputedWithdrawn` branch of `WithdrawDisputed`).
async fn apply_withdrawn_amounts(
    ctx: &DispatcherContext,
    payment: &mut PaymentRequest,
    purchase: Option<&mut PurchaseRequest>,
    tx: &TxInfo,
) -> Result<(), EngineError> {
    let Some(seller) = ctx.store.get_hot_wallet(payment.selling_wallet_id).await? else {
        warn!("withdrawn-amount diff for {}: seller wallet not found", payment.side.blockchain_identifier);
        return Ok(());
    };
    let buyer_wallet_id = payment
        .buyer_wallet_id
        .or_else(|| purchase.as_deref().map(|p| p.purchasing_wallet_id));
    let Some(buyer_wallet_id) = buyer_wallet_id else {
        warn!("withdrawn-amount diff for {}: no buyer wallet on record", payment.side.blockchain_identifier);
        return Ok(());
    };
    let Some(buyer) = ctx.store.get_hot_wallet(buyer_wallet_id).await? else {
        warn!("withdrawn-amount diff for {}: buyer wallet not found", payment.side.blockchain_identifier);
        return Ok(());
    };

    let withdrawn_for_seller = net_value_to_address(tx, &seller.address);
    let withdrawn_for_buyer = net_value_to_address(tx, &buyer.address);

    payment.side.withdrawn_for_seller = withdrawn_for_seller.clone();
    payment.side.withdrawn_for_buyer = withdrawn_for_buyer.clone();
    if let Some(p) = purchase {
        p.side.withdrawn_for_seller = withdrawn_for_seller;
        p.side.withdrawn_for_buyer = withdrawn_for_buyer;
    }
    Ok(())
}

/// Sum of `tx`'s outputs minus its inputs at `address`, per unit, keeping
/// only units where the address came out ahead.
fn net_value_to_address(tx: &TxInfo, address: &str) -> Vec<escrow_persistence::Amount> {
    use std::collections::HashMap;

    let mut net: HashMap<String, i128> = HashMap::new();
    for out in tx.outputs.iter().filter(|u| u.address == address) {
        for a in &out.amounts {
            *net.entry(a.unit.clone()).or_insert(0) += a.quantity as i128;
        }
    }
    for inp in tx.inputs.iter().filter(|u| u.address == address) {
        for a in &inp.amounts {
            *net.entry(a.unit.clone()).or_insert(0) -= a.quantity as i128;
        }
    }
    net.into_iter()
        .filter(|(_, v)| *v > 0)
        .map(|(unit, amount)| escrow_persistence::Amount {
            unit,
            amount: amount as u64,
        })
        .collect()
}

/// Spec §4.3.2: the consumed input must trace back, by walking ancestor
/// script UTXOs up to `MAX_HISTORY_LEVELS` hops, to a transaction recorded on
/// either mirror's `current_transaction` or `transaction_history` — not
/// merely equal the immediately consumed hash, since dispatchers on either
/// mirror can author transitions the other mirror never sees directly.
async fn is_legitimate_successor(
    ctx: &DispatcherContext,
    source: &PaymentSource,
    payment_side: &EscrowSide,
    purchase_side: Option<&EscrowSide>,
    consumed_tx_hash: &str,
) -> Result<bool, EngineError> {
    let recorded_ids: std::collections::HashSet<EntityId> = payment_side
        .current_transaction_id
        .into_iter()
        .chain(payment_side.transaction_history.iter().copied())
        .chain(purchase_side.into_iter().flat_map(|s| {
            s.current_transaction_id
                .into_iter()
                .chain(s.transaction_history.iter().copied())
        }))
        .collect();

    let mut recorded_hashes = std::collections::HashSet::new();
    for tx_id in recorded_ids {
        if let Some(tx) = ctx.store.get_transaction(tx_id).await? {
            if !tx.tx_hash.is_empty() {
                recorded_hashes.insert(tx.tx_hash);
            }
        }
    }

    let mut current_hash = consumed_tx_hash.to_string();
    for _ in 0..ctx.max_history_levels {
        if recorded_hashes.contains(&current_hash) {
            return Ok(true);
        }
        let ancestor = ctx.chain.get_tx(&current_hash).await?;
        let Some(script_input) = ancestor
            .inputs
            .iter()
            .find(|u| u.address == source.smart_contract_address)
        else {
            return Ok(false);
        };
        current_hash = script_input.tx_hash.clone();
    }
    Ok(false)
}

fn decode_input_datum(utxo: &escrow_chain_adapter::Utxo) -> Option<EscrowDatum> {
    let hex_str = utxo.inline_datum.as_ref()?;
    let bytes = hex::decode(hex_str).ok()?;
    EscrowDatum::decode(&bytes).ok()
}

fn decode_output_datum(utxo: &escrow_chain_adapter::Utxo) -> Option<EscrowDatum> {
    decode_input_datum(utxo)
}

fn amounts_of(utxo: &escrow_chain_adapter::Utxo) -> Vec<escrow_persistence::Amount> {
    utxo.amounts
        .iter()
        .map(|a| escrow_persistence::Amount {
            unit: a.unit.clone(),
            amount: a.quantity,
        })
        .collect()
}
