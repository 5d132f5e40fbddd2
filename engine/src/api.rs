//! Downstream API surface (spec §6): the operations an HTTP layer (out of
//! scope here) calls into. Plain async functions on `escrow-persistence`
//! types, not a framework — each enforces the creation-time invariants (I1,
//! I3, I4, I5) and returns a typed [`EngineError`] on rejection.

use escrow_persistence::{
    Amount, Capability, EntityId, EscrowSide, NextAction, PaymentAction, PaymentRequest, Pricing,
    PurchaseRequest, PurchasingAction, RegistrationState, RegistryRequest,
};

use crate::context::DispatcherContext;
use crate::error::EngineError;
use crate::validation::{validate_collateral_return, validate_input_hash, validate_time_ordering};

/// Page of rows plus the cursor to pass as `after_id` for the next page
/// (spec §6 `query_*`: `cursorId`-based pagination, page size 10).
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<EntityId>,
}

pub const DEFAULT_PAGE_SIZE: usize = 10;

/// spec §6: `register_agent(payment_source_id, sellingWalletVkey, metadata…)`
/// creates a `RegistryRequest` with `state = RegistrationRequested`. Minting
/// and `agent_identifier` assignment happen later, in the registration
/// dispatcher once the mint confirms.
#[allow(clippy::too_many_arguments)]
pub async fn register_agent(
    ctx: &DispatcherContext,
    payment_source_id: EntityId,
    selling_wallet_id: EntityId,
    name: String,
    description: String,
    api_base_url: String,
    capability: Capability,
    author: String,
    legal: String,
    tags: Vec<String>,
    example_outputs: Vec<String>,
    pricing: Pricing,
    metadata_version: u32,
) -> Result<RegistryRequest, EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::Validation {
            field: "name".into(),
            message: "must not be empty".into(),
        });
    }

    let id = ctx.store.next_entity_id().await?;
    let request = RegistryRequest {
        id,
        payment_source_id,
        selling_wallet_id,
        name,
        description,
        api_base_url,
        capability,
        author,
        legal,
        tags,
        example_outputs,
        pricing,
        metadata_version,
        agent_identifier: None,
        state: RegistrationState::RegistrationRequested,
        current_transaction_id: None,
        error: None,
    };
    ctx.store.update_registry_request(request.clone()).await?;
    Ok(request)
}

/// spec §6: `delete_agent_registration(id)`, allowed only once the
/// registration has reached a terminal state.
pub async fn delete_agent_registration(ctx: &DispatcherContext, id: EntityId) -> Result<(), EngineError> {
    let Some(request) = ctx.store.get_registry_request(id).await? else {
        return Err(EngineError::Validation {
            field: "id".into(),
            message: "no RegistryRequest found".into(),
        });
    };
    if !matches!(
        request.state,
        RegistrationState::RegistrationFailed | RegistrationState::DeregistrationConfirmed
    ) {
        return Err(EngineError::Validation {
            field: "state".into(),
            message: format!(
                "{:?} is not a terminal state; only RegistrationFailed or DeregistrationConfirmed may be deleted",
                request.state
            ),
        });
    }
    ctx.store.delete_registry_request(id).await?;
    Ok(())
}

/// spec §6: `create_payment(...)` — creates a `PaymentRequest` with
/// `next_action = WaitingForExternalAction`, `BuyerWallet = NULL`,
/// `on_chain_state = NULL`. `purchaser_handle_hex` is the buyer-supplied
/// 20-byte hex handle that `blockchain_identifier` is formed from by
/// suffixing `identifier_from_purchaser` (spec §6).
#[allow(clippy::too_many_arguments)]
pub async fn create_payment(
    ctx: &DispatcherContext,
    payment_source_id: EntityId,
    selling_wallet_id: EntityId,
    purchaser_handle_hex: &str,
    identifier_from_purchaser: &str,
    input_hash: &str,
    pay_by_time: i64,
    submit_result_time: i64,
    unlock_time: i64,
    external_dispute_unlock_time: i64,
    requested_funds: Vec<Amount>,
    collateral_return_lovelace: u64,
) -> Result<PaymentRequest, EngineError> {
    validate_input_hash(input_hash)?;
    validate_time_ordering(pay_by_time, submit_result_time, unlock_time, external_dispute_unlock_time)?;
    validate_collateral_return(collateral_return_lovelace)?;

    let blockchain_identifier = format!("{purchaser_handle_hex}{identifier_from_purchaser}");
    if ctx
        .store
        .find_payment_request_by_identifier(payment_source_id, &blockchain_identifier)
        .await?
        .is_some()
    {
        return Err(EngineError::Validation {
            field: "blockchain_identifier".into(),
            message: format!("{blockchain_identifier} already has a PaymentRequest on this payment source"),
        });
    }

    let id = ctx.store.next_entity_id().await?;
    let request = PaymentRequest {
        side: EscrowSide {
            id,
            payment_source_id,
            blockchain_identifier,
            input_hash: input_hash.to_string(),
            result_hash: String::new(),
            pay_by_time,
            submit_result_time,
            unlock_time,
            external_dispute_unlock_time,
            buyer_cooldown_time: 0,
            seller_cooldown_time: 0,
            collateral_return_lovelace,
            requested_funds,
            paid_funds: Vec::new(),
            on_chain_state: None,
            current_transaction_id: None,
            transaction_history: Vec::new(),
            withdrawn_for_seller: Vec::new(),
            withdrawn_for_buyer: Vec::new(),
        },
        selling_wallet_id,
        buyer_wallet_id: None,
        next_action: NextAction::new(PaymentAction::WaitingForExternalAction),
    };
    ctx.store.update_payment_request(request.clone()).await?;
    Ok(request)
}

/// spec §6: `create_purchase(blockchainIdentifier, ...)` — creates a
/// `PurchaseRequest` with `next_action = FundsLockingRequested`. Unlike
/// `create_payment`, the buyer already knows the full `blockchain_identifier`
/// (it was handed to them out of band by the seller).
#[allow(clippy::too_many_arguments)]
pub async fn create_purchase(
    ctx: &DispatcherContext,
    payment_source_id: EntityId,
    purchasing_wallet_id: EntityId,
    seller_wallet_id: EntityId,
    blockchain_identifier: String,
    input_hash: &str,
    pay_by_time: i64,
    submit_result_time: i64,
    unlock_time: i64,
    external_dispute_unlock_time: i64,
    requested_funds: Vec<Amount>,
    collateral_return_lovelace: u64,
) -> Result<PurchaseRequest, EngineError> {
    validate_input_hash(input_hash)?;
    validate_time_ordering(pay_by_time, submit_result_time, unlock_time, external_dispute_unlock_time)?;
    validate_collateral_return(collateral_return_lovelace)?;

    if ctx
        .store
        .find_purchase_request_by_identifier(payment_source_id, &blockchain_identifier)
        .await?
        .is_some()
    {
        return Err(EngineError::Validation {
            field: "blockchain_identifier".into(),
            message: format!("{blockchain_identifier} already has a PurchaseRequest on this payment source"),
        });
    }

    let id = ctx.store.next_entity_id().await?;
    let request = PurchaseRequest {
        side: EscrowSide {
            id,
            payment_source_id,
            blockchain_identifier,
            input_hash: input_hash.to_string(),
            result_hash: String::new(),
            pay_by_time,
            submit_result_time,
            unlock_time,
            external_dispute_unlock_time,
            buyer_cooldown_time: 0,
            seller_cooldown_time: 0,
            collateral_return_lovelace,
            requested_funds,
            paid_funds: Vec::new(),
            on_chain_state: None,
            current_transaction_id: None,
            transaction_history: Vec::new(),
            withdrawn_for_seller: Vec::new(),
            withdrawn_for_buyer: Vec::new(),
        },
        purchasing_wallet_id,
        seller_wallet_id,
        next_action: NextAction::new(PurchasingAction::FundsLockingRequested),
    };
    ctx.store.update_purchase_request(request.clone()).await?;
    Ok(request)
}

/// spec §6: `submit_result(network, submitResultHash, blockchainIdentifier)`
/// — queues `SubmitResultRequested` on the seller mirror.
pub async fn submit_result(
    ctx: &DispatcherContext,
    payment_source_id: EntityId,
    blockchain_identifier: &str,
    submit_result_hash: &str,
) -> Result<(), EngineError> {
    let Some(mut payment) = ctx
        .store
        .find_payment_request_by_identifier(payment_source_id, blockchain_identifier)
        .await?
    else {
        return Err(EngineError::Validation {
            field: "blockchain_identifier".into(),
            message: "no PaymentRequest found".into(),
        });
    };
    payment.side.result_hash = submit_result_hash.to_string();
    payment.next_action.requested_action = PaymentAction::SubmitResultRequested;
    ctx.store.update_payment_request(payment).await?;
    Ok(())
}

/// spec §6: `request_refund` — queues `SetRefundRequestedRequested` on the
/// buyer mirror ([`crate::dispatchers::request_refund`] claims it).
pub async fn request_refund(
    ctx: &DispatcherContext,
    payment_source_id: EntityId,
    blockchain_identifier: &str,
) -> Result<(), EngineError> {
    queue_purchasing_action(ctx, payment_source_id, blockchain_identifier).await
}

/// spec §6: `cancel_refund_request` — shares the same `*Requested` queue
/// slot as `request_refund` ([`crate::dispatchers::cancel_refund`] claims it
/// by the escrow's current `on_chain_state` instead of a distinct action).
pub async fn cancel_refund_request(
    ctx: &DispatcherContext,
    payment_source_id: EntityId,
    blockchain_identifier: &str,
) -> Result<(), EngineError> {
    queue_purchasing_action(ctx, payment_source_id, blockchain_identifier).await
}

async fn queue_purchasing_action(
    ctx: &DispatcherContext,
    payment_source_id: EntityId,
    blockchain_identifier: &str,
) -> Result<(), EngineError> {
    let Some(mut purchase) = ctx
        .store
        .find_purchase_request_by_identifier(payment_source_id, blockchain_identifier)
        .await?
    else {
        return Err(EngineError::Validation {
            field: "blockchain_identifier".into(),
            message: "no PurchaseRequest found".into(),
        });
    };
    purchase.next_action.requested_action = PurchasingAction::SetRefundRequestedRequested;
    ctx.store.update_purchase_request(purchase).await?;
    Ok(())
}

/// spec §6: `authorize_refund` — queues `AuthorizeRefundRequested` on the
/// seller mirror, the admin multisig path
/// ([`crate::dispatchers::authorize_refund`]).
pub async fn authorize_refund(
    ctx: &DispatcherContext,
    payment_source_id: EntityId,
    blockchain_identifier: &str,
) -> Result<(), EngineError> {
    let Some(mut payment) = ctx
        .store
        .find_payment_request_by_identifier(payment_source_id, blockchain_identifier)
        .await?
    else {
        return Err(EngineError::Validation {
            field: "blockchain_identifier".into(),
            message: "no PaymentRequest found".into(),
        });
    };
    payment.next_action.requested_action = PaymentAction::AuthorizeRefundRequested;
    ctx.store.update_payment_request(payment).await?;
    Ok(())
}

/// spec §6: `query_payments` — read-only list, `cursorId`-based pagination.
pub async fn query_payments(
    ctx: &DispatcherContext,
    payment_source_id: EntityId,
    after_id: Option<EntityId>,
) -> Result<Page<PaymentRequest>, EngineError> {
    let items = ctx
        .store
        .list_payment_requests_page(payment_source_id, after_id, DEFAULT_PAGE_SIZE)
        .await?;
    let next_cursor = items.last().map(|r| r.side.id);
    Ok(Page { items, next_cursor })
}

/// spec §6: `query_purchases` — read-only list, `cursorId`-based pagination.
pub async fn query_purchases(
    ctx: &DispatcherContext,
    payment_source_id: EntityId,
    after_id: Option<EntityId>,
) -> Result<Page<PurchaseRequest>, EngineError> {
    let items = ctx
        .store
        .list_purchase_requests_page(payment_source_id, after_id, DEFAULT_PAGE_SIZE)
        .await?;
    let next_cursor = items.last().map(|r| r.side.id);
    Ok(Page { items, next_cursor })
}

/// spec §6: `query_registry` — read-only list, `cursorId`-based pagination.
pub async fn query_registry(
    ctx: &DispatcherContext,
    payment_source_id: EntityId,
    after_id: Option<EntityId>,
) -> Result<Page<RegistryRequest>, EngineError> {
    let items = ctx
        .store
        .list_registry_requests_page(payment_source_id, after_id, DEFAULT_PAGE_SIZE)
        .await?;
    let next_cursor = items.last().map(|r| r.id);
    Ok(Page { items, next_cursor })
}
