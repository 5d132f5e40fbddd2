use async_trait::async_trait;

use crate::entities::{
    EntityId, HotWallet, OnChainState, PaymentAction, PaymentRequest, PaymentSource,
    PaymentSourceIdentifier, PurchaseRequest, PurchasingAction, RegistrationState,
    RegistryRequest, Transaction, TransactionStatus,
};
use crate::error::PersistenceError;

/// Narrow transactional interface over the relational store (spec §2, §4.5).
/// Every multi-row mutation the engine issues is required to run under
/// serializable isolation; implementations enforce that internally rather
/// than leaving it to the caller.
#[async_trait]
pub trait PersistenceFacade: Send + Sync {
    // ===== Payment sources =====

    async fn list_active_payment_sources(&self) -> Result<Vec<PaymentSource>, PersistenceError>;

    async fn get_payment_source(
        &self,
        id: EntityId,
    ) -> Result<Option<PaymentSource>, PersistenceError>;

    /// Allocates a fresh surrogate id for a new `PaymentRequest`/
    /// `PurchaseRequest`/`RegistryRequest` row (spec §6: the downstream
    /// creation entrypoints mint their own id up front, the same as every
    /// other `update_*` upsert in this store expects).
    async fn next_entity_id(&self) -> Result<EntityId, PersistenceError>;

    /// Flip `sync_in_progress` under serializable isolation. Fails with
    /// `SyncInProgress` if a non-expired flag is already set (expiry
    /// `SYNC_LOCK_TIMEOUT_INTERVAL`, default 3 min).
    async fn try_begin_sync(
        &self,
        payment_source_id: EntityId,
        now_ms: i64,
        timeout_secs: u64,
    ) -> Result<bool, PersistenceError>;

    async fn end_sync(
        &self,
        payment_source_id: EntityId,
        last_identifier_checked: Option<String>,
        now_ms: i64,
    ) -> Result<(), PersistenceError>;

    // ===== Hot wallets =====

    async fn get_hot_wallet(&self, id: EntityId) -> Result<Option<HotWallet>, PersistenceError>;

    /// Create-or-connect a counterparty wallet row by `(vkey, address)`
    /// (spec §4.3.1: "attach the BuyerWallet"). The row carries no
    /// `encrypted_mnemonic` — the engine never signs on behalf of a
    /// counterparty — and exists purely so `PaymentRequest.buyer_wallet_id`
    /// has somewhere stable to point.
    async fn connect_counterparty_wallet(
        &self,
        payment_source_id: EntityId,
        role: crate::entities::WalletRole,
        vkey: &str,
        address: &str,
    ) -> Result<EntityId, PersistenceError>;

    /// Atomically check `locked_at IS NULL AND NOT EXISTS(pending tx)`, set
    /// `locked_at = now`, create the placeholder Pending `Transaction`, and
    /// wire it as the owning entity's `current_transaction` (spec I2, §4.5).
    /// Returns the created transaction id on success, `None` if the wallet
    /// was already locked and no stale lock could be reclaimed.
    async fn try_lock_wallet(
        &self,
        wallet_id: EntityId,
        owner: crate::entities::TransactionOwner,
        now_ms: i64,
        stale_after_secs: u64,
    ) -> Result<Option<EntityId>, PersistenceError>;

    /// Release a wallet lock and move the transaction out of `Pending`
    /// atomically (spec §4.5: unlock is atomic with the status change).
    async fn release_wallet_lock(
        &self,
        wallet_id: EntityId,
        transaction_id: EntityId,
        new_status: TransactionStatus,
        tx_hash: Option<String>,
    ) -> Result<(), PersistenceError>;

    // ===== Transactions =====

    async fn get_transaction(
        &self,
        id: EntityId,
    ) -> Result<Option<Transaction>, PersistenceError>;

    /// Used by the Rollback Handler (spec §4.3 step 2) to locate the
    /// placeholder/confirmed transaction a rolled-back hash corresponds to.
    async fn find_transaction_by_hash(
        &self,
        tx_hash: &str,
    ) -> Result<Option<Transaction>, PersistenceError>;

    /// Entities (payment or purchase side) whose `current_transaction`
    /// points at `transaction_id`, needed to route a rollback's
    /// `WaitingForManualAction` transition to the right rows.
    async fn find_entities_by_current_transaction(
        &self,
        transaction_id: EntityId,
    ) -> Result<(Vec<PaymentRequest>, Vec<PurchaseRequest>), PersistenceError>;

    async fn set_transaction_hash(
        &self,
        id: EntityId,
        tx_hash: String,
    ) -> Result<(), PersistenceError>;

    async fn mark_transaction_rolled_back(&self, id: EntityId) -> Result<(), PersistenceError>;

    // ===== Registry requests =====

    async fn list_registry_requests_in_state(
        &self,
        payment_source_id: EntityId,
        state: RegistrationState,
        limit: usize,
    ) -> Result<Vec<RegistryRequest>, PersistenceError>;

    async fn get_registry_request(
        &self,
        id: EntityId,
    ) -> Result<Option<RegistryRequest>, PersistenceError>;

    async fn update_registry_request(
        &self,
        request: RegistryRequest,
    ) -> Result<(), PersistenceError>;

    /// Removes a `RegistryRequest` row (spec §6 `delete_agent_registration`),
    /// allowed only once it has reached a terminal state. The engine enforces
    /// which states qualify; the facade just performs the delete.
    async fn delete_registry_request(&self, id: EntityId) -> Result<(), PersistenceError>;

    /// Page of `RegistryRequest`s for a payment source ordered by `id`,
    /// starting strictly after `after_id` (spec §6 `query_registry`:
    /// `cursorId`-based pagination).
    async fn list_registry_requests_page(
        &self,
        payment_source_id: EntityId,
        after_id: Option<EntityId>,
        limit: usize,
    ) -> Result<Vec<RegistryRequest>, PersistenceError>;

    // ===== Payment requests (seller mirror) =====

    async fn list_payment_requests_with_action(
        &self,
        payment_source_id: EntityId,
        action: PaymentAction,
        limit: usize,
    ) -> Result<Vec<PaymentRequest>, PersistenceError>;

    async fn find_payment_request_by_identifier(
        &self,
        payment_source_id: EntityId,
        blockchain_identifier: &str,
    ) -> Result<Option<PaymentRequest>, PersistenceError>;

    async fn update_payment_request(
        &self,
        request: PaymentRequest,
    ) -> Result<(), PersistenceError>;

    /// Rows whose on-chain state matches `state` regardless of their current
    /// `next_action` — used by the admin Withdraw Disputed path (spec §4.4),
    /// which has no dedicated `*Requested` queue slot of its own and instead
    /// scans `Disputed` escrows directly (see DESIGN.md).
    async fn list_payment_requests_by_on_chain_state(
        &self,
        payment_source_id: EntityId,
        state: OnChainState,
        limit: usize,
    ) -> Result<Vec<PaymentRequest>, PersistenceError>;

    /// Page of `PaymentRequest`s for a payment source ordered by `id`,
    /// starting strictly after `after_id` (spec §6 `query_payments`).
    async fn list_payment_requests_page(
        &self,
        payment_source_id: EntityId,
        after_id: Option<EntityId>,
        limit: usize,
    ) -> Result<Vec<PaymentRequest>, PersistenceError>;

    // ===== Purchase requests (buyer mirror) =====

    async fn list_purchase_requests_with_action(
        &self,
        payment_source_id: EntityId,
        action: PurchasingAction,
        limit: usize,
    ) -> Result<Vec<PurchaseRequest>, PersistenceError>;

    async fn find_purchase_request_by_identifier(
        &self,
        payment_source_id: EntityId,
        blockchain_identifier: &str,
    ) -> Result<Option<PurchaseRequest>, PersistenceError>;

    async fn update_purchase_request(
        &self,
        request: PurchaseRequest,
    ) -> Result<(), PersistenceError>;

    /// Page of `PurchaseRequest`s for a payment source ordered by `id`,
    /// starting strictly after `after_id` (spec §6 `query_purchases`).
    async fn list_purchase_requests_page(
        &self,
        payment_source_id: EntityId,
        after_id: Option<EntityId>,
        limit: usize,
    ) -> Result<Vec<PurchaseRequest>, PersistenceError>;

    /// Apply a state-transition to both mirrors of a `blockchain_identifier`
    /// in one serializable transaction (spec §4.3.2). Implementations must
    /// either commit both updates or neither.
    async fn apply_mirror_transition(
        &self,
        payment: Option<PaymentRequest>,
        purchase: Option<PurchaseRequest>,
    ) -> Result<(), PersistenceError>;

    // ===== Cursor trail (rollback detection, spec I7) =====

    async fn append_identifier(
        &self,
        payment_source_id: EntityId,
        tx_hash: &str,
        block_time: i64,
    ) -> Result<(), PersistenceError>;

    async fn list_identifiers_desc(
        &self,
        payment_source_id: EntityId,
        limit: usize,
    ) -> Result<Vec<PaymentSourceIdentifier>, PersistenceError>;

    /// Drop every identifier trail entry newer than `fork_point_tx_hash`
    /// (inclusive of nothing; exclusive boundary), used once a rollback's
    /// fork point has been found.
    async fn truncate_identifiers_after(
        &self,
        payment_source_id: EntityId,
        fork_point_tx_hash: &str,
    ) -> Result<Vec<String>, PersistenceError>;
}
