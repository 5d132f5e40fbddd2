use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::entities::{
    EntityId, HotWallet, PaymentAction, PaymentRequest, PaymentSource, PaymentSourceIdentifier,
    PurchaseRequest, PurchasingAction, RegistrationState, RegistryRequest, Transaction,
    TransactionOwner, TransactionStatus,
};
use crate::error::PersistenceError;
use crate::facade::PersistenceFacade;

/// In-memory `PersistenceFacade` fake used by engine unit/integration tests.
/// Single `Mutex<Store>` stands in for serializable isolation: every mutating
/// operation holds the lock for its whole critical section, which is exactly
/// the guarantee the Postgres implementation provides via `SERIALIZABLE`.
#[derive(Default)]
pub struct InMemoryFacade {
    store: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    next_id: EntityId,
    payment_sources: HashMap<EntityId, PaymentSource>,
    hot_wallets: HashMap<EntityId, HotWallet>,
    transactions: HashMap<EntityId, Transaction>,
    registry_requests: HashMap<EntityId, RegistryRequest>,
    payment_requests: HashMap<EntityId, PaymentRequest>,
    purchase_requests: HashMap<EntityId, PurchaseRequest>,
    identifiers: HashMap<EntityId, Vec<PaymentSourceIdentifier>>,
}

impl Store {
    fn alloc_id(&mut self) -> EntityId {
        self.next_id += 1;
        self.next_id
    }

    fn pending_tx_exists_for_wallet(&self, wallet_id: EntityId) -> bool {
        self.transactions
            .values()
            .any(|t| t.blocks_wallet == Some(wallet_id) && t.status == TransactionStatus::Pending)
    }
}

impl InMemoryFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: insert a fully-formed row and return its id, allocating
    /// one if the row's id is zero.
    pub async fn seed_payment_source(&self, mut source: PaymentSource) -> EntityId {
        let mut store = self.store.lock().await;
        if source.id == 0 {
            source.id = store.alloc_id();
        }
        let id = source.id;
        store.payment_sources.insert(id, source);
        id
    }

    pub async fn seed_hot_wallet(&self, mut wallet: HotWallet) -> EntityId {
        let mut store = self.store.lock().await;
        if wallet.id == 0 {
            wallet.id = store.alloc_id();
        }
        let id = wallet.id;
        store.hot_wallets.insert(id, wallet);
        id
    }

    pub async fn seed_registry_request(&self, mut request: RegistryRequest) -> EntityId {
        let mut store = self.store.lock().await;
        if request.id == 0 {
            request.id = store.alloc_id();
        }
        let id = request.id;
        store.registry_requests.insert(id, request);
        id
    }

    pub async fn seed_payment_request(&self, mut request: PaymentRequest) -> EntityId {
        let mut store = self.store.lock().await;
        if request.side.id == 0 {
            request.side.id = store.alloc_id();
        }
        let id = request.side.id;
        store.payment_requests.insert(id, request);
        id
    }

    pub async fn seed_purchase_request(&self, mut request: PurchaseRequest) -> EntityId {
        let mut store = self.store.lock().await;
        if request.side.id == 0 {
            request.side.id = store.alloc_id();
        }
        let id = request.side.id;
        store.purchase_requests.insert(id, request);
        id
    }

    pub async fn get_transaction_raw(&self, id: EntityId) -> Option<Transaction> {
        self.store.lock().await.transactions.get(&id).cloned()
    }
}

#[async_trait]
impl PersistenceFacade for InMemoryFacade {
    async fn list_active_payment_sources(&self) -> Result<Vec<PaymentSource>, PersistenceError> {
        let store = self.store.lock().await;
        Ok(store
            .payment_sources
            .values()
            .filter(|s| s.deleted_at.is_none() && s.disabled_at.is_none())
            .cloned()
            .collect())
    }

    async fn get_payment_source(
        &self,
        id: EntityId,
    ) -> Result<Option<PaymentSource>, PersistenceError> {
        Ok(self.store.lock().await.payment_sources.get(&id).cloned())
    }

    async fn next_entity_id(&self) -> Result<EntityId, PersistenceError> {
        Ok(self.store.lock().await.alloc_id())
    }

    async fn try_begin_sync(
        &self,
        payment_source_id: EntityId,
        now_ms: i64,
        timeout_secs: u64,
    ) -> Result<bool, PersistenceError> {
        let mut store = self.store.lock().await;
        let source = store
            .payment_sources
            .get_mut(&payment_source_id)
            .ok_or_else(|| PersistenceError::NotFound(format!("payment_source {payment_source_id}")))?;

        if source.sync_in_progress {
            let started = source.sync_started_at.unwrap_or(0);
            let expired = now_ms - started > (timeout_secs as i64) * 1000;
            if !expired {
                return Ok(false);
            }
        }
        source.sync_in_progress = true;
        source.sync_started_at = Some(now_ms);
        Ok(true)
    }

    async fn end_sync(
        &self,
        payment_source_id: EntityId,
        last_identifier_checked: Option<String>,
        now_ms: i64,
    ) -> Result<(), PersistenceError> {
        let mut store = self.store.lock().await;
        let source = store
            .payment_sources
            .get_mut(&payment_source_id)
            .ok_or_else(|| PersistenceError::NotFound(format!("payment_source {payment_source_id}")))?;
        source.sync_in_progress = false;
        source.sync_started_at = None;
        if let Some(id) = last_identifier_checked {
            source.last_identifier_checked = Some(id);
            source.last_identifier_checked_at = Some(now_ms);
        }
        Ok(())
    }

    async fn get_hot_wallet(&self, id: EntityId) -> Result<Option<HotWallet>, PersistenceError> {
        Ok(self.store.lock().await.hot_wallets.get(&id).cloned())
    }

    async fn connect_counterparty_wallet(
        &self,
        payment_source_id: EntityId,
        role: crate::entities::WalletRole,
        vkey: &str,
        address: &str,
    ) -> Result<EntityId, PersistenceError> {
        let mut store = self.store.lock().await;
        if let Some(existing) = store
            .hot_wallets
            .values()
            .find(|w| w.payment_source_id == payment_source_id && w.vkey == vkey && w.address == address)
        {
            return Ok(existing.id);
        }
        let id = store.alloc_id();
        store.hot_wallets.insert(
            id,
            HotWallet {
                id,
                payment_source_id,
                role,
                vkey: vkey.to_string(),
                address: address.to_string(),
                collection_address: None,
                encrypted_mnemonic: Vec::new(),
                locked_at: None,
                note: Some("counterparty wallet, connected from an observed datum".to_string()),
            },
        );
        Ok(id)
    }

    async fn try_lock_wallet(
        &self,
        wallet_id: EntityId,
        owner: TransactionOwner,
        now_ms: i64,
        stale_after_secs: u64,
    ) -> Result<Option<EntityId>, PersistenceError> {
        let mut store = self.store.lock().await;

        let locked_at = store
            .hot_wallets
            .get(&wallet_id)
            .ok_or_else(|| PersistenceError::NotFound(format!("hot_wallet {wallet_id}")))?
            .locked_at;

        let currently_locked = match locked_at {
            Some(at) => now_ms - at <= (stale_after_secs as i64) * 1000,
            None => false,
        };
        if currently_locked || store.pending_tx_exists_for_wallet(wallet_id) {
            return Ok(None);
        }

        let tx_id = store.alloc_id();
        store.transactions.insert(
            tx_id,
            Transaction {
                id: tx_id,
                tx_hash: String::new(),
                status: TransactionStatus::Pending,
                blocks_wallet: Some(wallet_id),
                owner,
                created_at: now_ms,
            },
        );
        if let Some(wallet) = store.hot_wallets.get_mut(&wallet_id) {
            wallet.locked_at = Some(now_ms);
        }
        Ok(Some(tx_id))
    }

    async fn release_wallet_lock(
        &self,
        wallet_id: EntityId,
        transaction_id: EntityId,
        new_status: TransactionStatus,
        tx_hash: Option<String>,
    ) -> Result<(), PersistenceError> {
        let mut store = self.store.lock().await;
        let tx = store
            .transactions
            .get_mut(&transaction_id)
            .ok_or_else(|| PersistenceError::NotFound(format!("transaction {transaction_id}")))?;
        tx.status = new_status;
        if let Some(hash) = tx_hash {
            tx.tx_hash = hash;
        }
        tx.blocks_wallet = None;
        if let Some(wallet) = store.hot_wallets.get_mut(&wallet_id) {
            wallet.locked_at = None;
        }
        Ok(())
    }

    async fn get_transaction(&self, id: EntityId) -> Result<Option<Transaction>, PersistenceError> {
        Ok(self.store.lock().await.transactions.get(&id).cloned())
    }

    async fn find_transaction_by_hash(
        &self,
        tx_hash: &str,
    ) -> Result<Option<Transaction>, PersistenceError> {
        Ok(self
            .store
            .lock()
            .await
            .transactions
            .values()
            .find(|t| t.tx_hash == tx_hash)
            .cloned())
    }

    async fn find_entities_by_current_transaction(
        &self,
        transaction_id: EntityId,
    ) -> Result<(Vec<PaymentRequest>, Vec<PurchaseRequest>), PersistenceError> {
        let store = self.store.lock().await;
        let payments = store
            .payment_requests
            .values()
            .filter(|r| r.side.current_transaction_id == Some(transaction_id))
            .cloned()
            .collect();
        let purchases = store
            .purchase_requests
            .values()
            .filter(|r| r.side.current_transaction_id == Some(transaction_id))
            .cloned()
            .collect();
        Ok((payments, purchases))
    }

    async fn set_transaction_hash(
        &self,
        id: EntityId,
        tx_hash: String,
    ) -> Result<(), PersistenceError> {
        let mut store = self.store.lock().await;
        let tx = store
            .transactions
            .get_mut(&id)
            .ok_or_else(|| PersistenceError::NotFound(format!("transaction {id}")))?;
        tx.tx_hash = tx_hash;
        Ok(())
    }

    async fn mark_transaction_rolled_back(&self, id: EntityId) -> Result<(), PersistenceError> {
        let mut store = self.store.lock().await;
        let wallet_to_unlock = {
            let tx = store
                .transactions
                .get_mut(&id)
                .ok_or_else(|| PersistenceError::NotFound(format!("transaction {id}")))?;
            tx.status = TransactionStatus::RolledBack;
            tx.blocks_wallet.take()
        };
        if let Some(wallet_id) = wallet_to_unlock {
            if let Some(wallet) = store.hot_wallets.get_mut(&wallet_id) {
                wallet.locked_at = None;
            }
        }
        Ok(())
    }

    async fn list_registry_requests_in_state(
        &self,
        payment_source_id: EntityId,
        state: RegistrationState,
        limit: usize,
    ) -> Result<Vec<RegistryRequest>, PersistenceError> {
        let store = self.store.lock().await;
        Ok(store
            .registry_requests
            .values()
            .filter(|r| r.payment_source_id == payment_source_id && r.state == state)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_registry_request(
        &self,
        id: EntityId,
    ) -> Result<Option<RegistryRequest>, PersistenceError> {
        Ok(self.store.lock().await.registry_requests.get(&id).cloned())
    }

    async fn update_registry_request(
        &self,
        request: RegistryRequest,
    ) -> Result<(), PersistenceError> {
        self.store
            .lock()
            .await
            .registry_requests
            .insert(request.id, request);
        Ok(())
    }

    async fn delete_registry_request(&self, id: EntityId) -> Result<(), PersistenceError> {
        self.store.lock().await.registry_requests.remove(&id);
        Ok(())
    }

    async fn list_registry_requests_page(
        &self,
        payment_source_id: EntityId,
        after_id: Option<EntityId>,
        limit: usize,
    ) -> Result<Vec<RegistryRequest>, PersistenceError> {
        let store = self.store.lock().await;
        let mut rows: Vec<RegistryRequest> = store
            .registry_requests
            .values()
            .filter(|r| {
                r.payment_source_id == payment_source_id
                    && after_id.map(|after| r.id > after).unwrap_or(true)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn list_payment_requests_with_action(
        &self,
        payment_source_id: EntityId,
        action: PaymentAction,
        limit: usize,
    ) -> Result<Vec<PaymentRequest>, PersistenceError> {
        let store = self.store.lock().await;
        Ok(store
            .payment_requests
            .values()
            .filter(|r| {
                r.side.payment_source_id == payment_source_id
                    && r.next_action.requested_action == action
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_payment_request_by_identifier(
        &self,
        payment_source_id: EntityId,
        blockchain_identifier: &str,
    ) -> Result<Option<PaymentRequest>, PersistenceError> {
        let store = self.store.lock().await;
        Ok(store
            .payment_requests
            .values()
            .find(|r| {
                r.side.payment_source_id == payment_source_id
                    && r.side.blockchain_identifier == blockchain_identifier
            })
            .cloned())
    }

    async fn update_payment_request(
        &self,
        request: PaymentRequest,
    ) -> Result<(), PersistenceError> {
        self.store
            .lock()
            .await
            .payment_requests
            .insert(request.side.id, request);
        Ok(())
    }

    async fn list_payment_requests_by_on_chain_state(
        &self,
        payment_source_id: EntityId,
        state: crate::entities::OnChainState,
        limit: usize,
    ) -> Result<Vec<PaymentRequest>, PersistenceError> {
        let store = self.store.lock().await;
        Ok(store
            .payment_requests
            .values()
            .filter(|r| {
                r.side.payment_source_id == payment_source_id && r.side.on_chain_state == Some(state)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_payment_requests_page(
        &self,
        payment_source_id: EntityId,
        after_id: Option<EntityId>,
        limit: usize,
    ) -> Result<Vec<PaymentRequest>, PersistenceError> {
        let store = self.store.lock().await;
        let mut rows: Vec<PaymentRequest> = store
            .payment_requests
            .values()
            .filter(|r| {
                r.side.payment_source_id == payment_source_id
                    && after_id.map(|after| r.side.id > after).unwrap_or(true)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.side.id);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn list_purchase_requests_with_action(
        &self,
        payment_source_id: EntityId,
        action: PurchasingAction,
        limit: usize,
    ) -> Result<Vec<PurchaseRequest>, PersistenceError> {
        let store = self.store.lock().await;
        Ok(store
            .purchase_requests
            .values()
            .filter(|r| {
                r.side.payment_source_id == payment_source_id
                    && r.next_action.requested_action == action
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_purchase_request_by_identifier(
        &self,
        payment_source_id: EntityId,
        blockchain_identifier: &str,
    ) -> Result<Option<PurchaseRequest>, PersistenceError> {
        let store = self.store.lock().await;
        Ok(store
            .purchase_requests
            .values()
            .find(|r| {
                r.side.payment_source_id == payment_source_id
                    && r.side.blockchain_identifier == blockchain_identifier
            })
            .cloned())
    }

    async fn update_purchase_request(
        &self,
        request: PurchaseRequest,
    ) -> Result<(), PersistenceError> {
        self.store
            .lock()
            .await
            .purchase_requests
            .insert(request.side.id, request);
        Ok(())
    }

    async fn list_purchase_requests_page(
        &self,
        payment_source_id: EntityId,
        after_id: Option<EntityId>,
        limit: usize,
    ) -> Result<Vec<PurchaseRequest>, PersistenceError> {
        let store = self.store.lock().await;
        let mut rows: Vec<PurchaseRequest> = store
            .purchase_requests
            .values()
            .filter(|r| {
                r.side.payment_source_id == payment_source_id
                    && after_id.map(|after| r.side.id > after).unwrap_or(true)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.side.id);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn apply_mirror_transition(
        &self,
        payment: Option<PaymentRequest>,
        purchase: Option<PurchaseRequest>,
    ) -> Result<(), PersistenceError> {
        let mut store = self.store.lock().await;
        if let Some(p) = payment {
            store.payment_requests.insert(p.side.id, p);
        }
        if let Some(p) = purchase {
            store.purchase_requests.insert(p.side.id, p);
        }
        Ok(())
    }

    async fn append_identifier(
        &self,
        payment_source_id: EntityId,
        tx_hash: &str,
        block_time: i64,
    ) -> Result<(), PersistenceError> {
        let mut store = self.store.lock().await;
        let id = store.alloc_id();
        store
            .identifiers
            .entry(payment_source_id)
            .or_default()
            .push(PaymentSourceIdentifier {
                id,
                payment_source_id,
                tx_hash: tx_hash.to_string(),
                block_time,
            });
        Ok(())
    }

    async fn list_identifiers_desc(
        &self,
        payment_source_id: EntityId,
        limit: usize,
    ) -> Result<Vec<PaymentSourceIdentifier>, PersistenceError> {
        let store = self.store.lock().await;
        let mut entries = store
            .identifiers
            .get(&payment_source_id)
            .cloned()
            .unwrap_or_default();
        entries.sort_by(|a, b| b.block_time.cmp(&a.block_time));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn truncate_identifiers_after(
        &self,
        payment_source_id: EntityId,
        fork_point_tx_hash: &str,
    ) -> Result<Vec<String>, PersistenceError> {
        let mut store = self.store.lock().await;
        let entries = store.identifiers.entry(payment_source_id).or_default();
        entries.sort_by_key(|e| e.block_time);
        let fork_index = entries
            .iter()
            .position(|e| e.tx_hash == fork_point_tx_hash)
            .ok_or_else(|| {
                PersistenceError::InvariantViolation(format!(
                    "fork point {fork_point_tx_hash} not present in identifier trail"
                ))
            })?;
        let dropped: Vec<String> = entries
            .split_off(fork_index + 1)
            .into_iter()
            .map(|e| e.tx_hash)
            .collect();
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_common::Network;

    fn sample_wallet(id: EntityId) -> HotWallet {
        HotWallet {
            id,
            payment_source_id: 1,
            role: crate::entities::WalletRole::Selling,
            vkey: "aa".into(),
            address: "addr1".into(),
            collection_address: None,
            encrypted_mnemonic: vec![],
            locked_at: None,
            note: None,
        }
    }

    #[tokio::test]
    async fn wallet_lock_is_exclusive() {
        let facade = InMemoryFacade::new();
        let wallet_id = facade.seed_hot_wallet(sample_wallet(0)).await;

        let first = facade
            .try_lock_wallet(wallet_id, TransactionOwner::PurchaseCurrent, 1_000, 600)
            .await
            .unwrap();
        assert!(first.is_some());

        let second = facade
            .try_lock_wallet(wallet_id, TransactionOwner::PurchaseCurrent, 1_500, 600)
            .await
            .unwrap();
        assert!(second.is_none(), "a locked wallet must reject a second lock attempt");
    }

    #[tokio::test]
    async fn stale_lock_is_reclaimable() {
        let facade = InMemoryFacade::new();
        let wallet_id = facade.seed_hot_wallet(sample_wallet(0)).await;
        let first = facade
            .try_lock_wallet(wallet_id, TransactionOwner::PurchaseCurrent, 0, 600)
            .await
            .unwrap()
            .unwrap();
        facade
            .release_wallet_lock(wallet_id, first, TransactionStatus::Confirmed, Some("deadbeef".into()))
            .await
            .unwrap();

        // simulate a lock held past the stale threshold without a pending tx cleared
        let store_wallet_locked_at = {
            let mut store = facade.store.lock().await;
            let w = store.hot_wallets.get_mut(&wallet_id).unwrap();
            w.locked_at = Some(0);
            w.locked_at
        };
        assert_eq!(store_wallet_locked_at, Some(0));

        let reclaimed = facade
            .try_lock_wallet(wallet_id, TransactionOwner::PurchaseCurrent, 1_000_000, 600)
            .await
            .unwrap();
        assert!(reclaimed.is_some());
    }

    #[tokio::test]
    async fn sync_flag_blocks_concurrent_begin() {
        let facade = InMemoryFacade::new();
        let source_id = facade
            .seed_payment_source(PaymentSource {
                id: 0,
                network: Network::Preprod,
                smart_contract_address: "addr_script1".into(),
                policy_id: "policy".into(),
                fee_rate_permille: 10,
                admin_wallet_addresses: vec!["a1".into(), "a2".into()],
                rpc_provider_api_key: "key".into(),
                last_identifier_checked: None,
                sync_in_progress: false,
                sync_started_at: None,
                last_identifier_checked_at: None,
                disabled_at: None,
                deleted_at: None,
            })
            .await;

        assert!(facade.try_begin_sync(source_id, 0, 180).await.unwrap());
        assert!(!facade.try_begin_sync(source_id, 1_000, 180).await.unwrap());
        assert!(facade
            .try_begin_sync(source_id, 200_000, 180)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn rollback_truncation_returns_dropped_hashes() {
        let facade = InMemoryFacade::new();
        facade.append_identifier(1, "h1", 100).await.unwrap();
        facade.append_identifier(1, "h2", 200).await.unwrap();
        facade.append_identifier(1, "h3", 300).await.unwrap();

        let dropped = facade.truncate_identifiers_after(1, "h1").await.unwrap();
        assert_eq!(dropped, vec!["h2".to_string(), "h3".to_string()]);

        let remaining = facade.list_identifiers_desc(1, 10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].tx_hash, "h1");
    }
}
