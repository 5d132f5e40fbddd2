//! End-to-end Sync Loop scenarios over an in-memory persistence façade and a
//! fake chain adapter, covering spec §8's first three end-to-end scenarios
//! (the happy-path opening match, the payment-side spoof, and rollback
//! detection). No real indexer or database is involved.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;

use escrow_chain_adapter::{
    AdapterError, ChainAdapter, DerivedScript, ExecutionUnits, Order, ScriptParameters, TxInfo,
    TxListEntry, Utxo,
};
use escrow_codec::{EscrowDatum, SmartContractState};
use escrow_common::{AddressComponents, KeyHash, Network, VerificationKey};
use escrow_engine::rawtx::write_redeemers;
use escrow_engine::{run_sync_cycle, DispatcherContext};
use escrow_persistence::{
    EscrowSide, HotWallet, InMemoryFacade, OnChainState, PaymentAction, PaymentRequest,
    PaymentSource, PurchaseRequest, PurchasingAction, WalletRole,
};

/// Fixed responses keyed by address/page/hash; good enough to drive one
/// Sync Loop cycle deterministically without a real indexer.
#[derive(Default)]
struct FakeChainAdapter {
    pages: StdMutex<HashMap<(String, u32), Vec<TxListEntry>>>,
    txs: StdMutex<HashMap<String, TxInfo>>,
}

impl FakeChainAdapter {
    fn with_page(self, addr: &str, page: u32, entries: Vec<TxListEntry>) -> Self {
        self.pages.lock().unwrap().insert((addr.to_string(), page), entries);
        self
    }

    fn with_tx(self, info: TxInfo) -> Self {
        self.txs.lock().unwrap().insert(info.tx_hash.clone(), info);
        self
    }
}

#[async_trait]
impl ChainAdapter for FakeChainAdapter {
    async fn list_txs_at(&self, addr: &str, page: u32, _order: Order) -> Result<Vec<TxListEntry>, AdapterError> {
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&(addr.to_string(), page))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_utxos_at(&self, _addr: &str) -> Result<Vec<Utxo>, AdapterError> {
        Ok(Vec::new())
    }

    async fn get_tx(&self, tx_hash: &str) -> Result<TxInfo, AdapterError> {
        self.txs
            .lock()
            .unwrap()
            .get(tx_hash)
            .cloned()
            .ok_or(AdapterError::NotFound)
    }

    async fn submit_tx(&self, _signed_bytes: &[u8]) -> Result<String, AdapterError> {
        Ok("unused".to_string())
    }

    async fn evaluate_tx(&self, _bytes: &[u8]) -> Result<Vec<ExecutionUnits>, AdapterError> {
        Ok(Vec::new())
    }

    async fn derive_script_addr(&self, _params: &ScriptParameters) -> Result<DerivedScript, AdapterError> {
        Ok(DerivedScript {
            address: "script_addr".to_string(),
            policy_id: "policy".to_string(),
        })
    }
}

const SCRIPT_ADDR: &str = "script_addr";
const SELLER_OWN_ADDR: &str = "seller_own_addr";
const BUYER_OWN_ADDR: &str = "buyer_own_addr";

fn vkey(byte: u8) -> VerificationKey {
    VerificationKey::from_bytes(&[byte; VerificationKey::SIZE]).unwrap()
}

fn key_hash(byte: u8) -> KeyHash {
    KeyHash::from_bytes(&[byte; KeyHash::SIZE]).unwrap()
}

fn base_side(blockchain_identifier: &str) -> EscrowSide {
    EscrowSide {
        id: 0,
        payment_source_id: 0,
        blockchain_identifier: blockchain_identifier.to_string(),
        input_hash: "e3b0".to_string() + &"0".repeat(60),
        result_hash: String::new(),
        pay_by_time: 500,
        submit_result_time: 1000,
        unlock_time: 2000,
        external_dispute_unlock_time: 3000,
        buyer_cooldown_time: 0,
        seller_cooldown_time: 0,
        collateral_return_lovelace: 2_000_000,
        requested_funds: vec![],
        paid_funds: vec![],
        on_chain_state: None,
        current_transaction_id: None,
        transaction_history: vec![],
        withdrawn_for_seller: vec![],
        withdrawn_for_buyer: vec![],
    }
}

fn opening_datum() -> EscrowDatum {
    EscrowDatum {
        buyer_vkey: vkey(2),
        buyer_address: AddressComponents::new(key_hash(20), None),
        seller_vkey: vkey(1),
        seller_address: AddressComponents::new(key_hash(10), None),
        blockchain_identifier: "id1".to_string(),
        result_hash: String::new(),
        result_time: 1000,
        unlock_time: 2000,
        external_dispute_unlock_time: 3000,
        pay_by_time: 500,
        buyer_cooldown_time: 0,
        seller_cooldown_time: 0,
        state: SmartContractState::FundsLocked,
        input_hash: "e3b0".to_string() + &"0".repeat(60),
        collateral_return_lovelace: 2_000_000,
    }
}

fn opening_tx(tx_hash: &str, block_time: u64, datum: &EscrowDatum) -> TxInfo {
    TxInfo {
        tx_hash: tx_hash.to_string(),
        block_hash: "block1".to_string(),
        confirmations: 10,
        inputs: vec![Utxo {
            tx_hash: "seed".to_string(),
            output_index: 0,
            address: BUYER_OWN_ADDR.to_string(),
            amounts: vec![],
            inline_datum: None,
            reference_script_hash: None,
            collateral: false,
        }],
        outputs: vec![Utxo {
            tx_hash: tx_hash.to_string(),
            output_index: 0,
            address: SCRIPT_ADDR.to_string(),
            amounts: vec![escrow_chain_adapter::Amount {
                unit: "lovelace".to_string(),
                quantity: 7_000_000,
            }],
            inline_datum: Some(hex::encode(datum.encode())),
            reference_script_hash: None,
            collateral: false,
        }],
        raw_body_bytes: write_redeemers(&[]),
    }
}

async fn seed_source(store: &InMemoryFacade) -> (escrow_persistence::EntityId, escrow_persistence::EntityId, escrow_persistence::EntityId, escrow_persistence::EntityId) {
    let source_id = store
        .seed_payment_source(PaymentSource {
            id: 0,
            network: Network::Preprod,
            smart_contract_address: SCRIPT_ADDR.to_string(),
            policy_id: "policy".to_string(),
            fee_rate_permille: 10,
            admin_wallet_addresses: vec!["admin1".into(), "admin2".into()],
            rpc_provider_api_key: "key".to_string(),
            last_identifier_checked: None,
            sync_in_progress: false,
            sync_started_at: None,
            last_identifier_checked_at: None,
            disabled_at: None,
            deleted_at: None,
        })
        .await;

    let selling_wallet_id = store
        .seed_hot_wallet(HotWallet {
            id: 0,
            payment_source_id: source_id,
            role: WalletRole::Selling,
            vkey: vkey(1).to_hex(),
            address: SELLER_OWN_ADDR.to_string(),
            collection_address: None,
            encrypted_mnemonic: vec![],
            locked_at: None,
            note: None,
        })
        .await;

    let purchasing_wallet_id = store
        .seed_hot_wallet(HotWallet {
            id: 0,
            payment_source_id: source_id,
            role: WalletRole::Purchasing,
            vkey: vkey(2).to_hex(),
            address: BUYER_OWN_ADDR.to_string(),
            collection_address: None,
            encrypted_mnemonic: vec![],
            locked_at: None,
            note: None,
        })
        .await;

    // The purchase side's record of the *seller* counterparty: same vkey as
    // the real selling wallet, as `create_purchase` would have recorded it.
    let seller_counterparty_id = store
        .seed_hot_wallet(HotWallet {
            id: 0,
            payment_source_id: source_id,
            role: WalletRole::Selling,
            vkey: vkey(1).to_hex(),
            address: "seller_as_seen_by_buyer".to_string(),
            collection_address: None,
            encrypted_mnemonic: vec![],
            locked_at: None,
            note: None,
        })
        .await;

    (source_id, selling_wallet_id, purchasing_wallet_id, seller_counterparty_id)
}

fn test_ctx(chain: FakeChainAdapter, store: InMemoryFacade) -> DispatcherContext {
    let mut ctx = DispatcherContext::new(std::sync::Arc::new(chain), std::sync::Arc::new(store));
    ctx.block_confirmations_threshold = 0;
    ctx
}

#[tokio::test]
async fn happy_path_initial_match_locks_funds_on_both_mirrors() {
    let store = InMemoryFacade::new();
    let (source_id, selling_wallet_id, purchasing_wallet_id, seller_counterparty_id) =
        seed_source(&store).await;

    let mut purchase_side = base_side("id1");
    purchase_side.payment_source_id = source_id;
    store
        .seed_purchase_request(PurchaseRequest {
            side: purchase_side,
            purchasing_wallet_id,
            seller_wallet_id: seller_counterparty_id,
            next_action: escrow_persistence::NextAction::new(PurchasingAction::FundsLockingInitiated),
        })
        .await;

    let mut payment_side = base_side("id1");
    payment_side.payment_source_id = source_id;
    store
        .seed_payment_request(PaymentRequest {
            side: payment_side,
            selling_wallet_id,
            buyer_wallet_id: None,
            next_action: escrow_persistence::NextAction::new(PaymentAction::WaitingForExternalAction),
        })
        .await;

    let datum = opening_datum();
    let tx = opening_tx("tx1", 400, &datum);
    let chain = FakeChainAdapter::default()
        .with_page(SCRIPT_ADDR, 1, vec![TxListEntry { tx_hash: "tx1".into(), block_time: 400 }])
        .with_page(SCRIPT_ADDR, 2, vec![])
        .with_tx(tx);

    let source = store.get_payment_source(source_id).await.unwrap().unwrap();
    let ctx = test_ctx(chain, store);

    run_sync_cycle(&ctx, &source, 1_000_000).await.unwrap();

    let purchase = ctx
        .store
        .find_purchase_request_by_identifier(source_id, "id1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(purchase.side.on_chain_state, Some(OnChainState::FundsLocked));
    assert_eq!(purchase.next_action.requested_action, PurchasingAction::WaitingForExternalAction);

    let payment = ctx
        .store
        .find_payment_request_by_identifier(source_id, "id1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.side.on_chain_state, Some(OnChainState::FundsLocked));
    assert_eq!(payment.next_action.requested_action, PaymentAction::WaitingForExternalAction);
    assert!(payment.buyer_wallet_id.is_some());

    let source = ctx.store.get_payment_source(source_id).await.unwrap().unwrap();
    assert_eq!(source.last_identifier_checked.as_deref(), Some("tx1"));
}

#[tokio::test]
async fn payment_side_records_invalid_on_field_mismatch_while_purchase_side_is_untouched() {
    let store = InMemoryFacade::new();
    let (source_id, selling_wallet_id, _purchasing_wallet_id, _seller_counterparty_id) =
        seed_source(&store).await;

    // No PurchaseRequest at all for "id1": the purchase-side match is simply
    // never attempted (the lookup returns `None` and the code returns early),
    // demonstrating the other half of the asymmetry — nothing to spoof.
    let mut payment_side = base_side("id1");
    payment_side.payment_source_id = source_id;
    payment_side.unlock_time = 9000; // stricter than the datum below, forcing a mismatch
    store
        .seed_payment_request(PaymentRequest {
            side: payment_side,
            selling_wallet_id,
            buyer_wallet_id: None,
            next_action: escrow_persistence::NextAction::new(PaymentAction::WaitingForExternalAction),
        })
        .await;

    let datum = opening_datum(); // datum.unlock_time = 2000 < stored 9000
    let tx = opening_tx("tx1", 400, &datum);
    let chain = FakeChainAdapter::default()
        .with_page(SCRIPT_ADDR, 1, vec![TxListEntry { tx_hash: "tx1".into(), block_time: 400 }])
        .with_page(SCRIPT_ADDR, 2, vec![])
        .with_tx(tx);

    let source = store.get_payment_source(source_id).await.unwrap().unwrap();
    let ctx = test_ctx(chain, store);

    run_sync_cycle(&ctx, &source, 1_000_000).await.unwrap();

    let payment = ctx
        .store
        .find_payment_request_by_identifier(source_id, "id1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.side.on_chain_state, Some(OnChainState::FundsOrDatumInvalid));
    assert_eq!(payment.next_action.requested_action, PaymentAction::WaitingForManualAction);
    assert!(payment
        .next_action
        .error_note
        .as_deref()
        .unwrap_or_default()
        .contains("Unlock time is before the agreed upon time"));
    assert!(payment.buyer_wallet_id.is_none());
}

#[tokio::test]
async fn rollback_detection_marks_entities_waiting_for_manual_action() {
    let store = InMemoryFacade::new();
    let (source_id, selling_wallet_id, _purchasing_wallet_id, _seller_counterparty_id) =
        seed_source(&store).await;

    // Prime the cursor trail as if a prior cycle had applied "tx_old".
    store.append_identifier(source_id, "tx_old", 100).await.unwrap();
    store
        .end_sync(source_id, Some("tx_old".to_string()), 100)
        .await
        .unwrap();

    let mut payment_side = base_side("id1");
    payment_side.payment_source_id = source_id;
    let payment_id = store
        .seed_payment_request(PaymentRequest {
            side: payment_side,
            selling_wallet_id,
            buyer_wallet_id: None,
            next_action: escrow_persistence::NextAction::new(PaymentAction::WithdrawInitiated),
        })
        .await;

    // Wire a Pending transaction "tx_old" as this request's current_transaction.
    let tx_id = store
        .try_lock_wallet(
            selling_wallet_id,
            escrow_persistence::TransactionOwner::PaymentCurrent,
            50,
            600,
        )
        .await
        .unwrap()
        .unwrap();
    store.set_transaction_hash(tx_id, "tx_old".to_string()).await.unwrap();
    let mut payment = store
        .find_payment_request_by_identifier(source_id, "id1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.side.id, payment_id);
    payment.side.current_transaction_id = Some(tx_id);
    store.update_payment_request(payment).await.unwrap();

    // Fresh chain history no longer contains "tx_old" anywhere.
    let chain = FakeChainAdapter::default()
        .with_page(SCRIPT_ADDR, 1, vec![])
        .with_page(SCRIPT_ADDR, 2, vec![]);

    let source = store.get_payment_source(source_id).await.unwrap().unwrap();
    let ctx = test_ctx(chain, store);

    run_sync_cycle(&ctx, &source, 1_000_000).await.unwrap();

    let payment = ctx
        .store
        .find_payment_request_by_identifier(source_id, "id1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.next_action.requested_action, PaymentAction::WaitingForManualAction);
    assert!(payment
        .next_action
        .error_note
        .as_deref()
        .unwrap_or_default()
        .contains("Rolled back transaction detected"));

    let tx = ctx.store.get_transaction(tx_id).await.unwrap().unwrap();
    assert_eq!(tx.status, escrow_persistence::TransactionStatus::RolledBack);
}

#[tokio::test]
async fn transition_confirms_pending_transaction_and_advances_state() {
    let store = InMemoryFacade::new();
    let (source_id, selling_wallet_id, purchasing_wallet_id, seller_counterparty_id) =
        seed_source(&store).await;

    // Seed the purchase side as though the Initial match already ran: its
    // own transaction ("tx1") is Confirmed and recorded, the payment side
    // records nothing of it directly — this is the case comment #3 exists
    // for, since a naive single-mirror successor check would reject the
    // very next transition.
    let tx1_id = store
        .try_lock_wallet(purchasing_wallet_id, escrow_persistence::TransactionOwner::PurchaseCurrent, 100, 600)
        .await
        .unwrap()
        .unwrap();
    store
        .release_wallet_lock(
            purchasing_wallet_id,
            tx1_id,
            escrow_persistence::TransactionStatus::Confirmed,
            Some("tx1".to_string()),
        )
        .await
        .unwrap();

    let mut purchase_side = base_side("id1");
    purchase_side.payment_source_id = source_id;
    purchase_side.on_chain_state = Some(OnChainState::FundsLocked);
    purchase_side.current_transaction_id = Some(tx1_id);
    store
        .seed_purchase_request(PurchaseRequest {
            side: purchase_side,
            purchasing_wallet_id,
            seller_wallet_id: seller_counterparty_id,
            next_action: escrow_persistence::NextAction::new(PurchasingAction::WaitingForExternalAction),
        })
        .await;

    // The seller's own dispatcher locked its wallet for this SubmitResult
    // transition and stamped the Pending transaction with the real hash
    // ("tx2") once it submitted — exactly what `dispatchers::driver::run_once`
    // leaves behind on success.
    let pending_id = store
        .try_lock_wallet(selling_wallet_id, escrow_persistence::TransactionOwner::PaymentCurrent, 200, 600)
        .await
        .unwrap()
        .unwrap();
    store.set_transaction_hash(pending_id, "tx2".to_string()).await.unwrap();

    let mut payment_side = base_side("id1");
    payment_side.payment_source_id = source_id;
    payment_side.on_chain_state = Some(OnChainState::FundsLocked);
    payment_side.current_transaction_id = Some(pending_id);
    store
        .seed_payment_request(PaymentRequest {
            side: payment_side,
            selling_wallet_id,
            buyer_wallet_id: Some(purchasing_wallet_id),
            next_action: escrow_persistence::NextAction::new(PaymentAction::SubmitResultInitiated),
        })
        .await;

    let old_datum = opening_datum();
    let tx2 = TxInfo {
        tx_hash: "tx2".to_string(),
        block_hash: "block2".to_string(),
        confirmations: 10,
        inputs: vec![Utxo {
            tx_hash: "tx1".to_string(),
            output_index: 0,
            address: SCRIPT_ADDR.to_string(),
            amounts: vec![],
            inline_datum: Some(hex::encode(old_datum.encode())),
            reference_script_hash: None,
            collateral: false,
        }],
        outputs: vec![],
        raw_body_bytes: write_redeemers(&[escrow_codec::Redeemer::SubmitResult]),
    };
    let chain = FakeChainAdapter::default()
        .with_page(SCRIPT_ADDR, 1, vec![TxListEntry { tx_hash: "tx2".into(), block_time: 500 }])
        .with_page(SCRIPT_ADDR, 2, vec![])
        .with_tx(tx2);

    let source = store.get_payment_source(source_id).await.unwrap().unwrap();
    let ctx = test_ctx(chain, store);

    run_sync_cycle(&ctx, &source, 1_000_000).await.unwrap();

    let payment = ctx
        .store
        .find_payment_request_by_identifier(source_id, "id1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.side.on_chain_state, Some(OnChainState::ResultSubmitted));
    assert_eq!(payment.next_action.requested_action, PaymentAction::WaitingForExternalAction);
    assert_eq!(payment.side.current_transaction_id, None);
    assert_eq!(payment.side.transaction_history, vec![pending_id]);

    let confirmed = ctx.store.get_transaction(pending_id).await.unwrap().unwrap();
    assert_eq!(confirmed.status, escrow_persistence::TransactionStatus::Confirmed);
    assert_eq!(confirmed.tx_hash, "tx2");

    let selling_wallet = ctx.store.get_hot_wallet(selling_wallet_id).await.unwrap().unwrap();
    assert_eq!(selling_wallet.locked_at, None);
}

#[tokio::test]
async fn withdraw_disputed_transition_records_net_amounts_for_both_sides() {
    let store = InMemoryFacade::new();
    let (source_id, selling_wallet_id, purchasing_wallet_id, seller_counterparty_id) =
        seed_source(&store).await;

    let tx2_id = store
        .try_lock_wallet(purchasing_wallet_id, escrow_persistence::TransactionOwner::PurchaseCurrent, 100, 600)
        .await
        .unwrap()
        .unwrap();
    store
        .release_wallet_lock(
            purchasing_wallet_id,
            tx2_id,
            escrow_persistence::TransactionStatus::Confirmed,
            Some("tx2".to_string()),
        )
        .await
        .unwrap();

    let mut purchase_side = base_side("id1");
    purchase_side.payment_source_id = source_id;
    purchase_side.on_chain_state = Some(OnChainState::Disputed);
    purchase_side.current_transaction_id = Some(tx2_id);
    store
        .seed_purchase_request(PurchaseRequest {
            side: purchase_side,
            purchasing_wallet_id,
            seller_wallet_id: seller_counterparty_id,
            next_action: escrow_persistence::NextAction::new(PurchasingAction::WaitingForExternalAction),
        })
        .await;

    let pending_id = store
        .try_lock_wallet(selling_wallet_id, escrow_persistence::TransactionOwner::PaymentCurrent, 200, 600)
        .await
        .unwrap()
        .unwrap();
    store.set_transaction_hash(pending_id, "tx3".to_string()).await.unwrap();

    let mut payment_side = base_side("id1");
    payment_side.payment_source_id = source_id;
    payment_side.on_chain_state = Some(OnChainState::Disputed);
    payment_side.current_transaction_id = Some(pending_id);
    store
        .seed_payment_request(PaymentRequest {
            side: payment_side,
            selling_wallet_id,
            buyer_wallet_id: Some(purchasing_wallet_id),
            next_action: escrow_persistence::NextAction::new(PaymentAction::AuthorizeRefundInitiated),
        })
        .await;

    let mut old_datum = opening_datum();
    old_datum.state = SmartContractState::Disputed;
    let tx3 = TxInfo {
        tx_hash: "tx3".to_string(),
        block_hash: "block3".to_string(),
        confirmations: 10,
        inputs: vec![Utxo {
            tx_hash: "tx2".to_string(),
            output_index: 0,
            address: SCRIPT_ADDR.to_string(),
            amounts: vec![],
            inline_datum: Some(hex::encode(old_datum.encode())),
            reference_script_hash: None,
            collateral: false,
        }],
        outputs: vec![
            Utxo {
                tx_hash: "tx3".to_string(),
                output_index: 0,
                address: SELLER_OWN_ADDR.to_string(),
                amounts: vec![escrow_chain_adapter::Amount { unit: "lovelace".to_string(), quantity: 3_000_000 }],
                inline_datum: None,
                reference_script_hash: None,
                collateral: false,
            },
            Utxo {
                tx_hash: "tx3".to_string(),
                output_index: 1,
                address: BUYER_OWN_ADDR.to_string(),
                amounts: vec![escrow_chain_adapter::Amount { unit: "lovelace".to_string(), quantity: 4_000_000 }],
                inline_datum: None,
                reference_script_hash: None,
                collateral: false,
            },
        ],
        raw_body_bytes: write_redeemers(&[escrow_codec::Redeemer::WithdrawDisputed]),
    };
    let chain = FakeChainAdapter::default()
        .with_page(SCRIPT_ADDR, 1, vec![TxListEntry { tx_hash: "tx3".into(), block_time: 600 }])
        .with_page(SCRIPT_ADDR, 2, vec![])
        .with_tx(tx3);

    let source = store.get_payment_source(source_id).await.unwrap().unwrap();
    let ctx = test_ctx(chain, store);

    run_sync_cycle(&ctx, &source, 1_000_000).await.unwrap();

    let payment = ctx
        .store
        .find_payment_request_by_identifier(source_id, "id1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.side.on_chain_state, Some(OnChainState::DisputedWithdrawn));
    assert_eq!(payment.next_action.requested_action, PaymentAction::None);
    assert_eq!(
        payment.side.withdrawn_for_seller,
        vec![escrow_persistence::Amount { unit: "lovelace".to_string(), amount: 3_000_000 }]
    );
    assert_eq!(
        payment.side.withdrawn_for_buyer,
        vec![escrow_persistence::Amount { unit: "lovelace".to_string(), amount: 4_000_000 }]
    );

    let purchase = ctx
        .store
        .find_purchase_request_by_identifier(source_id, "id1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        purchase.side.withdrawn_for_seller,
        vec![escrow_persistence::Amount { unit: "lovelace".to_string(), amount: 3_000_000 }]
    );
    assert_eq!(
        purchase.side.withdrawn_for_buyer,
        vec![escrow_persistence::Amount { unit: "lovelace".to_string(), amount: 4_000_000 }]
    );
}
