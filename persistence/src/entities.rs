use escrow_common::Network;
use serde::{Deserialize, Serialize};

/// Surrogate key type for every row in the facade; `BIGSERIAL` on the Postgres side.
pub type EntityId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletRole {
    Selling,
    Purchasing,
    FeeReceiver,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentSource {
    pub id: EntityId,
    pub network: Network,
    pub smart_contract_address: String,
    pub policy_id: String,
    pub fee_rate_permille: u32,
    /// Ordered, 2-5 entries (spec I-admin-threshold).
    pub admin_wallet_addresses: Vec<String>,
    pub rpc_provider_api_key: String,
    /// Tx-hash cursor into `payment_source_identifiers`; `None` before the first sync.
    pub last_identifier_checked: Option<String>,
    pub sync_in_progress: bool,
    pub sync_started_at: Option<i64>,
    /// Timestamp paired with `last_identifier_checked` so a liveness probe or
    /// operator dashboard can tell a stalled source from an idle one.
    pub last_identifier_checked_at: Option<i64>,
    pub disabled_at: Option<i64>,
    pub deleted_at: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotWallet {
    pub id: EntityId,
    pub payment_source_id: EntityId,
    pub role: WalletRole,
    pub vkey: String,
    pub address: String,
    pub collection_address: Option<String>,
    /// Opaque ciphertext; the core never reads plaintext key material.
    pub encrypted_mnemonic: Vec<u8>,
    pub locked_at: Option<i64>,
    pub note: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    RolledBack,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionOwner {
    PaymentCurrent,
    PaymentHistory,
    PurchaseCurrent,
    PurchaseHistory,
    RegistryCurrent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: EntityId,
    /// Empty until the dispatcher's `submit_tx` call returns.
    pub tx_hash: String,
    pub status: TransactionStatus,
    pub blocks_wallet: Option<EntityId>,
    pub owner: TransactionOwner,
    pub created_at: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationState {
    RegistrationRequested,
    RegistrationInitiated,
    RegistrationConfirmed,
    RegistrationFailed,
    DeregistrationRequested,
    DeregistrationInitiated,
    DeregistrationConfirmed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingKind {
    Fixed,
    Free,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub unit: String,
    pub amount: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub kind: PricingKind,
    pub amounts: Vec<Amount>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub version: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistryRequest {
    pub id: EntityId,
    pub payment_source_id: EntityId,
    pub selling_wallet_id: EntityId,
    pub name: String,
    pub description: String,
    pub api_base_url: String,
    pub capability: Capability,
    pub author: String,
    pub legal: String,
    pub tags: Vec<String>,
    pub example_outputs: Vec<String>,
    pub pricing: Pricing,
    pub metadata_version: u32,
    /// `policy_id ‖ asset_name` hex, 120 chars; set once the mint is submitted.
    pub agent_identifier: Option<String>,
    pub state: RegistrationState,
    pub current_transaction_id: Option<EntityId>,
    pub error: Option<String>,
}

impl Default for Capability {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: String::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnChainState {
    FundsLocked,
    ResultSubmitted,
    RefundRequested,
    Disputed,
    Withdrawn,
    RefundWithdrawn,
    DisputedWithdrawn,
    FundsOrDatumInvalid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentAction {
    None,
    WaitingForExternalAction,
    WaitingForManualAction,
    WithdrawRequested,
    WithdrawInitiated,
    SubmitResultRequested,
    SubmitResultInitiated,
    AuthorizeRefundRequested,
    AuthorizeRefundInitiated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchasingAction {
    None,
    FundsLockingRequested,
    FundsLockingInitiated,
    WaitingForExternalAction,
    WaitingForManualAction,
    SetRefundRequestedRequested,
    SetRefundRequestedInitiated,
    WithdrawRefundRequested,
    WithdrawRefundInitiated,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NextAction<A> {
    pub requested_action: A,
    pub error_type: Option<String>,
    /// Chain-appended across transitions: `prev_note (prev_action) -> new_note`.
    pub error_note: Option<String>,
}

impl<A> NextAction<A> {
    pub fn new(requested_action: A) -> Self {
        Self {
            requested_action,
            error_type: None,
            error_note: None,
        }
    }

    pub fn append_note(&mut self, prev_action_label: &str, new_note: &str) {
        self.error_note = Some(match self.error_note.take() {
            Some(prev) => format!("{prev} ({prev_action_label}) -> {new_note}"),
            None => new_note.to_string(),
        });
    }
}

/// Shared temporal/hash fields duplicated verbatim by `PaymentRequest` and
/// `PurchaseRequest` (the "mirror" pair, spec §9 Design Notes).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscrowSide {
    pub id: EntityId,
    pub payment_source_id: EntityId,
    pub blockchain_identifier: String,
    pub input_hash: String,
    pub result_hash: String,
    pub pay_by_time: i64,
    pub submit_result_time: i64,
    pub unlock_time: i64,
    pub external_dispute_unlock_time: i64,
    pub buyer_cooldown_time: i64,
    pub seller_cooldown_time: i64,
    pub collateral_return_lovelace: u64,
    pub requested_funds: Vec<Amount>,
    pub paid_funds: Vec<Amount>,
    pub on_chain_state: Option<OnChainState>,
    pub current_transaction_id: Option<EntityId>,
    pub transaction_history: Vec<EntityId>,
    pub withdrawn_for_seller: Vec<Amount>,
    pub withdrawn_for_buyer: Vec<Amount>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub side: EscrowSide,
    /// SmartContractWallet (Selling role), owned by this PaymentSource.
    pub selling_wallet_id: EntityId,
    /// Counterparty, attached on first successful Initial match; `None` until then.
    pub buyer_wallet_id: Option<EntityId>,
    pub next_action: NextAction<PaymentAction>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub side: EscrowSide,
    /// SmartContractWallet (Purchasing role), owned by this PaymentSource.
    pub purchasing_wallet_id: EntityId,
    pub seller_wallet_id: EntityId,
    pub next_action: NextAction<PurchasingAction>,
}

/// Append-only cursor trail of observed tx-hashes on a PaymentSource's script
/// address, used to detect rollbacks (spec I7).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentSourceIdentifier {
    pub id: EntityId,
    pub payment_source_id: EntityId,
    pub tx_hash: String,
    pub block_time: i64,
}
