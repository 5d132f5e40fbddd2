//! Shared [`TxBuilder`] implementations. Every dispatcher that only differs
//! from its siblings by which redeemer it attaches (submit-result,
//! request-refund, cancel-refund, authorize-refund, withdraw,
//! withdraw-refund, withdraw-disputed) shares [`RedeemerBuilder`]; the two
//! builders that don't fit that shape (opening a new escrow, minting an
//! agent identifier) get their own.

use async_trait::async_trait;

use escrow_chain_adapter::{ExecutionUnits, Utxo};
use escrow_codec::{EscrowDatum, Redeemer, SmartContractState};
use escrow_persistence::EscrowSide;

use crate::context::DispatcherContext;
use crate::dispatchers::driver::{TxBuilder, TxEnvelope};
use crate::error::EngineError;
use crate::rawtx::write_redeemers;

/// Appends the validity window and collateral reference every authored
/// transaction carries (spec §4.4) to the draft bytes.
fn write_envelope(writer: &mut escrow_common::Writer, envelope: &TxEnvelope<'_>) {
    use escrow_common::Serializer as _;
    writer.write_u64(envelope.valid_before as u64);
    writer.write_u64(envelope.valid_after as u64);
    envelope.collateral.tx_hash.clone().write(writer);
    writer.write_u64(envelope.collateral.output_index as u64);
}

/// Reconstructs the datum an escrow's own `EscrowSide` row implies, with
/// `state` overridden to whatever the in-flight transition is about to
/// produce (spec §4.2 field list). The counterparty vkeys/addresses are not
/// persisted on `EscrowSide` itself (they live on the two `HotWallet` rows
/// the mirror references) — callers that need them fill them in after
/// calling this helper.
pub fn datum_skeleton(side: &EscrowSide, state: SmartContractState) -> EscrowDatum {
    EscrowDatum {
        buyer_vkey: escrow_common::VerificationKey::zero(),
        buyer_address: escrow_common::AddressComponents::new(escrow_common::KeyHash::zero(), None),
        seller_vkey: escrow_common::VerificationKey::zero(),
        seller_address: escrow_common::AddressComponents::new(escrow_common::KeyHash::zero(), None),
        blockchain_identifier: side.blockchain_identifier.clone(),
        result_hash: side.result_hash.clone(),
        result_time: side.submit_result_time as u64,
        unlock_time: side.unlock_time as u64,
        external_dispute_unlock_time: side.external_dispute_unlock_time as u64,
        pay_by_time: side.pay_by_time as u64,
        buyer_cooldown_time: side.buyer_cooldown_time as u64,
        seller_cooldown_time: side.seller_cooldown_time as u64,
        state,
        input_hash: side.input_hash.clone(),
        collateral_return_lovelace: side.collateral_return_lovelace,
    }
}

/// Spends the escrow's current UTXO with a single redeemer, optionally
/// producing a new datum at the script address (spec §4.3.2 table). `None`
/// new-datum builders (Withdraw, WithdrawRefund, WithdrawDisputed) leave no
/// script output.
pub struct RedeemerBuilder {
    pub redeemer: Redeemer,
    pub new_datum: Option<EscrowDatum>,
}

#[async_trait]
impl TxBuilder for RedeemerBuilder {
    async fn build(
        &self,
        _ctx: &DispatcherContext,
        _utxos: &[Utxo],
        envelope: &TxEnvelope<'_>,
        _budgets: Option<&[ExecutionUnits]>,
    ) -> Result<Vec<u8>, EngineError> {
        let mut writer = escrow_common::Writer::new();
        write_envelope(&mut writer, envelope);
        let mut bytes = writer.into_bytes();
        bytes.extend(write_redeemers(&[self.redeemer]));
        if let Some(datum) = &self.new_datum {
            bytes.extend(datum.encode());
        }
        Ok(bytes)
    }
}

/// Opens a new escrow: zero redeemers, one script output carrying the
/// freshly constructed datum (spec §4.3 step 4 "Initial").
pub struct InitialLockBuilder {
    pub datum: EscrowDatum,
}

#[async_trait]
impl TxBuilder for InitialLockBuilder {
    async fn build(
        &self,
        _ctx: &DispatcherContext,
        _utxos: &[Utxo],
        envelope: &TxEnvelope<'_>,
        _budgets: Option<&[ExecutionUnits]>,
    ) -> Result<Vec<u8>, EngineError> {
        let mut writer = escrow_common::Writer::new();
        write_envelope(&mut writer, envelope);
        let mut bytes = writer.into_bytes();
        bytes.extend(write_redeemers(&[]));
        bytes.extend(self.datum.encode());
        Ok(bytes)
    }
}

/// Mints (or, with `burn: true`, burns) a single agent identifier NFT under
/// the payment source's minting policy (spec §4.4 Register/Deregister
/// Agent). The asset name is derived from the first consumed UTXO so
/// repeated registrations never collide (one-shot minting policy pattern);
/// [`crate::dispatchers::register`] computes it once and reuses it for the
/// matching deregister burn.
pub struct MintAssetBuilder {
    pub asset_name: escrow_common::Hash,
    pub burn: bool,
    pub metadata: Vec<(String, Vec<String>)>,
}

#[async_trait]
impl TxBuilder for MintAssetBuilder {
    async fn build(
        &self,
        _ctx: &DispatcherContext,
        _utxos: &[Utxo],
        envelope: &TxEnvelope<'_>,
        _budgets: Option<&[ExecutionUnits]>,
    ) -> Result<Vec<u8>, EngineError> {
        use escrow_common::Serializer as _;
        let mut writer = escrow_common::Writer::new();
        write_envelope(&mut writer, envelope);
        self.burn.write(&mut writer);
        writer.write_bytes(self.asset_name.as_bytes());
        (self.metadata.len() as u64).write(&mut writer);
        for (label, chunks) in &self.metadata {
            label.clone().write(&mut writer);
            chunks.clone().write(&mut writer);
        }
        Ok(writer.into_bytes())
    }
}
