//! `EscrowDatum` — the on-chain structured data attached to a script output.
//! Encoding is pure and total: `decode(encode(d)) == d` for every datum.

use escrow_common::{AddressComponents, Hash, VerificationKey};
use serde::{Deserialize, Serialize};

use crate::address::{decode_address, encode_address};
use crate::constructor::ConstructorTerm;
use crate::CodecError;

/// The subset of escrow lifecycle states encoded on-chain. The coordinator's
/// off-chain `OnChainState` (spec §3) is a superset derived from this plus
/// the redeemer that produced/consumed a given output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum SmartContractState {
    FundsLocked,
    ResultSubmitted,
    RefundRequested,
    Disputed,
}

impl SmartContractState {
    fn tag(self) -> u64 {
        match self {
            SmartContractState::FundsLocked => 0,
            SmartContractState::ResultSubmitted => 1,
            SmartContractState::RefundRequested => 2,
            SmartContractState::Disputed => 3,
        }
    }

    fn from_tag(tag: u64) -> Result<Self, CodecError> {
        match tag {
            0 => Ok(SmartContractState::FundsLocked),
            1 => Ok(SmartContractState::ResultSubmitted),
            2 => Ok(SmartContractState::RefundRequested),
            3 => Ok(SmartContractState::Disputed),
            other => Err(CodecError::UnexpectedShape(format!(
                "unknown SmartContractState tag {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowDatum {
    pub buyer_vkey: VerificationKey,
    pub buyer_address: AddressComponents,
    pub seller_vkey: VerificationKey,
    pub seller_address: AddressComponents,
    pub blockchain_identifier: String,
    /// Empty string when unset.
    pub result_hash: String,
    pub result_time: u64,
    pub unlock_time: u64,
    pub external_dispute_unlock_time: u64,
    pub pay_by_time: u64,
    pub buyer_cooldown_time: u64,
    pub seller_cooldown_time: u64,
    pub state: SmartContractState,
    pub input_hash: String,
    pub collateral_return_lovelace: u64,
}

const DATUM_CONSTR_TAG: u64 = 0;

impl EscrowDatum {
    pub fn encode(&self) -> Vec<u8> {
        self.to_term().encode()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let term = ConstructorTerm::decode(bytes).map_err(CodecError::Reader)?;
        Self::from_term(&term)
    }

    pub fn to_term(&self) -> ConstructorTerm {
        ConstructorTerm::constr(
            DATUM_CONSTR_TAG,
            vec![
                ConstructorTerm::bytes(self.buyer_vkey.as_bytes().to_vec()),
                encode_address(&self.buyer_address),
                ConstructorTerm::bytes(self.seller_vkey.as_bytes().to_vec()),
                encode_address(&self.seller_address),
                ConstructorTerm::bytes(self.blockchain_identifier.as_bytes().to_vec()),
                ConstructorTerm::bytes(self.result_hash.as_bytes().to_vec()),
                ConstructorTerm::int(self.result_time as i128),
                ConstructorTerm::int(self.unlock_time as i128),
                ConstructorTerm::int(self.external_dispute_unlock_time as i128),
                ConstructorTerm::int(self.pay_by_time as i128),
                ConstructorTerm::int(self.buyer_cooldown_time as i128),
                ConstructorTerm::int(self.seller_cooldown_time as i128),
                ConstructorTerm::constr(self.state.tag(), vec![]),
                ConstructorTerm::bytes(self.input_hash.as_bytes().to_vec()),
                ConstructorTerm::int(self.collateral_return_lovelace as i128),
            ],
        )
    }

    pub fn from_term(term: &ConstructorTerm) -> Result<Self, CodecError> {
        let (tag, fields) = term.as_constr()?;
        if tag != DATUM_CONSTR_TAG {
            return Err(CodecError::UnexpectedShape(format!(
                "unexpected datum constructor tag {tag}"
            )));
        }
        if fields.len() != 15 {
            return Err(CodecError::UnexpectedShape(format!(
                "expected 15 datum fields, got {}",
                fields.len()
            )));
        }

        let state_term = ConstructorTerm::field(fields, 12)?;
        let (state_tag, _) = state_term.as_constr()?;

        Ok(EscrowDatum {
            buyer_vkey: VerificationKey::from_bytes(ConstructorTerm::field(fields, 0)?.as_bytes()?)?,
            buyer_address: decode_address(ConstructorTerm::field(fields, 1)?)?,
            seller_vkey: VerificationKey::from_bytes(ConstructorTerm::field(fields, 2)?.as_bytes()?)?,
            seller_address: decode_address(ConstructorTerm::field(fields, 3)?)?,
            blockchain_identifier: utf8(ConstructorTerm::field(fields, 4)?)?,
            result_hash: utf8(ConstructorTerm::field(fields, 5)?)?,
            result_time: ConstructorTerm::field(fields, 6)?.as_int()? as u64,
            unlock_time: ConstructorTerm::field(fields, 7)?.as_int()? as u64,
            external_dispute_unlock_time: ConstructorTerm::field(fields, 8)?.as_int()? as u64,
            pay_by_time: ConstructorTerm::field(fields, 9)?.as_int()? as u64,
            buyer_cooldown_time: ConstructorTerm::field(fields, 10)?.as_int()? as u64,
            seller_cooldown_time: ConstructorTerm::field(fields, 11)?.as_int()? as u64,
            state: SmartContractState::from_tag(state_tag)?,
            input_hash: utf8(ConstructorTerm::field(fields, 13)?)?,
            collateral_return_lovelace: ConstructorTerm::field(fields, 14)?.as_int()? as u64,
        })
    }
}

fn utf8(term: &ConstructorTerm) -> Result<String, CodecError> {
    String::from_utf8(term.as_bytes()?.to_vec()).map_err(|e| CodecError::UnexpectedShape(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_common::KeyHash;

    fn sample_datum() -> EscrowDatum {
        EscrowDatum {
            buyer_vkey: VerificationKey::from_bytes(&[1u8; VerificationKey::SIZE]).unwrap(),
            buyer_address: AddressComponents::new(
                KeyHash::from_bytes(&[2u8; KeyHash::SIZE]).unwrap(),
                None,
            ),
            seller_vkey: VerificationKey::from_bytes(&[3u8; VerificationKey::SIZE]).unwrap(),
            seller_address: AddressComponents::new(
                KeyHash::from_bytes(&[4u8; KeyHash::SIZE]).unwrap(),
                Some(KeyHash::from_bytes(&[5u8; KeyHash::SIZE]).unwrap()),
            ),
            blockchain_identifier: "0123456789abcdef0123".to_string(),
            result_hash: String::new(),
            result_time: 1000,
            unlock_time: 2000,
            external_dispute_unlock_time: 3000,
            pay_by_time: 500,
            buyer_cooldown_time: 0,
            seller_cooldown_time: 0,
            state: SmartContractState::FundsLocked,
            input_hash: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85".to_string(),
            collateral_return_lovelace: 2_000_000,
        }
    }

    #[test]
    fn datum_roundtrip() {
        let datum = sample_datum();
        let bytes = datum.encode();
        let back = EscrowDatum::decode(&bytes).unwrap();
        assert_eq!(datum, back);
    }

    #[test]
    fn datum_roundtrip_with_result_hash() {
        let mut datum = sample_datum();
        datum.result_hash = "ff00".repeat(16);
        datum.state = SmartContractState::ResultSubmitted;
        let bytes = datum.encode();
        let back = EscrowDatum::decode(&bytes).unwrap();
        assert_eq!(datum, back);
    }
}
