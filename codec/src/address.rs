//! Address credential encoding: a payment credential (key hash) plus an
//! optional stake credential, each a nested constructor term — the exact
//! shape the on-chain script's `Address` type expects.

use escrow_common::{AddressComponents, KeyHash};

use crate::constructor::ConstructorTerm;
use crate::CodecError;

const CREDENTIAL_VERIFICATION_KEY_TAG: u64 = 0;
const STAKING_CREDENTIAL_HASH_TAG: u64 = 0;
const MAYBE_JUST_TAG: u64 = 0;
const MAYBE_NOTHING_TAG: u64 = 1;

fn encode_credential(key_hash: &KeyHash) -> ConstructorTerm {
    ConstructorTerm::constr(
        CREDENTIAL_VERIFICATION_KEY_TAG,
        vec![ConstructorTerm::bytes(key_hash.as_bytes().to_vec())],
    )
}

fn decode_credential(term: &ConstructorTerm) -> Result<KeyHash, CodecError> {
    let (tag, fields) = term.as_constr()?;
    if tag != CREDENTIAL_VERIFICATION_KEY_TAG {
        return Err(CodecError::UnexpectedShape(
            "only verification-key credentials are supported".into(),
        ));
    }
    let bytes = ConstructorTerm::field(fields, 0)?.as_bytes()?;
    Ok(KeyHash::from_bytes(bytes)?)
}

fn encode_maybe_staking(stake_key_hash: &Option<KeyHash>) -> ConstructorTerm {
    match stake_key_hash {
        Some(key_hash) => {
            let staking_credential = ConstructorTerm::constr(
                STAKING_CREDENTIAL_HASH_TAG,
                vec![encode_credential(key_hash)],
            );
            ConstructorTerm::constr(MAYBE_JUST_TAG, vec![staking_credential])
        }
        None => ConstructorTerm::constr(MAYBE_NOTHING_TAG, vec![]),
    }
}

fn decode_maybe_staking(term: &ConstructorTerm) -> Result<Option<KeyHash>, CodecError> {
    let (tag, fields) = term.as_constr()?;
    match tag {
        MAYBE_JUST_TAG => {
            let staking_credential = ConstructorTerm::field(fields, 0)?;
            let (inner_tag, inner_fields) = staking_credential.as_constr()?;
            if inner_tag != STAKING_CREDENTIAL_HASH_TAG {
                return Err(CodecError::UnexpectedShape(
                    "only hash-based staking credentials are supported".into(),
                ));
            }
            let credential = ConstructorTerm::field(inner_fields, 0)?;
            Ok(Some(decode_credential(credential)?))
        }
        MAYBE_NOTHING_TAG => Ok(None),
        other => Err(CodecError::UnexpectedShape(format!(
            "unknown Maybe tag {other}"
        ))),
    }
}

pub fn encode_address(address: &AddressComponents) -> ConstructorTerm {
    ConstructorTerm::constr(
        0,
        vec![
            encode_credential(&address.payment_key_hash),
            encode_maybe_staking(&address.stake_key_hash),
        ],
    )
}

pub fn decode_address(term: &ConstructorTerm) -> Result<AddressComponents, CodecError> {
    let (_, fields) = term.as_constr()?;
    let payment_key_hash = decode_credential(ConstructorTerm::field(fields, 0)?)?;
    let stake_key_hash = decode_maybe_staking(ConstructorTerm::field(fields, 1)?)?;
    Ok(AddressComponents::new(payment_key_hash, stake_key_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_common::Serializer;

    #[test]
    fn address_roundtrip_with_stake() {
        let addr = AddressComponents::new(
            KeyHash::from_bytes(&[1u8; KeyHash::SIZE]).unwrap(),
            Some(KeyHash::from_bytes(&[2u8; KeyHash::SIZE]).unwrap()),
        );
        let term = encode_address(&addr);
        let bytes = term.encode();
        let back_term = ConstructorTerm::decode(&bytes).unwrap();
        let back = decode_address(&back_term).unwrap();
        assert_eq!(addr, back);
    }

    #[test]
    fn address_roundtrip_without_stake() {
        let addr = AddressComponents::new(
            KeyHash::from_bytes(&[9u8; KeyHash::SIZE]).unwrap(),
            None,
        );
        let term = encode_address(&addr);
        let back = decode_address(&term).unwrap();
        assert_eq!(addr, back);
    }
}
