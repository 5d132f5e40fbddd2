//! Extraction of the redeemers attached to a transaction body.
//!
//! The retrieval pack carries no Cardano CBOR crate (no `pallas`/`minicbor`),
//! so — exactly as the Codec substitutes a `ConstructorTerm` intermediate
//! representation for real Plutus Data — transaction bodies authored by this
//! coordinator's own dispatchers serialize their redeemer list with the
//! shared `Reader`/`Writer` wire format instead of real CBOR. This module is
//! the decode side of that envelope.
use escrow_codec::{ConstructorTerm, Redeemer};
use escrow_common::{Reader, ReaderError, Serializer, Writer};

pub fn extract_redeemers(raw_body_bytes: &[u8]) -> Result<Vec<Redeemer>, ReaderError> {
    if raw_body_bytes.is_empty() {
        return Ok(Vec::new());
    }
    let mut reader = Reader::new(raw_body_bytes);
    let count = reader.read_u16()? as usize;
    let mut redeemers = Vec::with_capacity(count);
    for _ in 0..count {
        let term = ConstructorTerm::read(&mut reader)?;
        redeemers.push(
            Redeemer::from_term(&term)
                .map_err(|e| ReaderError::InvalidValue(format!("bad redeemer term: {e}")))?,
        );
    }
    Ok(redeemers)
}

pub fn write_redeemers(redeemers: &[Redeemer]) -> Vec<u8> {
    let mut writer = Writer::new();
    writer.write_u16(redeemers.len() as u16);
    for r in redeemers {
        r.to_term().write(&mut writer);
    }
    writer.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_empty_and_populated_redeemer_lists() {
        assert_eq!(extract_redeemers(&[]).unwrap(), Vec::new());

        let bytes = write_redeemers(&[Redeemer::SubmitResult, Redeemer::Withdraw]);
        let back = extract_redeemers(&bytes).unwrap();
        assert_eq!(back, vec![Redeemer::SubmitResult, Redeemer::Withdraw]);
    }
}
