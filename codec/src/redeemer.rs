//! `Redeemer` — the seven spending-transition variants. The constructor tag
//! matches the on-chain redeemer constructor index exactly (spec §4.2).

use serde::{Deserialize, Serialize};

use crate::constructor::ConstructorTerm;
use crate::CodecError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Redeemer {
    Withdraw,
    RequestRefund,
    CancelRefundRequest,
    WithdrawRefund,
    WithdrawDisputed,
    SubmitResult,
    AllowRefund,
}

impl Redeemer {
    pub fn tag(self) -> u64 {
        match self {
            Redeemer::Withdraw => 0,
            Redeemer::RequestRefund => 1,
            Redeemer::CancelRefundRequest => 2,
            Redeemer::WithdrawRefund => 3,
            Redeemer::WithdrawDisputed => 4,
            Redeemer::SubmitResult => 5,
            Redeemer::AllowRefund => 6,
        }
    }

    pub fn from_tag(tag: u64) -> Result<Self, CodecError> {
        match tag {
            0 => Ok(Redeemer::Withdraw),
            1 => Ok(Redeemer::RequestRefund),
            2 => Ok(Redeemer::CancelRefundRequest),
            3 => Ok(Redeemer::WithdrawRefund),
            4 => Ok(Redeemer::WithdrawDisputed),
            5 => Ok(Redeemer::SubmitResult),
            6 => Ok(Redeemer::AllowRefund),
            other => Err(CodecError::UnknownRedeemerTag(other)),
        }
    }

    pub fn encode(self) -> Vec<u8> {
        self.to_term().encode()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let term = ConstructorTerm::decode(bytes).map_err(CodecError::Reader)?;
        Self::from_term(&term)
    }

    pub fn to_term(self) -> ConstructorTerm {
        ConstructorTerm::constr(self.tag(), vec![])
    }

    pub fn from_term(term: &ConstructorTerm) -> Result<Self, CodecError> {
        let (tag, _fields) = term.as_constr()?;
        Self::from_tag(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeemer_roundtrip_all_variants() {
        let all = [
            Redeemer::Withdraw,
            Redeemer::RequestRefund,
            Redeemer::CancelRefundRequest,
            Redeemer::WithdrawRefund,
            Redeemer::WithdrawDisputed,
            Redeemer::SubmitResult,
            Redeemer::AllowRefund,
        ];
        for (i, redeemer) in all.iter().enumerate() {
            assert_eq!(redeemer.tag(), i as u64);
            let bytes = redeemer.encode();
            let back = Redeemer::decode(&bytes).unwrap();
            assert_eq!(*redeemer, back);
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let term = ConstructorTerm::constr(99, vec![]);
        let err = Redeemer::from_term(&term).unwrap_err();
        assert!(matches!(err, CodecError::UnknownRedeemerTag(99)));
    }
}
