use escrow_codec::{Redeemer, SmartContractState};
use escrow_persistence::{Amount, OnChainState, PaymentAction, PurchasingAction};

/// `(redeemer, new_datum, amount_ok) -> OnChainState`, the exhaustive table
/// from spec §4.3.2. `new_datum_state` is `None` when the redeemer produces
/// no script output (Withdraw, WithdrawRefund, WithdrawDisputed).
pub fn resolve_on_chain_state(
    redeemer: Redeemer,
    new_datum_state: Option<SmartContractState>,
    amount_ok: bool,
) -> OnChainState {
    match redeemer {
        Redeemer::Withdraw => OnChainState::Withdrawn,
        Redeemer::RequestRefund => {
            if new_datum_state == Some(SmartContractState::Disputed) {
                OnChainState::Disputed
            } else {
                OnChainState::RefundRequested
            }
        }
        Redeemer::CancelRefundRequest => {
            if new_datum_state == Some(SmartContractState::ResultSubmitted) {
                OnChainState::ResultSubmitted
            } else if amount_ok {
                OnChainState::FundsLocked
            } else {
                OnChainState::FundsOrDatumInvalid
            }
        }
        Redeemer::WithdrawRefund => OnChainState::RefundWithdrawn,
        Redeemer::WithdrawDisputed => OnChainState::DisputedWithdrawn,
        Redeemer::SubmitResult => {
            if matches!(
                new_datum_state,
                Some(SmartContractState::RefundRequested) | Some(SmartContractState::Disputed)
            ) {
                OnChainState::Disputed
            } else {
                OnChainState::ResultSubmitted
            }
        }
        Redeemer::AllowRefund => OnChainState::RefundRequested,
    }
}

/// The new output's amount must cover every requested unit: for lovelace the
/// output must be at least `requested + collateral_return`; for every other
/// unit it must equal the requested quantity exactly (spec §4.3.2).
pub fn amount_is_correct(
    requested: &[Amount],
    collateral_return_lovelace: u64,
    produced: &[Amount],
) -> bool {
    for req in requested {
        let produced_qty = produced
            .iter()
            .find(|p| p.unit == req.unit)
            .map(|p| p.amount)
            .unwrap_or(0);

        if req.unit == "lovelace" {
            if produced_qty < req.amount + collateral_return_lovelace {
                return false;
            }
        } else if produced_qty != req.amount {
            return false;
        }
    }
    true
}

/// Deterministic `(current_action, new_on_chain_state) -> (new_action, error_type?, error_note?)`
/// table for the PaymentRequest (seller) mirror, driving forward progress of
/// its work queue (spec §4.3.2).
pub fn next_payment_action(
    _current: PaymentAction,
    new_state: OnChainState,
) -> (PaymentAction, Option<&'static str>, Option<&'static str>) {
    match new_state {
        OnChainState::FundsLocked => (PaymentAction::WaitingForExternalAction, None, None),
        OnChainState::ResultSubmitted => (PaymentAction::WaitingForExternalAction, None, None),
        OnChainState::RefundRequested | OnChainState::Disputed => {
            (PaymentAction::WaitingForExternalAction, None, None)
        }
        OnChainState::Withdrawn
        | OnChainState::RefundWithdrawn
        | OnChainState::DisputedWithdrawn => (PaymentAction::None, None, None),
        OnChainState::FundsOrDatumInvalid => (
            PaymentAction::WaitingForManualAction,
            Some("invariant"),
            Some("On-chain datum disagreed with the recorded request."),
        ),
    }
}

/// Same table for the PurchaseRequest (buyer) mirror.
pub fn next_purchasing_action(
    _current: PurchasingAction,
    new_state: OnChainState,
) -> (PurchasingAction, Option<&'static str>, Option<&'static str>) {
    match new_state {
        OnChainState::FundsLocked => (PurchasingAction::WaitingForExternalAction, None, None),
        OnChainState::ResultSubmitted => (PurchasingAction::WaitingForExternalAction, None, None),
        OnChainState::RefundRequested => (PurchasingAction::WaitingForExternalAction, None, None),
        OnChainState::Disputed => (PurchasingAction::WaitingForExternalAction, None, None),
        OnChainState::Withdrawn
        | OnChainState::RefundWithdrawn
        | OnChainState::DisputedWithdrawn => (PurchasingAction::None, None, None),
        OnChainState::FundsOrDatumInvalid => (
            PurchasingAction::WaitingForManualAction,
            Some("invariant"),
            Some("On-chain datum disagreed with the recorded request."),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_refund_with_result_hash_yields_result_submitted() {
        let state = resolve_on_chain_state(
            Redeemer::CancelRefundRequest,
            Some(SmartContractState::ResultSubmitted),
            true,
        );
        assert_eq!(state, OnChainState::ResultSubmitted);
    }

    #[test]
    fn cancel_refund_without_result_hash_checks_amount() {
        let ok = resolve_on_chain_state(Redeemer::CancelRefundRequest, None, true);
        assert_eq!(ok, OnChainState::FundsLocked);
        let bad = resolve_on_chain_state(Redeemer::CancelRefundRequest, None, false);
        assert_eq!(bad, OnChainState::FundsOrDatumInvalid);
    }

    #[test]
    fn submit_result_with_dispute_datum_yields_disputed() {
        let state = resolve_on_chain_state(
            Redeemer::SubmitResult,
            Some(SmartContractState::Disputed),
            true,
        );
        assert_eq!(state, OnChainState::Disputed);
    }

    #[test]
    fn amount_correctness_requires_collateral_on_lovelace() {
        let requested = vec![Amount {
            unit: "lovelace".into(),
            amount: 1_000_000,
        }];
        let produced_short = vec![Amount {
            unit: "lovelace".into(),
            amount: 1_000_000,
        }];
        assert!(!amount_is_correct(&requested, 5_000_000, &produced_short));

        let produced_enough = vec![Amount {
            unit: "lovelace".into(),
            amount: 6_000_000,
        }];
        assert!(amount_is_correct(&requested, 5_000_000, &produced_enough));
    }

    #[test]
    fn amount_correctness_requires_exact_match_for_tokens() {
        let requested = vec![Amount {
            unit: "policyassetname".into(),
            amount: 3,
        }];
        let too_many = vec![Amount {
            unit: "policyassetname".into(),
            amount: 4,
        }];
        assert!(!amount_is_correct(&requested, 0, &too_many));
    }
}
