//! Field-level validation for the downstream API entrypoints (spec §6, §7):
//! invariants I3, I4, I5 rejected before anything reaches persistence or the
//! chain.

use crate::error::EngineError;

fn invalid(field: &str, message: impl Into<String>) -> EngineError {
    EngineError::Validation {
        field: field.to_string(),
        message: message.into(),
    }
}

/// I3: `input_hash` is hex-only, length ≥ `MIN_INPUT_HASH_HEX_LEN`.
pub fn validate_input_hash(hash: &str) -> Result<(), EngineError> {
    if hash.len() < escrow_common::config::MIN_INPUT_HASH_HEX_LEN || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid(
            "input_hash",
            format!(
                "must be hex-only and at least {} characters",
                escrow_common::config::MIN_INPUT_HASH_HEX_LEN
            ),
        ));
    }
    Ok(())
}

/// I4: `pay_by_time < submit_result_time ≤ unlock_time ≤ external_dispute_unlock_time`.
pub fn validate_time_ordering(
    pay_by_time: i64,
    submit_result_time: i64,
    unlock_time: i64,
    external_dispute_unlock_time: i64,
) -> Result<(), EngineError> {
    if pay_by_time >= submit_result_time {
        return Err(invalid("submit_result_time", "must be after pay_by_time"));
    }
    if submit_result_time > unlock_time {
        return Err(invalid("unlock_time", "must not be before submit_result_time"));
    }
    if unlock_time > external_dispute_unlock_time {
        return Err(invalid(
            "external_dispute_unlock_time",
            "must not be before unlock_time",
        ));
    }
    Ok(())
}

/// I5: `collateral_return_lovelace` is 0 or ≥ `MIN_COLLATERAL_LOVELACE`.
pub fn validate_collateral_return(collateral_return_lovelace: u64) -> Result<(), EngineError> {
    if collateral_return_lovelace != 0 && collateral_return_lovelace < escrow_common::config::MIN_COLLATERAL_LOVELACE {
        return Err(invalid(
            "collateral_return_lovelace",
            format!(
                "must be 0 or at least {} lovelace",
                escrow_common::config::MIN_COLLATERAL_LOVELACE
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_hash_rejects_short_or_non_hex() {
        assert!(validate_input_hash(&"a".repeat(55)).is_err());
        assert!(validate_input_hash(&format!("{}zz", "a".repeat(54))).is_err());
        assert!(validate_input_hash(&"a".repeat(56)).is_ok());
    }

    #[test]
    fn time_ordering_requires_strict_pay_by_time() {
        assert!(validate_time_ordering(100, 100, 200, 300).is_err());
        assert!(validate_time_ordering(100, 101, 101, 300).is_ok());
        assert!(validate_time_ordering(100, 200, 150, 300).is_err());
        assert!(validate_time_ordering(100, 200, 300, 250).is_err());
    }

    #[test]
    fn collateral_allows_zero_or_minimum_and_up() {
        assert!(validate_collateral_return(0).is_ok());
        assert!(validate_collateral_return(escrow_common::config::MIN_COLLATERAL_LOVELACE).is_ok());
        assert!(validate_collateral_return(escrow_common::config::MIN_COLLATERAL_LOVELACE - 1).is_err());
    }
}
