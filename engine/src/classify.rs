use escrow_chain_adapter::{TxInfo, Utxo};

/// Classification of a transaction touching the script address (spec §4.3
/// step 4). The Sync Loop dispatches differently per variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxClass<'a> {
    /// Any output paying the script carries a reference script, or the
    /// script input/output shape matches none of the allowed patterns.
    Invalid,
    /// Zero script inputs, at least one script output, zero redeemers: a new
    /// escrow is being opened.
    Initial { script_outputs: Vec<&'a Utxo> },
    /// Exactly one script input, exactly one redeemer, at most one script
    /// output: an existing escrow transitions state.
    Transition {
        script_input: &'a Utxo,
        script_output: Option<&'a Utxo>,
    },
}

/// Classify `tx` against `script_address`. `redeemer_count` is the number of
/// redeemers attached to the transaction — the Chain Adapter does not expose
/// redeemers directly, so callers derive this from `raw_body_bytes` parsing
/// (outside this module's concern) and pass it in.
pub fn classify<'a>(tx: &'a TxInfo, script_address: &str, redeemer_count: usize) -> TxClass<'a> {
    let script_inputs: Vec<&Utxo> = tx
        .inputs
        .iter()
        .filter(|u| u.address == script_address)
        .collect();
    let script_outputs: Vec<&Utxo> = tx
        .outputs
        .iter()
        .filter(|u| u.address == script_address)
        .collect();

    if script_outputs
        .iter()
        .any(|u| u.reference_script_hash.is_some())
    {
        return TxClass::Invalid;
    }

    if script_inputs.is_empty() && !script_outputs.is_empty() && redeemer_count == 0 {
        return TxClass::Initial { script_outputs };
    }

    if script_inputs.len() == 1 && redeemer_count == 1 && script_outputs.len() <= 1 {
        return TxClass::Transition {
            script_input: script_inputs[0],
            script_output: script_outputs.into_iter().next(),
        };
    }

    TxClass::Invalid
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_chain_adapter::TxInfo;

    fn utxo(address: &str, reference_script: bool) -> Utxo {
        Utxo {
            tx_hash: "h".into(),
            output_index: 0,
            address: address.into(),
            amounts: vec![],
            inline_datum: None,
            reference_script_hash: if reference_script {
                Some(escrow_common::Hash::sha256(b"ref"))
            } else {
                None
            },
            collateral: false,
        }
    }

    fn tx(inputs: Vec<Utxo>, outputs: Vec<Utxo>) -> TxInfo {
        TxInfo {
            tx_hash: "h".into(),
            block_hash: "b".into(),
            confirmations: 10,
            inputs,
            outputs,
            raw_body_bytes: vec![],
        }
    }

    #[test]
    fn zero_inputs_one_output_zero_redeemers_is_initial() {
        let t = tx(vec![], vec![utxo("script", false)]);
        assert!(matches!(classify(&t, "script", 0), TxClass::Initial { .. }));
    }

    #[test]
    fn one_input_one_redeemer_is_transition() {
        let t = tx(vec![utxo("script", false)], vec![utxo("script", false)]);
        assert!(matches!(classify(&t, "script", 1), TxClass::Transition { .. }));
    }

    #[test]
    fn reference_script_output_is_invalid() {
        let t = tx(vec![], vec![utxo("script", true)]);
        assert_eq!(classify(&t, "script", 0), TxClass::Invalid);
    }

    #[test]
    fn two_script_inputs_is_invalid() {
        let t = tx(
            vec![utxo("script", false), utxo("script", false)],
            vec![utxo("script", false)],
        );
        assert_eq!(classify(&t, "script", 1), TxClass::Invalid);
    }
}
