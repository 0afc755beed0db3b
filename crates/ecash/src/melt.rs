//! Melt: redeeming proofs by having the mint pay a Lightning invoice

use lightning_invoice::Bolt11Invoice;
use serde::{Deserialize, Serialize};

use crate::amount::{self, Amount};
use crate::proof::{BlindSignature, BlindedMessage, CurrencyUnit, Proofs, ProofsMethods};

/// State of a melt quote at the mint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MeltQuoteState {
    /// Mint has not attempted (or has abandoned) the payment
    #[default]
    Unpaid,
    /// Payment is in flight
    Pending,
    /// Payment settled; inputs are consumed
    Paid,
}

/// Melt quote request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuoteRequest {
    /// Bolt11 invoice to be paid
    pub request: Bolt11Invoice,
    /// Unit the wallet will pay with
    pub unit: CurrencyUnit,
}

/// Melt quote response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuoteResponse {
    /// Quote id
    pub quote: String,
    /// Amount that must be provided
    pub amount: Amount,
    /// Additional fee reserve required for routing
    pub fee_reserve: Amount,
    /// Quote state
    #[serde(default)]
    pub state: MeltQuoteState,
    /// Unix timestamp until which the quote is valid
    pub expiry: u64,
}

/// Melt request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltRequest {
    /// Quote id
    pub quote: String,
    /// Proofs to be consumed
    pub inputs: Proofs,
    /// Blank outputs for overpaid-fee change; amounts are zero
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<BlindedMessage>>,
}

impl MeltRequest {
    /// Create new [`MeltRequest`]
    pub fn new(quote: String, inputs: Proofs, outputs: Option<Vec<BlindedMessage>>) -> Self {
        Self {
            quote,
            inputs: inputs.without_dleqs(),
            outputs,
        }
    }

    /// Total value of the inputs
    pub fn inputs_amount(&self) -> Result<Amount, amount::Error> {
        self.inputs.total_amount()
    }
}

/// Melt response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltResponse {
    /// Resulting quote state
    pub state: MeltQuoteState,
    /// Preimage of the paid invoice, when the mint shares it
    #[serde(default)]
    pub payment_preimage: Option<String>,
    /// Blind signatures over the blank outputs returning overpaid fees
    #[serde(default)]
    pub change: Option<Vec<BlindSignature>>,
}

impl MeltResponse {
    /// Total value of the returned change, if any
    pub fn change_amount(&self) -> Result<Option<Amount>, amount::Error> {
        self.change
            .as_ref()
            .map(|change| Amount::try_sum(change.iter().map(|sig| sig.amount)))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_melt_quote_state_wire_format() {
        assert_eq!(
            serde_json::to_string(&MeltQuoteState::Unpaid).unwrap(),
            "\"UNPAID\""
        );
        let state: MeltQuoteState = serde_json::from_str("\"PAID\"").unwrap();
        assert_eq!(state, MeltQuoteState::Paid);
    }

    #[test]
    fn test_melt_quote_response_defaults_state() {
        let json = r#"{"quote":"q-1","amount":100,"fee_reserve":2,"expiry":1700000000}"#;
        let response: MeltQuoteResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.state, MeltQuoteState::Unpaid);
        assert_eq!(response.amount, Amount::from(100));
        assert_eq!(response.fee_reserve, Amount::from(2));
    }
}
