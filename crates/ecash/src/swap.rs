//! Swap: exchanging proofs for a fresh set of equal value

use serde::{Deserialize, Serialize};

use crate::amount::{self, Amount};
use crate::proof::{BlindSignature, BlindedMessage, Proofs, ProofsMethods};

/// Swap request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    /// Proofs to be spent
    inputs: Proofs,
    /// Blinded messages for the mint to sign
    outputs: Vec<BlindedMessage>,
}

impl SwapRequest {
    /// Create new [`SwapRequest`]
    pub fn new(inputs: Proofs, outputs: Vec<BlindedMessage>) -> Self {
        Self {
            inputs: inputs.without_dleqs(),
            outputs,
        }
    }

    /// Get inputs (proofs)
    pub fn inputs(&self) -> &Proofs {
        &self.inputs
    }

    /// Get outputs (blinded messages)
    pub fn outputs(&self) -> &Vec<BlindedMessage> {
        &self.outputs
    }

    /// Total value of the inputs
    pub fn input_amount(&self) -> Result<Amount, amount::Error> {
        self.inputs.total_amount()
    }

    /// Total value of the outputs
    pub fn output_amount(&self) -> Result<Amount, amount::Error> {
        Amount::try_sum(self.outputs.iter().map(|output| output.amount))
    }
}

/// Swap response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapResponse {
    /// Blind signatures, in output order
    pub signatures: Vec<BlindSignature>,
}

impl SwapResponse {
    /// Create new [`SwapResponse`]
    pub fn new(signatures: Vec<BlindSignature>) -> Self {
        Self { signatures }
    }

    /// Total value of the signatures
    pub fn signatures_amount(&self) -> Result<Amount, amount::Error> {
        Amount::try_sum(self.signatures.iter().map(|sig| sig.amount))
    }
}
