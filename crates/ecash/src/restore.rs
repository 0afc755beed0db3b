//! Restore: recovering signatures for previously submitted outputs
//!
//! After an indeterminate network failure the wallet can re-present the
//! blinded messages it originally sent; the mint returns signatures for any
//! it actually processed. Combined with the retained blinding factors and
//! secrets this reconstructs the proofs without re-spending anything.

use serde::{Deserialize, Serialize};

use crate::proof::{BlindSignature, BlindedMessage};

/// Restore request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRequest {
    /// Previously submitted blinded messages
    pub outputs: Vec<BlindedMessage>,
}

/// Restore response
///
/// `outputs` and `signatures` pair positionally; both contain only the
/// entries the mint actually signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResponse {
    /// The subset of submitted outputs the mint recognized
    pub outputs: Vec<BlindedMessage>,
    /// Signatures over those outputs
    pub signatures: Vec<BlindSignature>,
}
