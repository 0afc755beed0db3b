//! Discrete-log-equality proofs
//!
//! A DLEQ proof lets the holder check that a blind signature really was
//! produced with the mint's published key for that denomination, without the
//! mint revealing the key. Verification is opportunistic for the wallet: a
//! failed proof is a strong signal of a misbehaving mint, but the protocol
//! does not require it to block spending.

use std::ops::Deref;

use bitcoin::secp256k1::Scalar;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dhke::{hash_e, hash_to_curve};
use crate::keys::{PublicKey, SecretKey};
use crate::proof::Proof;
use crate::SECP256K1;

/// DLEQ error
#[derive(Debug, Error)]
pub enum Error {
    /// Proof carries no DLEQ data
    #[error("No DLEQ proof provided")]
    MissingDleqProof,
    /// Challenge does not re-derive
    #[error("Invalid DLEQ proof")]
    InvalidDleqProof,
    /// Secp256k1 error
    #[error(transparent)]
    Secp256k1(#[from] bitcoin::secp256k1::Error),
    /// DHKE error
    #[error(transparent)]
    Dhke(#[from] crate::dhke::Error),
}

/// DLEQ data attached to a blind signature by the mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignatureDleq {
    /// Challenge
    pub e: SecretKey,
    /// Response
    pub s: SecretKey,
}

/// DLEQ data carried in a proof
///
/// Extends [`BlindSignatureDleq`] with the blinding factor `r`, which the
/// holder needs to reconstruct the blinded pair the challenge commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofDleq {
    /// Challenge
    pub e: SecretKey,
    /// Response
    pub s: SecretKey,
    /// Blinding factor
    pub r: SecretKey,
}

impl ProofDleq {
    /// Create new [`ProofDleq`]
    pub fn new(e: SecretKey, s: SecretKey, r: SecretKey) -> Self {
        Self { e, s, r }
    }
}

/// `A - B` on the curve
fn point_sub(a: &PublicKey, b: &PublicKey) -> Result<PublicKey, Error> {
    let neg_b: bitcoin::secp256k1::PublicKey = b.negate(&SECP256K1);
    Ok(a.combine(&neg_b)?.into())
}

/// `k * P` on the curve
fn point_mul(p: &PublicKey, k: &SecretKey) -> Result<PublicKey, Error> {
    let scalar = Scalar::from(k.deref().to_owned());
    Ok(p.mul_tweak(&SECP256K1, &scalar)?.into())
}

/// Verify a DLEQ proof over a blinded message / blind signature pair.
///
/// Recomputes `R1 = s*G - e*K` and `R2 = s*B' - e*C'` and checks that the
/// challenge `e` equals `hash_e(R1, R2, K, C')`.
pub fn verify_dleq(
    blinded_message: &PublicKey,
    blinded_signature: &PublicKey,
    e: &SecretKey,
    s: &SecretKey,
    mint_pubkey: &PublicKey,
) -> Result<(), Error> {
    let r1 = point_sub(&s.public_key(), &point_mul(mint_pubkey, e)?)?;
    let r2 = point_sub(&point_mul(blinded_message, s)?, &point_mul(blinded_signature, e)?)?;

    let challenge = hash_e(vec![r1, r2, *mint_pubkey, *blinded_signature]);

    if e.to_secret_bytes() != challenge {
        tracing::warn!("DLEQ challenge did not re-derive");
        return Err(Error::InvalidDleqProof);
    }

    Ok(())
}

/// Produce a DLEQ proof for a signature (the mint's half; used by tests)
pub fn calculate_dleq(
    blinded_signature: &PublicKey,
    blinded_message: &PublicKey,
    mint_secret_key: &SecretKey,
) -> Result<BlindSignatureDleq, Error> {
    // Random nonce
    let nonce = SecretKey::generate();

    let r1 = nonce.public_key();
    let r2 = point_mul(blinded_message, &nonce)?;

    let e = hash_e(vec![r1, r2, mint_secret_key.public_key(), *blinded_signature]);
    let e_sk = SecretKey::from_slice(&e).map_err(|_| Error::InvalidDleqProof)?;

    // s = nonce + e * k
    let s: SecretKey = mint_secret_key
        .deref()
        .mul_tweak(&Scalar::from(e_sk.deref().to_owned()))?
        .add_tweak(&Scalar::from(nonce.deref().to_owned()))?
        .into();

    Ok(BlindSignatureDleq { e: e_sk, s })
}

impl Proof {
    /// Verify this proof's DLEQ data against the mint key for its amount.
    ///
    /// Reconstructs the blinded pair from the retained blinding factor:
    /// `B' = Y + r*G` and `C' = C + r*K`.
    pub fn verify_dleq(&self, mint_pubkey: &PublicKey) -> Result<(), Error> {
        let dleq = self.dleq.as_ref().ok_or(Error::MissingDleqProof)?;

        let y = hash_to_curve(self.secret.as_bytes())?;
        let blinded_message: PublicKey = y.combine(&dleq.r.public_key())?.into();
        let blinded_signature: PublicKey =
            self.c.combine(&*point_mul(mint_pubkey, &dleq.r)?)?.into();

        verify_dleq(
            &blinded_message,
            &blinded_signature,
            &dleq.e,
            &dleq.s,
            mint_pubkey,
        )
    }
}
