//! Blind Diffie-Hellman key exchange
//!
//! The core issuance scheme: the holder blinds a secret, the mint signs the
//! blinded point without ever seeing the secret, and the holder unblinds the
//! signature into a spendable proof. Sign/verify are the mint's half and are
//! exported so tests can play the mint.

use std::ops::Deref;

use bitcoin::hashes::sha256::Hash as Sha256Hash;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Parity, PublicKey as NormalizedPublicKey, Scalar, XOnlyPublicKey};
use thiserror::Error;

use crate::dleq::ProofDleq;
use crate::keys::{Keys, PublicKey, SecretKey};
use crate::proof::{BlindSignature, Proof, Proofs};
use crate::secret::Secret;
use crate::util::hex;
use crate::SECP256K1;

const DOMAIN_SEPARATOR: &[u8; 28] = b"Secp256k1_HashToCurve_Cashu_";

/// DHKE error
#[derive(Debug, Error)]
pub enum Error {
    /// Signature does not verify against the key
    #[error("Token not verified")]
    TokenNotVerified,
    /// Hash-to-curve exhausted its counter without finding a point
    #[error("No valid point found")]
    NoValidPoint,
    /// Output material arrays are not the same length
    #[error("Mismatched lengths: `{promises}` promises, `{rs}` blinding factors, `{secrets}` secrets")]
    LengthMismatch {
        /// Number of blind signatures
        promises: usize,
        /// Number of blinding factors
        rs: usize,
        /// Number of secrets
        secrets: usize,
    },
    /// Keyset has no key for the denomination
    #[error("No key for amount `{0}`")]
    AmountKey(crate::Amount),
    /// Secp256k1 error
    #[error(transparent)]
    Secp256k1(#[from] bitcoin::secp256k1::Error),
}

/// Deterministically map a message to a point on the secp256k1 curve.
///
/// Hashes the domain-separated message, then appends an incrementing
/// counter until the result parses as a valid x coordinate.
pub fn hash_to_curve(message: &[u8]) -> Result<PublicKey, Error> {
    let msg_to_hash: Vec<u8> = [DOMAIN_SEPARATOR, message].concat();

    let msg_hash: [u8; 32] = Sha256Hash::hash(&msg_to_hash).to_byte_array();

    let mut counter: u32 = 0;
    while counter < 2_u32.pow(16) {
        let mut bytes_to_hash: Vec<u8> = Vec::with_capacity(36);
        bytes_to_hash.extend_from_slice(&msg_hash);
        bytes_to_hash.extend_from_slice(&counter.to_le_bytes());
        let hash: [u8; 32] = Sha256Hash::hash(&bytes_to_hash).to_byte_array();

        match XOnlyPublicKey::from_slice(&hash) {
            Ok(pk) => {
                return Ok(NormalizedPublicKey::from_x_only_public_key(pk, Parity::Even).into())
            }
            Err(_) => {
                counter += 1;
            }
        }
    }

    Err(Error::NoValidPoint)
}

/// Hash an ordered list of public keys into a 32 byte challenge
pub fn hash_e<I>(public_keys: I) -> [u8; 32]
where
    I: IntoIterator<Item = PublicKey>,
{
    let mut e: String = String::new();

    for public_key in public_keys.into_iter() {
        let uncompressed: [u8; 65] = public_key.to_uncompressed_bytes();
        e.push_str(&hex::encode(uncompressed));
    }

    Sha256Hash::hash(e.as_bytes()).to_byte_array()
}

/// Blind a message
///
/// `B_ = Y + rG`
pub fn blind_message(
    secret: &[u8],
    blinding_factor: Option<SecretKey>,
) -> Result<(PublicKey, SecretKey), Error> {
    let y: PublicKey = hash_to_curve(secret)?;
    let r: SecretKey = blinding_factor.unwrap_or_else(SecretKey::generate);
    Ok((y.combine(&r.public_key())?.into(), r))
}

/// Unblind a signature
///
/// `C = C_ - rK`
pub fn unblind_message(
    // C_
    blinded_key: &PublicKey,
    r: &SecretKey,
    // K
    mint_pubkey: &PublicKey,
) -> Result<PublicKey, Error> {
    let r: Scalar = Scalar::from(r.deref().to_owned());

    // a = r * K
    let a: PublicKey = mint_pubkey.mul_tweak(&SECP256K1, &r)?.into();

    // C_ - a
    let a: PublicKey = a.negate(&SECP256K1).into();
    Ok(blinded_key.combine(&a)?.into())
}

/// Unblind a batch of blind signatures into proofs.
///
/// `promises`, `rs` and `secrets` are one positional tuple list: element `i`
/// of each belongs to the same output. They must never be reordered
/// independently of each other; a silent mismatch would produce unspendable
/// or wrong-value proofs, so any length difference is rejected outright.
pub fn construct_proofs(
    promises: Vec<BlindSignature>,
    rs: Vec<SecretKey>,
    secrets: Vec<Secret>,
    keys: &Keys,
) -> Result<Proofs, Error> {
    if (promises.len() != rs.len()) || (promises.len() != secrets.len()) {
        return Err(Error::LengthMismatch {
            promises: promises.len(),
            rs: rs.len(),
            secrets: secrets.len(),
        });
    }

    let mut proofs = Vec::with_capacity(promises.len());
    for ((blinded_signature, r), secret) in promises.into_iter().zip(rs).zip(secrets) {
        let blinded_c: PublicKey = blinded_signature.c;
        let a: PublicKey = keys
            .amount_key(blinded_signature.amount)
            .ok_or(Error::AmountKey(blinded_signature.amount))?;

        let unblinded_signature: PublicKey = unblind_message(&blinded_c, &r, &a)?;

        let dleq = blinded_signature
            .dleq
            .map(|d| ProofDleq::new(d.e, d.s, r.clone()));

        proofs.push(Proof {
            amount: blinded_signature.amount,
            keyset_id: blinded_signature.keyset_id,
            secret,
            c: unblinded_signature,
            dleq,
        });
    }

    Ok(proofs)
}

/// Sign a blinded message (the mint's half)
///
/// `C_ = k * B_`, where `k` is the mint's private key for the denomination.
#[inline]
pub fn sign_message(k: &SecretKey, blinded_message: &PublicKey) -> Result<PublicKey, Error> {
    let k: Scalar = Scalar::from(k.deref().to_owned());
    Ok(blinded_message.mul_tweak(&SECP256K1, &k)?.into())
}

/// Verify an unblinded signature against the signing key and message
pub fn verify_message(
    a: &SecretKey,
    unblinded_message: PublicKey,
    msg: &[u8],
) -> Result<(), Error> {
    // Y
    let y: PublicKey = hash_to_curve(msg)?;

    let expected: PublicKey = y
        .mul_tweak(&SECP256K1, &Scalar::from(*a.deref()))?
        .into();

    if unblinded_message == expected {
        return Ok(());
    }

    Err(Error::TokenNotVerified)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::str::FromStr;

    use super::*;
    use crate::keyset::Id;
    use crate::Amount;

    #[test]
    fn test_hash_to_curve_vectors() {
        let secret = "0000000000000000000000000000000000000000000000000000000000000000";
        let y = hash_to_curve(&hex::decode(secret).unwrap()).unwrap();
        assert_eq!(
            y,
            PublicKey::from_hex("024cce997d3b518f739663b757deaec95bcd9473c30a14ac2fd04023a739d1a725")
                .unwrap()
        );

        let secret = "0000000000000000000000000000000000000000000000000000000000000001";
        let y = hash_to_curve(&hex::decode(secret).unwrap()).unwrap();
        assert_eq!(
            y,
            PublicKey::from_hex("022e7158e11c9506f1aa4248bf531298daa7febd6194f003edcd9b93ade6253acf")
                .unwrap()
        );

        // This message takes a few counter iterations before a valid point
        // is found, exercising the loop.
        let secret = "0000000000000000000000000000000000000000000000000000000000000002";
        let y = hash_to_curve(&hex::decode(secret).unwrap()).unwrap();
        assert_eq!(
            y,
            PublicKey::from_hex("026cdbe15362df59cd1dd3c9c11de8aedac2106eca69236ecd9fbe117af897be4f")
                .unwrap()
        );
    }

    #[test]
    fn test_blind_message_vectors() {
        let message =
            hex::decode("d341ee4871f1f889041e63cf0d3823c713eea6aff01e80f1719f08f9e5be98f6")
                .unwrap();
        let sec: SecretKey =
            SecretKey::from_hex("99fce58439fc37412ab3468b73db0569322588f62fb3a49182d67e23d877824a")
                .unwrap();

        let (b, r) = blind_message(&message, Some(sec.clone())).unwrap();

        assert_eq!(sec, r);
        assert_eq!(
            b,
            PublicKey::from_hex("033b1a9737a40cc3fd9b6af4b723632b76a67a36782596304612a6c2bfb5197e6d")
                .unwrap()
        );
    }

    #[test]
    fn test_unblind_message_vector() {
        let blinded_key =
            PublicKey::from_hex("02a9acc1e48c25eeeb9289b5031cc57da9fe72f3fe2861d264bdc074209b107ba2")
                .unwrap();
        let r =
            SecretKey::from_hex("0000000000000000000000000000000000000000000000000000000000000001")
                .unwrap();
        let a =
            PublicKey::from_hex("020000000000000000000000000000000000000000000000000000000000000001")
                .unwrap();

        let unblinded = unblind_message(&blinded_key, &r, &a).unwrap();

        assert_eq!(
            unblinded,
            PublicKey::from_hex("03c724d7e6a5443b39ac8acf11f40420adc4f99a02e7cc1b57703d9391f6d129cd")
                .unwrap()
        );
    }

    #[test]
    fn test_blind_sign_unblind_verify_is_identity() {
        let message =
            hex::decode("d341ee4871f1f889041e63cf0d3823c713eea6aff01e80f1719f08f9e5be98f6")
                .unwrap();
        let holder_blinding_factor: SecretKey =
            SecretKey::from_hex("99fce58439fc37412ab3468b73db0569322588f62fb3a49182d67e23d877824a")
                .unwrap();

        let (b, r) = blind_message(&message, Some(holder_blinding_factor)).unwrap();

        let mint_key =
            SecretKey::from_hex("0000000000000000000000000000000000000000000000000000000000000001")
                .unwrap();

        let signed = sign_message(&mint_key, &b).unwrap();
        let unblinded = unblind_message(&signed, &r, &mint_key.public_key()).unwrap();

        assert!(verify_message(&mint_key, unblinded, &message).is_ok());
    }

    #[test]
    fn test_verify_rejects_wrong_key_and_message() {
        let message = b"an ecash secret";
        let correct_key = SecretKey::generate();
        let wrong_key = SecretKey::generate();

        let (blinded, r) = blind_message(message, None).unwrap();
        let signed = sign_message(&correct_key, &blinded).unwrap();
        let unblinded = unblind_message(&signed, &r, &correct_key.public_key()).unwrap();

        assert!(verify_message(&correct_key, unblinded, message).is_ok());
        assert!(verify_message(&wrong_key, unblinded, message).is_err());
        assert!(verify_message(&correct_key, unblinded, b"a different secret").is_err());
    }

    #[test]
    fn test_construct_proofs_rejects_length_mismatch() {
        let secret_key = SecretKey::generate();
        let mut keys_map = BTreeMap::new();
        keys_map.insert(Amount::from(1), secret_key.public_key());
        let keys = Keys::new(keys_map);

        let promise = BlindSignature {
            amount: Amount::from(1),
            keyset_id: Id::from_str("009a1f293253e41e").unwrap(),
            c: secret_key.public_key(),
            dleq: None,
        };

        // Two blinding factors for a single promise
        let result = construct_proofs(
            vec![promise],
            vec![SecretKey::generate(), SecretKey::generate()],
            vec![Secret::generate()],
            &keys,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_construct_proofs_pairs_positionally() {
        let keyset_id = Id::from_str("009a1f293253e41e").unwrap();
        let mint_key = SecretKey::generate();
        let mut keys_map = BTreeMap::new();
        keys_map.insert(Amount::from(1), mint_key.public_key());
        let keys = Keys::new(keys_map);

        let mut promises = Vec::new();
        let mut rs = Vec::new();
        let mut secrets = Vec::new();
        for _ in 0..3 {
            let secret = Secret::generate();
            let (blinded, r) = blind_message(secret.as_bytes(), None).unwrap();
            promises.push(BlindSignature {
                amount: Amount::from(1),
                keyset_id,
                c: sign_message(&mint_key, &blinded).unwrap(),
                dleq: None,
            });
            rs.push(r);
            secrets.push(secret);
        }

        let proofs = construct_proofs(promises, rs, secrets, &keys).unwrap();
        assert_eq!(proofs.len(), 3);

        for proof in proofs {
            assert!(verify_message(&mint_key, proof.c, proof.secret.as_bytes()).is_ok());
        }
    }
}
