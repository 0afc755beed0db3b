//! Keysets and keyset ID
//!
//! A keyset id is derived from the keys themselves, so key material for a
//! known id can be cached indefinitely: a mint cannot change the keys behind
//! an id without changing the id.

use std::array::TryFromSliceError;
use std::fmt;
use std::str::FromStr;

use bitcoin::hashes::sha256::Hash as Sha256;
use bitcoin::hashes::Hash;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::keys::{Keys, PublicKey};
use crate::proof::CurrencyUnit;
use crate::util::hex;
use crate::Amount;

/// Keyset error
#[derive(Debug, Error)]
pub enum Error {
    /// Hex Error
    #[error(transparent)]
    Hex(#[from] hex::Error),
    /// Keyset id length invalid
    #[error("Keyset id length invalid")]
    Length,
    /// Unknown keyset id version
    #[error("Unknown keyset id version")]
    UnknownVersion,
    /// Slice error
    #[error(transparent)]
    Slice(#[from] TryFromSliceError),
    /// Keyset id does not match the derived id of the keys
    #[error("Keyset id `{expected}` does not match keys (derived `{derived}`)")]
    IdMismatch {
        /// Id the keyset claims
        expected: Id,
        /// Id derived from the key material
        derived: Id,
    },
}

/// Keyset version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeySetVersion {
    /// Current version 00
    Version00,
}

impl KeySetVersion {
    /// [`KeySetVersion`] to byte
    pub fn to_byte(&self) -> u8 {
        match self {
            Self::Version00 => 0,
        }
    }

    /// [`KeySetVersion`] from byte
    pub fn from_byte(byte: &u8) -> Result<Self, Error> {
        match byte {
            0 => Ok(Self::Version00),
            _ => Err(Error::UnknownVersion),
        }
    }
}

impl fmt::Display for KeySetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySetVersion::Version00 => f.write_str("00"),
        }
    }
}

/// A keyset id: a version byte followed by a hash of the keyset's public
/// keys. Derivable by anyone holding the keys, and stored in every proof to
/// identify the keyset it was issued under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id {
    version: KeySetVersion,
    id: [u8; Self::BYTELEN],
}

impl Id {
    const STRLEN: usize = 14;
    const BYTELEN: usize = 7;

    /// [`Id`] to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        [vec![self.version.to_byte()], self.id.to_vec()].concat()
    }

    /// [`Id`] from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != Self::BYTELEN + 1 {
            return Err(Error::Length);
        }
        Ok(Self {
            version: KeySetVersion::from_byte(&bytes[0])?,
            id: bytes[1..].try_into()?,
        })
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.version, hex::encode(self.id))
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::STRLEN + 2 {
            return Err(Error::Length);
        }

        Ok(Self {
            version: KeySetVersion::from_byte(&hex::decode(&s[..2])?[0])?,
            id: hex::decode(&s[2..])?
                .try_into()
                .map_err(|_| Error::Length)?,
        })
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Id::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<&Keys> for Id {
    fn from(keys: &Keys) -> Self {
        // 1. sort the public keys by their denomination, ascending
        // 2. concatenate the compressed key bytes
        // 3. SHA-256 the concatenation
        // 4. the id is a version byte plus the first 7 bytes of the hash
        let mut entries: Vec<(&Amount, &PublicKey)> = keys.iter().collect();
        entries.sort_by_key(|(amount, _)| **amount);

        let pubkeys_concat: Vec<u8> = entries
            .iter()
            .flat_map(|(_, pubkey)| pubkey.to_bytes())
            .collect();

        let hash = Sha256::hash(&pubkeys_concat);

        Self {
            version: KeySetVersion::Version00,
            id: hash.to_byte_array()[0..Self::BYTELEN]
                .try_into()
                .expect("7 bytes of a 32 byte hash"),
        }
    }
}

/// Keyset: the full key material published for one id
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeySet {
    /// Keyset [`Id`]
    pub id: Id,
    /// Keyset [`CurrencyUnit`]
    pub unit: CurrencyUnit,
    /// Keyset [`Keys`]
    pub keys: Keys,
}

impl KeySet {
    /// Verify that the claimed id matches the key material
    pub fn verify_id(&self) -> Result<(), Error> {
        let derived = Id::from(&self.keys);
        if derived != self.id {
            return Err(Error::IdMismatch {
                expected: self.id,
                derived,
            });
        }
        Ok(())
    }
}

/// Response to a request for a keyset's keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysResponse {
    /// The requested keysets
    pub keysets: Vec<KeySet>,
}

/// Keyset summary as listed by the mint
#[derive(Debug, Clone, Hash, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeySetInfo {
    /// Keyset [`Id`]
    pub id: Id,
    /// Keyset [`CurrencyUnit`]
    pub unit: CurrencyUnit,
    /// Whether the mint will sign new outputs against this keyset
    pub active: bool,
    /// Input fee, per thousand proofs spent
    #[serde(default)]
    pub input_fee_ppk: u64,
}

/// Keysets listing response
///
/// Entries that fail to parse (malformed ids, unknown versions) are dropped
/// rather than failing the whole listing: a mint advertising one future
/// keyset version must not make its current keysets unusable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeysetResponse {
    /// Keysets the mint currently lists
    pub keysets: Vec<KeySetInfo>,
}

impl<'de> Deserialize<'de> for KeysetResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            keysets: Vec<serde_json::Value>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let keysets = raw
            .keysets
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<KeySetInfo>(value) {
                Ok(info) => Some(info),
                Err(err) => {
                    tracing::warn!("Skipping malformed keyset entry: {}", err);
                    None
                }
            })
            .collect();

        Ok(Self { keysets })
    }
}
