//! Proofs, blinded messages and output material
//!
//! A [`Proof`] is one spendable unit of value: the holder's secret plus the
//! mint's unblinded signature over it. Proofs are immutable once
//! constructed and are logically destroyed the moment they are submitted as
//! inputs to a swap or melt; a spent proof must never be offered again.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::amount::{self, blank_output_count, Amount};
use crate::dhke::{self, blind_message, hash_to_curve};
use crate::dleq::ProofDleq;
use crate::keys::{PublicKey, SecretKey};
use crate::keyset::Id;
use crate::secret::Secret;

/// Currency unit a token or keyset is denominated in
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CurrencyUnit {
    /// Satoshi
    #[default]
    Sat,
    /// Millisatoshi
    Msat,
    /// US cent
    Usd,
    /// Euro cent
    Eur,
    /// Other unit
    Custom(String),
}

impl FromStr for CurrencyUnit {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sat" => Ok(Self::Sat),
            "msat" => Ok(Self::Msat),
            "usd" => Ok(Self::Usd),
            "eur" => Ok(Self::Eur),
            _ => Ok(Self::Custom(s.to_string())),
        }
    }
}

impl fmt::Display for CurrencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrencyUnit::Sat => write!(f, "sat"),
            CurrencyUnit::Msat => write!(f, "msat"),
            CurrencyUnit::Usd => write!(f, "usd"),
            CurrencyUnit::Eur => write!(f, "eur"),
            CurrencyUnit::Custom(unit) => write!(f, "{unit}"),
        }
    }
}

impl Serialize for CurrencyUnit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CurrencyUnit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str(&s).expect("infallible"))
    }
}

/// Blinded message: what the wallet sends the mint to sign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindedMessage {
    /// Amount
    pub amount: Amount,
    /// Keyset id the output is to be signed under
    #[serde(rename = "id")]
    pub keyset_id: Id,
    /// Blinded secret message (`B_`)
    #[serde(rename = "B_")]
    pub b: PublicKey,
}

impl BlindedMessage {
    /// Create new [`BlindedMessage`]
    pub fn new(amount: Amount, keyset_id: Id, b: PublicKey) -> Self {
        Self {
            amount,
            keyset_id,
            b,
        }
    }
}

/// Blind signature ("promise") returned by the mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignature {
    /// Amount
    pub amount: Amount,
    /// Keyset id the signature was made under
    #[serde(rename = "id")]
    pub keyset_id: Id,
    /// Blinded signature (`C_`) on the blinded secret
    #[serde(rename = "C_")]
    pub c: PublicKey,
    /// DLEQ proof over the signature
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dleq: Option<crate::dleq::BlindSignatureDleq>,
}

/// Proof: one spendable unit of ecash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Amount
    pub amount: Amount,
    /// Keyset id
    #[serde(rename = "id")]
    pub keyset_id: Id,
    /// Secret message
    pub secret: Secret,
    /// Unblinded signature
    #[serde(rename = "C")]
    pub c: PublicKey,
    /// DLEQ proof, if the mint supplied one
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dleq: Option<ProofDleq>,
}

impl Proof {
    /// Create new [`Proof`]
    pub fn new(amount: Amount, keyset_id: Id, secret: Secret, c: PublicKey) -> Self {
        Proof {
            amount,
            keyset_id,
            secret,
            c,
            dleq: None,
        }
    }

    /// The proof's public identifier: `Y = hash_to_curve(secret)`
    ///
    /// This is what state checks are keyed by; it identifies the proof to
    /// the mint without revealing the secret.
    pub fn y(&self) -> Result<PublicKey, dhke::Error> {
        hash_to_curve(self.secret.as_bytes())
    }
}

impl std::hash::Hash for Proof {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.secret.hash(state);
    }
}

impl Ord for Proof {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.amount.cmp(&other.amount)
    }
}

impl PartialOrd for Proof {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// List of [`Proof`]s
pub type Proofs = Vec<Proof>;

/// Extension helpers over proof lists
pub trait ProofsMethods {
    /// Try to sum up the amounts of all proofs
    fn total_amount(&self) -> Result<Amount, amount::Error>;

    /// The public identifiers (Ys) of all proofs, in order
    fn ys(&self) -> Result<Vec<PublicKey>, dhke::Error>;

    /// Count proofs by keyset
    fn count_by_keyset(&self) -> HashMap<Id, u64>;

    /// A copy of the proofs without DLEQ data (inputs to the mint do not
    /// need to carry it)
    fn without_dleqs(&self) -> Proofs;
}

impl ProofsMethods for Proofs {
    fn total_amount(&self) -> Result<Amount, amount::Error> {
        Amount::try_sum(self.iter().map(|p| p.amount))
    }

    fn ys(&self) -> Result<Vec<PublicKey>, dhke::Error> {
        self.iter().map(Proof::y).collect()
    }

    fn count_by_keyset(&self) -> HashMap<Id, u64> {
        let mut counts = HashMap::new();
        for proof in self.iter() {
            *counts.entry(proof.keyset_id).or_default() += 1;
        }
        counts
    }

    fn without_dleqs(&self) -> Proofs {
        self.iter()
            .map(|p| {
                let mut p = p.clone();
                p.dleq = None;
                p
            })
            .collect()
    }
}

/// One pending output: the blinded message together with the material needed
/// to unblind its eventual signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreMint {
    /// Blinded message
    pub blinded_message: BlindedMessage,
    /// Secret
    pub secret: Secret,
    /// Blinding factor
    pub r: SecretKey,
    /// Amount
    pub amount: Amount,
}

/// Output material for one request.
///
/// The secrets, blinding factors and blinded messages are one positional
/// tuple list, paired with the mint's returned signatures by index. They are
/// kept together (and persisted together in failure records) because
/// unblinding requires exactly this pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreMintSecrets {
    /// Pending outputs
    pub secrets: Vec<PreMint>,
    /// Keyset the outputs will be signed under
    pub keyset_id: Id,
}

impl PreMintSecrets {
    /// Outputs with fresh random secrets, one per amount
    pub fn random(keyset_id: Id, amounts: &[Amount]) -> Result<Self, dhke::Error> {
        let mut output = Vec::with_capacity(amounts.len());

        for amount in amounts {
            let secret = Secret::generate();
            let (blinded, r) = blind_message(secret.as_bytes(), None)?;

            output.push(PreMint {
                blinded_message: BlindedMessage::new(*amount, keyset_id, blinded),
                secret,
                r,
                amount: *amount,
            });
        }

        Ok(PreMintSecrets {
            secrets: output,
            keyset_id,
        })
    }

    /// Blank outputs for overpaid-fee change.
    ///
    /// The mint assigns each blank output's value after the fact, so the
    /// amounts here are zero and only the count matters.
    pub fn blank(keyset_id: Id, fee_reserve: Amount) -> Result<Self, dhke::Error> {
        let count = blank_output_count(fee_reserve);

        let mut output = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let secret = Secret::generate();
            let (blinded, r) = blind_message(secret.as_bytes(), None)?;

            output.push(PreMint {
                blinded_message: BlindedMessage::new(Amount::ZERO, keyset_id, blinded),
                secret,
                r,
                amount: Amount::ZERO,
            });
        }

        Ok(PreMintSecrets {
            secrets: output,
            keyset_id,
        })
    }

    /// Number of pending outputs
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Whether there are no pending outputs
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Total amount across outputs
    pub fn total_amount(&self) -> Result<Amount, amount::Error> {
        Amount::try_sum(self.secrets.iter().map(|pm| pm.amount))
    }

    /// The blinded messages, in order
    pub fn blinded_messages(&self) -> Vec<BlindedMessage> {
        self.secrets.iter().map(|pm| pm.blinded_message.clone()).collect()
    }

    /// The secrets, in order
    pub fn secrets(&self) -> Vec<Secret> {
        self.secrets.iter().map(|pm| pm.secret.clone()).collect()
    }

    /// The blinding factors, in order
    pub fn rs(&self) -> Vec<SecretKey> {
        self.secrets.iter().map(|pm| pm.r.clone()).collect()
    }
}

/// Spend state of a proof as reported by the mint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum State {
    /// Never seen by the mint
    Unspent,
    /// Part of an in-flight operation
    Pending,
    /// Consumed; the secret is burned
    Spent,
    /// Local-only: reserved by this wallet for an operation in progress,
    /// never reported by a mint
    Reserved,
}

/// State check request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStateRequest {
    /// Public identifiers (Ys) of the proofs to check
    #[serde(rename = "Ys")]
    pub ys: Vec<PublicKey>,
}

/// State of one checked proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofState {
    /// Public identifier of the proof
    #[serde(rename = "Y")]
    pub y: PublicKey,
    /// Spend state
    pub state: State,
    /// Witness data, if any was supplied on spend
    #[serde(default)]
    pub witness: Option<String>,
}

/// State check response
///
/// States are returned in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStateResponse {
    /// Proof states
    pub states: Vec<ProofState>,
}
