//! Ecash shared types and crypto utilities.
//!
//! This crate is the protocol foundation for the mintpay wallet core: the
//! blind Diffie-Hellman key exchange used to issue and redeem bearer tokens,
//! the amount/denomination math, and the wire types spoken with a mint.
//!
//! It carries no network or storage dependencies; everything here is usable
//! from synchronous code and from tests that play the mint side themselves.

pub mod amount;
pub mod dhke;
pub mod dleq;
pub mod keys;
pub mod keyset;
pub mod melt;
pub mod mint_url;
pub mod proof;
pub mod restore;
pub mod secret;
pub mod swap;
pub mod token;
pub mod util;

// re-exporting external crates
pub use lightning_invoice::{self, Bolt11Invoice};
pub use {bitcoin, serde_json};

pub use self::amount::Amount;
pub use self::dleq::{BlindSignatureDleq, ProofDleq};
pub use self::keys::{Keys, PublicKey, SecretKey};
pub use self::keyset::{Id, KeySet, KeySetInfo, KeysResponse, KeysetResponse};
pub use self::melt::{MeltQuoteRequest, MeltQuoteResponse, MeltQuoteState, MeltRequest, MeltResponse};
pub use self::mint_url::MintUrl;
pub use self::proof::{
    BlindSignature, BlindedMessage, CheckStateRequest, CheckStateResponse, CurrencyUnit, PreMint,
    PreMintSecrets, Proof, ProofState, Proofs, ProofsMethods, State,
};
pub use self::restore::{RestoreRequest, RestoreResponse};
pub use self::secret::Secret;
pub use self::swap::{SwapRequest, SwapResponse};
pub use self::token::Token;
pub use self::util::SECP256K1;
