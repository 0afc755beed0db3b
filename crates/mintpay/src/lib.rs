//! Merchant-side Chaumian ecash wallet core.
//!
//! Holds, splits, swaps and redeems bearer tokens against a mint on behalf
//! of a merchant store:
//!
//! - [`wallet::Wallet`] drives the three mint operations (swap, melt,
//!   restore) plus proof state checks, over a [`client::MintConnector`].
//! - [`payment::PaymentProcessor`] accepts incoming tokens against a
//!   required settlement value, choosing swap or melt by trust policy.
//! - [`recovery::RecoveryPoller`] re-drives persisted failure records when
//!   a network outcome was indeterminate, guaranteeing value is neither
//!   lost nor double-counted.
//!
//! Persistence, Lightning access and exchange rates are collaborator traits
//! the host wires in; see [`store::WalletStore`], [`lightning`].

pub mod client;
pub mod error;
pub mod lightning;
pub mod payment;
pub mod recovery;
pub mod store;
pub mod types;
pub mod wallet;

pub use ecash;

pub use self::client::{HttpClient, MintConnector};
pub use self::error::{Error, ErrorKind, ErrorResponse, OperationError};
pub use self::lightning::{LightningClient, RateSource};
pub use self::payment::{PaymentProcessor, PaymentRejection};
pub use self::recovery::RecoveryPoller;
pub use self::store::{WalletMemoryStore, WalletStore};
pub use self::types::{
    FailureKind, FailureRecord, InvoiceHandle, InvoiceStatus, Melted, MeltQuote, PaymentOutcome,
    PaymentPolicy, ProofInfo, RecoveryOutcome, Settlement,
};
pub use self::wallet::{keyset_fee, select_proofs, ProofSelection, Wallet};
