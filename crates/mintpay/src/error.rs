//! Errors
//!
//! Every error classifies into one of four kinds, and the kind decides what
//! a caller may do with it: only [`ErrorKind::Indeterminate`] failures feed
//! the failure-record / recovery path; everything else is terminal for the
//! operation that raised it.

use ecash::{Amount, Id, PreMintSecrets};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The mint returned a well-formed rejection. Never retried
    /// automatically.
    Protocol,
    /// The request fails local validation (value, fees, spent state).
    /// Raised before any mutating network call.
    Value,
    /// The outcome at the mint is unknown: timeout or connection failure
    /// after inputs may have been transmitted. Never a success or failure
    /// verdict; resolved later by the recovery poller.
    Indeterminate,
    /// A counterparty or implementation bug: responses that cannot be
    /// reconciled with what was sent. Fatal for the operation, surfaced for
    /// manual review.
    Invariant,
}

/// Wallet core error
#[derive(Debug, Error)]
pub enum Error {
    // Value errors
    /// Token is worth less than the required settlement value
    #[error("Insufficient value: provided `{provided}`, required `{required}`")]
    InsufficientValue {
        /// Value of the presented token
        provided: Amount,
        /// Value required to settle
        required: Amount,
    },
    /// Token has already been spent
    #[error("Token already spent")]
    TokenAlreadySpent,
    /// Token is part of an in-flight operation
    #[error("Token pending")]
    TokenPending,
    /// Token spans more than one mint
    #[error("Multi-mint tokens are not supported")]
    MultiMintToken,
    /// Fees exceed the configured cap
    #[error("Max fee exceeded: fee `{fee}`, cap `{cap}`")]
    MaxFeeExceeded {
        /// Fee that would be paid
        fee: Amount,
        /// Configured cap
        cap: Amount,
    },
    /// Not enough proofs to cover the operation
    #[error("Insufficient funds")]
    InsufficientFunds,
    /// Mint is untrusted and melting is disallowed by policy
    #[error("Mint is not trusted and melt is disallowed")]
    UntrustedMint,
    /// Operation needs a Lightning client and none is configured
    #[error("No Lightning client configured")]
    LightningUnavailable,
    /// Unit not supported for this operation
    #[error("Unit not supported")]
    UnitUnsupported,
    /// Melt quote expired before the melt was submitted
    #[error("Expired quote: expired `{expiry}`, time `{now}`")]
    ExpiredQuote {
        /// Quote expiry
        expiry: u64,
        /// Current time
        now: u64,
    },
    /// Invoice does not carry an amount
    #[error("Invoice amount undefined")]
    InvoiceAmountUndefined,
    /// Failure record is not known
    #[error("Unknown failure record: `{0}`")]
    UnknownFailureRecord(uuid::Uuid),

    // Protocol errors
    /// Mint rejected the request
    #[error(transparent)]
    Mint(#[from] ErrorResponse),
    /// Keyset is not known to the mint
    #[error("Unknown keyset: `{0}`")]
    UnknownKeySet(Id),
    /// Mint has no active keyset for the unit
    #[error("No active keyset")]
    NoActiveKeyset,
    /// Mint quoted a different amount than the invoice carries
    #[error("Incorrect quote amount: expected `{expected}`, quoted `{quoted}`")]
    IncorrectQuoteAmount {
        /// Amount the invoice carries
        expected: Amount,
        /// Amount the mint quoted
        quoted: Amount,
    },
    /// Mint reported the melt as failed
    #[error("Melt failed: the mint did not pay the invoice")]
    MeltFailed,

    // Indeterminate errors
    /// Operation timed out after submission
    #[error("Timed out waiting for the mint")]
    Timeout,
    /// Transport failure
    #[error("Network error: {0}")]
    Network(String),
    /// Mint and Lightning observations disagree; outcome unknown
    #[error("Payment state is unknown")]
    PaymentStateUnknown,
    /// Durable store failure
    #[error("Database error: {0}")]
    Database(String),
    /// Lightning client failure
    #[error("Lightning error: {0}")]
    Lightning(String),

    // Invariant violations
    /// Mint returned a different number of signatures than outputs sent
    #[error("Signature count mismatch: sent `{expected}` outputs, got `{returned}` signatures")]
    SignatureCountMismatch {
        /// Outputs submitted
        expected: usize,
        /// Signatures returned
        returned: usize,
    },
    /// Restore did not return signatures for every submitted output
    #[error("Restore unbalanced: submitted `{submitted}` outputs, `{returned}` were signed")]
    RestoreUnbalanced {
        /// Outputs submitted
        submitted: usize,
        /// Outputs the mint recognized
        returned: usize,
    },
    /// Restore returned an output that was never submitted
    #[error("Restore returned an unknown output")]
    UnknownRestoredOutput,
    /// Mint contradicted a previously observed quote state
    #[error("Quote state conflict: mint reversed a previously PAID quote")]
    QuoteStateConflict,

    // Conversions from the protocol crate
    /// Amount error
    #[error(transparent)]
    Amount(#[from] ecash::amount::Error),
    /// DHKE error
    #[error(transparent)]
    Dhke(#[from] ecash::dhke::Error),
    /// Keyset error
    #[error(transparent)]
    Keyset(#[from] ecash::keyset::Error),
    /// Token error
    #[error(transparent)]
    Token(#[from] ecash::token::Error),
    /// Mint url error
    #[error(transparent)]
    MintUrl(#[from] ecash::mint_url::Error),
    /// Invoice parse error
    #[error(transparent)]
    Invoice(#[from] lightning_invoice::ParseOrSemanticError),
    /// Serde json error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The class this error falls into
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InsufficientValue { .. }
            | Error::TokenAlreadySpent
            | Error::TokenPending
            | Error::MultiMintToken
            | Error::MaxFeeExceeded { .. }
            | Error::InsufficientFunds
            | Error::UntrustedMint
            | Error::LightningUnavailable
            | Error::UnitUnsupported
            | Error::ExpiredQuote { .. }
            | Error::InvoiceAmountUndefined
            | Error::UnknownFailureRecord(_)
            | Error::Amount(_)
            | Error::Token(_)
            | Error::MintUrl(_)
            | Error::Invoice(_) => ErrorKind::Value,

            Error::Mint(_)
            | Error::UnknownKeySet(_)
            | Error::NoActiveKeyset
            | Error::IncorrectQuoteAmount { .. }
            | Error::MeltFailed
            | Error::Keyset(_)
            | Error::Json(_) => ErrorKind::Protocol,

            Error::Timeout
            | Error::Network(_)
            | Error::PaymentStateUnknown
            | Error::Database(_)
            | Error::Lightning(_) => ErrorKind::Indeterminate,

            Error::SignatureCountMismatch { .. }
            | Error::RestoreUnbalanced { .. }
            | Error::UnknownRestoredOutput
            | Error::QuoteStateConflict
            | Error::Dhke(_) => ErrorKind::Invariant,
        }
    }

    /// Whether the outcome at the mint is unknown
    pub fn is_indeterminate(&self) -> bool {
        self.kind() == ErrorKind::Indeterminate
    }
}

/// Well-formed rejection body returned by a mint
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("Mint rejection (code `{code}`): {}", .detail.as_deref().unwrap_or("no detail"))]
pub struct ErrorResponse {
    /// Error code
    pub code: i32,
    /// Human readable detail
    #[serde(default)]
    pub detail: Option<String>,
}

impl ErrorResponse {
    /// Parse an error response out of a mint's raw reply body
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Failure of a swap or melt, with the output material a failure record
/// needs when the outcome is indeterminate.
///
/// `outputs` is `Some` only when the inputs may have reached the mint: the
/// blinding factors and secrets in it are the only way the eventual
/// signatures can ever be unblinded, so dropping them loses funds.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct OperationError {
    /// The underlying error
    pub error: Error,
    /// Output material to retain, for indeterminate failures
    pub outputs: Option<PreMintSecrets>,
}

impl OperationError {
    /// An indeterminate failure carrying its output material
    pub fn indeterminate(error: Error, outputs: PreMintSecrets) -> Self {
        Self {
            error,
            outputs: Some(outputs),
        }
    }
}

impl From<Error> for OperationError {
    fn from(error: Error) -> Self {
        Self {
            error,
            outputs: None,
        }
    }
}
