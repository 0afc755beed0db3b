//! Wallet core types

use ecash::dhke;
use ecash::melt::MeltQuoteState;
use ecash::{Amount, CurrencyUnit, MintUrl, PreMintSecrets, Proof, Proofs, PublicKey, State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ecash::util::unix_time;

/// A proof together with the bookkeeping the durable store needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofInfo {
    /// The proof
    pub proof: Proof,
    /// The proof's public identifier (`Y`)
    pub y: PublicKey,
    /// Mint the proof was issued by
    pub mint_url: MintUrl,
    /// Local spend state
    pub state: State,
    /// Unit the proof is denominated in
    pub unit: CurrencyUnit,
}

impl ProofInfo {
    /// Create new [`ProofInfo`]
    pub fn new(
        proof: Proof,
        mint_url: MintUrl,
        state: State,
        unit: CurrencyUnit,
    ) -> Result<Self, dhke::Error> {
        let y = proof.y()?;
        Ok(Self {
            proof,
            y,
            mint_url,
            state,
            unit,
        })
    }
}

/// A melt quote obtained from the mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeltQuote {
    /// Quote id
    pub id: String,
    /// Unit the quote is denominated in
    pub unit: CurrencyUnit,
    /// Amount the invoice requires
    pub amount: Amount,
    /// Bolt11 payment request the quote is for
    pub request: String,
    /// Fee reserve required on top of the amount
    pub fee_reserve: Amount,
    /// Last observed state
    pub state: MeltQuoteState,
    /// Unix timestamp until which the quote is valid
    pub expiry: u64,
}

/// Result of a melt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Melted {
    /// Quote state after the melt call
    pub state: MeltQuoteState,
    /// Preimage of the paid invoice, when shared
    pub payment_preimage: Option<String>,
    /// Change proofs unblinded from the returned blank-output signatures
    pub change: Proofs,
    /// Blank output material still pending a signature, when the melt came
    /// back [`MeltQuoteState::Pending`]
    pub pending_outputs: Option<PreMintSecrets>,
}

/// Operation a failure record was created for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// A swap whose response never arrived
    Swap,
    /// A melt whose outcome is unknown
    Melt {
        /// Melt quote id at the mint
        quote_id: String,
        /// Invoice the mint was asked to pay
        invoice_id: String,
        /// Quote expiry
        quote_expiry: u64,
        /// Last state observed at the mint
        last_state: MeltQuoteState,
    },
}

/// Durable evidence of an operation whose outcome at the mint is unknown.
///
/// Created only after inputs were (possibly) transmitted; holds everything
/// needed to later decide the outcome and reconstruct resulting proofs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Record id
    pub id: Uuid,
    /// Mint the operation ran against
    pub mint_url: MintUrl,
    /// Unit of the amounts involved
    pub unit: CurrencyUnit,
    /// Host payment reference the operation settles
    pub payment_id: String,
    /// Value to credit against the payment once the operation succeeds
    pub value: Amount,
    /// Input proofs that were submitted (possibly spent)
    pub inputs: Proofs,
    /// Output material needed to reconstruct resulting proofs, if any
    /// outputs are still owed
    pub outputs: Option<PreMintSecrets>,
    /// Operation kind and its state
    pub kind: FailureKind,
    /// Times the poller has re-evaluated this record
    pub retry_count: u32,
    /// Unix timestamp of the last re-evaluation
    pub last_retry: Option<u64>,
    /// Whether the record has reached a terminal outcome
    pub resolved: bool,
    /// Value of the proofs recovered on success
    pub recovered_amount: Option<Amount>,
    /// Why the operation definitively failed, when it did
    #[serde(default)]
    pub failure_reason: Option<String>,
    /// Unix timestamp the record was created
    pub created: u64,
}

impl FailureRecord {
    /// Record for an indeterminate swap
    pub fn swap(
        mint_url: MintUrl,
        unit: CurrencyUnit,
        payment_id: String,
        value: Amount,
        inputs: Proofs,
        outputs: PreMintSecrets,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mint_url,
            unit,
            payment_id,
            value,
            inputs,
            outputs: Some(outputs),
            kind: FailureKind::Swap,
            retry_count: 0,
            last_retry: None,
            resolved: false,
            recovered_amount: None,
            failure_reason: None,
            created: unix_time(),
        }
    }

    /// Record for an indeterminate melt
    #[allow(clippy::too_many_arguments)]
    pub fn melt(
        mint_url: MintUrl,
        unit: CurrencyUnit,
        payment_id: String,
        value: Amount,
        inputs: Proofs,
        outputs: Option<PreMintSecrets>,
        quote: &MeltQuote,
        invoice_id: String,
        last_state: MeltQuoteState,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mint_url,
            unit,
            payment_id,
            value,
            inputs,
            outputs,
            kind: FailureKind::Melt {
                quote_id: quote.id.clone(),
                invoice_id,
                quote_expiry: quote.expiry,
                last_state,
            },
            retry_count: 0,
            last_retry: None,
            resolved: false,
            recovered_amount: None,
            failure_reason: None,
            created: unix_time(),
        }
    }
}

/// Settlement registered against a host payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Host payment reference
    pub payment_id: String,
    /// Mint the value came from
    pub mint_url: MintUrl,
    /// Settled value
    pub amount: Amount,
    /// Unix timestamp of settlement
    pub at: u64,
}

/// Status of a Lightning invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    /// Invoice settled
    Paid,
    /// Invoice not yet paid
    Unpaid,
    /// Invoice expired unpaid
    Expired,
}

/// Handle to an invoice created through the Lightning collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceHandle {
    /// Id the invoice can later be queried by
    pub id: String,
    /// Bolt11 payment request
    pub request: String,
}

/// Per-store payment acceptance policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPolicy {
    /// Mints whose tokens are credited directly after a swap
    #[serde(default)]
    pub trusted_mints: Vec<MintUrl>,
    /// Whether tokens from untrusted mints may be melted to Lightning
    #[serde(default)]
    pub melt_untrusted: bool,
    /// Cap on keyset input fees, as a percentage of the payment value
    pub max_fee_percent: f64,
    /// Lightning fee reserve estimated when sizing a melt invoice, as a
    /// percentage of the payment value
    pub lightning_fee_percent: f64,
    /// Expiry given to melt invoices, in seconds
    pub invoice_expiry_secs: u64,
}

impl PaymentPolicy {
    /// Whether a mint is on the trusted allowlist
    pub fn is_trusted(&self, mint_url: &MintUrl) -> bool {
        self.trusted_mints.contains(mint_url)
    }
}

impl Default for PaymentPolicy {
    fn default() -> Self {
        Self {
            trusted_mints: Vec::new(),
            melt_untrusted: false,
            max_fee_percent: 1.0,
            lightning_fee_percent: 2.0,
            invoice_expiry_secs: 600,
        }
    }
}

/// Accepted payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    /// Value credited against the payment
    pub settled_value: Amount,
    /// Set when the mint under-delivered on a swap and the discrepancy
    /// needs operator review
    pub requires_review: bool,
}

/// Terminal or pending verdict for one failure-record evaluation
#[derive(Debug)]
pub enum RecoveryOutcome {
    /// Operation ultimately succeeded; proofs persisted and settlement
    /// registered
    Succeeded {
        /// Value of the proofs recovered
        recovered: Amount,
    },
    /// Outcome still unknown; poll again later
    Pending,
    /// Operation definitively failed
    Failed {
        /// Why the operation failed
        reason: String,
    },
}

impl RecoveryOutcome {
    /// Whether this outcome resolves the record
    pub fn is_resolved(&self) -> bool {
        !matches!(self, RecoveryOutcome::Pending)
    }
}
