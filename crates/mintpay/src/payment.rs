//! Payment orchestrator
//!
//! Consumes an incoming token presented against a merchant payment:
//! validates value, spend state and fees, then settles via swap (trusted
//! mint) or melt (untrusted mint, when policy allows). Indeterminate
//! network outcomes become durable failure records for the recovery poller;
//! nothing is ever credited on an unknown outcome.

use std::sync::Arc;
use std::time::Duration;

use ecash::melt::MeltQuoteState;
use ecash::{Amount, MintUrl, Proofs, ProofsMethods, State, Token};
use thiserror::Error as ThisError;
use tracing::instrument;
use uuid::Uuid;

use crate::client::MintConnector;
use crate::error::{Error, OperationError};
use crate::lightning::{LightningClient, RateSource};
use crate::store::WalletStore;
use crate::types::{FailureRecord, InvoiceStatus, PaymentOutcome, PaymentPolicy};
use crate::wallet::{keyset_fee, Wallet};

/// Rejected (or unresolved) payment.
///
/// `failure_record` is set when the outcome is indeterminate and a record
/// was persisted for the recovery poller; the payment is not credited until
/// the poller resolves it.
#[derive(Debug, ThisError)]
#[error("{error}")]
pub struct PaymentRejection {
    /// Why the payment was not accepted
    pub error: Error,
    /// Failure record awaiting recovery, if one was created
    pub failure_record: Option<Uuid>,
}

impl From<Error> for PaymentRejection {
    fn from(error: Error) -> Self {
        Self {
            error,
            failure_record: None,
        }
    }
}

impl PaymentRejection {
    fn recoverable(error: Error, record: Uuid) -> Self {
        Self {
            error,
            failure_record: Some(record),
        }
    }
}

/// Orchestrates incoming token payments for one merchant store
#[derive(Debug)]
pub struct PaymentProcessor {
    client: Arc<dyn MintConnector>,
    store: Arc<dyn WalletStore>,
    rate: Arc<dyn RateSource>,
    lightning: Option<Arc<dyn LightningClient>>,
    policy: PaymentPolicy,
    op_timeout: Option<Duration>,
}

impl PaymentProcessor {
    /// Create new [`PaymentProcessor`]
    pub fn new(
        client: Arc<dyn MintConnector>,
        store: Arc<dyn WalletStore>,
        rate: Arc<dyn RateSource>,
        lightning: Option<Arc<dyn LightningClient>>,
        policy: PaymentPolicy,
    ) -> Self {
        Self {
            client,
            store,
            rate,
            lightning,
            policy,
            op_timeout: None,
        }
    }

    /// Bound swap and melt network calls by a timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    fn wallet_for(&self, mint_url: MintUrl, token: &Token) -> Wallet {
        let wallet = Wallet::new(
            mint_url,
            token.unit(),
            Arc::clone(&self.client),
            Arc::clone(&self.store),
        );
        match self.op_timeout {
            Some(timeout) => wallet.with_timeout(timeout),
            None => wallet,
        }
    }

    /// Accept an incoming token against a required settlement value.
    ///
    /// `required` is already denominated in the settlement unit (sats);
    /// `payment_id` is the host's reference for the payment being settled.
    /// All validation runs before any mutating call to the mint: funds are
    /// never submitted when the token is short, already spent, or its fees
    /// exceed the configured cap.
    #[instrument(skip(self, token), fields(payment_id = %payment_id))]
    pub async fn process_incoming_token(
        &self,
        token: &Token,
        required: Amount,
        payment_id: &str,
    ) -> Result<PaymentOutcome, PaymentRejection> {
        let (mint_url, proofs) = token.single_mint().map_err(|err| match err {
            ecash::token::Error::MultiMintUnsupported => Error::MultiMintToken,
            other => Error::Token(other),
        })?;

        // Value the token via the queried rate for one unit of its
        // denomination
        let unit = token.unit();
        let rate = self.rate.unit_value(&mint_url, &unit).await?;
        let face_value = proofs.total_amount().map_err(Error::from)?;
        let provided = Amount::from((face_value.to_u64() as f64 * rate).floor() as u64);

        if provided < required {
            return Err(Error::InsufficientValue { provided, required }.into());
        }

        let wallet = self.wallet_for(mint_url.clone(), token);

        // Refuse tokens that are already spent or tied up elsewhere
        let states = wallet.check_proofs_state(&proofs).await?;
        if states.iter().any(|state| state.state == State::Spent) {
            return Err(Error::TokenAlreadySpent.into());
        }
        if states.iter().any(|state| state.state == State::Pending) {
            return Err(Error::TokenPending.into());
        }

        // Fee validation gates every mutating call
        let keysets = wallet.keysets().await?;
        let fee = keyset_fee(&proofs, &keysets)?;
        let fee_cap = percent_of(provided, self.policy.max_fee_percent);
        if fee > fee_cap {
            return Err(Error::MaxFeeExceeded { fee, cap: fee_cap }.into());
        }

        if self.policy.is_trusted(&mint_url) {
            self.settle_by_swap(&wallet, token, proofs, fee, provided, payment_id)
                .await
        } else if self.policy.melt_untrusted {
            self.settle_by_melt(&wallet, token, proofs, fee, provided, payment_id)
                .await
        } else {
            Err(Error::UntrustedMint.into())
        }
    }

    /// Trusted-mint path: swap and credit immediately on success
    async fn settle_by_swap(
        &self,
        wallet: &Wallet,
        token: &Token,
        proofs: Proofs,
        fee: Amount,
        provided: Amount,
        payment_id: &str,
    ) -> Result<PaymentOutcome, PaymentRejection> {
        let expected = proofs
            .total_amount()
            .map_err(Error::from)?
            .checked_sub(fee)
            .unwrap_or(Amount::ZERO);

        match wallet.swap(proofs.clone(), fee).await {
            Ok(new_proofs) => {
                let received = new_proofs.total_amount().map_err(Error::from)?;
                let requires_review = received < expected;
                if requires_review {
                    tracing::warn!(
                        "Swap returned `{}` for expected `{}`; flagging for review",
                        received,
                        expected
                    );
                }
                Ok(PaymentOutcome {
                    settled_value: provided,
                    requires_review,
                })
            }
            Err(OperationError {
                error,
                outputs: Some(outputs),
            }) => {
                // Outcome unknown. If the mint provably did nothing there
                // is nothing to recover; otherwise persist a record.
                if let Ok(states) = wallet.check_proofs_state(&proofs).await {
                    if states.iter().all(|state| state.state == State::Unspent) {
                        tracing::info!("Swap never happened; inputs remain spendable");
                        wallet
                            .release_proofs(proofs.ys().map_err(Error::from)?)
                            .await?;
                        return Err(error.into());
                    }
                }

                let record = FailureRecord::swap(
                    wallet.mint_url.clone(),
                    token.unit(),
                    payment_id.to_string(),
                    provided,
                    proofs,
                    outputs,
                );
                let record_id = record.id;
                self.store.add_failure_record(record).await?;
                tracing::warn!("Swap outcome unknown; failure record {} created", record_id);
                Err(PaymentRejection::recoverable(error, record_id))
            }
            Err(OperationError { error, .. }) => Err(error.into()),
        }
    }

    /// Untrusted-mint path: melt to a fresh invoice; credit only once the
    /// invoice is observed paid
    async fn settle_by_melt(
        &self,
        wallet: &Wallet,
        token: &Token,
        proofs: Proofs,
        fee: Amount,
        provided: Amount,
        payment_id: &str,
    ) -> Result<PaymentOutcome, PaymentRejection> {
        let lightning = self
            .lightning
            .as_ref()
            .ok_or(Error::LightningUnavailable)?;

        // Size the invoice to what the proofs can pay after the estimated
        // routing reserve and the keyset fee
        let face_value = proofs.total_amount().map_err(Error::from)?;
        let reserve = percent_of_ceil(face_value, self.policy.lightning_fee_percent);
        let invoice_amount = face_value
            .checked_sub(reserve)
            .and_then(|net| net.checked_sub(fee))
            .ok_or(Error::MaxFeeExceeded {
                fee: reserve
                    .checked_add(fee)
                    .unwrap_or(Amount::from(u64::MAX)),
                cap: face_value,
            })?;

        let invoice = lightning
            .create_invoice(
                invoice_amount,
                &format!("ecash settlement {payment_id}"),
                self.policy.invoice_expiry_secs,
            )
            .await?;

        let quote = wallet.melt_quote(&invoice.request).await?;

        // The quote's actual fee reserve must still fit in the proofs
        let required = quote
            .amount
            .checked_add(quote.fee_reserve)
            .ok_or(Error::from(ecash::amount::Error::AmountOverflow))?;
        if required > face_value {
            return Err(Error::MaxFeeExceeded {
                fee: quote.fee_reserve,
                cap: reserve,
            }
            .into());
        }

        match wallet.melt(&quote, proofs.clone()).await {
            Ok(melted) => match melted.state {
                MeltQuoteState::Unpaid => {
                    // Definitive: the mint did not pay and released nothing
                    Err(Error::MeltFailed.into())
                }
                MeltQuoteState::Paid => {
                    // The mint's claim alone is not enough; the invoice
                    // must be observed paid before value is credited
                    let status = lightning.invoice_status(&invoice.id).await?;
                    if status == InvoiceStatus::Paid {
                        Ok(PaymentOutcome {
                            settled_value: provided,
                            requires_review: false,
                        })
                    } else {
                        let record = FailureRecord::melt(
                            wallet.mint_url.clone(),
                            token.unit(),
                            payment_id.to_string(),
                            provided,
                            proofs,
                            None,
                            &quote,
                            invoice.id.clone(),
                            MeltQuoteState::Paid,
                        );
                        let record_id = record.id;
                        self.store.add_failure_record(record).await?;
                        Err(PaymentRejection::recoverable(
                            Error::PaymentStateUnknown,
                            record_id,
                        ))
                    }
                }
                MeltQuoteState::Pending => {
                    let record = FailureRecord::melt(
                        wallet.mint_url.clone(),
                        token.unit(),
                        payment_id.to_string(),
                        provided,
                        proofs,
                        melted.pending_outputs,
                        &quote,
                        invoice.id.clone(),
                        MeltQuoteState::Pending,
                    );
                    let record_id = record.id;
                    self.store.add_failure_record(record).await?;
                    Err(PaymentRejection::recoverable(
                        Error::PaymentStateUnknown,
                        record_id,
                    ))
                }
            },
            Err(OperationError {
                error,
                outputs: Some(outputs),
            }) => {
                let record = FailureRecord::melt(
                    wallet.mint_url.clone(),
                    token.unit(),
                    payment_id.to_string(),
                    provided,
                    proofs,
                    Some(outputs),
                    &quote,
                    invoice.id.clone(),
                    MeltQuoteState::Pending,
                );
                let record_id = record.id;
                self.store.add_failure_record(record).await?;
                tracing::warn!("Melt outcome unknown; failure record {} created", record_id);
                Err(PaymentRejection::recoverable(error, record_id))
            }
            Err(OperationError { error, .. }) => Err(error.into()),
        }
    }
}

/// `percent` of `amount`, rounded down
fn percent_of(amount: Amount, percent: f64) -> Amount {
    Amount::from((amount.to_u64() as f64 * percent / 100.0).floor() as u64)
}

/// `percent` of `amount`, rounded up
fn percent_of_ceil(amount: Amount, percent: f64) -> Amount {
    Amount::from((amount.to_u64() as f64 * percent / 100.0).ceil() as u64)
}
