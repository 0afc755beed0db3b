//! Melt
//!
//! Redeems proofs by having the mint pay a Lightning invoice. Blank outputs
//! sized to the quote's fee reserve let the mint return overpaid routing
//! fees as change without pre-committing to the change amount.

use std::str::FromStr;

use ecash::dhke::construct_proofs;
use ecash::melt::{MeltQuoteRequest, MeltQuoteState, MeltRequest};
use ecash::util::unix_time;
use ecash::{Amount, CurrencyUnit, PreMintSecrets, Proofs, ProofsMethods, State};
use lightning_invoice::Bolt11Invoice;
use tracing::instrument;

use super::Wallet;
use crate::error::{Error, OperationError};
use crate::types::{Melted, MeltQuote, ProofInfo};

impl Wallet {
    /// Obtain a melt quote for a bolt11 invoice
    #[instrument(skip(self, request))]
    pub async fn melt_quote(&self, request: &str) -> Result<MeltQuote, Error> {
        let invoice = Bolt11Invoice::from_str(request)?;
        let amount_msat = invoice
            .amount_milli_satoshis()
            .ok_or(Error::InvoiceAmountUndefined)?;

        let amount = match self.unit {
            CurrencyUnit::Sat => Amount::from(amount_msat / 1000),
            CurrencyUnit::Msat => Amount::from(amount_msat),
            _ => return Err(Error::UnitUnsupported),
        };

        let response = self
            .client()
            .post_melt_quote(
                &self.mint_url,
                MeltQuoteRequest {
                    request: invoice,
                    unit: self.unit.clone(),
                },
            )
            .await?;

        if response.amount != amount {
            tracing::warn!(
                "Mint quoted `{}` for an invoice of `{}`",
                response.amount,
                amount
            );
            return Err(Error::IncorrectQuoteAmount {
                expected: amount,
                quoted: response.amount,
            });
        }

        Ok(MeltQuote {
            id: response.quote,
            unit: self.unit.clone(),
            amount,
            request: request.to_string(),
            fee_reserve: response.fee_reserve,
            state: response.state,
            expiry: response.expiry,
        })
    }

    /// Melt `inputs` against a quote.
    ///
    /// Input handling follows the reported quote state: `Paid` consumes the
    /// inputs and unblinds any change, `Unpaid` releases them, `Pending`
    /// keeps them reserved and hands the blank-output material back so the
    /// caller can persist a failure record. Transport failures after
    /// submission come back as indeterminate [`OperationError`]s carrying
    /// the blank material.
    #[instrument(skip(self, inputs), fields(mint_url = %self.mint_url, quote_id = %quote.id))]
    pub async fn melt(&self, quote: &MeltQuote, inputs: Proofs) -> Result<Melted, OperationError> {
        let now = unix_time();
        if quote.expiry <= now {
            return Err(Error::ExpiredQuote {
                expiry: quote.expiry,
                now,
            }
            .into());
        }

        let input_total = inputs.total_amount().map_err(Error::from)?;
        let required = quote
            .amount
            .checked_add(quote.fee_reserve)
            .ok_or(Error::from(ecash::amount::Error::AmountOverflow))?;
        if input_total < required {
            return Err(Error::InsufficientFunds.into());
        }

        let active = self.active_keyset().await?;
        let keys = self.keys(active.id).await?;

        let blanks = PreMintSecrets::blank(active.id, quote.fee_reserve).map_err(Error::from)?;
        let outputs = (!blanks.is_empty()).then(|| blanks.blinded_messages());
        let request = MeltRequest::new(quote.id.clone(), inputs.clone(), outputs);

        let input_ys = inputs.ys().map_err(Error::from)?;
        self.store().set_pending_proofs(input_ys.clone()).await?;

        let response = match self
            .bounded(self.client().post_melt(&self.mint_url, request))
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_indeterminate() => {
                tracing::warn!("Melt outcome unknown, retaining blank outputs: {}", err);
                return Err(OperationError::indeterminate(err, blanks));
            }
            Err(err) => {
                self.store().set_unspent_proofs(input_ys).await?;
                return Err(err.into());
            }
        };

        match response.state {
            MeltQuoteState::Unpaid => {
                // The mint did not pay; the inputs remain ours
                self.store().set_unspent_proofs(input_ys).await?;
                Ok(Melted {
                    state: MeltQuoteState::Unpaid,
                    payment_preimage: None,
                    change: Vec::new(),
                    pending_outputs: None,
                })
            }
            MeltQuoteState::Pending => Ok(Melted {
                state: MeltQuoteState::Pending,
                payment_preimage: response.payment_preimage,
                change: Vec::new(),
                pending_outputs: Some(blanks),
            }),
            MeltQuoteState::Paid => {
                let change = match response.change {
                    Some(mut change) => {
                        if change.len() > blanks.len() {
                            tracing::error!(
                                "Mint returned {} change signatures for {} blank outputs",
                                change.len(),
                                blanks.len()
                            );
                            change.truncate(blanks.len());
                        }
                        let count = change.len();
                        construct_proofs(
                            change,
                            blanks.rs()[..count].to_vec(),
                            blanks.secrets()[..count].to_vec(),
                            &keys,
                        )
                        .map_err(Error::from)?
                    }
                    None => Vec::new(),
                };

                self.verify_dleqs(&change, &keys);

                let added = change
                    .iter()
                    .map(|proof| {
                        ProofInfo::new(
                            proof.clone(),
                            self.mint_url.clone(),
                            State::Unspent,
                            self.unit.clone(),
                        )
                    })
                    .collect::<Result<Vec<ProofInfo>, _>>()
                    .map_err(Error::from)?;

                self.store().update_proofs(added, input_ys).await?;

                Ok(Melted {
                    state: MeltQuoteState::Paid,
                    payment_preimage: response.payment_preimage,
                    change,
                    pending_outputs: None,
                })
            }
        }
    }
}
