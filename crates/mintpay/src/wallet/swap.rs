//! Swap
//!
//! Exchanges a set of proofs for a fresh set, breaking linkability and
//! producing change. The new proofs must be persisted and the inputs
//! deleted in one atomic store write; no intermediate state is ever durably
//! observable.

use ecash::dhke::construct_proofs;
use ecash::{Amount, PreMintSecrets, Proofs, ProofsMethods, State, SwapRequest};
use tracing::instrument;

use super::Wallet;
use crate::error::{Error, OperationError};
use crate::types::ProofInfo;

impl Wallet {
    /// Swap `inputs` for fresh proofs.
    ///
    /// With a zero `fee` the outputs mirror the input denominations one for
    /// one (no consolidation); otherwise the net value after the fee is
    /// denomination-split against the active keyset.
    ///
    /// A transport failure after the inputs were submitted comes back as an
    /// [`OperationError`] carrying the output material; the caller persists
    /// it in a failure record. The inputs stay reserved in that case since
    /// the mint may have consumed them.
    #[instrument(skip(self, inputs), fields(mint_url = %self.mint_url))]
    pub async fn swap(&self, inputs: Proofs, fee: Amount) -> Result<Proofs, OperationError> {
        let active = self.active_keyset().await?;
        let keys = self.keys(active.id).await?;

        let input_total = inputs.total_amount().map_err(Error::from)?;
        let output_amounts: Vec<Amount> = if fee == Amount::ZERO {
            inputs.iter().map(|proof| proof.amount).collect()
        } else {
            let net = input_total
                .checked_sub(fee)
                .ok_or(Error::InsufficientFunds)?;
            net.split_into(&keys.amounts()).map_err(Error::from)?
        };

        let pre_mint = PreMintSecrets::random(active.id, &output_amounts).map_err(Error::from)?;
        let request = SwapRequest::new(inputs.clone(), pre_mint.blinded_messages());

        let input_ys = inputs.ys().map_err(Error::from)?;
        self.store().set_pending_proofs(input_ys.clone()).await?;

        let response = match self
            .bounded(self.client().post_swap(&self.mint_url, request))
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_indeterminate() => {
                tracing::warn!("Swap outcome unknown, retaining output material: {}", err);
                return Err(OperationError::indeterminate(err, pre_mint));
            }
            Err(err) => {
                // Definitive rejection: the inputs were not consumed
                self.store().set_unspent_proofs(input_ys).await?;
                return Err(err.into());
            }
        };

        if response.signatures.len() != pre_mint.len() {
            // The mint under- or over-delivered. Inputs stay reserved so an
            // operator can reconcile; crediting a short delivery would
            // silently absorb the loss.
            tracing::error!(
                "Mint returned {} signatures for {} outputs",
                response.signatures.len(),
                pre_mint.len()
            );
            return Err(Error::SignatureCountMismatch {
                expected: pre_mint.len(),
                returned: response.signatures.len(),
            }
            .into());
        }

        let proofs = construct_proofs(
            response.signatures,
            pre_mint.rs(),
            pre_mint.secrets(),
            &keys,
        )
        .map_err(Error::from)?;

        self.verify_dleqs(&proofs, &keys);

        let added = proofs
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

        Ok(proofs)
    }
}
