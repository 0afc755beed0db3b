//! Restore
//!
//! After an indeterminate failure the retained output material can be
//! re-presented to the mint, which returns signatures for whatever it
//! actually processed. Reconstruction pairs returned outputs to the
//! retained material by blinded point, so the mint's ordering does not
//! matter.

use ecash::dhke::construct_proofs;
use ecash::restore::{RestoreRequest, RestoreResponse};
use ecash::{BlindSignature, PreMintSecrets, Proofs, Secret, SecretKey};
use tracing::instrument;

use super::Wallet;
use crate::error::Error;

impl Wallet {
    /// Recover the proofs of a fully processed operation.
    ///
    /// Every submitted output must come back signed; anything else means
    /// the operation was not (or only partly) processed and the record
    /// stays unresolved.
    #[instrument(skip(self, outputs), fields(mint_url = %self.mint_url))]
    pub async fn restore(&self, outputs: &PreMintSecrets) -> Result<Proofs, Error> {
        let response = self.post_restore(outputs).await?;

        if response.signatures.len() != outputs.len() {
            return Err(Error::RestoreUnbalanced {
                submitted: outputs.len(),
                returned: response.signatures.len(),
            });
        }

        self.reconstruct(outputs, response).await
    }

    /// Recover whatever subset of the outputs the mint signed.
    ///
    /// Used for melt change: the mint signs only as many blank outputs as
    /// the overpaid fee needed, so a partial return is the normal case.
    #[instrument(skip(self, outputs), fields(mint_url = %self.mint_url))]
    pub async fn restore_change(&self, outputs: &PreMintSecrets) -> Result<Proofs, Error> {
        let response = self.post_restore(outputs).await?;
        self.reconstruct(outputs, response).await
    }

    async fn post_restore(&self, outputs: &PreMintSecrets) -> Result<RestoreResponse, Error> {
        self.client()
            .post_restore(
                &self.mint_url,
                RestoreRequest {
                    outputs: outputs.blinded_messages(),
                },
            )
            .await
    }

    async fn reconstruct(
        &self,
        outputs: &PreMintSecrets,
        response: RestoreResponse,
    ) -> Result<Proofs, Error> {
        if response.outputs.len() != response.signatures.len() {
            return Err(Error::SignatureCountMismatch {
                expected: response.outputs.len(),
                returned: response.signatures.len(),
            });
        }

        let keys = self.keys(outputs.keyset_id).await?;

        // Pair each returned output with its retained blinding material
        let mut rs: Vec<SecretKey> = Vec::with_capacity(response.outputs.len());
        let mut secrets: Vec<Secret> = Vec::with_capacity(response.outputs.len());
        let mut signatures: Vec<BlindSignature> = Vec::with_capacity(response.outputs.len());

        for (returned, signature) in response.outputs.iter().zip(response.signatures) {
            let pre_mint = outputs
                .secrets
                .iter()
                .find(|pre_mint| pre_mint.blinded_message.b == returned.b)
                .ok_or(Error::UnknownRestoredOutput)?;

            rs.push(pre_mint.r.clone());
            secrets.push(pre_mint.secret.clone());
            signatures.push(signature);
        }

        let proofs = construct_proofs(signatures, rs, secrets, &keys)?;
        self.verify_dleqs(&proofs, &keys);

        Ok(proofs)
    }
}
