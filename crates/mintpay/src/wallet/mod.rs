//! Token wallet
//!
//! One [`Wallet`] is scoped to a single mint and unit. Each operation is a
//! fresh attempt against the mint; the wallet holds no long-lived locks
//! across network calls. Exclusive ownership of a proof for the duration of
//! one operation is enforced by reserving it in the store before
//! submission.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ecash::{
    Amount, CheckStateRequest, CurrencyUnit, Keys, MintUrl, ProofState, Proofs, ProofsMethods,
    PublicKey,
};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::client::MintConnector;
use crate::error::Error;
use crate::store::WalletStore;

mod keysets;
mod melt;
mod restore;
mod select;
mod swap;

pub use keysets::keyset_fee;
pub use select::{select_proofs, ProofSelection};

/// Wallet against a single mint
#[derive(Debug)]
pub struct Wallet {
    /// The mint this wallet operates against
    pub mint_url: MintUrl,
    /// Unit the wallet is denominated in
    pub unit: CurrencyUnit,
    client: Arc<dyn MintConnector>,
    store: Arc<dyn WalletStore>,
    keys_fetch_lock: Mutex<()>,
    op_timeout: Option<Duration>,
}

impl Wallet {
    /// Create new [`Wallet`]
    pub fn new(
        mint_url: MintUrl,
        unit: CurrencyUnit,
        client: Arc<dyn MintConnector>,
        store: Arc<dyn WalletStore>,
    ) -> Self {
        Self {
            mint_url,
            unit,
            client,
            store,
            keys_fetch_lock: Mutex::new(()),
            op_timeout: None,
        }
    }

    /// Bound swap and melt calls by a timeout.
    ///
    /// An elapsed timeout is indeterminate, exactly like a connection
    /// failure: the mint may still process the request after the client
    /// stops waiting.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    pub(crate) async fn bounded<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        match self.op_timeout {
            Some(timeout) => tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| Error::Timeout)?,
            None => fut.await,
        }
    }

    /// Sum of unspent proofs held for this mint
    #[instrument(skip(self))]
    pub async fn total_balance(&self) -> Result<Amount, Error> {
        self.store.unspent_balance(&self.mint_url).await
    }

    /// Ask the mint for the spend state of a set of proofs.
    ///
    /// Queries by the proofs' public identifiers; states come back in
    /// request order.
    #[instrument(skip(self, proofs))]
    pub async fn check_proofs_state(&self, proofs: &Proofs) -> Result<Vec<ProofState>, Error> {
        let ys = proofs.ys()?;
        let response = self
            .client
            .post_check_state(&self.mint_url, CheckStateRequest { ys })
            .await?;
        Ok(response.states)
    }

    /// Mark proofs in-flight so concurrent operations cannot select them
    pub async fn reserve_proofs(&self, ys: Vec<PublicKey>) -> Result<(), Error> {
        self.store.set_pending_proofs(ys).await
    }

    /// Return proofs to the available pool
    pub async fn release_proofs(&self, ys: Vec<PublicKey>) -> Result<(), Error> {
        self.store.set_unspent_proofs(ys).await
    }

    pub(crate) fn client(&self) -> &Arc<dyn MintConnector> {
        &self.client
    }

    pub(crate) fn store(&self) -> &Arc<dyn WalletStore> {
        &self.store
    }

    /// Opportunistically verify DLEQ proofs on freshly unblinded proofs.
    ///
    /// A failure is a strong signal of a misbehaving mint but does not
    /// block spending; it is logged for the operator.
    pub(crate) fn verify_dleqs(&self, proofs: &Proofs, keys: &Keys) {
        for proof in proofs {
            if proof.dleq.is_none() {
                continue;
            }
            match keys.amount_key(proof.amount) {
                Some(key) => {
                    if let Err(err) = proof.verify_dleq(&key) {
                        tracing::warn!(
                            "DLEQ verification failed for a proof from {}: {}",
                            self.mint_url,
                            err
                        );
                    }
                }
                None => tracing::warn!("No key to verify DLEQ for amount {}", proof.amount),
            }
        }
    }
}
