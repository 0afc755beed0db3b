//! Recovery poller
//!
//! Re-evaluates persisted failure records against current mint and
//! Lightning state and decides whether the operation ultimately succeeded,
//! is still pending, or definitively failed. On success the recovered
//! proofs, the settlement and the record resolution are committed as one
//! unit of work; a half-applied recovery is the bug class this module
//! exists to prevent.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ecash::melt::MeltQuoteState;
use ecash::util::unix_time;
use ecash::{CurrencyUnit, MintUrl, ProofsMethods, State};
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;

use crate::client::MintConnector;
use crate::error::Error;
use crate::lightning::LightningClient;
use crate::store::WalletStore;
use crate::types::{
    FailureKind, FailureRecord, InvoiceStatus, ProofInfo, RecoveryOutcome, Settlement,
};
use crate::wallet::Wallet;

/// Re-drives failure records to a terminal outcome
#[derive(Debug)]
pub struct RecoveryPoller {
    client: Arc<dyn MintConnector>,
    store: Arc<dyn WalletStore>,
    lightning: Option<Arc<dyn LightningClient>>,
    op_timeout: Option<Duration>,
    // Advisory lock: one evaluation per record at a time. Re-entry would
    // otherwise double-credit recovered proofs.
    in_flight: Mutex<HashSet<Uuid>>,
}

impl RecoveryPoller {
    /// Create new [`RecoveryPoller`]
    pub fn new(
        client: Arc<dyn MintConnector>,
        store: Arc<dyn WalletStore>,
        lightning: Option<Arc<dyn LightningClient>>,
    ) -> Self {
        Self {
            client,
            store,
            lightning,
            op_timeout: None,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Bound network calls made during recovery by a timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    fn wallet_for(&self, mint_url: MintUrl, unit: CurrencyUnit) -> Wallet {
        let wallet = Wallet::new(
            mint_url,
            unit,
            Arc::clone(&self.client),
            Arc::clone(&self.store),
        );
        match self.op_timeout {
            Some(timeout) => wallet.with_timeout(timeout),
            None => wallet,
        }
    }

    /// Re-evaluate one failure record.
    ///
    /// Safe to call repeatedly: an evaluation already running for the same
    /// record reports [`RecoveryOutcome::Pending`] without touching
    /// anything, and a record that is already resolved reports its stored
    /// outcome without re-applying effects.
    #[instrument(skip(self))]
    pub async fn poll(&self, record_id: &Uuid) -> Result<RecoveryOutcome, Error> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(*record_id) {
                tracing::debug!("Record {} is already being evaluated", record_id);
                return Ok(RecoveryOutcome::Pending);
            }
        }

        let result = self.poll_inner(record_id).await;

        self.in_flight.lock().await.remove(record_id);
        result
    }

    async fn poll_inner(&self, record_id: &Uuid) -> Result<RecoveryOutcome, Error> {
        let record = self
            .store
            .get_failure_record(record_id)
            .await?
            .ok_or(Error::UnknownFailureRecord(*record_id))?;

        if record.resolved {
            // Replay the stored outcome; effects were applied exactly once
            return Ok(match record.failure_reason {
                Some(reason) => RecoveryOutcome::Failed { reason },
                None => RecoveryOutcome::Succeeded {
                    recovered: record.recovered_amount.unwrap_or_default(),
                },
            });
        }

        let wallet = self.wallet_for(record.mint_url.clone(), record.unit.clone());

        let outcome = match record.kind.clone() {
            FailureKind::Melt {
                quote_id,
                invoice_id,
                quote_expiry: _,
                last_state,
            } => {
                self.poll_melt(&wallet, &record, &quote_id, &invoice_id, last_state)
                    .await?
            }
            FailureKind::Swap => self.poll_swap(&wallet, &record).await?,
        };

        if !outcome.is_resolved() {
            // Re-fetch: the evaluation may have updated observed state
            if let Some(mut record) = self.store.get_failure_record(record_id).await? {
                record.retry_count += 1;
                record.last_retry = Some(unix_time());
                self.store.update_failure_record(record).await?;
            }
        }

        Ok(outcome)
    }

    async fn poll_melt(
        &self,
        wallet: &Wallet,
        record: &FailureRecord,
        quote_id: &str,
        invoice_id: &str,
        last_state: MeltQuoteState,
    ) -> Result<RecoveryOutcome, Error> {
        let lightning = self
            .lightning
            .as_ref()
            .ok_or(Error::LightningUnavailable)?;

        match lightning.invoice_status(invoice_id).await? {
            InvoiceStatus::Expired => {
                // The invoice can never be paid now; the melt is dead and
                // the inputs were never consumed
                self.fail_record(record, Error::MeltFailed, true).await
            }
            InvoiceStatus::Unpaid => Ok(RecoveryOutcome::Pending),
            InvoiceStatus::Paid => {
                let quote = self
                    .client
                    .get_melt_quote(&record.mint_url, quote_id)
                    .await?;

                // previous={PAID,PENDING} x current={PAID,PENDING,UNPAID}
                match (last_state, quote.state) {
                    (_, MeltQuoteState::Paid) => self.succeed_melt(wallet, record).await,
                    (_, MeltQuoteState::Pending) => {
                        self.observe_melt_state(record, MeltQuoteState::Pending)
                            .await?;
                        Ok(RecoveryOutcome::Pending)
                    }
                    (MeltQuoteState::Pending | MeltQuoteState::Unpaid, MeltQuoteState::Unpaid) => {
                        // Never progressed past pending: the proofs were
                        // never consumed
                        self.fail_record(record, Error::MeltFailed, true).await
                    }
                    (MeltQuoteState::Paid, MeltQuoteState::Unpaid) => {
                        // The mint is contradicting an earlier PAID
                        // observation; surface for manual review rather
                        // than guessing
                        Err(Error::QuoteStateConflict)
                    }
                }
            }
        }
    }

    async fn succeed_melt(
        &self,
        wallet: &Wallet,
        record: &FailureRecord,
    ) -> Result<RecoveryOutcome, Error> {
        // Reconstruct whatever change the mint owed on the blank outputs
        let change = match &record.outputs {
            Some(outputs) => wallet.restore_change(outputs).await?,
            None => Vec::new(),
        };

        self.commit(record, change).await
    }

    async fn poll_swap(
        &self,
        wallet: &Wallet,
        record: &FailureRecord,
    ) -> Result<RecoveryOutcome, Error> {
        let states = wallet.check_proofs_state(&record.inputs).await?;

        if states.iter().all(|state| state.state == State::Unspent) {
            // Nothing happened at the mint; the inputs are safe to spend
            // again and there is nothing to recover
            return self
                .fail_record(
                    record,
                    Error::Network("swap was never processed".to_string()),
                    true,
                )
                .await;
        }

        let outputs = match &record.outputs {
            Some(outputs) => outputs,
            None => {
                return Err(Error::UnknownFailureRecord(record.id));
            }
        };

        match wallet.restore(outputs).await {
            Ok(proofs) => self.commit(record, proofs).await,
            Err(err @ Error::RestoreUnbalanced { .. }) => {
                // Protocol-level inconsistency: the mint consumed the
                // inputs but will not return all outputs. Resolve so the
                // poller stops retrying, keep the inputs reserved, and
                // surface to an operator.
                tracing::error!("Record {} unrecoverable: {}", record.id, err);
                self.fail_record(record, err, false).await
            }
            Err(err) => Err(err),
        }
    }

    /// Commit a successful recovery: proofs, settlement and resolution as
    /// one unit of work.
    async fn commit(
        &self,
        record: &FailureRecord,
        proofs: ecash::Proofs,
    ) -> Result<RecoveryOutcome, Error> {
        let recovered = proofs.total_amount()?;

        let infos = proofs
            .into_iter()
            .map(|proof| {
                ProofInfo::new(
                    proof,
                    record.mint_url.clone(),
                    State::Unspent,
                    record.unit.clone(),
                )
            })
            .collect::<Result<Vec<ProofInfo>, _>>()?;

        let settlement = Settlement {
            payment_id: record.payment_id.clone(),
            mint_url: record.mint_url.clone(),
            amount: record.value,
            at: unix_time(),
        };

        self.store
            .apply_recovery(&record.id, infos, settlement)
            .await?;

        tracing::info!(
            "Record {} resolved: recovered `{}` toward payment {}",
            record.id,
            recovered,
            record.payment_id
        );

        Ok(RecoveryOutcome::Succeeded { recovered })
    }

    /// Resolve a record as definitively failed.
    ///
    /// `release_inputs` is true only when the mint provably never consumed
    /// the inputs; otherwise they stay reserved for operator review.
    async fn fail_record(
        &self,
        record: &FailureRecord,
        error: Error,
        release_inputs: bool,
    ) -> Result<RecoveryOutcome, Error> {
        if release_inputs {
            self.store.set_unspent_proofs(record.inputs.ys()?).await?;
        }

        let reason = error.to_string();
        let mut record = record.clone();
        record.resolved = true;
        record.failure_reason = Some(reason.clone());
        self.store.update_failure_record(record).await?;

        tracing::info!("Record resolved as failed: {}", reason);

        Ok(RecoveryOutcome::Failed { reason })
    }

    async fn observe_melt_state(
        &self,
        record: &FailureRecord,
        state: MeltQuoteState,
    ) -> Result<(), Error> {
        let mut record = record.clone();
        if let FailureKind::Melt { last_state, .. } = &mut record.kind {
            *last_state = state;
        }
        self.store.update_failure_record(record).await
    }
}
