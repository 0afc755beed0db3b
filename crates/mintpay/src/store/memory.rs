//! In-memory store
//!
//! Reference [`WalletStore`] implementation backing the test suite. Not
//! durable; a host deployment brings its own database-backed store.

use std::collections::HashMap;

use async_trait::async_trait;
use ecash::{Amount, Id, Keys, KeySet, MintUrl, ProofsMethods, PublicKey, State};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::WalletStore;
use crate::error::Error;
use crate::types::{FailureRecord, ProofInfo, Settlement};

#[derive(Debug, Default)]
struct Inner {
    proofs: HashMap<PublicKey, ProofInfo>,
    keys: HashMap<(MintUrl, Id), Keys>,
    failures: HashMap<Uuid, FailureRecord>,
    settlements: Vec<Settlement>,
}

/// In-memory [`WalletStore`]
#[derive(Debug, Default)]
pub struct WalletMemoryStore {
    inner: RwLock<Inner>,
}

impl WalletMemoryStore {
    /// Create new empty [`WalletMemoryStore`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Settlements registered so far
    pub async fn settlements(&self) -> Vec<Settlement> {
        self.inner.read().await.settlements.clone()
    }
}

#[async_trait]
impl WalletStore for WalletMemoryStore {
    async fn update_proofs(
        &self,
        added: Vec<ProofInfo>,
        removed_ys: Vec<PublicKey>,
    ) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        for y in removed_ys {
            inner.proofs.remove(&y);
        }
        for info in added {
            inner.proofs.insert(info.y, info);
        }
        Ok(())
    }

    async fn get_proofs(
        &self,
        mint_url: Option<&MintUrl>,
        states: Option<&[State]>,
    ) -> Result<Vec<ProofInfo>, Error> {
        let inner = self.inner.read().await;
        Ok(inner
            .proofs
            .values()
            .filter(|info| mint_url.map_or(true, |url| &info.mint_url == url))
            .filter(|info| states.map_or(true, |states| states.contains(&info.state)))
            .cloned()
            .collect())
    }

    async fn set_pending_proofs(&self, ys: Vec<PublicKey>) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        for y in ys {
            if let Some(info) = inner.proofs.get_mut(&y) {
                info.state = State::Pending;
            }
        }
        Ok(())
    }

    async fn set_unspent_proofs(&self, ys: Vec<PublicKey>) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        for y in ys {
            if let Some(info) = inner.proofs.get_mut(&y) {
                info.state = State::Unspent;
            }
        }
        Ok(())
    }

    async fn unspent_balance(&self, mint_url: &MintUrl) -> Result<Amount, Error> {
        let inner = self.inner.read().await;
        let proofs: ecash::Proofs = inner
            .proofs
            .values()
            .filter(|info| &info.mint_url == mint_url && info.state == State::Unspent)
            .map(|info| info.proof.clone())
            .collect();
        Ok(proofs.total_amount()?)
    }

    async fn add_keys(&self, mint_url: MintUrl, keyset: KeySet) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.keys.entry((mint_url, keyset.id)).or_insert(keyset.keys);
        Ok(())
    }

    async fn get_keys(&self, mint_url: &MintUrl, keyset_id: &Id) -> Result<Option<Keys>, Error> {
        let inner = self.inner.read().await;
        Ok(inner.keys.get(&(mint_url.clone(), *keyset_id)).cloned())
    }

    async fn add_failure_record(&self, record: FailureRecord) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.failures.insert(record.id, record);
        Ok(())
    }

    async fn get_failure_record(&self, id: &Uuid) -> Result<Option<FailureRecord>, Error> {
        let inner = self.inner.read().await;
        Ok(inner.failures.get(id).cloned())
    }

    async fn update_failure_record(&self, record: FailureRecord) -> Result<(), Error> {
        let mut inner = self.inner.write().await;
        inner.failures.insert(record.id, record);
        Ok(())
    }

    async fn list_unresolved_failures(&self) -> Result<Vec<FailureRecord>, Error> {
        let inner = self.inner.read().await;
        let mut records: Vec<FailureRecord> = inner
            .failures
            .values()
            .filter(|record| !record.resolved)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.created);
        Ok(records)
    }

    async fn apply_recovery(
        &self,
        record_id: &Uuid,
        proofs: Vec<ProofInfo>,
        settlement: Settlement,
    ) -> Result<(), Error> {
        // One lock acquisition stands in for the database transaction a
        // durable implementation would use.
        let mut inner = self.inner.write().await;

        let record = inner
            .failures
            .get_mut(record_id)
            .ok_or(Error::UnknownFailureRecord(*record_id))?;

        if record.resolved {
            return Ok(());
        }
        record.resolved = true;
        record.recovered_amount = Some(settlement_proofs_total(&proofs)?);

        let removed: Vec<PublicKey> = record.inputs.ys()?;
        for y in removed {
            inner.proofs.remove(&y);
        }
        for info in proofs {
            inner.proofs.insert(info.y, info);
        }
        inner.settlements.push(settlement);

        Ok(())
    }
}

fn settlement_proofs_total(proofs: &[ProofInfo]) -> Result<Amount, Error> {
    Ok(Amount::try_sum(proofs.iter().map(|info| info.proof.amount))?)
}
