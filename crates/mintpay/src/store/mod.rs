//! Durable store
//!
//! The wallet core treats persistence as rows behind this trait; the host
//! brings the storage technology. One store instance is scoped to one
//! merchant store: scope ids are the implementor's concern, not threaded
//! through every call.

use std::fmt::Debug;

use async_trait::async_trait;
use ecash::{Amount, Id, Keys, KeySet, MintUrl, PublicKey, State};
use uuid::Uuid;

use crate::error::Error;
use crate::types::{FailureRecord, ProofInfo, Settlement};

pub mod memory;

pub use memory::WalletMemoryStore;

/// Durable wallet storage
#[async_trait]
pub trait WalletStore: Debug + Send + Sync {
    /// Atomically add and remove proofs.
    ///
    /// A swap's success path hangs on this being one write: the inputs are
    /// deleted and the results persisted with no intermediate state ever
    /// durably observable.
    async fn update_proofs(
        &self,
        added: Vec<ProofInfo>,
        removed_ys: Vec<PublicKey>,
    ) -> Result<(), Error>;

    /// Proofs, optionally filtered by mint and state
    async fn get_proofs(
        &self,
        mint_url: Option<&MintUrl>,
        states: Option<&[State]>,
    ) -> Result<Vec<ProofInfo>, Error>;

    /// Mark proofs as in-flight so no concurrent operation selects them
    async fn set_pending_proofs(&self, ys: Vec<PublicKey>) -> Result<(), Error>;

    /// Return proofs to the available pool
    async fn set_unspent_proofs(&self, ys: Vec<PublicKey>) -> Result<(), Error>;

    /// Sum of unspent, non-reserved proof amounts for a mint
    async fn unspent_balance(&self, mint_url: &MintUrl) -> Result<Amount, Error>;

    /// Cache the keys of a keyset. Keys for an id never change, so this is
    /// insert-only.
    async fn add_keys(&self, mint_url: MintUrl, keyset: KeySet) -> Result<(), Error>;

    /// Cached keys for a keyset, if known
    async fn get_keys(&self, mint_url: &MintUrl, keyset_id: &Id) -> Result<Option<Keys>, Error>;

    /// Persist a new failure record
    async fn add_failure_record(&self, record: FailureRecord) -> Result<(), Error>;

    /// A failure record by id
    async fn get_failure_record(&self, id: &Uuid) -> Result<Option<FailureRecord>, Error>;

    /// Update a failure record (retry bookkeeping, observed state, failed
    /// resolution)
    async fn update_failure_record(&self, record: FailureRecord) -> Result<(), Error>;

    /// Unresolved failure records, oldest first
    async fn list_unresolved_failures(&self) -> Result<Vec<FailureRecord>, Error>;

    /// Commit a successful recovery as one unit of work: persist the
    /// recovered proofs, register the settlement, and resolve the record.
    ///
    /// A half-applied recovery (proofs saved but settlement missing, or the
    /// reverse) is exactly the state this subsystem exists to prevent, so
    /// implementations must apply the three effects together. Calling this
    /// for an already-resolved record is a no-op.
    async fn apply_recovery(
        &self,
        record_id: &Uuid,
        proofs: Vec<ProofInfo>,
        settlement: Settlement,
    ) -> Result<(), Error>;
}
