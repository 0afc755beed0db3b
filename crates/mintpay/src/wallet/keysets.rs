//! Keyset service
//!
//! Keyset listings are always fetched live (activation can change at any
//! time); key material is cached by (mint, id) because the id is derived
//! from the keys. The cache is an optimization only: a cold cache costs an
//! extra round-trip, never correctness.

use std::collections::HashMap;

use ecash::{Amount, Id, Keys, KeySetInfo, Proofs, ProofsMethods};
use tracing::instrument;

use super::Wallet;
use crate::error::Error;

impl Wallet {
    /// The mint's current keyset listing, fetched live
    #[instrument(skip(self))]
    pub async fn keysets(&self) -> Result<Vec<KeySetInfo>, Error> {
        self.client().get_keysets(&self.mint_url).await
    }

    /// The active keyset for this wallet's unit with the lowest input fee
    #[instrument(skip(self))]
    pub async fn active_keyset(&self) -> Result<KeySetInfo, Error> {
        self.keysets()
            .await?
            .into_iter()
            .filter(|keyset| keyset.active && keyset.unit == self.unit)
            .min_by_key(|keyset| keyset.input_fee_ppk)
            .ok_or(Error::NoActiveKeyset)
    }

    /// Keys for a keyset, store-first.
    ///
    /// On a cache miss the keys are fetched, checked against the id they
    /// claim, and persisted. The lock only dampens duplicate fetches under
    /// race; a duplicate fetch would be harmless.
    #[instrument(skip(self))]
    pub async fn keys(&self, keyset_id: Id) -> Result<Keys, Error> {
        if let Some(keys) = self.store().get_keys(&self.mint_url, &keyset_id).await? {
            return Ok(keys);
        }

        let _fetch_guard = self.keys_fetch_lock.lock().await;
        if let Some(keys) = self.store().get_keys(&self.mint_url, &keyset_id).await? {
            return Ok(keys);
        }

        let keyset = self.client().get_keys(&self.mint_url, keyset_id).await?;
        keyset.verify_id()?;

        self.store()
            .add_keys(self.mint_url.clone(), keyset.clone())
            .await?;

        Ok(keyset.keys)
    }
}

/// Input fee for spending a set of proofs, given the mint's keyset listing.
///
/// Fees are quoted per-proof in parts-per-thousand and the total rounds up
/// to the next whole unit.
pub fn keyset_fee(proofs: &Proofs, keysets: &[KeySetInfo]) -> Result<Amount, Error> {
    let fee_ppk: HashMap<Id, u64> = keysets
        .iter()
        .map(|keyset| (keyset.id, keyset.input_fee_ppk))
        .collect();

    let mut sum_fee: u64 = 0;
    for (keyset_id, proof_count) in proofs.count_by_keyset() {
        let ppk = fee_ppk
            .get(&keyset_id)
            .ok_or(Error::UnknownKeySet(keyset_id))?;

        let proofs_fee = ppk
            .checked_mul(proof_count)
            .ok_or(ecash::amount::Error::AmountOverflow)?;
        sum_fee = sum_fee
            .checked_add(proofs_fee)
            .ok_or(ecash::amount::Error::AmountOverflow)?;
    }

    Ok(Amount::from(sum_fee.div_ceil(1000)))
}
