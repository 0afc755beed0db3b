//! Lightning and rate collaborators
//!
//! The wallet core never talks to a Lightning node or a rate provider
//! directly; the host wires these two narrow traits in. The Lightning
//! client only originates invoices and reports their status.

use std::fmt::Debug;

use async_trait::async_trait;
use ecash::{Amount, CurrencyUnit, MintUrl};

use crate::error::Error;
use crate::types::{InvoiceHandle, InvoiceStatus};

/// Invoice originator
#[async_trait]
pub trait LightningClient: Debug + Send + Sync {
    /// Create an invoice for `amount` sats
    async fn create_invoice(
        &self,
        amount: Amount,
        memo: &str,
        expiry_secs: u64,
    ) -> Result<InvoiceHandle, Error>;

    /// Current status of a previously created invoice
    async fn invoice_status(&self, invoice_id: &str) -> Result<InvoiceStatus, Error>;
}

/// Exchange rate source
#[async_trait]
pub trait RateSource: Debug + Send + Sync {
    /// Value of one unit of `unit` at `mint_url`, in the settlement unit
    /// (sats). `1.0` for sat-denominated tokens.
    async fn unit_value(&self, mint_url: &MintUrl, unit: &CurrencyUnit) -> Result<f64, Error>;
}
