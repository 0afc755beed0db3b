//! Mint client
//!
//! [`MintConnector`] is the seam between the wallet core and the network:
//! the reqwest-backed [`HttpClient`] implements it in production and tests
//! substitute a scripted mint. Methods take the mint URL per call so one
//! client serves every mint a token may arrive from.

use std::fmt::Debug;

use async_trait::async_trait;
use ecash::melt::{MeltQuoteRequest, MeltQuoteResponse, MeltRequest, MeltResponse};
use ecash::restore::{RestoreRequest, RestoreResponse};
use ecash::{
    CheckStateRequest, CheckStateResponse, Id, KeySet, KeySetInfo, KeysResponse, KeysetResponse,
    MintUrl, SwapRequest, SwapResponse,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;
use url::Url;

use crate::error::{Error, ErrorResponse};

/// Interface that connects the wallet core to a mint
#[async_trait]
pub trait MintConnector: Debug + Send + Sync {
    /// List the mint's keysets
    async fn get_keysets(&self, mint_url: &MintUrl) -> Result<Vec<KeySetInfo>, Error>;
    /// Fetch the keys for one keyset
    async fn get_keys(&self, mint_url: &MintUrl, keyset_id: Id) -> Result<KeySet, Error>;
    /// Swap proofs for fresh outputs
    async fn post_swap(&self, mint_url: &MintUrl, request: SwapRequest)
        -> Result<SwapResponse, Error>;
    /// Request a melt quote for an invoice
    async fn post_melt_quote(
        &self,
        mint_url: &MintUrl,
        request: MeltQuoteRequest,
    ) -> Result<MeltQuoteResponse, Error>;
    /// Current state of a melt quote
    async fn get_melt_quote(
        &self,
        mint_url: &MintUrl,
        quote_id: &str,
    ) -> Result<MeltQuoteResponse, Error>;
    /// Melt proofs against a quote
    async fn post_melt(&self, mint_url: &MintUrl, request: MeltRequest)
        -> Result<MeltResponse, Error>;
    /// Spend state of a set of proofs
    async fn post_check_state(
        &self,
        mint_url: &MintUrl,
        request: CheckStateRequest,
    ) -> Result<CheckStateResponse, Error>;
    /// Re-request signatures for previously submitted outputs
    async fn post_restore(
        &self,
        mint_url: &MintUrl,
        request: RestoreRequest,
    ) -> Result<RestoreResponse, Error>;
}

/// Http mint client
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Create new [`HttpClient`]
    pub fn new() -> Self {
        Self {
            inner: Client::new(),
        }
    }

    fn transport_error(err: reqwest::Error) -> Error {
        // Both cases are indeterminate: the request may have reached the
        // mint even when the response never arrived.
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err.to_string())
        }
    }

    fn decode<R: DeserializeOwned>(body: &str) -> Result<R, Error> {
        serde_json::from_str::<R>(body).map_err(|err| {
            // A body that is not the expected response is usually a
            // well-formed mint rejection
            match ErrorResponse::from_json(body) {
                Ok(rejection) => Error::Mint(rejection),
                Err(_) => {
                    tracing::warn!("Unparseable mint response: {}", err);
                    err.into()
                }
            }
        })
    }

    async fn http_get<R: DeserializeOwned>(&self, url: Url) -> Result<R, Error> {
        let body = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(Self::transport_error)?
            .text()
            .await
            .map_err(Self::transport_error)?;

        Self::decode(&body)
    }

    async fn http_post<P: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        url: Url,
        payload: &P,
    ) -> Result<R, Error> {
        let body = self
            .inner
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(Self::transport_error)?
            .text()
            .await
            .map_err(Self::transport_error)?;

        Self::decode(&body)
    }
}

#[async_trait]
impl MintConnector for HttpClient {
    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_keysets(&self, mint_url: &MintUrl) -> Result<Vec<KeySetInfo>, Error> {
        let url = mint_url.join_paths(&["v1", "keysets"])?;
        Ok(self.http_get::<KeysetResponse>(url).await?.keysets)
    }

    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_keys(&self, mint_url: &MintUrl, keyset_id: Id) -> Result<KeySet, Error> {
        let url = mint_url.join_paths(&["v1", "keys", &keyset_id.to_string()])?;
        self.http_get::<KeysResponse>(url)
            .await?
            .keysets
            .into_iter()
            .next()
            .ok_or(Error::UnknownKeySet(keyset_id))
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_swap(
        &self,
        mint_url: &MintUrl,
        request: SwapRequest,
    ) -> Result<SwapResponse, Error> {
        let url = mint_url.join_paths(&["v1", "swap"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_melt_quote(
        &self,
        mint_url: &MintUrl,
        request: MeltQuoteRequest,
    ) -> Result<MeltQuoteResponse, Error> {
        let url = mint_url.join_paths(&["v1", "melt", "quote", "bolt11"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip(self), fields(mint_url = %mint_url))]
    async fn get_melt_quote(
        &self,
        mint_url: &MintUrl,
        quote_id: &str,
    ) -> Result<MeltQuoteResponse, Error> {
        let url = mint_url.join_paths(&["v1", "melt", "quote", "bolt11", quote_id])?;
        self.http_get(url).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_melt(
        &self,
        mint_url: &MintUrl,
        request: MeltRequest,
    ) -> Result<MeltResponse, Error> {
        let url = mint_url.join_paths(&["v1", "melt", "bolt11"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_check_state(
        &self,
        mint_url: &MintUrl,
        request: CheckStateRequest,
    ) -> Result<CheckStateResponse, Error> {
        let url = mint_url.join_paths(&["v1", "checkstate"])?;
        self.http_post(url, &request).await
    }

    #[instrument(skip(self, request), fields(mint_url = %mint_url))]
    async fn post_restore(
        &self,
        mint_url: &MintUrl,
        request: RestoreRequest,
    ) -> Result<RestoreResponse, Error> {
        let url = mint_url.join_paths(&["v1", "restore"])?;
        self.http_post(url, &request).await
    }
}
