//! `reqwest` implementation of [`CartApi`].
//!
//! Authenticated calls rely on the storefront session cookie: either kept by
//! the client's cookie store after login, or supplied up front through
//! [`CartConfig::session_cookie`].

use std::sync::Arc;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use grocer_core::api::{
    CartSnapshotResponse, ErrorBody, GuestAddRequest, SyncRequest, SyncResponse,
};
use grocer_core::{CartLineItem, LineId, SessionToken};

use super::{ApiError, CartApi};
use crate::config::CartConfig;

/// HTTP client for the storefront cart endpoints.
#[derive(Clone)]
pub struct HttpCartApi {
    inner: Arc<HttpCartApiInner>,
}

struct HttpCartApiInner {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpCartApi {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be constructed
    /// (e.g., the session cookie is not a valid header value).
    pub fn new(config: &CartConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = &config.session_cookie {
            let mut value = HeaderValue::from_str(cookie.expose_secret())
                .map_err(|e| ApiError::Network(format!("invalid session cookie: {e}")))?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self::with_client(client, config.api_url.clone()))
    }

    /// Wrap an existing `reqwest` client (shares its cookie jar).
    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: Url) -> Self {
        Self {
            inner: Arc::new(HttpCartApiInner { client, base_url }),
        }
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| ApiError::Network(format!("invalid URL {path}: {e}")))
    }

    /// Send a request and decode the JSON body or the error body.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !status.is_success() {
            let parsed = serde_json::from_str::<ErrorBody>(&body).ok();
            debug!(status = %status, code = ?parsed.as_ref().map(|b| b.code), "Cart API error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                code: parsed.as_ref().map(|b| b.code),
                message: parsed.map_or_else(
                    || body.chars().take(200).collect(),
                    |b| b.message,
                ),
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Turn `success: false` into an error so callers only see accepted writes.
fn accepted(response: SyncResponse) -> Result<SyncResponse, ApiError> {
    if response.success {
        Ok(response)
    } else {
        Err(ApiError::Rejected(
            response
                .message
                .unwrap_or_else(|| "cart rejected".to_string()),
        ))
    }
}

impl CartApi for HttpCartApi {
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    async fn push(&self, request: &SyncRequest) -> Result<SyncResponse, ApiError> {
        let url = self.url("api/cart/sync")?;
        let response = self
            .execute(self.inner.client.post(url).json(request))
            .await?;
        accepted(response)
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<CartSnapshotResponse, ApiError> {
        let url = self.url("api/cart")?;
        self.execute(self.inner.client.get(url)).await
    }

    #[instrument(skip(self, item), fields(line = %item.line_id()))]
    async fn guest_add(
        &self,
        token: SessionToken,
        item: &CartLineItem,
    ) -> Result<SyncResponse, ApiError> {
        let url = self.url(&format!("api/cart/guest/{token}/items"))?;
        let body = GuestAddRequest { item: item.clone() };
        let response = self.execute(self.inner.client.post(url).json(&body)).await?;
        accepted(response)
    }

    #[instrument(skip(self))]
    async fn guest_remove(
        &self,
        token: SessionToken,
        line: LineId,
    ) -> Result<SyncResponse, ApiError> {
        let url = self.url(&format!(
            "api/cart/guest/{token}/items/{}/{}",
            line.product_id, line.variant_id
        ))?;
        let response = self.execute(self.inner.client.delete(url)).await?;
        accepted(response)
    }
}
