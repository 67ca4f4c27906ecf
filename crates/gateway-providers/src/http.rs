//! HTTP plumbing shared by the adapters.
//!
//! Every vendor call goes through a [`Call`], which races the request against the caller's
//! cancellation token and turns transport failures and error statuses into classified
//! provider errors.

use gateway_core::{Cause, GatewayError, GatewayResult, Sentinel};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Maps a vendor error status and body to a cause
pub(crate) type ErrorParser = fn(u16, &str) -> Cause;

/// Build the pooled HTTP client for one model instance
pub(crate) fn build_client(provider: &str, timeout: Duration) -> GatewayResult<Client> {
    Client::builder()
        .connect_timeout(timeout)
        .pool_max_idle_per_host(100)
        .build()
        .map_err(|e| {
            GatewayError::classify(
                provider,
                Sentinel::ClientConstruction,
                Cause::Transport(format!("failed to create HTTP client: {e}")),
            )
        })
}

/// Cause for a reqwest failure; client timeouts count as deadline expiry
pub(crate) fn transport_cause(err: &reqwest::Error) -> Cause {
    if err.is_timeout() {
        Cause::DeadlineExceeded
    } else if err.is_decode() {
        Cause::Decode(err.to_string())
    } else {
        Cause::Transport(err.to_string())
    }
}

/// One classified vendor operation
#[derive(Clone, Copy)]
pub(crate) struct Call<'a> {
    pub provider: &'a str,
    pub sentinel: Sentinel,
    pub parse_error: ErrorParser,
}

impl<'a> Call<'a> {
    pub(crate) fn new(provider: &'a str, sentinel: Sentinel, parse_error: ErrorParser) -> Self {
        Self {
            provider,
            sentinel,
            parse_error,
        }
    }

    pub(crate) fn error(&self, cause: Cause) -> GatewayError {
        GatewayError::classify(self.provider, self.sentinel, cause)
    }

    /// Send and check the status. The body is left unread.
    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        cancel: Option<&CancellationToken>,
    ) -> GatewayResult<Response> {
        self.race(cancel, async {
            let response = request
                .send()
                .await
                .map_err(|e| self.error(transport_cause(&e)))?;
            self.check_status(response).await
        })
        .await
    }

    /// Send, check the status and decode the JSON body, keeping the raw value
    pub(crate) async fn json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        cancel: Option<&CancellationToken>,
    ) -> GatewayResult<(T, serde_json::Value)> {
        self.race(cancel, async {
            let response = request
                .send()
                .await
                .map_err(|e| self.error(transport_cause(&e)))?;
            let response = self.check_status(response).await?;
            let body = response
                .bytes()
                .await
                .map_err(|e| self.error(transport_cause(&e)))?;

            trace!(provider = %self.provider, bytes = body.len(), "Received response body");

            let raw: serde_json::Value = serde_json::from_slice(&body)
                .map_err(|e| self.error(Cause::Decode(format!("invalid JSON: {e}"))))?;
            let typed = T::deserialize(&raw)
                .map_err(|e| self.error(Cause::Decode(format!("unexpected response shape: {e}"))))?;
            Ok((typed, raw))
        })
        .await
    }

    /// Classify a non-success response
    pub(crate) async fn check_status(&self, response: Response) -> GatewayResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            provider = %self.provider,
            status = status.as_u16(),
            "Provider returned error status"
        );
        Err(self.error((self.parse_error)(status.as_u16(), &body)))
    }

    async fn race<T>(
        &self,
        cancel: Option<&CancellationToken>,
        fut: impl Future<Output = GatewayResult<T>>,
    ) -> GatewayResult<T> {
        let Some(cancel) = cancel else {
            return fut.await;
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(GatewayError::cancelled(self.provider, self.sentinel)),
            result = fut => result,
        }
    }
}

/// Fallback cause when an error body has no recognisable shape
pub(crate) fn plain_error(status: u16, body: &str) -> Cause {
    let message = if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        body.trim().to_string()
    };
    Cause::api(status, message)
}
