//! Authenticated HTTP gateway for one-shot REST calls.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::credential::CredentialManager;
use crate::error::ClientError;

/// Header carrying the credential on every authenticated call.
pub const CREDENTIAL_HEADER: &str = "X-Stronghold-Token";

/// Result of the advisory connectivity probe.
#[derive(Debug)]
pub enum ProbeOutcome {
    /// Server answered with a 2xx status.
    Reachable,
    /// Server could not be confirmed reachable. Holds a `ConnectivityFailure`.
    Unreachable(ClientError),
}

impl ProbeOutcome {
    /// Check if the probe succeeded.
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable)
    }
}

/// HTTP client that attaches the current credential to each request.
#[derive(Clone)]
pub struct RequestGateway {
    inner: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialManager>,
}

impl RequestGateway {
    /// Create a new gateway.
    pub fn new(base_url: &str, credentials: Arc<CredentialManager>) -> Self {
        Self {
            inner: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Send an authenticated request, returning the raw response.
    ///
    /// Fails with `NotInitialized` before credentials are established.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response, ClientError> {
        let credential = self.credentials.credential().await?;
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "HTTP request");

        let mut request = self
            .inner
            .request(method, &url)
            .header(CREDENTIAL_HEADER, credential.value());
        if let Some(body) = body {
            request = request.json(&body);
        }

        Ok(request.send().await?)
    }

    /// Send a request and fail on non-2xx, attaching the response body.
    pub async fn request_ok(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response, ClientError> {
        let response = self.request(method, path, body).await?;
        ensure_success(response).await
    }

    /// Send a request and decode a JSON response.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let response = self.request_ok(method, path, body).await?;
        response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Check connectivity, giving up after `timeout`.
    ///
    /// Never fails: problems are logged and reported in the outcome.
    pub async fn probe(&self, path: &str, timeout: Duration) -> ProbeOutcome {
        self.probe_until(path, timeout, CancellationToken::new()).await
    }

    /// Like [`probe`](Self::probe), also giving up when `cancel` fires.
    pub async fn probe_until(
        &self,
        path: &str,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> ProbeOutcome {
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::ConnectivityFailure(format!(
                "probe of {} cancelled",
                path
            ))),
            _ = tokio::time::sleep(timeout) => Err(ClientError::ConnectivityFailure(format!(
                "probe of {} timed out after {}ms",
                path,
                timeout.as_millis()
            ))),
            result = self.request(Method::GET, path, None) => match result {
                Ok(response) if response.status().is_success() => Ok(()),
                Ok(response) => Err(ClientError::ConnectivityFailure(format!(
                    "probe of {} returned HTTP {}",
                    path,
                    response.status()
                ))),
                Err(e) => Err(ClientError::ConnectivityFailure(e.to_string())),
            },
        };

        match result {
            Ok(()) => {
                debug!(path = %path, "Connectivity probe succeeded");
                ProbeOutcome::Reachable
            }
            Err(err) => {
                warn!(path = %path, error = %err, "Connectivity probe failed");
                ProbeOutcome::Unreachable(err)
            }
        }
    }
}

/// Turn a non-2xx response into `RequestFailed` carrying the body text.
async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(status = %status, error = %e, "Failed to read error response body");
            String::new()
        }
    };
    Err(ClientError::RequestFailed {
        status: status.as_u16(),
        body,
    })
}
