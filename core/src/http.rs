//! Plumbing shared by the reqwest-backed provider clients.

use crate::error::ProviderKind;
use crate::error::Result;
use crate::error::RetrievalError;
use reqwest::Client;
use reqwest::Response;
use serde_json::Value;
use std::time::Duration;
use tracing::error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a pooled client whose every request is bounded by `timeout`.
/// `reqwest::Client` is cheap to clone and safe to share across concurrent
/// calls.
pub(crate) fn build_client(provider: ProviderKind, timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(timeout.min(CONNECT_TIMEOUT))
        .timeout(timeout)
        .build()
        .map_err(|e| {
            RetrievalError::Configuration(format!("failed to build {provider} HTTP client: {e}"))
        })
}

pub(crate) fn transport_error(provider: ProviderKind, err: reqwest::Error) -> RetrievalError {
    let message = if err.is_timeout() {
        format!("request timed out: {err}")
    } else {
        format!("request failed: {err}")
    };
    RetrievalError::unavailable(provider, message)
}

/// Turn a response into its JSON body. Non-2xx statuses become
/// `ProviderUnavailable`; a 2xx body that is not JSON is malformed.
pub(crate) async fn read_json(provider: ProviderKind, response: Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(%provider, %status, body = %error_text, "Provider returned an error status");
        return Err(RetrievalError::unavailable(
            provider,
            format!("HTTP {status}: {error_text}"),
        ));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(provider, e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| RetrievalError::malformed(provider, format!("body is not JSON: {e}")))
}
