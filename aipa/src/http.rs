//! Outbound HTTP plumbing shared by the remote clients.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{Error, Result};

pub const USER_AGENT: &str = concat!("aipa/", env!("CARGO_PKG_VERSION"));

/// Build the reqwest client used by one remote client.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|source| Error::Transport {
            service: "http",
            source,
        })
}

/// Send a request with a timeout and turn non-2xx answers into `Error::Status`.
///
/// The error body is read under the same timeout; a stalled body is reported
/// as empty.
pub async fn send(service: &'static str, request: RequestBuilder, timeout: Duration) -> Result<Response> {
    let response = tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| Error::Timeout(service))?
        .map_err(|source| Error::Transport { service, source })?;

    let status = response.status();
    if !status.is_success() {
        let body = tokio::time::timeout(timeout, response.text())
            .await
            .ok()
            .and_then(|body| body.ok())
            .unwrap_or_default();
        return Err(Error::Status {
            service,
            status,
            body,
        });
    }
    Ok(response)
}

/// Send and decode a JSON body.
pub async fn send_json<T: DeserializeOwned>(
    service: &'static str,
    request: RequestBuilder,
    timeout: Duration,
) -> Result<T> {
    let response = send(service, request, timeout).await?;
    let body = tokio::time::timeout(timeout, response.text())
        .await
        .map_err(|_| Error::Timeout(service))?
        .map_err(|source| Error::Transport { service, source })?;
    serde_json::from_str(&body).map_err(|e| Error::parse(service, format!("{} (body: {})", e, truncate_body(&body))))
}

/// Send and return the raw body bytes.
pub async fn send_bytes(service: &'static str, request: RequestBuilder, timeout: Duration) -> Result<Vec<u8>> {
    let response = send(service, request, timeout).await?;
    let bytes = tokio::time::timeout(timeout, response.bytes())
        .await
        .map_err(|_| Error::Timeout(service))?
        .map_err(|source| Error::Transport { service, source })?;
    Ok(bytes.to_vec())
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    if body.chars().count() <= MAX {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX).collect();
        format!("{}...", head)
    }
}
