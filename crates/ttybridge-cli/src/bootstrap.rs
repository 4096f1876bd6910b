//! Configuration bootstrap over HTTP.
//!
//! Before any transport is opened the client asks the page for the socket
//! path and service name. Any non-200 status or an unparsable body aborts the
//! connect attempt.

use reqwest::{Client, StatusCode, Url};
use ttybridge_core::BootstrapError;
use ttybridge_proto::ServerConfig;

/// Fetch the server configuration from `url`.
///
/// # Errors
///
/// - [`BootstrapError::Request`] if the request cannot be made
/// - [`BootstrapError::Status`] for any status other than 200
/// - [`BootstrapError::Parse`] if the body is not the expected JSON
pub async fn fetch_config(client: &Client, url: Url) -> Result<ServerConfig, BootstrapError> {
    tracing::debug!(%url, "fetching server configuration");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| BootstrapError::Request(err.to_string()))?;
    let status = response.status();
    let body = response.bytes().await.map_err(|err| BootstrapError::Request(err.to_string()))?;

    interpret(status, &body)
}

/// Turn a bootstrap response into a configuration.
///
/// # Errors
///
/// See [`fetch_config`].
pub fn interpret(status: StatusCode, body: &[u8]) -> Result<ServerConfig, BootstrapError> {
    if status != StatusCode::OK {
        let text = status.canonical_reason().unwrap_or_else(|| status.as_str());
        tracing::warn!(%status, "configuration request rejected");
        return Err(BootstrapError::Status(text.to_string()));
    }

    ServerConfig::from_json(body).map_err(|reason| {
        tracing::warn!(%reason, "configuration response unparsable");
        BootstrapError::Parse { reason }
    })
}
