//! Small helpers shared by the platform REST clients.

use collab_core::BridgeError;
use serde::de::DeserializeOwned;

/// JSON:API media type used by the Data Management endpoints.
pub const JSON_API: &str = "application/vnd.api+json";

/// Joins a base URL and an absolute path without doubling slashes.
pub fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Passes 2xx responses through; turns anything else into a transport error
/// carrying the status and the response body.
pub async fn check(resp: reqwest::Response) -> Result<reqwest::Response, BridgeError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(BridgeError::Transport(format!(
        "{url} returned {status}: {}",
        body.trim()
    )))
}

/// `check` followed by JSON decoding.
pub async fn json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, BridgeError> {
    check(resp)
        .await?
        .json::<T>()
        .await
        .map_err(BridgeError::transport)
}
