//! Shared HTTP plumbing for the Fabric endpoints.

use branchout_core::secret::Secret;
use serde::Deserialize;

use crate::error::FabricError;

/// Authenticated client for one Fabric tenant.
///
/// Requests to the Fabric API and the Power BI admin API carry the same
/// bearer token, obtained once per run.
pub struct FabricClient {
    client: reqwest::Client,
    api_url: String,
    admin_api_url: String,
    token: Secret,
}

/// Body of create responses that only matter for their `id`.
#[derive(Debug, Deserialize)]
pub(crate) struct IdResponse {
    #[serde(default)]
    pub id: Option<String>,
}

impl IdResponse {
    pub(crate) fn into_id(self) -> Result<String, FabricError> {
        self.id
            .filter(|id| !id.is_empty())
            .ok_or(FabricError::MissingField("id"))
    }
}

impl FabricClient {
    /// Create a client with its own connection pool.
    ///
    /// * `api_url` - Fabric base URL, e.g. `https://api.fabric.microsoft.com/v1`.
    /// * `admin_api_url` - Power BI base URL, e.g. `https://api.powerbi.com/v1.0/myorg`.
    pub fn new(api_url: impl Into<String>, admin_api_url: impl Into<String>, token: Secret) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, admin_api_url, token)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        admin_api_url: impl Into<String>,
        token: Secret,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            admin_api_url: admin_api_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    pub(crate) fn admin_endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.admin_api_url, path)
    }

    pub(crate) fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url).bearer_auth(self.token.expose())
    }

    pub(crate) fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.post(url).bearer_auth(self.token.expose())
    }
}

// ---- response helpers ----

/// Read the body as text for error reporting.
pub(crate) async fn body_text(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string())
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or a [`FabricError::ApiError`] carrying the
/// status and body text on failure.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, FabricError> {
    let status = response.status();
    if !status.is_success() {
        let body = body_text(response).await;
        return Err(FabricError::ApiError {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
pub(crate) async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, FabricError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

/// Assert the response has a success status code, discarding the body.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<(), FabricError> {
    ensure_success(response).await?;
    Ok(())
}
