//! Fabric bearer-token acquisition.
//!
//! A pre-supplied token is used as-is. Otherwise the token is requested
//! from the Microsoft identity platform v2 token endpoint with either the
//! `client_credentials` or the `password` grant.

use branchout_core::config::Credentials;
use branchout_core::secret::Secret;
use serde::Deserialize;

/// OAuth2 scope granting access to the Fabric REST API.
pub const FABRIC_SCOPE: &str = "https://api.fabric.microsoft.com/.default";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Token endpoint rejected the request ({status}): {error}: {description}")]
    Rejected {
        status: u16,
        error: String,
        description: String,
    },

    #[error("No Fabric token could be obtained")]
    EmptyToken,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Produce a bearer token for the Fabric API scope.
///
/// * `authority_url` - identity host, e.g. `https://login.microsoftonline.com`.
pub async fn acquire_token(
    client: &reqwest::Client,
    authority_url: &str,
    credentials: &Credentials,
) -> Result<Secret, AuthError> {
    let (tenant_id, params) = match credentials {
        Credentials::Token(token) => {
            if token.is_empty() {
                return Err(AuthError::EmptyToken);
            }
            tracing::info!(token_len = token.len(), "Using provided Fabric token");
            return Ok(token.clone());
        }
        Credentials::ClientSecret {
            tenant_id,
            client_id,
            client_secret,
        } => (
            tenant_id,
            vec![
                ("grant_type", "client_credentials"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.expose()),
                ("scope", FABRIC_SCOPE),
            ],
        ),
        Credentials::Password {
            tenant_id,
            client_id,
            username,
            password,
        } => (
            tenant_id,
            vec![
                ("grant_type", "password"),
                ("client_id", client_id.as_str()),
                ("username", username.as_str()),
                ("password", password.expose()),
                ("scope", FABRIC_SCOPE),
            ],
        ),
    };

    let url = token_endpoint(authority_url, tenant_id);
    tracing::info!(
        grant = credentials.kind(),
        tenant_id = %tenant_id,
        "Requesting Fabric token",
    );

    let response = client.post(&url).form(&params).send().await?;
    let status = response.status();
    // The identity platform reports failures as JSON with a 4xx status.
    let body: TokenResponse = response.json().await?;

    if !status.is_success() {
        let error = body.error.unwrap_or_else(|| "unknown_error".into());
        let description = body.error_description.unwrap_or_default();
        tracing::error!(status = status.as_u16(), error = %error, "Fabric token could not be obtained");
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            error,
            description,
        });
    }

    let token = body
        .access_token
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::EmptyToken)?;
    tracing::info!(token_len = token.len(), "Fabric token acquired");
    Ok(Secret::new(token))
}

fn token_endpoint(authority_url: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        authority_url.trim_end_matches('/'),
        tenant_id
    )
}
