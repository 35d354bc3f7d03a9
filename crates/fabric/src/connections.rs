//! Credential connections that let Fabric reach GitHub.
//!
//! Connections are looked up by display name and created only when no
//! match exists, so repeated runs against the same repository share one
//! connection.

use branchout_core::secret::Secret;
use serde::Deserialize;
use serde_json::json;

use crate::client::{parse_response, FabricClient, IdResponse};
use crate::error::FabricError;

/// Stop following `continuationUri` after this many pages.
const MAX_LISTING_PAGES: usize = 100;

/// A connection as returned by `GET /connections`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Whether a connection was found by name or created by this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOutcome {
    Reused(String),
    Created(String),
}

impl ConnectionOutcome {
    pub fn id(&self) -> &str {
        match self {
            ConnectionOutcome::Reused(id) | ConnectionOutcome::Created(id) => id,
        }
    }
}

/// The listing endpoint answers either with a bare array or with the
/// array wrapped under `value`; anything else reads as no connections.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConnectionListing {
    Bare(Vec<Connection>),
    Wrapped {
        value: Vec<Connection>,
        #[serde(rename = "continuationUri", default)]
        continuation_uri: Option<String>,
    },
    Other(serde_json::Value),
}

impl ConnectionListing {
    fn into_page(self) -> (Vec<Connection>, Option<String>) {
        match self {
            ConnectionListing::Bare(connections) => (connections, None),
            ConnectionListing::Wrapped {
                value,
                continuation_uri,
            } => (value, continuation_uri.filter(|uri| !uri.is_empty())),
            ConnectionListing::Other(_) => (Vec::new(), None),
        }
    }
}

/// Find the first connection whose display name equals `display_name`
/// exactly and that carries an id.
pub fn find_by_display_name<'a>(
    connections: &'a [Connection],
    display_name: &str,
) -> Option<&'a str> {
    connections
        .iter()
        .filter(|c| c.display_name.as_deref() == Some(display_name))
        .find_map(|c| c.id.as_deref().filter(|id| !id.is_empty()))
}

impl FabricClient {
    /// List every connection visible to the caller, following pagination.
    pub async fn list_connections(&self) -> Result<Vec<Connection>, FabricError> {
        let mut url = self.endpoint("connections");
        let mut connections = Vec::new();

        for _ in 0..MAX_LISTING_PAGES {
            let listing: ConnectionListing = parse_response(self.get(&url).send().await?).await?;
            let (page, next) = listing.into_page();
            connections.extend(page);

            match next {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }

        tracing::debug!(count = connections.len(), "Listed Fabric connections");
        Ok(connections)
    }

    /// Return the id of the connection named `display_name`, creating a
    /// GitHub key-credential connection holding `secret` if none exists.
    pub async fn get_or_create_connection(
        &self,
        display_name: &str,
        secret: &Secret,
    ) -> Result<ConnectionOutcome, FabricError> {
        if secret.is_empty() {
            tracing::error!("GitHub PAT token is required to create or use a GitHub connection");
            return Err(FabricError::MissingSecret);
        }

        let connections = self.list_connections().await?;
        if let Some(id) = find_by_display_name(&connections, display_name) {
            tracing::info!(connection = display_name, connection_id = id, "Found existing GitHub connection");
            return Ok(ConnectionOutcome::Reused(id.to_string()));
        }

        tracing::info!(connection = display_name, "Creating GitHub PAT connection");
        let body = json!({
            "connectivityType": "ShareableCloud",
            "displayName": display_name,
            "connectionDetails": {
                "type": "GitHubSourceControl",
                "creationMethod": "GitHubSourceControl.Contents",
            },
            "credentialDetails": {
                "credentials": {
                    "credentialType": "Key",
                    "key": secret.expose(),
                },
            },
        });

        let response = self
            .post(&self.endpoint("connections"))
            .json(&body)
            .send()
            .await?;
        let id = parse_response::<IdResponse>(response).await?.into_id()?;

        tracing::info!(connection = display_name, connection_id = %id, "GitHub connection created");
        Ok(ConnectionOutcome::Created(id))
    }
}
