/// Errors from the Fabric and Power BI REST layer.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Fabric returned a non-2xx status code.
    #[error("Fabric API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A workspace with the requested display name already exists.
    #[error("Workspace '{0}' already exists; choose a new workspace name")]
    WorkspaceExists(String),

    /// A success response did not carry a field the caller needs.
    #[error("Fabric response is missing '{0}'")]
    MissingField(&'static str),

    /// No GitHub token was available for the credential connection.
    #[error("A GitHub PAT token is required to create or use a GitHub connection")]
    MissingSecret,
}
