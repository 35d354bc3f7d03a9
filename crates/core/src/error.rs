#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Missing required value: {0}")]
    Missing(&'static str),

    #[error("No Fabric credentials: {0}")]
    Credentials(String),

    #[error("Invalid branch name: {0}")]
    InvalidBranchName(String),
}
