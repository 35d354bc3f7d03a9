use branchout_core::error::CoreError;
use branchout_core::policy::Step;
use branchout_fabric::auth::AuthError;
use branchout_fabric::FabricError;
use branchout_github::GitHubError;

/// Error that aborts a branch-out run.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Invalid or incomplete configuration, caught before any request.
    #[error(transparent)]
    Config(#[from] CoreError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Could not generate authentication token: {0}")]
    Auth(#[from] AuthError),

    #[error("Step '{step}' failed: {source}")]
    Fabric {
        step: Step,
        #[source]
        source: FabricError,
    },

    #[error("Step '{step}' failed: {source}")]
    GitHub {
        step: Step,
        #[source]
        source: GitHubError,
    },

    /// A step the run depends on was downgraded to best-effort and failed.
    #[error("Step '{step}' produced no result: {message}")]
    StepSkipped { step: Step, message: String },
}

impl ProvisionError {
    /// The step that failed, when the failure belongs to one.
    pub fn step(&self) -> Option<Step> {
        match self {
            ProvisionError::Config(_) | ProvisionError::HttpClient(_) => None,
            ProvisionError::Auth(_) => Some(Step::Authenticate),
            ProvisionError::Fabric { step, .. }
            | ProvisionError::GitHub { step, .. }
            | ProvisionError::StepSkipped { step, .. } => Some(*step),
        }
    }
}
