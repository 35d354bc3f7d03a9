//! Command-line surface.
//!
//! Every flag can also be set through the environment (or a `.env` file
//! loaded by `main`), using the variable names pipelines already pass.

use std::time::Duration;

use branchout_core::config::{
    ApiEndpoints, CredentialInputs, Credentials, RunConfig, SyncSettings, DEFAULT_AUTHORITY_URL,
    DEFAULT_FABRIC_API_URL, DEFAULT_GITHUB_API_URL, DEFAULT_POWERBI_API_URL, MAX_SYNC_TIMEOUT,
};
use branchout_core::error::CoreError;
use branchout_core::naming::default_branch_name;
use branchout_core::secret::Secret;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "branchout",
    version,
    about = "Branch out a Fabric feature workspace connected to a new GitHub branch"
)]
pub struct Args {
    /// Name of the feature workspace to create
    #[arg(long, env = "WORKSPACE_NAME")]
    pub workspace_name: String,

    /// Developer UPN added to the workspace as admin
    #[arg(long, env = "DEVELOPER")]
    pub developer: String,

    /// Branch the new branch is created from
    #[arg(long, env = "GH_MAIN_BRANCH")]
    pub main_branch: String,

    /// Branch to create (default: feature/<workspace name slug>)
    #[arg(long, env = "GH_NEW_BRANCH")]
    pub new_branch: Option<String>,

    /// Folder in the repository holding workspace items ("/" for root)
    #[arg(long, env = "GH_GIT_FOLDER")]
    pub git_folder: String,

    /// GitHub organization or user owning the repository
    #[arg(long, env = "GH_OWNER")]
    pub owner: String,

    /// GitHub repository name
    #[arg(long = "repo", env = "GH_REPO_NAME")]
    pub repo_name: String,

    /// Fabric capacity the workspace is assigned to
    #[arg(long, env = "CAPACITY_ID")]
    pub capacity_id: String,

    /// GitHub PAT with repo access
    #[arg(long, env = "GH_PAT_TOKEN", hide_env_values = true)]
    pub pat_token: String,

    #[arg(long, env = "TENANT_ID")]
    pub tenant_id: Option<String>,

    #[arg(long, env = "CLIENT_ID")]
    pub client_id: Option<String>,

    /// Service principal secret (alternative to username/password)
    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Service account without MFA
    #[arg(long = "username", env = "USER_NAME")]
    pub username: Option<String>,

    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Pre-acquired Fabric token; skips token acquisition
    #[arg(long, env = "FABRIC_TOKEN", hide_env_values = true)]
    pub fabric_token: Option<String>,

    #[arg(long, env = "FABRIC_API_URL", default_value = DEFAULT_FABRIC_API_URL)]
    pub fabric_api_url: String,

    #[arg(long, env = "POWERBI_API_URL", default_value = DEFAULT_POWERBI_API_URL)]
    pub powerbi_api_url: String,

    #[arg(long, env = "GH_API_URL", default_value = DEFAULT_GITHUB_API_URL)]
    pub github_api_url: String,

    #[arg(long, env = "AUTHORITY_URL", default_value = DEFAULT_AUTHORITY_URL)]
    pub authority_url: String,

    /// Seconds between sync status polls
    #[arg(
        long,
        env = "POLL_INTERVAL_SECS",
        default_value_t = 15,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_secs: u64,

    /// Give up polling the sync after this many seconds
    #[arg(
        long,
        env = "SYNC_TIMEOUT_SECS",
        default_value_t = 1800,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SYNC_TIMEOUT.as_secs())
    )]
    pub sync_timeout_secs: u64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Args {
    /// Validate the arguments and build the immutable run configuration.
    pub fn into_config(self) -> Result<RunConfig, CoreError> {
        let new_branch = match self.new_branch.filter(|b| !b.trim().is_empty()) {
            Some(branch) => branch,
            None => {
                let derived = default_branch_name(&self.workspace_name)?;
                tracing::info!(branch = %derived, "No new branch given, derived one from the workspace name");
                derived
            }
        };

        let credentials = Credentials::resolve(CredentialInputs {
            token: self.fabric_token.map(Secret::from),
            tenant_id: self.tenant_id,
            client_id: self.client_id,
            client_secret: self.client_secret.map(Secret::from),
            username: self.username,
            password: self.password.map(Secret::from),
        })?;

        let interval = Duration::from_secs(self.poll_interval_secs);
        let config = RunConfig {
            workspace_name: self.workspace_name,
            capacity_id: self.capacity_id,
            developer: self.developer,
            owner: self.owner,
            repo: self.repo_name,
            main_branch: self.main_branch,
            new_branch,
            git_folder: self.git_folder,
            pat_token: Secret::from(self.pat_token),
            credentials,
            endpoints: ApiEndpoints::new(
                self.fabric_api_url,
                self.powerbi_api_url,
                self.github_api_url,
                self.authority_url,
            ),
            sync: SyncSettings {
                initial_delay: interval,
                poll_interval: interval,
                timeout: Duration::from_secs(self.sync_timeout_secs),
            },
        };

        config.validate()?;
        Ok(config)
    }
}
