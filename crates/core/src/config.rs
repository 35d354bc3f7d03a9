//! Immutable run configuration.
//!
//! Built once from the command line (see the `branchout` binary) and
//! passed by reference to every step.

use std::time::Duration;

use crate::error::CoreError;
use crate::secret::Secret;

pub const DEFAULT_FABRIC_API_URL: &str = "https://api.fabric.microsoft.com/v1";
pub const DEFAULT_POWERBI_API_URL: &str = "https://api.powerbi.com/v1.0/myorg";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";

/// Fixed delay before the first poll and between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Upper bound on how long the initial sync is polled.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Largest accepted sync timeout.
pub const MAX_SYNC_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Base URLs of every remote API the run talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub fabric: String,
    /// Power BI admin API, used for the workspace admin grant.
    pub powerbi: String,
    pub github: String,
    /// OAuth2 authority host (tenant is appended per request).
    pub authority: String,
}

impl ApiEndpoints {
    /// Build endpoints, dropping any trailing `/` so paths can be appended
    /// with `format!("{base}/...")`.
    pub fn new(
        fabric: impl Into<String>,
        powerbi: impl Into<String>,
        github: impl Into<String>,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            fabric: trim_base(fabric.into()),
            powerbi: trim_base(powerbi.into()),
            github: trim_base(github.into()),
            authority: trim_base(authority.into()),
        }
    }
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self::new(
            DEFAULT_FABRIC_API_URL,
            DEFAULT_POWERBI_API_URL,
            DEFAULT_GITHUB_API_URL,
            DEFAULT_AUTHORITY_URL,
        )
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

/// Timing of the initial git sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Wait after an accepted update before the first status poll.
    pub initial_delay: Duration,
    /// Wait between polls when the provider does not send `Retry-After`.
    pub poll_interval: Duration,
    /// Polling gives up once this much time has passed.
    pub timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_POLL_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }
}

/// How the Fabric bearer token is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A token supplied by the caller, used as-is.
    Token(Secret),
    /// Service principal, `client_credentials` grant.
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: Secret,
    },
    /// Username/password (resource owner) grant; the account must not
    /// require MFA.
    Password {
        tenant_id: String,
        client_id: String,
        username: String,
        password: Secret,
    },
}

/// Raw credential inputs as they arrive from the command line.
#[derive(Debug, Clone, Default)]
pub struct CredentialInputs {
    pub token: Option<Secret>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<Secret>,
    pub username: Option<String>,
    pub password: Option<Secret>,
}

impl Credentials {
    /// Pick a credential source from the inputs.
    ///
    /// Precedence: pre-supplied token, then client secret, then
    /// username/password. Blank values count as absent.
    pub fn resolve(inputs: CredentialInputs) -> Result<Self, CoreError> {
        let CredentialInputs {
            token,
            tenant_id,
            client_id,
            client_secret,
            username,
            password,
        } = inputs;

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            return Ok(Credentials::Token(token));
        }

        let tenant_id = tenant_id.filter(|v| !v.trim().is_empty());
        let client_id = client_id.filter(|v| !v.trim().is_empty());
        let (Some(tenant_id), Some(client_id)) = (tenant_id, client_id) else {
            return Err(CoreError::Credentials(
                "provide a Fabric token, or a tenant id and client id with a secret or username/password"
                    .into(),
            ));
        };

        if let Some(client_secret) = client_secret.filter(|s| !s.is_empty()) {
            return Ok(Credentials::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            });
        }

        match (
            username.filter(|u| !u.trim().is_empty()),
            password.filter(|p| !p.is_empty()),
        ) {
            (Some(username), Some(password)) => Ok(Credentials::Password {
                tenant_id,
                client_id,
                username,
                password,
            }),
            _ => Err(CoreError::Credentials(
                "a client secret or a username and password is required alongside tenant and client id"
                    .into(),
            )),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::Token(_) => "token",
            Credentials::ClientSecret { .. } => "client_secret",
            Credentials::Password { .. } => "password",
        }
    }
}

/// Everything one branch-out run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub workspace_name: String,
    pub capacity_id: String,
    /// User principal name granted admin on the new workspace.
    pub developer: String,
    pub owner: String,
    pub repo: String,
    pub main_branch: String,
    pub new_branch: String,
    /// Folder inside the repository holding workspace items.
    pub git_folder: String,
    /// GitHub personal access token, also stored in the Fabric connection.
    pub pat_token: Secret,
    pub credentials: Credentials,
    pub endpoints: ApiEndpoints,
    pub sync: SyncSettings,
}

impl RunConfig {
    /// Check that every required value is present.
    ///
    /// The git folder may be empty (repository root).
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.pat_token.is_empty() {
            return Err(CoreError::Missing("GitHub PAT token"));
        }

        let required = [
            ("workspace name", &self.workspace_name),
            ("capacity id", &self.capacity_id),
            ("developer", &self.developer),
            ("repository owner", &self.owner),
            ("repository name", &self.repo),
            ("main branch", &self.main_branch),
            ("new branch", &self.new_branch),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(CoreError::Missing(name));
            }
        }

        if self.new_branch == self.main_branch {
            return Err(CoreError::Validation(format!(
                "new branch '{}' must differ from the main branch",
                self.new_branch
            )));
        }

        self.sync.validate()
    }
}

impl SyncSettings {
    /// Polling needs a non-zero interval and a timeout of at most
    /// [`MAX_SYNC_TIMEOUT`].
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.poll_interval.is_zero() {
            return Err(CoreError::Validation(
                "poll interval must be greater than zero".into(),
            ));
        }
        if self.timeout > MAX_SYNC_TIMEOUT {
            return Err(CoreError::Validation(format!(
                "sync timeout of {}s exceeds the {}s limit",
                self.timeout.as_secs(),
                MAX_SYNC_TIMEOUT.as_secs()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sample_config() -> RunConfig {
        RunConfig {
            workspace_name: "Sales Dev".into(),
            capacity_id: "cap-1".into(),
            developer: "dev@contoso.com".into(),
            owner: "contoso".into(),
            repo: "analytics".into(),
            main_branch: "main".into(),
            new_branch: "feature/sales-dev".into(),
            git_folder: "/".into(),
            pat_token: Secret::new("ghp_token"),
            credentials: Credentials::Token(Secret::new("fabric")),
            endpoints: ApiEndpoints::default(),
            sync: SyncSettings::default(),
        }
    }

    #[test]
    fn endpoints_drop_trailing_slash() {
        let endpoints = ApiEndpoints::new("http://a/v1/", "http://b/", "http://c", "http://d//");
        assert_eq!(endpoints.fabric, "http://a/v1");
        assert_eq!(endpoints.powerbi, "http://b");
        assert_eq!(endpoints.github, "http://c");
        assert_eq!(endpoints.authority, "http://d");
    }

    #[test]
    fn token_takes_precedence() {
        let creds = Credentials::resolve(CredentialInputs {
            token: Some(Secret::new("tok")),
            tenant_id: Some("t".into()),
            client_id: Some("c".into()),
            client_secret: Some(Secret::new("s")),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(creds, Credentials::Token(Secret::new("tok")));
    }

    #[test]
    fn blank_token_falls_through_to_client_secret() {
        let creds = Credentials::resolve(CredentialInputs {
            token: Some(Secret::new("")),
            tenant_id: Some("t".into()),
            client_id: Some("c".into()),
            client_secret: Some(Secret::new("s")),
            username: Some("u".into()),
            password: Some(Secret::new("p")),
        })
        .unwrap();
        assert_eq!(creds.kind(), "client_secret");
    }

    #[test]
    fn username_password_resolves() {
        let creds = Credentials::resolve(CredentialInputs {
            tenant_id: Some("t".into()),
            client_id: Some("c".into()),
            username: Some("u@contoso.com".into()),
            password: Some(Secret::new("p")),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(creds.kind(), "password");
    }

    #[test]
    fn missing_everything_is_an_error() {
        let err = Credentials::resolve(CredentialInputs::default()).unwrap_err();
        assert_matches!(err, CoreError::Credentials(_));
    }

    #[test]
    fn username_without_password_is_an_error() {
        let err = Credentials::resolve(CredentialInputs {
            tenant_id: Some("t".into()),
            client_id: Some("c".into()),
            username: Some("u".into()),
            ..Default::default()
        })
        .unwrap_err();
        assert_matches!(err, CoreError::Credentials(_));
    }

    #[test]
    fn valid_config_passes() {
        sample_config().validate().unwrap();
    }

    #[test]
    fn empty_pat_is_rejected_first() {
        let config = RunConfig {
            pat_token: Secret::new(""),
            workspace_name: String::new(),
            ..sample_config()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Missing required value: GitHub PAT token");
    }

    #[test]
    fn empty_git_folder_is_allowed() {
        let config = RunConfig {
            git_folder: String::new(),
            ..sample_config()
        };
        config.validate().unwrap();
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let config = RunConfig {
            sync: SyncSettings {
                poll_interval: Duration::ZERO,
                ..SyncSettings::default()
            },
            ..sample_config()
        };
        assert_matches!(config.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn oversized_sync_timeout_is_rejected() {
        let config = RunConfig {
            sync: SyncSettings {
                timeout: Duration::from_secs(u64::MAX),
                ..SyncSettings::default()
            },
            ..sample_config()
        };
        assert_matches!(config.validate(), Err(CoreError::Validation(_)));

        let at_limit = SyncSettings {
            timeout: MAX_SYNC_TIMEOUT,
            ..SyncSettings::default()
        };
        at_limit.validate().unwrap();
    }

    #[test]
    fn branching_onto_main_is_rejected() {
        let config = RunConfig {
            new_branch: "main".into(),
            ..sample_config()
        };
        assert!(config.validate().is_err());
    }
}
