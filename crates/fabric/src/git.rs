//! Git integration: connect a workspace to a branch, then sync it.

use branchout_core::config::SyncSettings;
use branchout_core::naming::normalize_folder;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::client::{body_text, FabricClient};
use crate::error::FabricError;
use crate::lro::{OperationHandle, PollOutcome};

/// Repository location a workspace is linked to.
#[derive(Debug, Clone, Copy)]
pub struct GitBranchTarget<'a> {
    pub owner: &'a str,
    pub repo: &'a str,
    pub branch: &'a str,
    /// Raw folder; normalized before it is sent.
    pub folder: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GitProviderDetails<'a> {
    owner_name: &'a str,
    git_provider_type: &'a str,
    repository_name: &'a str,
    branch_name: &'a str,
    directory_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GitCredentials<'a> {
    source: &'a str,
    connection_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GitConnectRequest<'a> {
    git_provider_details: GitProviderDetails<'a>,
    my_git_credentials: GitCredentials<'a>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResponse {
    #[serde(default)]
    required_action: Option<String>,
    #[serde(default)]
    workspace_head: Option<String>,
    #[serde(default)]
    remote_commit_hash: Option<String>,
}

/// Which request of the sync sequence answered unexpectedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Initialize,
    Update,
}

/// Result of the initial git sync. Never an error: the sync is
/// best-effort and every failure is captured here.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Initialization reported nothing to pull.
    UpToDate,
    /// The update finished synchronously.
    Updated,
    /// The update was accepted and polled to an end.
    Polled(PollOutcome),
    /// Initialization itself is still running; retry later.
    InitializationPending,
    Rejected {
        stage: SyncStage,
        status: u16,
        body: String,
    },
    /// Transport or decoding failure.
    Failed(String),
}

impl SyncOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            SyncOutcome::UpToDate
                | SyncOutcome::Updated
                | SyncOutcome::Polled(PollOutcome::Completed(_))
        )
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            SyncOutcome::InitializationPending | SyncOutcome::Polled(PollOutcome::TimedOut { .. })
        )
    }
}

impl FabricClient {
    /// Link a workspace to a GitHub branch and folder through an existing
    /// credential connection.
    ///
    /// Sends `POST /workspaces/{id}/git/connect`; any non-2xx status is
    /// an error.
    pub async fn connect_branch(
        &self,
        workspace_id: &str,
        target: GitBranchTarget<'_>,
        connection_id: &str,
    ) -> Result<(), FabricError> {
        let directory_name = normalize_folder(target.folder);
        tracing::info!(
            workspace_id,
            branch = target.branch,
            directory = %directory_name,
            "Connecting workspace to GitHub branch",
        );

        let request = GitConnectRequest {
            git_provider_details: GitProviderDetails {
                owner_name: target.owner,
                git_provider_type: "GitHub",
                repository_name: target.repo,
                branch_name: target.branch,
                directory_name,
            },
            my_git_credentials: GitCredentials {
                source: "ConfiguredConnection",
                connection_id,
            },
        };

        let response = self
            .post(&self.endpoint(&format!("workspaces/{workspace_id}/git/connect")))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = body_text(response).await;
            tracing::error!(status = status.as_u16(), body = %body, "Git connect failed");
            return Err(FabricError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(workspace_id, "Workspace connected to GitHub branch");
        Ok(())
    }

    /// Initialize the git connection and pull the branch into the
    /// workspace.
    ///
    /// Every failure is logged and returned as a [`SyncOutcome`].
    pub async fn initialize_from_git(
        &self,
        workspace_id: &str,
        settings: &SyncSettings,
        cancel: &CancellationToken,
    ) -> SyncOutcome {
        match self.try_initialize_from_git(workspace_id, settings, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(workspace_id, error = %e, "Workspace git initialization failed");
                SyncOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_initialize_from_git(
        &self,
        workspace_id: &str,
        settings: &SyncSettings,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, FabricError> {
        tracing::info!(workspace_id, "Initializing workspace git connection");

        let response = self
            .post(&self.endpoint(&format!(
                "workspaces/{workspace_id}/git/initializeConnection"
            )))
            .json(&json!({}))
            .send()
            .await?;

        match response.status() {
            StatusCode::ACCEPTED => {
                tracing::info!(workspace_id, "Git initialization accepted and in progress; retry the sync later");
                return Ok(SyncOutcome::InitializationPending);
            }
            status if status.is_success() => {}
            status => {
                let body = body_text(response).await;
                tracing::error!(status = status.as_u16(), body = %body, "Git initialization failed");
                return Ok(SyncOutcome::Rejected {
                    stage: SyncStage::Initialize,
                    status: status.as_u16(),
                    body,
                });
            }
        }

        let init: InitializeResponse = response.json().await?;
        if init.required_action.as_deref() == Some("None") {
            tracing::info!(workspace_id, "Workspace already matches the branch");
            return Ok(SyncOutcome::UpToDate);
        }

        let update = json!({
            "workspaceHead": init.workspace_head,
            "remoteCommitHash": init.remote_commit_hash,
            "options": {
                "allowOverrideItems": true,
                "conflictResolution": "RemoteSync",
            },
        });

        let response = self
            .post(&self.endpoint(&format!("workspaces/{workspace_id}/git/updateFromGit")))
            .json(&update)
            .send()
            .await?;

        match response.status() {
            StatusCode::ACCEPTED => {
                let Some(handle) =
                    OperationHandle::from_headers(response.headers(), settings.poll_interval)
                else {
                    tracing::error!(workspace_id, "Update accepted without a Location header");
                    return Ok(SyncOutcome::Rejected {
                        stage: SyncStage::Update,
                        status: StatusCode::ACCEPTED.as_u16(),
                        body: "missing Location header".into(),
                    });
                };

                tracing::info!(location = %handle.location, "Update accepted, workspace update is in progress");
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(SyncOutcome::Polled(PollOutcome::Cancelled)),
                    _ = tokio::time::sleep(settings.initial_delay) => {}
                }

                let outcome = self.poll_operation(&handle, settings.timeout, cancel).await;
                Ok(SyncOutcome::Polled(outcome))
            }
            status if status.is_success() => {
                tracing::info!(workspace_id, status = status.as_u16(), "Workspace is synchronizing with the branch");
                Ok(SyncOutcome::Updated)
            }
            status => {
                let body = body_text(response).await;
                tracing::error!(status = status.as_u16(), body = %body, "Failed to update the workspace");
                Ok(SyncOutcome::Rejected {
                    stage: SyncStage::Update,
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
