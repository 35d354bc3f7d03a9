//! The branch-out run: authenticate, create the workspace, grant admin,
//! create the branch, connect the workspace to it and pull its content.
//!
//! Steps run strictly in order. Each step's outcome goes through
//! [`settle`], which applies the step's [`StepPolicy`].

use std::time::Duration;

use branchout_core::config::RunConfig;
use branchout_core::naming::connection_display_name;
use branchout_core::policy::{Step, StepPolicy};
use branchout_fabric::auth::acquire_token;
use branchout_fabric::connections::ConnectionOutcome;
use branchout_fabric::git::{GitBranchTarget, SyncOutcome};
use branchout_fabric::{FabricClient, FabricError};
use branchout_github::{GitHubClient, GitHubError};
use tokio_util::sync::CancellationToken;

use crate::error::ProvisionError;
use crate::report::{sync_label, RunReport, StepStatus};

/// HTTP request timeout for a single API call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const USER_AGENT: &str = concat!("branchout/", env!("CARGO_PKG_VERSION"));

/// Execute a full branch-out.
///
/// Returns `Err` only for failures of fatal steps; best-effort failures
/// are logged and recorded in the [`RunReport`].
pub async fn run(
    config: &RunConfig,
    cancel: CancellationToken,
) -> Result<RunReport, ProvisionError> {
    config.validate()?;

    let http = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(ProvisionError::HttpClient)?;

    tracing::info!(
        step = %Step::Authenticate,
        credentials = config.credentials.kind(),
        "Authenticating to Fabric",
    );
    let token = require(
        Step::Authenticate,
        acquire_token(&http, &config.endpoints.authority, &config.credentials)
            .await
            .map_err(ProvisionError::from),
    )?;

    let fabric = FabricClient::with_client(
        http.clone(),
        config.endpoints.fabric.as_str(),
        config.endpoints.powerbi.as_str(),
        token,
    );
    let github = GitHubClient::with_client(
        http,
        config.endpoints.github.as_str(),
        config.pat_token.clone(),
    );

    let workspace_id = require(
        Step::CreateWorkspace,
        fabric
            .create_workspace(&config.workspace_name, &config.capacity_id)
            .await
            .map_err(fabric_error(Step::CreateWorkspace)),
    )?;

    let admin = settle(
        Step::AssignAdmin,
        fabric
            .add_workspace_admin(&workspace_id, &config.developer)
            .await
            .map_err(fabric_error(Step::AssignAdmin)),
    )?;

    tracing::info!(
        branch = %config.new_branch,
        base = %config.main_branch,
        "Creating GitHub branch",
    );
    let branch_outcome = require(
        Step::CreateBranch,
        github
            .create_branch(
                &config.owner,
                &config.repo,
                &config.main_branch,
                &config.new_branch,
            )
            .await
            .map_err(github_error(Step::CreateBranch)),
    )?;

    let connection = connect_branch_to_workspace(&fabric, config, &workspace_id).await?;

    let sync = initialize_sync(&fabric, config, &workspace_id, &cancel).await;

    Ok(RunReport {
        workspace_name: config.workspace_name.clone(),
        workspace_id,
        branch: config.new_branch.clone(),
        branch_outcome,
        admin,
        connection,
        sync,
    })
}

/// Resolve the repository's credential connection and link the workspace
/// to the new branch through it.
pub async fn connect_branch_to_workspace(
    fabric: &FabricClient,
    config: &RunConfig,
    workspace_id: &str,
) -> Result<ConnectionOutcome, ProvisionError> {
    let display_name = connection_display_name(&config.owner, &config.repo);
    let connection = require(
        Step::ResolveConnection,
        fabric
            .get_or_create_connection(&display_name, &config.pat_token)
            .await
            .map_err(fabric_error(Step::ResolveConnection)),
    )?;

    let target = GitBranchTarget {
        owner: &config.owner,
        repo: &config.repo,
        branch: &config.new_branch,
        folder: &config.git_folder,
    };
    require(
        Step::ConnectGit,
        fabric
            .connect_branch(workspace_id, target, connection.id())
            .await
            .map_err(fabric_error(Step::ConnectGit)),
    )?;

    Ok(connection)
}

async fn initialize_sync(
    fabric: &FabricClient,
    config: &RunConfig,
    workspace_id: &str,
    cancel: &CancellationToken,
) -> SyncOutcome {
    tracing::info!(
        workspace_id,
        branch = %config.new_branch,
        "Initializing workspace from GitHub branch",
    );
    let outcome = fabric
        .initialize_from_git(workspace_id, &config.sync, cancel)
        .await;

    if !outcome.is_complete() && !outcome.is_in_progress() {
        debug_assert_eq!(Step::InitializeSync.policy(), StepPolicy::BestEffort);
        tracing::warn!(
            step = %Step::InitializeSync,
            outcome = sync_label(&outcome),
            "Best-effort step did not complete, continuing",
        );
    }
    outcome
}

/// Apply `step`'s policy to its result.
///
/// Fatal failures are returned as `Err`; best-effort failures are logged
/// and come back as [`StepStatus::Failed`].
pub fn settle<T>(
    step: Step,
    result: Result<T, ProvisionError>,
) -> Result<StepStatus<T>, ProvisionError> {
    match result {
        Ok(value) => {
            tracing::debug!(step = %step, "Step completed");
            Ok(StepStatus::Completed(value))
        }
        Err(e) => match step.policy() {
            StepPolicy::Fatal => {
                tracing::error!(step = %step, error = %e, "Fatal step failed, aborting run");
                Err(e)
            }
            StepPolicy::BestEffort => {
                tracing::warn!(step = %step, error = %e, "Best-effort step failed, continuing");
                Ok(StepStatus::Failed(e.to_string()))
            }
        },
    }
}

/// [`settle`] for steps whose value later steps need: a swallowed
/// failure still ends the run.
fn require<T>(step: Step, result: Result<T, ProvisionError>) -> Result<T, ProvisionError> {
    match settle(step, result)? {
        StepStatus::Completed(value) => Ok(value),
        StepStatus::Failed(message) => Err(ProvisionError::StepSkipped { step, message }),
    }
}

fn fabric_error(step: Step) -> impl FnOnce(FabricError) -> ProvisionError {
    move |source| ProvisionError::Fabric { step, source }
}

fn github_error(step: Step) -> impl FnOnce(GitHubError) -> ProvisionError {
    move |source| ProvisionError::GitHub { step, source }
}
