//! What a finished run did, for the final log line and for tests.

use branchout_fabric::connections::ConnectionOutcome;
use branchout_fabric::git::SyncOutcome;
use branchout_fabric::lro::PollOutcome;
use branchout_github::BranchOutcome;

/// Result of a step after its policy was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus<T> {
    Completed(T),
    /// Best-effort step that failed; holds the error message.
    Failed(String),
}

impl<T> StepStatus<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepStatus::Completed(_))
    }
}

/// Summary of a successful run. Best-effort steps may still have failed.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub workspace_name: String,
    pub workspace_id: String,
    pub branch: String,
    pub branch_outcome: BranchOutcome,
    pub admin: StepStatus<()>,
    pub connection: ConnectionOutcome,
    pub sync: SyncOutcome,
}

impl RunReport {
    pub fn log_summary(&self) {
        tracing::info!(
            workspace = %self.workspace_name,
            workspace_id = %self.workspace_id,
            branch = %self.branch,
            branch_created = matches!(self.branch_outcome, BranchOutcome::Created { .. }),
            admin_granted = self.admin.is_completed(),
            connection_id = self.connection.id(),
            connection_reused = matches!(self.connection, ConnectionOutcome::Reused(_)),
            sync = sync_label(&self.sync),
            "Branch-out complete",
        );

        if let StepStatus::Failed(message) = &self.admin {
            tracing::warn!(error = %message, "Developer was not granted admin; add them manually");
        }
        if !self.sync.is_complete() {
            tracing::warn!(
                sync = sync_label(&self.sync),
                "Workspace is not yet synchronized with the branch; run an update from git later",
            );
        }
    }
}

/// Short machine-friendly label for a sync outcome.
pub fn sync_label(outcome: &SyncOutcome) -> &'static str {
    match outcome {
        SyncOutcome::UpToDate => "up_to_date",
        SyncOutcome::Updated => "updated",
        SyncOutcome::Polled(PollOutcome::Completed(_)) => "completed",
        SyncOutcome::Polled(PollOutcome::Failed { .. }) => "failed",
        SyncOutcome::Polled(PollOutcome::TimedOut { .. }) => "timed_out",
        SyncOutcome::Polled(PollOutcome::Cancelled) => "cancelled",
        SyncOutcome::InitializationPending => "initialization_pending",
        SyncOutcome::Rejected { .. } => "rejected",
        SyncOutcome::Failed(_) => "error",
    }
}
