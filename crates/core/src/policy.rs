//! Named failure policy for every provisioning step.
//!
//! The run consults [`Step::policy`] to decide whether an error aborts
//! the run or is logged and recorded in the final report.

use std::fmt;

/// How a step's failure affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// The run stops and exits non-zero.
    Fatal,
    /// The failure is logged and the run carries on.
    BestEffort,
}

/// The provisioning steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Authenticate,
    CreateWorkspace,
    AssignAdmin,
    CreateBranch,
    ResolveConnection,
    ConnectGit,
    InitializeSync,
}

impl Step {
    pub const ALL: [Step; 7] = [
        Step::Authenticate,
        Step::CreateWorkspace,
        Step::AssignAdmin,
        Step::CreateBranch,
        Step::ResolveConnection,
        Step::ConnectGit,
        Step::InitializeSync,
    ];

    pub const fn policy(self) -> StepPolicy {
        match self {
            Step::AssignAdmin | Step::InitializeSync => StepPolicy::BestEffort,
            Step::Authenticate
            | Step::CreateWorkspace
            | Step::CreateBranch
            | Step::ResolveConnection
            | Step::ConnectGit => StepPolicy::Fatal,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Step::Authenticate => "authenticate",
            Step::CreateWorkspace => "create_workspace",
            Step::AssignAdmin => "assign_admin",
            Step::CreateBranch => "create_branch",
            Step::ResolveConnection => "resolve_connection",
            Step::ConnectGit => "connect_git",
            Step::InitializeSync => "initialize_sync",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
