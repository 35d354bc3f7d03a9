//! Status values reported by long-running operations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a provider-side long-running operation.
///
/// `NotStarted` and `Running` are the only non-terminal states. Labels the
/// provider introduces later deserialize as [`OperationStatus::Unknown`]
/// and are treated as terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
    Undefined,
    #[serde(other)]
    Unknown,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OperationStatus::NotStarted | OperationStatus::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::NotStarted => "NotStarted",
            OperationStatus::Running => "Running",
            OperationStatus::Succeeded => "Succeeded",
            OperationStatus::Failed => "Failed",
            OperationStatus::Undefined => "Undefined",
            OperationStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
