//! Naming rules for git folders, credential connections and branches.
//!
//! Every name produced here is deterministic so a rerun of the same
//! branch-out finds what the previous run created.

use crate::error::CoreError;

/// Provider label used as the prefix of credential connection names.
pub const GIT_PROVIDER_LABEL: &str = "GitHub";

/// Prefix for branch names derived from a workspace name.
pub const DEFAULT_BRANCH_PREFIX: &str = "feature/";

/// Normalize a repository folder into the form the git-connect call
/// expects for its directory name.
///
/// Root markers (`""`, `"/"`, `"\"`) become the empty string; any other
/// value loses its trailing `/`.
///
/// # Examples
///
/// ```
/// use branchout_core::naming::normalize_folder;
///
/// assert_eq!(normalize_folder("/"), "");
/// assert_eq!(normalize_folder("fabric/items/"), "fabric/items");
/// assert_eq!(normalize_folder("fabric"), "fabric");
/// ```
pub fn normalize_folder(folder: &str) -> String {
    match folder {
        "" | "/" | "\\" => String::new(),
        other => other.trim_end_matches('/').to_string(),
    }
}

/// Display name of the credential connection for a repository.
///
/// The workspace provider looks connections up by this name, so it has
/// to be stable across runs.
pub fn connection_display_name(owner: &str, repo: &str) -> String {
    format!("{GIT_PROVIDER_LABEL} PAT - {owner}/{repo}")
}

/// Derive a branch name from a workspace name when none was supplied.
///
/// Convention: `feature/{slug}` where the slug is the lowercased
/// workspace name with every character outside `[a-z0-9._-]` replaced by
/// `-`, runs of `-` collapsed and `-`/`.` trimmed from both ends.
///
/// # Examples
///
/// ```
/// use branchout_core::naming::default_branch_name;
///
/// assert_eq!(default_branch_name("Sales Feature WS").unwrap(), "feature/sales-feature-ws");
/// assert!(default_branch_name("!!!").is_err());
/// ```
pub fn default_branch_name(workspace_name: &str) -> Result<String, CoreError> {
    let mut slug = String::with_capacity(workspace_name.len());
    for c in workspace_name.trim().chars().flat_map(char::to_lowercase) {
        let mapped = if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
            c
        } else {
            '-'
        };
        if mapped == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(mapped);
    }

    let slug = slug.trim_matches(|c| c == '-' || c == '.');
    // ".." is never valid inside a git ref.
    if slug.is_empty() || slug.contains("..") {
        return Err(CoreError::InvalidBranchName(format!(
            "cannot derive a branch name from workspace name '{workspace_name}'"
        )));
    }

    Ok(format!("{DEFAULT_BRANCH_PREFIX}{slug}"))
}
