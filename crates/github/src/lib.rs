//! GitHub REST client for branch lookup and creation.

pub mod client;
pub mod error;

pub use client::{BranchOutcome, GitHubClient};
pub use error::GitHubError;
