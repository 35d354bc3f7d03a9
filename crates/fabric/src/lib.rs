//! Microsoft Fabric REST client used by the branch-out run.
//!
//! Covers token acquisition, workspace creation, the Power BI admin
//! grant, credential connections, git connect/initialize/update and the
//! long-running-operation poller.

pub mod auth;
pub mod client;
pub mod connections;
pub mod error;
pub mod git;
pub mod lro;
pub mod workspaces;

pub use client::FabricClient;
pub use error::FabricError;
