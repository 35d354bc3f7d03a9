//! Domain types shared by the branch-out crates.
//!
//! Nothing in here performs I/O: the run configuration, step policies,
//! naming rules and long-running-operation statuses are plain data so
//! the provider clients and the CLI can agree on them.

pub mod config;
pub mod error;
pub mod naming;
pub mod operation;
pub mod policy;
pub mod secret;
