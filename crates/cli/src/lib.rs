//! `branchout` library crate.
//!
//! Exposes the argument model, logging setup and the provisioning run so
//! integration tests can drive a full run. The binary entrypoint lives in
//! `main.rs`.

pub mod args;
pub mod error;
pub mod logging;
pub mod provision;
pub mod report;
