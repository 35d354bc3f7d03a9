//! `branchout` -- create a Fabric feature workspace wired to a new
//! GitHub branch.
//!
//! Flags may also come from the environment or a `.env` file; run with
//! `--help` for the full list. Exits non-zero only when a fatal step
//! fails.

use std::process::ExitCode;

use branchout::args::Args;
use branchout::{logging, provision};
use clap::Parser;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    logging::init(args.log_format);
    tracing::info!("Starting GitHub branch-out");

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        workspace = %config.workspace_name,
        repo = %format!("{}/{}", config.owner, config.repo),
        branch = %config.new_branch,
        "Loaded branch-out configuration",
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    match provision::run(&config, cancel).await {
        Ok(report) => {
            report.log_summary();
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(
                step = e.step().map(|s| s.label()),
                error = %e,
                "Terminating branch-out",
            );
            ExitCode::FAILURE
        }
    }
}

/// Cancel the run on Ctrl-C or SIGTERM. Only the sync poll observes the
/// token; earlier steps finish their current request first.
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT (Ctrl-C), cancelling"),
        () = terminate => tracing::info!("Received SIGTERM, cancelling"),
    }
    cancel.cancel();
}
