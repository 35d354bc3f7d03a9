//! Long-running-operation polling.
//!
//! Fabric answers slow requests with `202 Accepted`, a `Location` header
//! pointing at an operation status URL and usually a `Retry-After`
//! header. [`FabricClient::poll_operation`] fetches that URL until the
//! operation leaves `NotStarted`/`Running`, the deadline passes, or the
//! [`CancellationToken`] is triggered.

use std::time::Duration;

use branchout_core::operation::OperationStatus;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::{parse_response, FabricClient};
use crate::error::FabricError;

/// Stand-in deadline for timeouts too large to add to an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Where and how often to poll an accepted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub location: String,
    pub retry_after: Duration,
}

impl OperationHandle {
    /// Build a handle from the headers of a `202 Accepted` response.
    ///
    /// Returns `None` without a usable `Location` header. A non-zero
    /// `Retry-After` (in whole seconds) overrides `default_interval`.
    pub fn from_headers(headers: &HeaderMap, default_interval: Duration) -> Option<Self> {
        let location = headers
            .get(LOCATION)?
            .to_str()
            .ok()
            .filter(|l| !l.is_empty())?
            .to_string();
        let retry_after = parse_retry_after(headers).unwrap_or(default_interval);
        Some(Self {
            location,
            retry_after,
        })
    }
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

/// Body of an operation status response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    pub status: OperationStatus,
    #[serde(default)]
    pub percent_complete: Option<f64>,
    #[serde(default, alias = "Error")]
    pub error: Option<serde_json::Value>,
}

/// How a polling loop ended. Polling never returns an error: failures
/// are reported here and logged.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Terminal status other than `Failed`.
    Completed(OperationStatus),
    /// The operation ended `Failed`; `error` is the provider's payload.
    Failed { error: serde_json::Value },
    /// The deadline passed while the operation was still pending.
    TimedOut { attempts: u32 },
    Cancelled,
}

impl FabricClient {
    /// Fetch the current state of an operation once.
    pub async fn operation_state(&self, location: &str) -> Result<OperationState, FabricError> {
        parse_response(self.get(location).send().await?).await
    }

    /// Poll `handle` until the operation reaches a terminal status.
    ///
    /// A failed individual fetch is logged and retried on the next tick.
    /// Sleeps of `handle.retry_after` separate fetches. Both the fetches
    /// and the sleeps end early on cancellation or at the deadline.
    pub async fn poll_operation(
        &self,
        handle: &OperationHandle,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        let deadline = deadline_after(timeout);
        let mut attempts = 0u32;

        tracing::info!(
            location = %handle.location,
            retry_after_secs = handle.retry_after.as_secs(),
            timeout_secs = timeout.as_secs(),
            "Polling long running operation",
        );

        loop {
            if cancel.is_cancelled() {
                tracing::warn!(attempts, "Long running operation polling cancelled");
                return PollOutcome::Cancelled;
            }

            attempts += 1;
            let fetched = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(attempts, "Long running operation polling cancelled");
                    return PollOutcome::Cancelled;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::error!(attempts, "Long running operation did not finish before the deadline");
                    return PollOutcome::TimedOut { attempts };
                }
                fetched = self.operation_state(&handle.location) => fetched,
            };
            match fetched {
                Ok(state) => {
                    tracing::info!(
                        attempt = attempts,
                        status = %state.status,
                        percent_complete = state.percent_complete,
                        "Long running operation status",
                    );
                    if state.status.is_terminal() {
                        return finish(state);
                    }
                }
                Err(e) => {
                    tracing::warn!(attempt = attempts, error = %e, "Operation status request failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::error!(attempts, "Long running operation did not finish before the deadline");
                return PollOutcome::TimedOut { attempts };
            }

            let wait = handle.retry_after.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(attempts, "Long running operation polling cancelled");
                    return PollOutcome::Cancelled;
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }
}

/// `timeout` from now, or a far-future instant when that is not
/// representable.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

fn finish(state: OperationState) -> PollOutcome {
    match state.status {
        OperationStatus::Failed => {
            let error = state.error.unwrap_or(serde_json::Value::Null);
            tracing::error!(error = %error, "The long running operation failed");
            PollOutcome::Failed { error }
        }
        status => {
            tracing::info!(status = %status, "The long running operation has completed");
            PollOutcome::Completed(status)
        }
    }
}
