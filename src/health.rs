use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{HealthCheckTimeoutError, ProbeError};

/// Decoded body of `GET /v1/sys/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HealthReport {
    pub sealed: bool,
}

/// Decoded body of `GET /v1/sys/seal-status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SealStatus {
    pub initialized: bool,
    pub sealed: bool,
    #[serde(default)]
    pub t: Option<u32>,
}

/// Read-only status endpoints of the target server.
#[async_trait::async_trait]
pub trait StatusProbe: Send + Sync {
    async fn seal_status(&self) -> Result<SealStatus, ProbeError>;

    async fn health(&self) -> Result<HealthReport, ProbeError>;
}

/// The server reported itself unsealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Healthy {
    pub attempts: u32,
}

/// Polls the health endpoint with linear backoff until the server is unsealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPoller {
    max_attempts: u32,
    initial_backoff: Duration,
}

impl HealthPoller {
    #[must_use]
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
        }
    }

    /// Delay after the failed attempt with zero-based index `attempt`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff.saturating_mul(attempt)
    }

    /// # Errors
    /// Returns `HealthCheckTimeoutError` once `max_attempts` probes have
    /// failed.
    pub async fn poll(
        &self,
        probe: &dyn StatusProbe,
    ) -> Result<Healthy, HealthCheckTimeoutError> {
        self.poll_with_sleep(probe, tokio::time::sleep).await
    }

    /// Same as [`HealthPoller::poll`] with custom sleep logic between attempts.
    ///
    /// # Errors
    /// Returns `HealthCheckTimeoutError` once `max_attempts` probes have
    /// failed.
    pub async fn poll_with_sleep<SleepFn, SleepFut>(
        &self,
        probe: &dyn StatusProbe,
        mut sleep_fn: SleepFn,
    ) -> Result<Healthy, HealthCheckTimeoutError>
    where
        SleepFn: FnMut(Duration) -> SleepFut,
        SleepFut: Future<Output = ()>,
    {
        let mut last_error = None;
        for attempt in 0..self.max_attempts {
            let reason = match probe.health().await {
                Ok(report) if !report.sealed => {
                    info!("Server reported unsealed after {} check(s)", attempt + 1);
                    return Ok(Healthy {
                        attempts: attempt + 1,
                    });
                }
                Ok(_) => "server is sealed".to_string(),
                Err(err) => err.to_string(),
            };
            warn!(
                "Health check failed (attempt {}/{}): {reason}",
                attempt + 1,
                self.max_attempts
            );
            last_error = Some(reason);
            if attempt + 1 < self.max_attempts {
                sleep_fn(self.backoff(attempt)).await;
            }
        }

        Err(HealthCheckTimeoutError {
            attempts: self.max_attempts,
            last_error,
        })
    }
}
