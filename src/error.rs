//! Error types for the bootstrap pipeline.
//!
//! Display strings name the stage and the cause. They never include unseal
//! shares, root tokens or raw init output.

use std::time::Duration;

use crate::state::{BootstrapState, InvalidTransition};

/// Failures while turning init output into credentials.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("init output contained no unseal key lines")]
    MissingUnsealKeys,

    #[error("init output contained no root token line")]
    MissingRootToken,

    /// A matching line had no value after the `": "` separator.
    #[error("init output line {line} has no value")]
    MalformedLine { line: usize },

    #[error("expected {expected} unseal keys in init output, found {found}")]
    KeyCountMismatch { expected: usize, found: usize },

    #[error("init response could not be decoded: {reason}")]
    InvalidResponse { reason: String },
}

/// Failures of the one-shot command runner itself.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to collect output of `{program}`: {reason}")]
    Output { program: String, reason: String },
}

/// Failures while invoking the init operation.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init command could not be run: {0}")]
    Runner(#[from] RunnerError),

    #[error("init request failed: {reason}")]
    Api { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum UnsealError {
    #[error("unsealing needs {threshold} shares but only {available} are available")]
    InsufficientShares { threshold: usize, available: usize },

    #[error("unseal command for share {index} could not be run: {source}")]
    Command {
        index: usize,
        #[source]
        source: RunnerError,
    },

    #[error("unseal command for share {index} exited with {}", describe_exit(*.exit_code))]
    Rejected {
        index: usize,
        exit_code: Option<i32>,
    },
}

impl UnsealError {
    /// Index of the share whose submission failed, if any.
    #[must_use]
    pub fn share_index(&self) -> Option<usize> {
        match self {
            Self::InsufficientShares { .. } => None,
            Self::Command { index, .. } | Self::Rejected { index, .. } => Some(*index),
        }
    }
}

/// Why a single health or seal-status probe did not produce a report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("request failed: {reason}")]
    Transport { reason: String },

    #[error("unexpected status {status}")]
    Status { status: u16 },

    #[error("malformed response body: {reason}")]
    Body { reason: String },
}

#[derive(Debug, thiserror::Error)]
#[error(
    "server did not report unsealed after {attempts} health checks (last error: {})",
    .last_error.as_deref().unwrap_or("none")
)]
pub struct HealthCheckTimeoutError {
    pub attempts: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("{stage} did not finish within {}", humantime::format_duration(*.after))]
pub struct StageTimeoutError {
    pub stage: BootstrapState,
    pub after: Duration,
}

/// A failed bootstrap run.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("could not read seal status: {0}")]
    StatusCheck(#[source] ProbeError),

    #[error("init failed: {0}")]
    Init(#[from] InitError),

    #[error("credential extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("unseal failed: {0}")]
    Unseal(#[from] UnsealError),

    #[error(transparent)]
    HealthCheckTimeout(#[from] HealthCheckTimeoutError),

    #[error(transparent)]
    StageTimeout(#[from] StageTimeoutError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl BootstrapError {
    /// The stage the run was in when it failed.
    #[must_use]
    pub fn stage(&self) -> BootstrapState {
        match self {
            Self::StatusCheck(_) => BootstrapState::NotStarted,
            Self::Init(_) => BootstrapState::Initializing,
            Self::Extraction(_) => BootstrapState::Extracting,
            Self::Unseal(_) => BootstrapState::Unsealing,
            Self::HealthCheckTimeout(_) => BootstrapState::WaitingHealthy,
            Self::StageTimeout(err) => err.stage,
            Self::InvalidTransition(err) => err.state,
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(|| "no exit code".to_string(), |code| format!("code {code}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_timeout_message_includes_last_error() {
        let err = HealthCheckTimeoutError {
            attempts: 20,
            last_error: Some("unexpected status 503".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "server did not report unsealed after 20 health checks (last error: unexpected status 503)"
        );
    }

    #[test]
    fn test_stage_timeout_names_stage_and_duration() {
        let err = BootstrapError::from(StageTimeoutError {
            stage: BootstrapState::Initializing,
            after: Duration::from_secs(120),
        });
        assert_eq!(err.stage(), BootstrapState::Initializing);
        assert_eq!(err.to_string(), "initializing did not finish within 2m");
    }

    #[test]
    fn test_unseal_error_reports_share_index() {
        let err = BootstrapError::from(UnsealError::Rejected {
            index: 1,
            exit_code: Some(2),
        });
        assert_eq!(err.stage(), BootstrapState::Unsealing);
        assert!(err.to_string().contains("share 1"));
        assert!(err.to_string().contains("code 2"));
    }
}
