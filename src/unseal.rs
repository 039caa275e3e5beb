use std::sync::Arc;

use tracing::info;

use crate::credentials::UnsealKey;
use crate::error::UnsealError;
use crate::operator::OperatorTarget;
use crate::runner::CommandRunner;

/// Submits the first `threshold` unseal shares, one command at a time.
///
/// Whether the server actually unsealed is left to the health poller.
pub struct UnsealCoordinator {
    runner: Arc<dyn CommandRunner>,
    target: OperatorTarget,
    threshold: usize,
}

impl UnsealCoordinator {
    pub fn new(runner: Arc<dyn CommandRunner>, target: OperatorTarget, threshold: usize) -> Self {
        Self {
            runner,
            target,
            threshold,
        }
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// # Errors
    /// Returns `UnsealError` if fewer than `threshold` shares are available or
    /// any unseal command fails to run or exits non-zero.
    pub async fn unseal(&self, keys: &[UnsealKey]) -> Result<(), UnsealError> {
        self.unseal_with_threshold(keys, self.threshold).await
    }

    /// Same as [`UnsealCoordinator::unseal`] with a threshold reported by the
    /// server instead of the configured one.
    ///
    /// # Errors
    /// Returns `UnsealError` if fewer than `threshold` shares are available or
    /// any unseal command fails to run or exits non-zero.
    pub async fn unseal_with_threshold(
        &self,
        keys: &[UnsealKey],
        threshold: usize,
    ) -> Result<(), UnsealError> {
        if keys.len() < threshold {
            return Err(UnsealError::InsufficientShares {
                threshold,
                available: keys.len(),
            });
        }

        for (index, key) in keys.iter().take(threshold).enumerate() {
            let spec = self.target.unseal_command(key);
            info!(
                "Submitting unseal share {}/{threshold}: {}",
                index + 1,
                spec.display_redacted()
            );
            let output = self
                .runner
                .run(&spec)
                .await
                .map_err(|source| UnsealError::Command { index, source })?;
            if !output.success() {
                return Err(UnsealError::Rejected {
                    index,
                    exit_code: output.exit_code,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::RunnerError;
    use crate::runner::{CapturedOutput, CommandSpec};

    /// Records submitted shares; exits non-zero for `reject_share`.
    #[derive(Default)]
    struct RecordingRunner {
        submitted: Mutex<Vec<String>>,
        reject_share: Option<String>,
    }

    #[async_trait::async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<CapturedOutput, RunnerError> {
            let share = spec
                .args
                .last()
                .map(|arg| arg.value().to_string())
                .unwrap_or_default();
            let rejected = self.reject_share.as_deref() == Some(share.as_str());
            self.submitted.lock().expect("submitted").push(share);
            Ok(CapturedOutput {
                logs: String::new(),
                exit_code: Some(i32::from(rejected)),
            })
        }
    }

    fn target() -> OperatorTarget {
        OperatorTarget {
            image: "hashicorp/vault:1.14".to_string(),
            network: "traefik".to_string(),
            address: "http://vault:8200".to_string(),
        }
    }

    fn keys(values: &[&str]) -> Vec<UnsealKey> {
        values.iter().map(|value| UnsealKey::new(*value)).collect()
    }

    #[tokio::test]
    async fn test_submits_only_first_threshold_shares_in_order() {
        let runner = Arc::new(RecordingRunner::default());
        let coordinator = UnsealCoordinator::new(runner.clone(), target(), 2);

        coordinator
            .unseal(&keys(&["k0", "k1", "k2"]))
            .await
            .expect("unseal");

        assert_eq!(*runner.submitted.lock().expect("submitted"), vec!["k0", "k1"]);
    }

    #[tokio::test]
    async fn test_exactly_threshold_calls_with_twenty_shares() {
        let runner = Arc::new(RecordingRunner::default());
        let coordinator = UnsealCoordinator::new(runner.clone(), target(), 2);
        let shares: Vec<String> = (0..20).map(|i| format!("share-{i}")).collect();
        let shares: Vec<UnsealKey> = shares.into_iter().map(UnsealKey::new).collect();

        coordinator.unseal(&shares).await.expect("unseal");

        assert_eq!(runner.submitted.lock().expect("submitted").len(), 2);
    }

    #[tokio::test]
    async fn test_too_few_shares_issues_no_commands() {
        let runner = Arc::new(RecordingRunner::default());
        let coordinator = UnsealCoordinator::new(runner.clone(), target(), 2);

        let err = coordinator.unseal(&keys(&["k0"])).await.unwrap_err();

        assert!(matches!(
            err,
            UnsealError::InsufficientShares {
                threshold: 2,
                available: 1
            }
        ));
        assert!(runner.submitted.lock().expect("submitted").is_empty());
    }

    #[tokio::test]
    async fn test_rejected_share_reports_index_and_stops() {
        let runner = Arc::new(RecordingRunner {
            submitted: Mutex::new(Vec::new()),
            reject_share: Some("k1".to_string()),
        });
        let coordinator = UnsealCoordinator::new(runner.clone(), target(), 3);

        let err = coordinator
            .unseal(&keys(&["k0", "k1", "k2"]))
            .await
            .unwrap_err();

        assert_eq!(err.share_index(), Some(1));
        assert!(!err.to_string().contains("k1"));
        assert_eq!(*runner.submitted.lock().expect("submitted"), vec!["k0", "k1"]);
    }

    #[tokio::test]
    async fn test_explicit_threshold_overrides_configured_one() {
        let runner = Arc::new(RecordingRunner::default());
        let coordinator = UnsealCoordinator::new(runner.clone(), target(), 2);

        coordinator
            .unseal_with_threshold(&keys(&["k0", "k1", "k2", "k3"]), 3)
            .await
            .expect("unseal");

        assert_eq!(
            *runner.submitted.lock().expect("submitted"),
            vec!["k0", "k1", "k2"]
        );
    }

    #[tokio::test]
    async fn test_resubmitting_same_shares_issues_same_commands() {
        let runner = Arc::new(RecordingRunner::default());
        let coordinator = UnsealCoordinator::new(runner.clone(), target(), 2);
        let shares = keys(&["k0", "k1"]);

        coordinator.unseal(&shares).await.expect("first unseal");
        coordinator.unseal(&shares).await.expect("second unseal");

        assert_eq!(
            *runner.submitted.lock().expect("submitted"),
            vec!["k0", "k1", "k0", "k1"]
        );
    }
}
