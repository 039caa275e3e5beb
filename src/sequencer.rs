use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::StageTimeouts;
use crate::credentials::{ExistingCredentials, RootToken, UnsealKey};
use crate::error::{BootstrapError, StageTimeoutError};
use crate::health::{HealthPoller, StatusProbe};
use crate::initializer::InitializationSource;
use crate::state::{BootstrapEvent, BootstrapState, InvalidTransition};
use crate::unseal::UnsealCoordinator;

/// Outcome of a successful run, handed to downstream configuration.
#[derive(Debug)]
pub struct BootstrapReady {
    pub endpoint: String,
    /// `None` when the server was already initialized and no token was supplied.
    pub root_token: Option<RootToken>,
    pub unseal_keys: Vec<UnsealKey>,
    /// `true` when this run performed the init operation.
    pub initialized_now: bool,
}

/// Drives one server from uninitialized (or already initialized) to unsealed.
pub struct BootstrapSequencer {
    endpoint: String,
    initializer: Box<dyn InitializationSource>,
    unsealer: UnsealCoordinator,
    probe: Arc<dyn StatusProbe>,
    poller: HealthPoller,
    timeouts: StageTimeouts,
    existing: ExistingCredentials,
    state: BootstrapState,
    history: Vec<BootstrapState>,
}

impl BootstrapSequencer {
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        initializer: Box<dyn InitializationSource>,
        unsealer: UnsealCoordinator,
        probe: Arc<dyn StatusProbe>,
        poller: HealthPoller,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            initializer,
            unsealer,
            probe,
            poller,
            timeouts,
            existing: ExistingCredentials::default(),
            state: BootstrapState::NotStarted,
            history: vec![BootstrapState::NotStarted],
        }
    }

    /// Credentials used when the server turns out to be initialized already.
    #[must_use]
    pub fn with_existing_credentials(mut self, existing: ExistingCredentials) -> Self {
        self.existing = existing;
        self
    }

    #[must_use]
    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Every state visited so far, starting with `NotStarted`.
    #[must_use]
    pub fn history(&self) -> &[BootstrapState] {
        &self.history
    }

    /// Runs the bootstrap to `Ready` or `Failed`.
    ///
    /// # Errors
    /// Returns `BootstrapError` naming the stage that failed. A sequencer
    /// only runs once; later calls fail with `InvalidTransition`.
    pub async fn run(&mut self) -> Result<BootstrapReady, BootstrapError> {
        match self.drive().await {
            Ok(ready) => Ok(ready),
            Err(err) => {
                error!("Bootstrap failed while {}: {err}", err.stage());
                if !self.state.is_terminal() {
                    self.advance(BootstrapEvent::StageFailed)?;
                }
                Err(err)
            }
        }
    }

    async fn drive(&mut self) -> Result<BootstrapReady, BootstrapError> {
        if self.state != BootstrapState::NotStarted {
            return Err(InvalidTransition {
                state: self.state,
                event: BootstrapEvent::InitInvoked,
            }
            .into());
        }

        let status = within(
            BootstrapState::NotStarted,
            self.timeouts.status,
            self.probe.seal_status(),
        )
        .await?
        .map_err(BootstrapError::StatusCheck)?;

        if status.initialized {
            let threshold = status
                .t
                .filter(|t| *t > 0)
                .and_then(|t| usize::try_from(t).ok())
                .unwrap_or_else(|| self.unsealer.threshold());
            return self.resume(status.sealed, threshold).await;
        }

        info!("Initializing server at {}", self.endpoint);
        self.advance(BootstrapEvent::InitInvoked)?;
        let raw = within(
            BootstrapState::Initializing,
            self.timeouts.init,
            self.initializer.invoke(),
        )
        .await??;
        self.advance(BootstrapEvent::InitCompleted)?;

        let credentials = self.initializer.extract(&raw)?;
        drop(raw);
        info!(
            "Extracted {} unseal key(s) and a root token",
            credentials.unseal_keys.len()
        );
        self.advance(BootstrapEvent::CredentialsExtracted)?;

        let threshold = self.unsealer.threshold();
        self.submit_shares(&credentials.unseal_keys, threshold).await?;
        self.await_healthy().await?;

        Ok(BootstrapReady {
            endpoint: self.endpoint.clone(),
            root_token: Some(credentials.root_token),
            unseal_keys: credentials.unseal_keys,
            initialized_now: true,
        })
    }

    /// Continues with a server that is already initialized. `threshold` is the
    /// share count the server reports it needs.
    async fn resume(
        &mut self,
        sealed: bool,
        threshold: usize,
    ) -> Result<BootstrapReady, BootstrapError> {
        let existing = std::mem::take(&mut self.existing);
        if sealed && !existing.unseal_keys.is_empty() {
            info!(
                "Server already initialized and sealed; submitting {} supplied share(s)",
                existing.unseal_keys.len()
            );
            self.advance(BootstrapEvent::ResumeUnseal)?;
            self.submit_shares(&existing.unseal_keys, threshold).await?;
        } else {
            if sealed {
                warn!("Server already initialized and sealed, but no unseal keys were supplied");
            } else {
                info!("Server already initialized; skipping init");
            }
            self.advance(BootstrapEvent::ResumeHealthCheck)?;
        }
        self.await_healthy().await?;

        Ok(BootstrapReady {
            endpoint: self.endpoint.clone(),
            root_token: existing.root_token,
            unseal_keys: existing.unseal_keys,
            initialized_now: false,
        })
    }

    async fn submit_shares(
        &mut self,
        keys: &[UnsealKey],
        threshold: usize,
    ) -> Result<(), BootstrapError> {
        within(
            BootstrapState::Unsealing,
            self.timeouts.unseal,
            self.unsealer.unseal_with_threshold(keys, threshold),
        )
        .await??;
        self.advance(BootstrapEvent::SharesSubmitted)?;
        Ok(())
    }

    async fn await_healthy(&mut self) -> Result<(), BootstrapError> {
        self.poller.poll(self.probe.as_ref()).await?;
        self.advance(BootstrapEvent::Healthy)?;
        Ok(())
    }

    fn advance(&mut self, event: BootstrapEvent) -> Result<(), InvalidTransition> {
        let next = self.state.on(event)?;
        info!("Bootstrap state: {} -> {next}", self.state);
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}

async fn within<F: Future>(
    stage: BootstrapState,
    after: Duration,
    fut: F,
) -> Result<F::Output, StageTimeoutError> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| StageTimeoutError { stage, after })
}
