use std::fmt;

/// Where a bootstrap run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    NotStarted,
    Initializing,
    Extracting,
    Unsealing,
    WaitingHealthy,
    Ready,
    Failed,
}

/// Inputs that move a bootstrap run between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapEvent {
    /// The init command has been issued.
    InitInvoked,
    /// The init command finished, whatever its exit status.
    InitCompleted,
    CredentialsExtracted,
    /// The server was already initialized and is sealed; shares were supplied.
    ResumeUnseal,
    /// The server was already initialized and only needs to be checked.
    ResumeHealthCheck,
    SharesSubmitted,
    Healthy,
    StageFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event {event:?} is not valid while {state}")]
pub struct InvalidTransition {
    pub state: BootstrapState,
    pub event: BootstrapEvent,
}

impl BootstrapState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }

    /// Applies `event` to the current state.
    ///
    /// # Errors
    /// Returns `InvalidTransition` when the event has no edge out of this state.
    pub fn on(self, event: BootstrapEvent) -> Result<Self, InvalidTransition> {
        use BootstrapEvent as E;
        use BootstrapState as S;

        let next = match (self, event) {
            (S::NotStarted, E::InitInvoked) => S::Initializing,
            (S::NotStarted, E::ResumeUnseal) => S::Unsealing,
            (S::NotStarted, E::ResumeHealthCheck) => S::WaitingHealthy,
            (S::Initializing, E::InitCompleted) => S::Extracting,
            (S::Extracting, E::CredentialsExtracted) => S::Unsealing,
            (S::Unsealing, E::SharesSubmitted) => S::WaitingHealthy,
            (S::WaitingHealthy, E::Healthy) => S::Ready,
            (state, E::StageFailed) if !state.is_terminal() => S::Failed,
            (state, event) => return Err(InvalidTransition { state, event }),
        };
        Ok(next)
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not started",
            Self::Initializing => "initializing",
            Self::Extracting => "extracting credentials",
            Self::Unsealing => "unsealing",
            Self::WaitingHealthy => "waiting for health",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
