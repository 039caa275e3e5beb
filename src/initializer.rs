//! Producers of [`InitializationResult`].
//!
//! The sequencer only sees [`InitializationSource`]: one call that performs
//! the init operation and one pure step that turns its raw output into
//! credentials. Scraping `vault operator init` logs is one implementation;
//! calling the HTTP API directly is the other.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::credentials::{InitializationResult, RootToken, UnsealKey};
use crate::error::{ExtractionError, InitError};
use crate::extract::extract_credentials;
use crate::operator::OperatorTarget;
use crate::runner::CommandRunner;
use crate::vault::VaultClient;

/// Raw output of an init operation. Holds secrets, so `Debug` only shows the
/// size.
pub struct RawInitOutput(String);

impl RawInitOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RawInitOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawInitOutput")
            .field("bytes", &self.0.len())
            .finish()
    }
}

#[async_trait::async_trait]
pub trait InitializationSource: Send + Sync {
    /// Performs the init operation against the server.
    async fn invoke(&self) -> Result<RawInitOutput, InitError>;

    /// Turns the raw output of [`InitializationSource::invoke`] into
    /// credentials.
    ///
    /// # Errors
    /// Returns `ExtractionError` if the output does not hold a complete set of
    /// credentials.
    fn extract(&self, raw: &RawInitOutput) -> Result<InitializationResult, ExtractionError>;
}

/// Runs `vault operator init` in a throwaway container and parses its logs.
pub struct LogScrapeInitializer {
    runner: Arc<dyn CommandRunner>,
    target: OperatorTarget,
    key_shares: u8,
    key_threshold: u8,
}

impl LogScrapeInitializer {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        target: OperatorTarget,
        key_shares: u8,
        key_threshold: u8,
    ) -> Self {
        Self {
            runner,
            target,
            key_shares,
            key_threshold,
        }
    }
}

#[async_trait::async_trait]
impl InitializationSource for LogScrapeInitializer {
    async fn invoke(&self) -> Result<RawInitOutput, InitError> {
        let spec = self.target.init_command(self.key_shares, self.key_threshold);
        info!("Running: {}", spec.display_redacted());
        let output = self.runner.run(&spec).await?;
        // The captured log is the signal; a non-zero exit usually means the
        // server was already initialized and extraction will say so.
        info!(
            "Init command finished (exit_code={:?}, log_bytes={})",
            output.exit_code,
            output.logs.len()
        );
        Ok(RawInitOutput::new(output.logs))
    }

    fn extract(&self, raw: &RawInitOutput) -> Result<InitializationResult, ExtractionError> {
        extract_credentials(raw.as_str(), usize::from(self.key_shares))
    }
}

#[derive(Deserialize)]
struct InitResponse {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    keys_base64: Vec<String>,
    root_token: String,
}

/// Calls `POST /v1/sys/init` and decodes the JSON response.
pub struct ApiInitializer {
    client: VaultClient,
    key_shares: u8,
    key_threshold: u8,
}

impl ApiInitializer {
    #[must_use]
    pub fn new(client: VaultClient, key_shares: u8, key_threshold: u8) -> Self {
        Self {
            client,
            key_shares,
            key_threshold,
        }
    }
}

#[async_trait::async_trait]
impl InitializationSource for ApiInitializer {
    async fn invoke(&self) -> Result<RawInitOutput, InitError> {
        info!(
            "Initializing {} via API (shares={}, threshold={})",
            self.client.base_url(),
            self.key_shares,
            self.key_threshold
        );
        let body = self
            .client
            .init_raw(self.key_shares, self.key_threshold)
            .await
            .map_err(|err| InitError::Api {
                reason: format!("{err:#}"),
            })?;
        Ok(RawInitOutput::new(body))
    }

    fn extract(&self, raw: &RawInitOutput) -> Result<InitializationResult, ExtractionError> {
        // serde_json errors only carry positions, never input text.
        let response: InitResponse =
            serde_json::from_str(raw.as_str()).map_err(|e| ExtractionError::InvalidResponse {
                reason: e.to_string(),
            })?;
        let keys = if response.keys.is_empty() {
            response.keys_base64
        } else {
            response.keys
        };
        if keys.is_empty() {
            return Err(ExtractionError::MissingUnsealKeys);
        }
        if response.root_token.trim().is_empty() {
            return Err(ExtractionError::MissingRootToken);
        }
        let expected = usize::from(self.key_shares);
        if keys.len() != expected {
            return Err(ExtractionError::KeyCountMismatch {
                expected,
                found: keys.len(),
            });
        }
        Ok(InitializationResult {
            unseal_keys: keys.into_iter().map(UnsealKey::new).collect(),
            root_token: RootToken::new(response.root_token),
        })
    }
}
