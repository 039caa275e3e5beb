use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

mod defaults;
mod validation;

pub(crate) const DEFAULT_CONFIG_FILE: &str = "vault-bootstrap.toml";
const ENV_PREFIX: &str = "VAULT_BOOTSTRAP";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub init: InitSettings,
    pub health: HealthSettings,
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub remote: Option<RemoteSettings>,
    pub backends: BackendSettings,
    pub escrow: EscrowSettings,
    pub runner: RunnerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    /// Public URL of the server, used for HTTP calls.
    pub endpoint: String,
    /// Service name reachable inside the container network.
    pub service_name: String,
    pub api_port: u16,
    pub image: String,
    pub network: String,
    #[serde(default)]
    pub ca_bundle_path: Option<PathBuf>,
}

impl ServerSettings {
    /// Address used by operator commands running inside the container network.
    #[must_use]
    pub fn operator_address(&self) -> String {
        format!("http://{}:{}", self.service_name, self.api_port)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InitSourceKind {
    /// Run `vault operator init` in a container and parse its output.
    Logs,
    /// Call `POST /v1/sys/init` directly.
    Api,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InitSettings {
    pub key_shares: u8,
    pub key_threshold: u8,
    pub source: InitSourceKind,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthSettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub request_timeout: String,
}

impl HealthSettings {
    #[must_use]
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// # Errors
    /// Returns error if `request_timeout` is not a valid duration.
    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration("health.request_timeout", &self.request_timeout)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutSettings {
    pub init: String,
    pub unseal: String,
    pub status: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub host: String,
    pub user: String,
    #[serde(default = "defaults::default_ssh_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    pub kv2: String,
    pub database: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EscrowSettings {
    pub enabled: bool,
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunnerSettings {
    pub max_output_bytes: usize,
}

/// Stage timeouts resolved to durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub init: Duration,
    pub unseal: Duration,
    pub status: Duration,
}

impl TimeoutSettings {
    /// # Errors
    /// Returns error if any timeout is not a valid duration.
    pub fn resolve(&self) -> Result<StageTimeouts> {
        Ok(StageTimeouts {
            init: parse_duration("timeouts.init", &self.init)?,
            unseal: parse_duration("timeouts.unseal", &self.unseal)?,
            status: parse_duration("timeouts.status", &self.status)?,
        })
    }
}

impl Settings {
    /// Loads settings from defaults, an optional TOML file and the environment.
    ///
    /// # Errors
    /// Returns error if configuration parsing fails.
    pub fn new(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut s = defaults::apply_defaults(Config::builder())?;

        let path =
            config_path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);
        s = s.add_source(File::from(path).required(false));

        // e.g. VAULT_BOOTSTRAP_SERVER__ENDPOINT
        s = s.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        s.build()?.try_deserialize()
    }

    pub fn override_endpoint(&mut self, endpoint: Option<&str>) {
        if let Some(endpoint) = endpoint {
            self.server.endpoint = endpoint.trim_end_matches('/').to_string();
        }
    }

    /// Validates configuration values for correctness.
    ///
    /// # Errors
    /// Returns error if any setting is invalid or out of range.
    pub fn validate(&self) -> Result<()> {
        validation::validate_settings(self)
    }
}

fn parse_duration(label: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim())
        .with_context(|| format!("{label} is not a valid duration: {value}"))
}
