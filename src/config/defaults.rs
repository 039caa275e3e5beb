use config::{ConfigBuilder, ConfigError, builder::DefaultState};

const DEFAULT_ENDPOINT: &str = "http://localhost:8200";
const DEFAULT_SERVICE_NAME: &str = "vault";
const DEFAULT_API_PORT: u64 = 8200;
const DEFAULT_IMAGE: &str = "hashicorp/vault:1.14";
const DEFAULT_NETWORK: &str = "traefik";
const DEFAULT_KEY_SHARES: u64 = 20;
const DEFAULT_KEY_THRESHOLD: u64 = 2;
const DEFAULT_INIT_SOURCE: &str = "logs";
const DEFAULT_HEALTH_MAX_ATTEMPTS: u64 = 20;
const DEFAULT_HEALTH_INITIAL_BACKOFF_MS: u64 = 1000;
const DEFAULT_HEALTH_REQUEST_TIMEOUT: &str = "5s";
const DEFAULT_INIT_TIMEOUT: &str = "2m";
const DEFAULT_UNSEAL_TIMEOUT: &str = "1m";
const DEFAULT_STATUS_TIMEOUT: &str = "10s";
const DEFAULT_KV2_BACKEND: &str = "kv2";
const DEFAULT_DATABASE_BACKEND: &str = "database";
const DEFAULT_ESCROW_ENABLED: bool = true;
const DEFAULT_ESCROW_PATH: &str = "sudo/vault/unseal-keys";
const DEFAULT_MAX_OUTPUT_BYTES: u64 = 64 * 1024;
const DEFAULT_SSH_PORT: u16 = 22;

pub(crate) fn apply_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    builder
        .set_default("server.endpoint", DEFAULT_ENDPOINT)?
        .set_default("server.service_name", DEFAULT_SERVICE_NAME)?
        .set_default("server.api_port", DEFAULT_API_PORT)?
        .set_default("server.image", DEFAULT_IMAGE)?
        .set_default("server.network", DEFAULT_NETWORK)?
        .set_default("init.key_shares", DEFAULT_KEY_SHARES)?
        .set_default("init.key_threshold", DEFAULT_KEY_THRESHOLD)?
        .set_default("init.source", DEFAULT_INIT_SOURCE)?
        .set_default("health.max_attempts", DEFAULT_HEALTH_MAX_ATTEMPTS)?
        .set_default(
            "health.initial_backoff_ms",
            DEFAULT_HEALTH_INITIAL_BACKOFF_MS,
        )?
        .set_default("health.request_timeout", DEFAULT_HEALTH_REQUEST_TIMEOUT)?
        .set_default("timeouts.init", DEFAULT_INIT_TIMEOUT)?
        .set_default("timeouts.unseal", DEFAULT_UNSEAL_TIMEOUT)?
        .set_default("timeouts.status", DEFAULT_STATUS_TIMEOUT)?
        .set_default("backends.kv2", DEFAULT_KV2_BACKEND)?
        .set_default("backends.database", DEFAULT_DATABASE_BACKEND)?
        .set_default("escrow.enabled", DEFAULT_ESCROW_ENABLED)?
        .set_default("escrow.path", DEFAULT_ESCROW_PATH)?
        .set_default("runner.max_output_bytes", DEFAULT_MAX_OUTPUT_BYTES)
}

pub(crate) fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}
