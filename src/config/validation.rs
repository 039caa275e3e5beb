use anyhow::Result;

use super::{RemoteSettings, Settings};

pub(crate) fn validate_settings(settings: &Settings) -> Result<()> {
    let server = &settings.server;
    if server.endpoint.trim().is_empty() {
        anyhow::bail!("server.endpoint must not be empty");
    }
    if !server.endpoint.starts_with("http://") && !server.endpoint.starts_with("https://") {
        anyhow::bail!("server.endpoint must start with http:// or https://");
    }
    if server.service_name.trim().is_empty() {
        anyhow::bail!("server.service_name must not be empty");
    }
    if server.api_port == 0 {
        anyhow::bail!("server.api_port must be greater than 0");
    }
    if server.image.trim().is_empty() {
        anyhow::bail!("server.image must not be empty");
    }
    if server.network.trim().is_empty() {
        anyhow::bail!("server.network must not be empty");
    }
    if let Some(path) = &server.ca_bundle_path
        && path.as_os_str().is_empty()
    {
        anyhow::bail!("server.ca_bundle_path must not be empty");
    }

    if settings.init.key_shares == 0 {
        anyhow::bail!("init.key_shares must be greater than 0");
    }
    if settings.init.key_threshold == 0 {
        anyhow::bail!("init.key_threshold must be greater than 0");
    }
    if settings.init.key_threshold > settings.init.key_shares {
        anyhow::bail!("init.key_threshold must be <= init.key_shares");
    }

    if settings.health.max_attempts == 0 {
        anyhow::bail!("health.max_attempts must be greater than 0");
    }
    if settings.health.request_timeout()?.is_zero() {
        anyhow::bail!("health.request_timeout must be greater than 0");
    }
    let timeouts = settings.timeouts.resolve()?;
    if timeouts.init.is_zero() || timeouts.unseal.is_zero() || timeouts.status.is_zero() {
        anyhow::bail!("timeouts values must be greater than 0");
    }

    if let Some(remote) = &settings.remote {
        validate_remote(remote)?;
    }

    if settings.backends.kv2.trim_matches('/').is_empty() {
        anyhow::bail!("backends.kv2 must not be empty");
    }
    if settings.backends.database.trim_matches('/').is_empty() {
        anyhow::bail!("backends.database must not be empty");
    }
    if settings.escrow.enabled && settings.escrow.path.trim_matches('/').is_empty() {
        anyhow::bail!("escrow.path must not be empty when escrow is enabled");
    }
    if settings.runner.max_output_bytes == 0 {
        anyhow::bail!("runner.max_output_bytes must be greater than 0");
    }
    Ok(())
}

fn validate_remote(remote: &RemoteSettings) -> Result<()> {
    if remote.host.trim().is_empty() {
        anyhow::bail!("remote.host must not be empty");
    }
    if remote.user.trim().is_empty() {
        anyhow::bail!("remote.user must not be empty");
    }
    if remote.port == 0 {
        anyhow::bail!("remote.port must be greater than 0");
    }
    Ok(())
}
