pub(crate) mod bootstrap;
pub(crate) mod health;
pub(crate) mod plan;

use anyhow::{Context, Result};
use vault_bootstrap::Settings;
use vault_bootstrap::vault::VaultClient;

use crate::cli::args::GlobalArgs;

pub(crate) fn load_settings(args: &GlobalArgs) -> Result<Settings> {
    let mut settings =
        Settings::new(args.config.as_deref()).context("Failed to load configuration")?;
    settings.override_endpoint(args.endpoint.as_deref());
    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

pub(crate) fn vault_client(settings: &Settings) -> Result<VaultClient> {
    VaultClient::new(
        &settings.server.endpoint,
        settings.server.ca_bundle_path.as_deref(),
        settings.health.request_timeout()?,
    )
    .context("Failed to create Vault client")
}
