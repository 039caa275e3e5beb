use anyhow::{Context, Result};
use vault_bootstrap::Settings;
use vault_bootstrap::health::HealthPoller;

use super::vault_client;

pub(crate) async fn run_health(settings: &Settings) -> Result<()> {
    let client = vault_client(settings)?;
    let poller = HealthPoller::new(
        settings.health.max_attempts,
        settings.health.initial_backoff(),
    );
    let healthy = poller
        .poll(&client)
        .await
        .with_context(|| format!("{} is not healthy", client.base_url()))?;
    println!(
        "{} is unsealed (after {} check(s))",
        client.base_url(),
        healthy.attempts
    );
    Ok(())
}
