use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;
use vault_bootstrap::Settings;
use vault_bootstrap::backends::SecretBackends;
use vault_bootstrap::base_config::{BaseConfigReport, apply_base_config};
use vault_bootstrap::config::InitSourceKind;
use vault_bootstrap::credentials::ExistingCredentials;
use vault_bootstrap::health::HealthPoller;
use vault_bootstrap::initializer::{ApiInitializer, InitializationSource, LogScrapeInitializer};
use vault_bootstrap::operator::OperatorTarget;
use vault_bootstrap::runner::{CommandRunner, DockerRunner};
use vault_bootstrap::sequencer::BootstrapSequencer;
use vault_bootstrap::unseal::UnsealCoordinator;

use super::vault_client;
use crate::cli::args::BootstrapArgs;
use crate::cli::output::print_bootstrap_summary;

pub(crate) struct BootstrapSummary {
    pub(crate) endpoint: String,
    pub(crate) initialized_now: bool,
    pub(crate) key_shares: u8,
    pub(crate) key_threshold: u8,
    pub(crate) root_token: Option<String>,
    pub(crate) unseal_keys: Vec<String>,
    pub(crate) base_config: Option<BaseConfigReport>,
    pub(crate) show_secrets: bool,
}

pub(crate) async fn run_bootstrap(settings: &Settings, args: &BootstrapArgs) -> Result<()> {
    let timeouts = settings.timeouts.resolve()?;
    let backends = SecretBackends::from_settings(&settings.backends)
        .context("Invalid secrets backend configuration")?;
    let client = vault_client(settings)?;
    let runner: Arc<dyn CommandRunner> = Arc::new(DockerRunner::new(
        settings.remote.clone(),
        settings.runner.max_output_bytes,
    ));
    let target = OperatorTarget::from_settings(&settings.server);
    let shares = settings.init.key_shares;
    let threshold = settings.init.key_threshold;

    let initializer: Box<dyn InitializationSource> = match settings.init.source {
        InitSourceKind::Logs => Box::new(LogScrapeInitializer::new(
            runner.clone(),
            target.clone(),
            shares,
            threshold,
        )),
        InitSourceKind::Api => Box::new(ApiInitializer::new(client.clone(), shares, threshold)),
    };

    let mut supplied_keys = args.unseal_key.clone();
    if let Some(path) = args.unseal_key_file.as_deref() {
        supplied_keys.extend(read_unseal_keys_from_file(path)?);
    }
    let existing = ExistingCredentials::from_raw(args.root_token.clone(), &supplied_keys);

    let mut sequencer = BootstrapSequencer::new(
        settings.server.endpoint.clone(),
        initializer,
        UnsealCoordinator::new(runner, target, usize::from(threshold)),
        Arc::new(client.clone()),
        HealthPoller::new(
            settings.health.max_attempts,
            settings.health.initial_backoff(),
        ),
        timeouts,
    )
    .with_existing_credentials(existing);

    let ready = match sequencer.run().await {
        Ok(ready) => ready,
        Err(err) => {
            let stage = err.stage();
            return Err(anyhow::Error::new(err).context(format!("Bootstrap failed while {stage}")));
        }
    };

    let root_token = ready
        .root_token
        .as_ref()
        .map(|token| token.expose_secret().to_string());
    let unseal_keys = ready
        .unseal_keys
        .iter()
        .map(|key| key.expose_secret().to_string())
        .collect();

    let base_config = match ready.root_token {
        Some(token) if !args.skip_base_config => {
            let admin = client.with_root_token(token);
            Some(
                apply_base_config(&admin, &backends, &settings.escrow, &ready.unseal_keys)
                    .await
                    .context("Failed to apply base configuration"),
            )
        }
        Some(_) => None,
        None => {
            warn!("No root token available; skipping base configuration");
            None
        }
    };
    let (base_config, base_config_error) = match base_config {
        Some(Ok(report)) => (Some(report), None),
        Some(Err(err)) => (None, Some(err)),
        None => (None, None),
    };

    let reveal = must_reveal_credentials(ready.initialized_now, base_config.as_ref());
    if reveal && !args.show_secrets {
        warn!("Unseal keys were not stored in Vault; printing the new credentials in full");
    }

    print_bootstrap_summary(&BootstrapSummary {
        endpoint: ready.endpoint,
        initialized_now: ready.initialized_now,
        key_shares: shares,
        key_threshold: threshold,
        root_token,
        unseal_keys,
        base_config,
        show_secrets: args.show_secrets || reveal,
    });

    match base_config_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Credentials created by this run exist nowhere else unless the shares were
/// escrowed, so they must be printed.
fn must_reveal_credentials(initialized_now: bool, report: Option<&BaseConfigReport>) -> bool {
    initialized_now && report.is_none_or(|report| report.escrow_path.is_none())
}

fn read_unseal_keys_from_file(path: &Path) -> Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read unseal key file: {}", path.display()))?;
    let keys: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if keys.is_empty() {
        anyhow::bail!("Unseal key file is empty: {}", path.display());
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn report(escrow_path: Option<&str>) -> BaseConfigReport {
        BaseConfigReport {
            mounts: vec!["kv2".to_string(), "database".to_string()],
            escrow_path: escrow_path.map(str::to_string),
        }
    }

    #[test]
    fn test_fresh_credentials_revealed_unless_escrowed() {
        assert!(must_reveal_credentials(true, None));
        assert!(must_reveal_credentials(true, Some(&report(None))));
        assert!(!must_reveal_credentials(
            true,
            Some(&report(Some("kv2/sudo/vault/unseal-keys")))
        ));
    }

    #[test]
    fn test_existing_credentials_never_forced_visible() {
        assert!(!must_reveal_credentials(false, None));
        assert!(!must_reveal_credentials(false, Some(&report(None))));
    }

    #[test]
    fn test_read_unseal_keys_from_file_filters_empty_lines() {
        let temp_dir = tempdir().expect("temp dir");
        let file_path = temp_dir.path().join("unseal.txt");
        std::fs::write(&file_path, "\n key-1 \n\nkey-2\n").expect("write");

        let keys = read_unseal_keys_from_file(&file_path).expect("keys");
        assert_eq!(keys, vec!["key-1".to_string(), "key-2".to_string()]);
    }

    #[test]
    fn test_read_unseal_keys_from_file_errors_on_empty() {
        let temp_dir = tempdir().expect("temp dir");
        let file_path = temp_dir.path().join("unseal.txt");
        std::fs::write(&file_path, "\n\n").expect("write");

        let err = read_unseal_keys_from_file(&file_path).unwrap_err();
        assert!(err.to_string().contains("Unseal key file is empty"));
    }
}
