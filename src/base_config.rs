use std::collections::BTreeMap;

use anyhow::{Context, Result};
use tracing::info;

use crate::backends::{Backend, SecretBackends};
use crate::config::EscrowSettings;
use crate::credentials::UnsealKey;
use crate::vault::VaultClient;

/// What the base configuration step changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseConfigReport {
    pub mounts: Vec<String>,
    pub escrow_path: Option<String>,
}

/// Mounts the platform's secrets engines and, when enabled, stores the unseal
/// shares in the KV engine.
///
/// # Errors
/// Returns error if a mount cannot be ensured or the shares cannot be written.
pub async fn apply_base_config(
    admin: &VaultClient,
    backends: &SecretBackends,
    escrow: &EscrowSettings,
    unseal_keys: &[UnsealKey],
) -> Result<BaseConfigReport> {
    let mut mounts = Vec::new();
    for (backend, path) in backends.iter() {
        let ensured = match backend {
            Backend::Kv2 => admin.ensure_kv_v2(path).await,
            Backend::Database => {
                admin
                    .ensure_secrets_engine(path, backend.engine_type())
                    .await
            }
        };
        ensured.with_context(|| format!("Failed to ensure {backend} engine at {path}"))?;
        info!("Secrets engine {backend} mounted at {path}");
        mounts.push(path.to_string());
    }

    let escrow_path = if escrow.enabled && !unseal_keys.is_empty() {
        let mount = backends.path(Backend::Kv2)?;
        let path = escrow.path.trim_matches('/');
        admin
            .write_kv(mount, path, escrow_payload(unseal_keys))
            .await
            .with_context(|| format!("Failed to store unseal keys at {mount}/{path}"))?;
        info!(
            "Stored {} unseal key(s) at {mount}/{path}",
            unseal_keys.len()
        );
        Some(format!("{mount}/{path}"))
    } else {
        None
    };

    Ok(BaseConfigReport {
        mounts,
        escrow_path,
    })
}

fn escrow_payload(unseal_keys: &[UnsealKey]) -> serde_json::Value {
    let entries: BTreeMap<String, &str> = unseal_keys
        .iter()
        .enumerate()
        .map(|(idx, key)| (format!("Unseal Token {idx}"), key.expose_secret()))
        .collect();
    serde_json::json!(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escrow_payload_numbers_keys_from_zero() {
        let payload = escrow_payload(&[UnsealKey::new("a"), UnsealKey::new("b")]);
        assert_eq!(
            payload,
            serde_json::json!({ "Unseal Token 0": "a", "Unseal Token 1": "b" })
        );
    }
}
