use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Certificate, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::credentials::RootToken;
use crate::error::ProbeError;
use crate::health::{HealthReport, SealStatus, StatusProbe};

const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";

#[derive(Clone)]
pub struct VaultClient {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct MountResponse {
    data: MountData,
}

#[derive(Debug, Deserialize)]
struct MountData {
    #[serde(rename = "type")]
    mount_type: String,
    #[serde(default)]
    options: Option<MountOptions>,
}

#[derive(Debug, Deserialize)]
struct MountOptions {
    #[serde(default)]
    version: Option<String>,
}

impl VaultClient {
    /// Builds a client for `base_url`, trusting the PEM bundle at `ca_bundle`
    /// in addition to the system roots.
    ///
    /// # Errors
    /// Returns error if the bundle cannot be read or the HTTP client fails to
    /// build.
    pub fn new(base_url: &str, ca_bundle: Option<&Path>, timeout: Duration) -> Result<Self> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(path) = ca_bundle {
            for certificate in load_ca_bundle(path)? {
                builder = builder.add_root_certificate(certificate);
            }
        }
        let client = builder
            .build()
            .context("Failed to build Vault HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: None,
        })
    }

    /// Turns this client into the administrative client, consuming the root
    /// token.
    #[must_use]
    pub fn with_root_token(mut self, token: RootToken) -> Self {
        self.token = Some(token.into_secret());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn probe_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProbeError> {
        let response = self
            .client
            .get(self.endpoint(path))
            .send()
            .await
            .map_err(|e| ProbeError::Transport {
                reason: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status {
                status: status.as_u16(),
            });
        }
        response.json::<T>().await.map_err(|e| ProbeError::Body {
            reason: e.to_string(),
        })
    }

    /// Calls `sys/init` and returns the raw response body.
    ///
    /// # Errors
    /// Returns error if the request fails or the server rejects it. The error
    /// never includes a successful response body.
    pub async fn init_raw(&self, shares: u8, threshold: u8) -> Result<String> {
        #[derive(Serialize)]
        struct InitRequest {
            secret_shares: u8,
            secret_threshold: u8,
        }
        let response = self
            .client
            .post(self.endpoint("sys/init"))
            .json(&InitRequest {
                secret_shares: shares,
                secret_threshold: threshold,
            })
            .send()
            .await
            .context("Vault init request failed")?;
        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read Vault init response body")?;
        if !status.is_success() {
            anyhow::bail!("Vault API error ({status}): {}", text.trim());
        }
        Ok(text)
    }

    /// Ensures a KV version 2 engine is mounted at `mount`.
    ///
    /// # Errors
    /// Returns error if the mount exists with a different type or version, or
    /// the API call fails.
    pub async fn ensure_kv_v2(&self, mount: &str) -> Result<()> {
        if let Some(data) = self.get_mount(mount).await? {
            if data.mount_type != "kv" {
                anyhow::bail!("Mount {mount} exists but is not KV");
            }
            let version = data.options.and_then(|opt| opt.version);
            if version.as_deref() != Some("2") {
                anyhow::bail!("Mount {mount} exists but is not KV v2");
            }
            return Ok(());
        }
        self.enable_mount(mount, "kv", Some("2"), "Generic KeyValue store.")
            .await
    }

    /// Ensures a secrets engine of `engine_type` is mounted at `mount`.
    ///
    /// # Errors
    /// Returns error if the mount exists with a different type or the API call
    /// fails.
    pub async fn ensure_secrets_engine(&self, mount: &str, engine_type: &str) -> Result<()> {
        if let Some(data) = self.get_mount(mount).await? {
            if data.mount_type != engine_type {
                anyhow::bail!(
                    "Mount {mount} exists with type {} instead of {engine_type}",
                    data.mount_type
                );
            }
            return Ok(());
        }
        self.enable_mount(mount, engine_type, None, "").await
    }

    /// Writes `data` to a KV v2 secret.
    ///
    /// # Errors
    /// Returns error if no token is set or the API call fails.
    pub async fn write_kv(&self, mount: &str, path: &str, data: serde_json::Value) -> Result<()> {
        #[derive(Serialize)]
        struct KvRequest {
            data: serde_json::Value,
        }
        let _: serde_json::Value = self
            .post_json(&format!("{mount}/data/{path}"), &KvRequest { data })
            .await?;
        Ok(())
    }

    async fn enable_mount(
        &self,
        mount: &str,
        engine_type: &str,
        version: Option<&str>,
        description: &str,
    ) -> Result<()> {
        #[derive(Serialize)]
        struct MountRequest<'a> {
            #[serde(rename = "type")]
            mount_type: &'a str,
            description: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            options: Option<MountOptionsRequest<'a>>,
        }
        #[derive(Serialize)]
        struct MountOptionsRequest<'a> {
            version: &'a str,
        }
        let _: serde_json::Value = self
            .post_json(
                &format!("sys/mounts/{mount}"),
                &MountRequest {
                    mount_type: engine_type,
                    description,
                    options: version.map(|version| MountOptionsRequest { version }),
                },
            )
            .await?;
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.base_url)
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Vault token is not set"))
    }

    async fn get_mount(&self, mount: &str) -> Result<Option<MountData>> {
        let response = self
            .client
            .get(self.endpoint(&format!("sys/mounts/{mount}")))
            .header(VAULT_TOKEN_HEADER, self.token()?)
            .send()
            .await
            .context("Failed to query Vault mounts")?;
        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read Vault mount response")?;
        if status == StatusCode::NOT_FOUND
            || (status == StatusCode::BAD_REQUEST && text.contains("No secret engine mount"))
        {
            return Ok(None);
        }
        if !status.is_success() {
            anyhow::bail!("Vault API error ({status}): {text}");
        }
        let parsed: MountResponse =
            serde_json::from_str(&text).context("Failed to parse mount response")?;
        Ok(Some(parsed.data))
    }

    async fn post_json<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R> {
        let response = self
            .client
            .post(self.endpoint(path))
            .header(VAULT_TOKEN_HEADER, self.token()?)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Vault request failed: {path}"))?;
        Self::parse_response(response)
            .await
            .with_context(|| format!("Vault response parse failed: {path}"))
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read Vault response body")?;
        if !status.is_success() {
            anyhow::bail!("Vault API error ({status}): {text}");
        }
        let text = if text.trim().is_empty() {
            "null"
        } else {
            text.as_str()
        };
        serde_json::from_str(text).context("Failed to parse Vault response")
    }
}

#[async_trait::async_trait]
impl StatusProbe for VaultClient {
    async fn seal_status(&self) -> Result<SealStatus, ProbeError> {
        self.probe_json("sys/seal-status").await
    }

    async fn health(&self) -> Result<HealthReport, ProbeError> {
        self.probe_json("sys/health").await
    }
}

fn load_ca_bundle(path: &Path) -> Result<Vec<Certificate>> {
    let pem = std::fs::read(path)
        .with_context(|| format!("Failed to read CA bundle {}", path.display()))?;
    let certificates = Certificate::from_pem_bundle(&pem)
        .with_context(|| format!("Failed to parse CA bundle {}", path.display()))?;
    if certificates.is_empty() {
        anyhow::bail!("CA bundle {} contains no certificates", path.display());
    }
    Ok(certificates)
}
