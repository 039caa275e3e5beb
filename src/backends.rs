use std::collections::BTreeMap;
use std::fmt;

use crate::config::BackendSettings;

/// Logical secrets engines the platform relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Backend {
    Kv2,
    Database,
}

impl Backend {
    /// Engine type passed to `sys/mounts`.
    #[must_use]
    pub fn engine_type(self) -> &'static str {
        match self {
            Self::Kv2 => "kv",
            Self::Database => "database",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Kv2 => "kv2",
            Self::Database => "database",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("\"{0}\" is already associated with a secrets backend")]
    AlreadyRegistered(Backend),

    #[error("\"{0}\" does not have a backend associated with it")]
    NotRegistered(Backend),

    #[error("mount path for \"{0}\" must not be empty")]
    EmptyPath(Backend),

    #[error("mount path \"{path}\" is used by both \"{existing}\" and \"{backend}\"")]
    PathInUse {
        path: String,
        existing: Backend,
        backend: Backend,
    },
}

/// Mount paths of the secrets engines, fixed once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretBackends {
    mounts: BTreeMap<Backend, String>,
}

#[derive(Debug, Default)]
pub struct SecretBackendsBuilder {
    mounts: BTreeMap<Backend, String>,
}

impl SecretBackendsBuilder {
    /// # Errors
    /// Returns `BackendError` if `backend` was registered before, the path is
    /// empty, or another backend already owns the path.
    pub fn register(mut self, backend: Backend, path: &str) -> Result<Self, BackendError> {
        let path = path.trim().trim_matches('/');
        if path.is_empty() {
            return Err(BackendError::EmptyPath(backend));
        }
        if self.mounts.contains_key(&backend) {
            return Err(BackendError::AlreadyRegistered(backend));
        }
        if let Some((existing, _)) = self.mounts.iter().find(|(_, mount)| *mount == path) {
            return Err(BackendError::PathInUse {
                path: path.to_string(),
                existing: *existing,
                backend,
            });
        }
        self.mounts.insert(backend, path.to_string());
        Ok(self)
    }

    #[must_use]
    pub fn build(self) -> SecretBackends {
        SecretBackends {
            mounts: self.mounts,
        }
    }
}

impl SecretBackends {
    #[must_use]
    pub fn builder() -> SecretBackendsBuilder {
        SecretBackendsBuilder::default()
    }

    /// # Errors
    /// Returns `BackendError` if the configured paths are empty or collide.
    pub fn from_settings(settings: &BackendSettings) -> Result<Self, BackendError> {
        Ok(Self::builder()
            .register(Backend::Kv2, &settings.kv2)?
            .register(Backend::Database, &settings.database)?
            .build())
    }

    /// # Errors
    /// Returns `BackendError::NotRegistered` if no path was registered.
    pub fn path(&self, backend: Backend) -> Result<&str, BackendError> {
        self.mounts
            .get(&backend)
            .map(String::as_str)
            .ok_or(BackendError::NotRegistered(backend))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Backend, &str)> {
        self.mounts
            .iter()
            .map(|(backend, path)| (*backend, path.as_str()))
    }
}
