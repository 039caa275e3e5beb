use std::fmt;

const REDACTED: &str = "<redacted>";

/// One share of the split master key.
#[derive(Clone, PartialEq, Eq)]
pub struct UnsealKey(String);

impl UnsealKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UnsealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UnsealKey").field(&REDACTED).finish()
    }
}

/// The initial root credential issued by `operator init`.
///
/// Building the administrative client consumes the token, so it can only be
/// handed downstream once.
#[derive(PartialEq, Eq)]
pub struct RootToken(String);

impl RootToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub(crate) fn into_secret(self) -> String {
        self.0
    }
}

impl fmt::Debug for RootToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RootToken").field(&REDACTED).finish()
    }
}

/// Unseal shares plus root token recovered from a freshly initialized server.
#[derive(Debug, PartialEq, Eq)]
pub struct InitializationResult {
    pub unseal_keys: Vec<UnsealKey>,
    pub root_token: RootToken,
}

/// Credentials an operator supplies for a server that is already initialized.
#[derive(Debug, Default)]
pub struct ExistingCredentials {
    pub root_token: Option<RootToken>,
    pub unseal_keys: Vec<UnsealKey>,
}

impl ExistingCredentials {
    pub fn from_raw(root_token: Option<String>, unseal_keys: &[String]) -> Self {
        Self {
            root_token: root_token
                .filter(|value| !value.trim().is_empty())
                .map(RootToken::new),
            unseal_keys: unseal_keys
                .iter()
                .map(|key| key.trim())
                .filter(|key| !key.is_empty())
                .map(UnsealKey::new)
                .collect(),
        }
    }
}
