//! Secret access for test credentials.
//!
//! Values are handed out as [`SecretValue`], whose `Debug` and `Display`
//! output is redacted, so a secret can be threaded through logged structs
//! without ending up in a log line or an agent transcript.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// Environment variable holding the test account email.
pub const TEST_EMAIL_VAR: &str = "BROWSERUSE_TEST_EMAIL";
/// Environment variable holding the test account password.
pub const TEST_PASSWORD_VAR: &str = "BROWSERUSE_TEST_PASSWORD";

/// A credential value. Only [`SecretValue::expose`] reveals it.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Narrow capability for looking up a named secret.
pub trait SecretProvider: Send + Sync {
    /// Returns `None` when the secret is absent or empty.
    fn get(&self, name: &str) -> Option<SecretValue>;

    fn require(&self, name: &str) -> E2eResult<SecretValue> {
        self.get(name)
            .ok_or_else(|| E2eError::MissingSecret(name.to_string()))
    }
}

/// Reads secrets from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretProvider;

impl SecretProvider for EnvSecretProvider {
    fn get(&self, name: &str) -> Option<SecretValue> {
        std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .map(SecretValue::new)
    }
}

/// In-memory secrets, for tests and dry runs.
#[derive(Default, Clone)]
pub struct StaticSecretProvider {
    values: HashMap<String, SecretValue>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), SecretValue::new(value));
        self
    }
}

impl SecretProvider for StaticSecretProvider {
    fn get(&self, name: &str) -> Option<SecretValue> {
        self.values
            .get(name)
            .filter(|v| !v.expose().is_empty())
            .cloned()
    }
}

/// Check that the login credentials exist and look usable. Errors name the
/// variable, never its value.
pub fn validate_login_credentials(provider: &dyn SecretProvider) -> E2eResult<()> {
    let email = provider.require(TEST_EMAIL_VAR).map_err(|e| {
        debug!(variable = TEST_EMAIL_VAR, "Login email missing");
        e
    })?;
    provider.require(TEST_PASSWORD_VAR).map_err(|e| {
        debug!(variable = TEST_PASSWORD_VAR, "Login password missing");
        e
    })?;

    if !email.expose().contains('@') {
        debug!(variable = TEST_EMAIL_VAR, "Login email rejected");
        return Err(E2eError::InvalidSecret {
            name: TEST_EMAIL_VAR.to_string(),
            reason: "does not appear to be a valid email address".to_string(),
        });
    }
    Ok(())
}

/// Every login credential currently available, for leak checks.
pub fn login_credentials(provider: &dyn SecretProvider) -> Vec<(&'static str, SecretValue)> {
    [TEST_EMAIL_VAR, TEST_PASSWORD_VAR]
        .into_iter()
        .filter_map(|name| provider.get(name).map(|value| (name, value)))
        .collect()
}
