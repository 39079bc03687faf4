//! API credential lookup
//!
//! Credentials are fetched by name once at startup. Anything that can hand out a
//! named secret implements [`SecretProvider`]; the binary reads them from the
//! environment.

use std::collections::HashMap;
use std::env;

use thiserror::Error;

/// Name of the secret holding the API client id
pub const CLIENT_ID_SECRET: &str = "AMADEUS_CLIENT_ID";

/// Name of the secret holding the API client secret
pub const CLIENT_SECRET_SECRET: &str = "AMADEUS_CLIENT_SECRET";

/// Errors that can occur when looking up a secret
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SecretError {
    /// No value is stored under this name
    #[error("Secret '{0}' is not set")]
    Missing(String),

    /// A value exists but is blank
    #[error("Secret '{0}' is empty")]
    Empty(String),
}

/// Source of named secrets
pub trait SecretProvider {
    /// Returns the plain-text value stored under `name`
    fn secret(&self, name: &str) -> Result<String, SecretError>;
}

/// Reads secrets from process environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretProvider for EnvSecrets {
    fn secret(&self, name: &str) -> Result<String, SecretError> {
        let value = env::var(name).map_err(|_| SecretError::Missing(name.to_string()))?;
        non_empty(name, value)
    }
}

/// Fixed in-memory secrets
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets(HashMap<String, String>);

impl StaticSecrets {
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }
}

impl SecretProvider for StaticSecrets {
    fn secret(&self, name: &str) -> Result<String, SecretError> {
        let value = self
            .0
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::Missing(name.to_string()))?;
        non_empty(name, value)
    }
}

fn non_empty(name: &str, value: String) -> Result<String, SecretError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(SecretError::Empty(name.to_string()))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Client id and secret for the flight search API
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Fetches both credentials; either one missing is an error
    pub fn fetch(provider: &impl SecretProvider) -> Result<Self, SecretError> {
        Ok(Self {
            client_id: provider.secret(CLIENT_ID_SECRET)?,
            client_secret: provider.secret(CLIENT_SECRET_SECRET)?,
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}
