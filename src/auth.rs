use std::fmt;

use crate::error::{HarnessError, Result};

/// Opaque bearer credential.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

impl From<&str> for AccessToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for AccessToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&AccessToken> for AccessToken {
    fn from(token: &AccessToken) -> Self {
        token.clone()
    }
}

/// Value of the `Authorization` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    Bearer(AccessToken),
    /// Sent verbatim, e.g. a pre-encoded `Basic` credential.
    Raw(String),
}

impl Authorization {
    pub fn bearer(token: impl Into<AccessToken>) -> Self {
        Authorization::Bearer(token.into())
    }

    pub fn header_value(&self) -> String {
        match self {
            Authorization::Bearer(token) => format!("Bearer {}", token.as_str()),
            Authorization::Raw(value) => value.clone(),
        }
    }
}

/// Supplies credentials for the authorization override of a request.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Result<AccessToken>;
}

impl TokenSource for AccessToken {
    fn access_token(&self) -> Result<AccessToken> {
        Ok(self.clone())
    }
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvTokenSource {
    variable: String,
}

impl EnvTokenSource {
    pub fn new(variable: &str) -> Self {
        Self {
            variable: variable.to_string(),
        }
    }
}

impl TokenSource for EnvTokenSource {
    fn access_token(&self) -> Result<AccessToken> {
        match std::env::var(&self.variable) {
            Ok(token) if !token.is_empty() => Ok(AccessToken(token)),
            _ => Err(HarnessError::InvalidConfig(format!(
                "environment variable {} holds no access token",
                self.variable
            ))),
        }
    }
}
