//! Access token capability.
//!
//! Acquiring and refreshing OAuth tokens is left to the caller; the client only asks a
//! [`TokenProvider`] for a token at the start of every attempt.

use crate::error::AuthError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-call hints forwarded to the token provider untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthOverrides {
    /// Ask the provider to skip its cache
    #[serde(default)]
    pub force: bool,

    /// Provider-specific parameters
    #[serde(default, flatten)]
    pub params: BTreeMap<String, String>,
}

/// Token response from a [`TokenProvider`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Bearer token; `None` or empty means the provider came back without one
    pub access_token: Option<String>,

    /// When the token stops being valid
    pub expiration: Option<DateTime<Utc>>,

    /// Tenant-specific SOAP base URL; requests go to `<url>/Service.asmx` when set
    pub soap_instance_url: Option<String>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            ..Default::default()
        }
    }

    /// The bearer token, if a non-empty one was returned.
    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Supplies bearer tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self, overrides: Option<&AuthOverrides>) -> Result<AccessToken, AuthError>;
}

/// Serves one fixed token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token),
        }
    }

    pub fn with_instance_url(mut self, url: impl Into<String>) -> Self {
        self.token.soap_instance_url = Some(url.into());
        self
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self, _overrides: Option<&AuthOverrides>) -> Result<AccessToken, AuthError> {
        Ok(self.token.clone())
    }
}
