//! Configuration types for the SOAP client.

use crate::error::SoapError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Partner API endpoint used when none is configured.
pub const DEFAULT_SOAP_ENDPOINT: &str = "https://webservice.exacttarget.com/Service.asmx";

/// Client configuration. Treated as read-only once the client is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// SOAP endpoint URI
    pub endpoint: String,

    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,

    /// Transport settings applied to every request
    pub transport: TransportOverrides,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SOAP_ENDPOINT.to_string(),
            headers: BTreeMap::new(),
            transport: TransportOverrides::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, SoapError> {
        serde_yaml::from_str(yaml).map_err(|e| SoapError::Config(e.to_string()))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Transport settings: configured per client, overridable per call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportOverrides {
    /// Headers added to the request
    pub headers: BTreeMap<String, String>,

    /// HTTP proxy
    pub proxy: Option<ProxyConfig>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

impl TransportOverrides {
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// HTTP proxy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Scheme, "http" or "https" (a trailing ':' is accepted)
    #[serde(default = "default_proxy_protocol")]
    pub protocol: String,

    pub host: String,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

fn default_proxy_protocol() -> String {
    "http".to_string()
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            protocol: default_proxy_protocol(),
            host: host.into(),
            port: Some(port),
            username: None,
            password: None,
        }
    }

    /// Proxy URL, e.g. `http://127.0.0.1:8888`.
    pub fn url(&self) -> String {
        let scheme = self.protocol.trim_end_matches(':');
        match self.port {
            Some(port) => format!("{}://{}:{}", scheme, self.host, port),
            None => format!("{}://{}", scheme, self.host),
        }
    }
}
