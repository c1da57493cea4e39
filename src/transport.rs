//! HTTP transport capability.

use crate::config::ProxyConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// SOAP over HTTP always POSTs.
pub const HTTP_METHOD: &str = "POST";

/// A fully prepared HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub uri: String,
    pub method: &'static str,
    pub headers: BTreeMap<String, String>,
    /// Serialized envelope
    pub body: String,
    pub proxy: Option<ProxyConfig>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Header lookup ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw HTTP response. Non-2xx statuses are not errors: faults come back as HTTP 500.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Executes prepared requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Proxy settings that share one client.
type ProxyKey = (String, Option<String>, Option<String>);

/// [`Transport`] backed by reqwest.
///
/// Direct requests use the wrapped client. A reqwest client's proxy is fixed when it is
/// built, so proxied requests go through a default-configured client built once per proxy
/// and reused afterwards. Settings of a client passed to [`ReqwestTransport::from_client`]
/// do not apply to those.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    proxied: Arc<Mutex<HashMap<ProxyKey, reqwest::Client>>>,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self::from_client(reqwest::Client::builder().build()?))
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            proxied: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The wrapped client, or the cached client for `proxy`.
    fn client_for(&self, proxy: Option<&ProxyConfig>) -> Result<reqwest::Client, TransportError> {
        let Some(proxy) = proxy else {
            return Ok(self.client.clone());
        };

        let key = (proxy.url(), proxy.username.clone(), proxy.password.clone());
        let mut proxied = self.proxied.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = proxied.get(&key) {
            return Ok(client.clone());
        }

        let mut settings = reqwest::Proxy::all(proxy.url())?;
        if let Some(username) = &proxy.username {
            settings = settings.basic_auth(username, proxy.password.as_deref().unwrap_or_default());
        }
        let client = reqwest::Client::builder().proxy(settings).build()?;
        debug!(proxy = %key.0, "Built client for proxy");
        proxied.insert(key, client.clone());
        Ok(client)
    }

    fn cached_proxies(&self) -> usize {
        self.proxied.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = self.client_for(request.proxy.as_ref())?;
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let mut builder = client.request(method, &request.uri);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.body(request.body).send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        debug!(uri = %request.uri, status, bytes = body.len(), "SOAP response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
