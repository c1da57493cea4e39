//! SOAP client: the request pipeline and one method per verb.
//!
//! Each call runs token acquisition, envelope building, dispatch and response parsing in
//! sequence. A `Token Expired` fault re-runs the whole pipeline once when the request allows it.

use crate::auth::{AccessToken, TokenProvider};
use crate::config::{ClientConfig, ProxyConfig, TransportOverrides};
use crate::envelope::build_envelope;
use crate::error::SoapError;
use crate::node::Node;
use crate::parser::parse_response;
use crate::transport::{HttpRequest, ReqwestTransport, Transport, HTTP_METHOD};
use crate::verbs::{self, RequestDescriptor, RequestOptions, RetrieveArgs};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// `User-Agent` sent with every request.
pub const USER_AGENT: &str = concat!("fuel-soap-rs/", env!("CARGO_PKG_VERSION"));

/// `Content-Type` of every request.
pub const CONTENT_TYPE: &str = "text/xml";

/// Header carrying the verb name.
pub const SOAP_ACTION_HEADER: &str = "SOAPAction";

/// Path appended to a token's `soap_instance_url`.
const SERVICE_PATH: &str = "/Service.asmx";

/// A successful, normalized response.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapResponse {
    /// The verb's response element, with `Results` always an array
    pub body: Value,
    /// HTTP status of the final attempt
    pub status: u16,
    /// HTTP response headers of the final attempt
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retry,
}

impl Attempt {
    fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Retry => "retry",
        }
    }
}

/// Client for the partner SOAP API.
///
/// Configuration is read-only once the client is built. Per-call overrides are merged into a
/// fresh copy for each request, so concurrent calls never see each other's settings.
pub struct SoapClient {
    config: ClientConfig,
    auth: Arc<dyn TokenProvider>,
    transport: Arc<dyn Transport>,
}

impl SoapClient {
    /// Create a client sending requests with reqwest.
    pub fn new(config: ClientConfig, auth: Arc<dyn TokenProvider>) -> Result<Self, SoapError> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(config, auth, Arc::new(transport)))
    }

    pub fn with_transport(
        config: ClientConfig,
        auth: Arc<dyn TokenProvider>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            auth,
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Dispatch one request.
    ///
    /// Malformed descriptors are rejected before any I/O. The pipeline runs at most twice:
    /// a second `Token Expired` fault is returned to the caller.
    pub async fn soap_request(&self, request: RequestDescriptor) -> Result<SoapResponse, SoapError> {
        validate_request(&request)?;

        match self.execute_attempt(&request, Attempt::First).await {
            Err(err) if err.is_expired_token() && request.retry_on_expiry => {
                warn!(action = %request.action, "Access token expired, retrying once");
                self.execute_attempt(&request, Attempt::Retry).await
            }
            outcome => outcome,
        }
    }

    async fn execute_attempt(
        &self,
        request: &RequestDescriptor,
        attempt: Attempt,
    ) -> Result<SoapResponse, SoapError> {
        // Every attempt starts from the caller's auth overrides.
        let token = self
            .auth
            .access_token(request.auth_overrides.as_ref())
            .await?;
        let bearer = match token.token() {
            Some(bearer) => bearer.to_string(),
            None => return Err(SoapError::MissingAccessToken(Box::new(token))),
        };

        let uri = self.endpoint_for(&token);
        let body = build_envelope(Some(&request.body), &bearer)?;
        let http_request = self.http_request(request, uri, body);

        debug!(
            action = %request.action,
            attempt = attempt.as_str(),
            endpoint = %http_request.uri,
            "Dispatching SOAP request"
        );

        let response = self.transport.execute(http_request).await?;
        let payload = parse_response(&request.response_key, &response.body)?.into_result()?;

        info!(
            action = %request.action,
            attempt = attempt.as_str(),
            status = response.status,
            "SOAP request completed"
        );

        Ok(SoapResponse {
            body: payload,
            status: response.status,
            headers: response.headers,
        })
    }

    /// The configured endpoint, unless the token points at a tenant-specific instance.
    fn endpoint_for(&self, token: &AccessToken) -> String {
        match token.soap_instance_url.as_deref().filter(|u| !u.is_empty()) {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), SERVICE_PATH),
            None => self.config.endpoint.clone(),
        }
    }

    fn http_request(&self, request: &RequestDescriptor, uri: String, body: String) -> HttpRequest {
        let overrides = request.transport_overrides.as_ref();

        let mut headers = BTreeMap::new();
        merge_headers(
            &mut headers,
            [("User-Agent", USER_AGENT), ("Content-Type", CONTENT_TYPE)],
        );
        merge_headers(&mut headers, str_pairs(&self.config.headers));
        merge_headers(&mut headers, str_pairs(&self.config.transport.headers));
        if let Some(overrides) = overrides {
            merge_headers(&mut headers, str_pairs(&overrides.headers));
        }
        merge_headers(&mut headers, [(SOAP_ACTION_HEADER, request.action.as_str())]);

        HttpRequest {
            uri,
            method: HTTP_METHOD,
            headers,
            body,
            proxy: self.proxy_for(overrides),
            timeout: self.timeout_for(overrides),
        }
    }

    fn proxy_for(&self, overrides: Option<&TransportOverrides>) -> Option<ProxyConfig> {
        overrides
            .and_then(|o| o.proxy.clone())
            .or_else(|| self.config.transport.proxy.clone())
    }

    fn timeout_for(&self, overrides: Option<&TransportOverrides>) -> Option<Duration> {
        overrides
            .and_then(TransportOverrides::timeout)
            .or_else(|| self.config.transport.timeout())
    }

    pub async fn create(
        &self,
        object_type: &str,
        objects: impl Into<Node>,
        options: Option<RequestOptions>,
    ) -> Result<SoapResponse, SoapError> {
        let request = verbs::build_create(object_type, objects.into(), options)?;
        self.soap_request(request).await
    }

    pub async fn retrieve(&self, object_type: &str, args: RetrieveArgs) -> Result<SoapResponse, SoapError> {
        self.soap_request(verbs::build_retrieve(object_type, args)).await
    }

    pub async fn update(
        &self,
        object_type: &str,
        objects: impl Into<Node>,
        options: Option<RequestOptions>,
    ) -> Result<SoapResponse, SoapError> {
        let request = verbs::build_update(object_type, objects.into(), options)?;
        self.soap_request(request).await
    }

    pub async fn delete(
        &self,
        object_type: &str,
        objects: impl Into<Node>,
        options: Option<RequestOptions>,
    ) -> Result<SoapResponse, SoapError> {
        let request = verbs::build_delete(object_type, objects.into(), options)?;
        self.soap_request(request).await
    }

    pub async fn describe(&self, object_type: &str) -> Result<SoapResponse, SoapError> {
        self.soap_request(verbs::build_describe(object_type)).await
    }

    pub async fn execute(&self, name: &str, parameters: impl Into<Node>) -> Result<SoapResponse, SoapError> {
        self.soap_request(verbs::build_execute(name, parameters.into()))
            .await
    }

    pub async fn perform(&self, object_type: &str, definition: impl Into<Node>) -> Result<SoapResponse, SoapError> {
        let request = verbs::build_perform(object_type, definition.into())?;
        self.soap_request(request).await
    }

    /// Schedule `interactions`. A malformed `interactions` value fails before any I/O.
    pub async fn schedule(
        &self,
        object_type: &str,
        recurrence: impl Into<Node>,
        interactions: impl Into<Node>,
        action: &str,
        options: Option<RequestOptions>,
    ) -> Result<SoapResponse, SoapError> {
        let request = verbs::build_schedule(
            object_type,
            recurrence.into(),
            interactions.into(),
            action,
            options,
        )?;
        self.soap_request(request).await
    }

    pub async fn extract(&self, definition: impl Into<Node>) -> Result<SoapResponse, SoapError> {
        self.soap_request(verbs::build_extract(definition.into()))
            .await
    }
}

fn validate_request(request: &RequestDescriptor) -> Result<(), SoapError> {
    if request.action.is_empty() {
        return Err(SoapError::InvalidArgument("request has no action".into()));
    }
    if request.response_key.is_empty() {
        return Err(SoapError::InvalidArgument("request has no response key".into()));
    }
    if request.body.as_element().is_none() {
        return Err(SoapError::InvalidArgument(
            "request body must be a structured element".into(),
        ));
    }
    Ok(())
}

fn str_pairs(headers: &BTreeMap<String, String>) -> impl Iterator<Item = (&str, &str)> {
    headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
}

/// Insert headers, replacing any existing header whose name differs only in case.
fn merge_headers<'a>(
    target: &mut BTreeMap<String, String>,
    headers: impl IntoIterator<Item = (&'a str, &'a str)>,
) {
    for (name, value) in headers {
        target.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        target.insert(name.to_string(), value.to_string());
    }
}
