//! Integration tests for the fuel-soap crate.
//!
//! These tests run the public client against a wiremock HTTP server through the reqwest
//! transport, covering envelope content, headers, response normalization and token retry.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fuel_soap::error::AuthError;
use fuel_soap::{
    AccessToken, AuthOverrides, ClientConfig, FilterExpression, Node, RequestOptions,
    RetrieveArgs, RetrieveOptions, SoapClient, SoapError, Stage, StaticTokenProvider,
    TokenProvider, TransportOverrides,
};

// ============================================================================
// Helpers
// ============================================================================

fn soap(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <soap:Body>
    {}
  </soap:Body>
</soap:Envelope>"#,
        body
    )
}

fn xml_response(status: u16, body: String) -> ResponseTemplate {
    ResponseTemplate::new(status)
        .insert_header("content-type", "text/xml; charset=utf-8")
        .set_body_string(body)
}

fn client_for(server: &MockServer, token: &str) -> SoapClient {
    let config = ClientConfig::default().with_endpoint(format!("{}/Service.asmx", server.uri()));
    SoapClient::new(config, Arc::new(StaticTokenProvider::new(token))).unwrap()
}

/// First call yields "stale", later calls "fresh".
struct RotatingProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenProvider for RotatingProvider {
    async fn access_token(&self, _overrides: Option<&AuthOverrides>) -> Result<AccessToken, AuthError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken::new(if call == 0 { "stale" } else { "fresh" }))
    }
}

const CREATE_OK: &str = r#"<CreateResponse xmlns="http://exacttarget.com/wsdl/partnerAPI">
  <Results>
    <StatusCode>OK</StatusCode>
    <StatusMessage>Created Email.</StatusMessage>
    <NewID>3418</NewID>
  </Results>
  <RequestID>9c6a0bd1-9b2d-4d69-9f1f-6c1a7c4e8d10</RequestID>
  <OverallStatus>OK</OverallStatus>
</CreateResponse>"#;

const TOKEN_EXPIRED: &str = r#"<soap:Fault>
  <faultcode>soap:Client</faultcode>
  <faultstring>Token Expired</faultstring>
</soap:Fault>"#;

// ============================================================================
// Request shape
// ============================================================================

#[tokio::test]
async fn test_create_sends_envelope_and_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Service.asmx"))
        .and(header("SOAPAction", "Create"))
        .and(header("Content-Type", "text/xml"))
        .and(body_string_contains(
            r#"<fueloauth xmlns="http://exacttarget.com">token-123</fueloauth>"#,
        ))
        .and(body_string_contains(r#"<Objects xsi:type="Email">"#))
        .and(body_string_contains("<QueryAllAccounts>true</QueryAllAccounts>"))
        .respond_with(xml_response(200, soap(CREATE_OK)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, "token-123");
    let response = client
        .create(
            "Email",
            json!({"Name": "Welcome", "Subject": "Hello"}),
            Some(RequestOptions::query_all_accounts()),
        )
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body["OverallStatus"], "OK");
    assert_eq!(response.body["Results"][0]["NewID"], "3418");
}

#[tokio::test]
async fn test_user_agent_identifies_client() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("User-Agent", concat!("fuel-soap-rs/", env!("CARGO_PKG_VERSION"))))
        .respond_with(xml_response(200, soap(CREATE_OK)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, "token-123");
    client.create("Email", json!({"Name": "x"}), None).await.unwrap();
}

#[tokio::test]
async fn test_retrieve_sends_filter() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("SOAPAction", "Retrieve"))
        .and(body_string_contains(r#"<Filter xsi:type="SimpleFilterPart">"#))
        .and(body_string_contains("<Property>Name</Property>"))
        .and(body_string_contains("<SimpleOperator>equals</SimpleOperator>"))
        .and(body_string_contains("<Value>DS_TEST</Value>"))
        .respond_with(xml_response(
            200,
            soap(
                r#"<RetrieveResponseMsg xmlns="http://exacttarget.com/wsdl/partnerAPI">
  <OverallStatus>OK</OverallStatus>
  <RequestID>r-1</RequestID>
  <Results xsi:type="Email"><ID>1</ID><Name>DS_TEST</Name></Results>
</RetrieveResponseMsg>"#,
            ),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, "token-123");
    let options = RetrieveOptions::default().with_filter(FilterExpression::simple("Name", "equals", "DS_TEST"));
    let response = client
        .retrieve("Email", RetrieveArgs::Full(Node::from(vec!["ID", "Name"]), options))
        .await
        .unwrap();

    let results = response.body["Results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["Name"], "DS_TEST");
}

#[tokio::test]
async fn test_per_call_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("X-Request-Source", "integration"))
        .respond_with(xml_response(200, soap(CREATE_OK)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, "token-123");
    let options = RequestOptions::default()
        .with_transport(TransportOverrides::default().with_header("X-Request-Source", "integration"));
    client
        .create("Email", json!({"Name": "x"}), Some(options))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_instance_url_from_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Service.asmx"))
        .respond_with(xml_response(200, soap(CREATE_OK)))
        .expect(1)
        .mount(&server)
        .await;

    // The configured endpoint is never contacted.
    let config = ClientConfig::default().with_endpoint("http://127.0.0.1:9/Service.asmx");
    let auth = StaticTokenProvider::new("token-123").with_instance_url(format!("{}/", server.uri()));
    let client = SoapClient::new(config, Arc::new(auth)).unwrap();

    client.create("Email", json!({"Name": "x"}), None).await.unwrap();
}

// ============================================================================
// Responses
// ============================================================================

#[tokio::test]
async fn test_fault_with_http_500() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(xml_response(
            500,
            soap(
                r#"<soap:Fault>
  <faultcode>soap:Client</faultcode>
  <faultstring>Invalid object type: Emial</faultstring>
</soap:Fault>"#,
            ),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, "token-123");
    let err = client.describe("Emial").await.unwrap_err();

    assert_eq!(err.stage(), Stage::SoapFault);
    match err {
        SoapError::Fault(fault) => {
            assert_eq!(fault.code, "soap:Client");
            assert_eq!(fault.message, "Invalid object type: Emial");
        }
        other => panic!("expected a fault, got {other:?}"),
    }
}

#[tokio::test]
async fn test_retrieve_domain_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(xml_response(
            200,
            soap(
                r#"<RetrieveResponseMsg xmlns="http://exacttarget.com/wsdl/partnerAPI">
  <OverallStatus>Error: The Request Property(s) Foo do not match with the fields of Email retrieve</OverallStatus>
  <RequestID>r-2</RequestID>
</RetrieveResponseMsg>"#,
            ),
        ))
        .mount(&server)
        .await;

    let client = client_for(&server, "token-123");
    let err = client
        .retrieve("Email", RetrieveArgs::Single(Node::from(vec!["Foo"])))
        .await
        .unwrap_err();

    match err {
        SoapError::Domain(domain) => {
            assert_eq!(
                domain.message,
                "The Request Property(s) Foo do not match with the fields of Email retrieve"
            );
            assert_eq!(domain.request_id.as_deref(), Some("r-2"));
            assert_eq!(domain.origin, "Retrieve Response");
        }
        other => panic!("expected a domain error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_describe_without_definition() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("SOAPAction", "Describe"))
        .respond_with(xml_response(
            200,
            soap(r#"<DefinitionResponseMsg xmlns="http://exacttarget.com/wsdl/partnerAPI"><RequestID>r-3</RequestID></DefinitionResponseMsg>"#),
        ))
        .mount(&server)
        .await;

    let client = client_for(&server, "token-123");
    let response = client.describe("Email").await.unwrap();
    assert_eq!(response.body["ObjectDefinition"], json!({}));
}

#[tokio::test]
async fn test_non_xml_response_is_parse_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html><body>Bad Gateway"))
        .mount(&server)
        .await;

    let client = client_for(&server, "token-123");
    let err = client.describe("Email").await.unwrap_err();
    assert_eq!(err.stage(), Stage::XmlParse);
}

// ============================================================================
// Token expiry
// ============================================================================

#[tokio::test]
async fn test_expired_token_is_retried_with_new_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains(">stale</fueloauth>"))
        .respond_with(xml_response(500, soap(TOKEN_EXPIRED)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains(">fresh</fueloauth>"))
        .respond_with(xml_response(200, soap(CREATE_OK)))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Arc::new(RotatingProvider {
        calls: AtomicUsize::new(0),
    });
    let config = ClientConfig::default().with_endpoint(format!("{}/Service.asmx", server.uri()));
    let client = SoapClient::new(config, auth.clone()).unwrap();

    let response = client.create("Email", json!({"Name": "x"}), None).await.unwrap();

    assert_eq!(response.body["OverallStatus"], "OK");
    assert_eq!(auth.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_expired_token_twice_is_returned() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(xml_response(500, soap(TOKEN_EXPIRED)))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, "token-123");
    let err = client.create("Email", json!({"Name": "x"}), None).await.unwrap_err();

    assert!(err.is_expired_token());
    assert_eq!(err.to_string(), "Token Expired");
}

// ============================================================================
// Argument validation
// ============================================================================

#[tokio::test]
async fn test_malformed_schedule_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(xml_response(200, soap(CREATE_OK)))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server, "token-123");
    let err = client
        .schedule(
            "Send",
            json!({"RecurrenceType": "Daily"}),
            "not interactions",
            "start",
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Stage::Arguments);
}
