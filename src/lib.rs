//! Client for the ExactTarget / Marketing Cloud SOAP partner API
//!
//! Turns plain request objects into SOAP envelopes, sends them with an OAuth bearer token,
//! and folds every response into one `Result`.
//!
//! # Features
//!
//! - Create, Retrieve, Update, Delete, Describe, Execute, Perform, Schedule and Extract
//! - Recursive Retrieve filter encoding (simple and complex filter parts)
//! - Response normalization (`Results` always an array, status checks per verb)
//! - A single automatic retry when the service reports `Token Expired`
//! - Pluggable token provider and HTTP transport
//!
//! # Example
//!
//! ```ignore
//! use fuel_soap::{ClientConfig, RetrieveArgs, SoapClient, StaticTokenProvider};
//! use std::sync::Arc;
//!
//! let client = SoapClient::new(ClientConfig::default(), Arc::new(StaticTokenProvider::new(token)))?;
//! let response = client.retrieve("Email", RetrieveArgs::Defaults).await?;
//! println!("{}", response.body["Results"]);
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod node;
pub mod parser;
pub mod transport;
pub mod verbs;

pub use auth::{AccessToken, AuthOverrides, StaticTokenProvider, TokenProvider};
pub use client::{SoapClient, SoapResponse};
pub use config::{ClientConfig, ProxyConfig, TransportOverrides};
pub use envelope::build_envelope;
pub use error::{DomainError, SoapError, SoapFault, Stage};
pub use filter::{encode_filter, FilterExpression, Operand};
pub use node::{Element, Node};
pub use parser::{parse_response, ResponseOutcome};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use verbs::{RequestDescriptor, RequestOptions, RetrieveArgs, RetrieveOptions, Verb};
