//! Error types for the SOAP client.

use crate::auth::AccessToken;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Fault string the partner API returns when the bearer token went stale mid-flight.
pub const TOKEN_EXPIRED_FAULT: &str = "Token Expired";

/// Errors delivered by the SOAP client.
///
/// Every variant knows the pipeline [`Stage`] that produced it, see [`SoapError::stage`].
#[derive(Error, Debug)]
pub enum SoapError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("No access token")]
    MissingAccessToken(Box<AccessToken>),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("envelope serialization error: {0}")]
    Envelope(String),

    #[error("{}", .0.message)]
    Fault(SoapFault),

    #[error("{}", .0.message)]
    Domain(DomainError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SoapError {
    /// The stage of the request pipeline this error originated from.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InvalidArgument(_) => Stage::Arguments,
            Self::Auth(_) | Self::MissingAccessToken(_) => Stage::Auth,
            Self::Transport(_) => Stage::Transport,
            Self::XmlParse(_) => Stage::XmlParse,
            Self::Envelope(_) => Stage::Envelope,
            Self::Fault(_) => Stage::SoapFault,
            Self::Domain(_) => Stage::Response,
            Self::Config(_) => Stage::Config,
        }
    }

    /// True when the service rejected the call because the access token expired.
    pub fn is_expired_token(&self) -> bool {
        matches!(self, Self::Fault(fault) if fault.is_expired_token())
    }
}

/// Pipeline stages, used to tag where an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Call validation, before any I/O
    Arguments,
    /// Token acquisition
    Auth,
    /// Building the request envelope
    Envelope,
    /// HTTP exchange
    Transport,
    /// Reading the response document
    XmlParse,
    /// SOAP fault reported by the service
    SoapFault,
    /// Business status inside a well-formed response
    Response,
    /// Loading client configuration
    Config,
}

impl Stage {
    /// Get the string marker for this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arguments => "arguments",
            Self::Auth => "auth",
            Self::Envelope => "envelope",
            Self::Transport => "transport",
            Self::XmlParse => "xml-parse",
            Self::SoapFault => "soap-fault",
            Self::Response => "response",
            Self::Config => "config",
        }
    }
}

/// A `soap:Fault` returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoapFault {
    /// `faultcode`
    pub code: String,
    /// `faultstring`
    pub message: String,
    /// `detail`, when the service sent one
    pub detail: Option<Value>,
}

impl SoapFault {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
        }
    }

    pub fn is_expired_token(&self) -> bool {
        self.message == TOKEN_EXPIRED_FAULT
    }
}

/// A business-level failure reported through a status field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainError {
    /// Status text, or the generic "Soap Error"
    pub message: String,
    /// `RequestID` echoed by the service
    pub request_id: Option<String>,
    /// Per-object results, which carry the individual status codes
    pub results: Vec<Value>,
    /// Which response produced the error (a response key, or "Retrieve Response")
    pub origin: String,
}

/// Failure reported by a [`TokenProvider`](crate::auth::TokenProvider).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct AuthError {
    pub message: String,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported by a [`Transport`](crate::transport::Transport).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}
