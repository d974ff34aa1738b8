//! Typed error hierarchy and failure normalization for the request layer.
//!
//! Every call shape funnels its outcome through [`settle`], so callers see
//! the same [`FritzError`] variants whichever shape they used:
//!
//! - `InvalidResponse`: the device answered with a 4xx/5xx status. When the
//!   body is a SOAP fault carrying a `UPnPError`, the fault is attached.
//! - `NoResponse`: the request went out but no complete response came
//!   back (refused connection, DNS failure, timeout, reset).
//! - `MalformedRequest`: the request could not be built, so nothing was sent.
//!
//! None of these are retried. The single digest retry performed by
//! [`crate::client::DigestClient`] is a protocol step and happens before
//! normalization.

use reqwest::StatusCode;
use serde::Serialize;

use crate::transport::{HttpResponse, TransportError, TransportErrorKind};
use crate::xml;

/// SOAP action reported when the request carried no `SoapAction` header.
pub const UNKNOWN_ACTION: &str = "unknown";

/// UPnP error details extracted from a SOAP fault envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoapFault {
    pub error_code: String,
    pub error_description: String,
    /// `SoapAction` of the failed request, or `"unknown"`.
    pub action: String,
}

impl SoapFault {
    /// Extracts `Envelope/Body/Fault/detail/UPnPError` from `body`.
    ///
    /// Best effort: anything that is not a well-formed fault envelope
    /// yields `None`.
    pub fn from_body(body: &str, action: &str) -> Option<Self> {
        let document = xml::parse(body).ok()?;
        let error = xml::find(
            &document,
            &["Envelope", "Body", "Fault", "detail", "UPnPError"],
        )?;

        Some(SoapFault {
            error_code: xml::child(error, "errorCode").and_then(xml::text)?.to_string(),
            error_description: xml::child(error, "errorDescription")
                .and_then(xml::text)?
                .to_string(),
            action: action.to_string(),
        })
    }
}

/// Unified error type for all request-layer operations.
#[derive(Debug, thiserror::Error)]
pub enum FritzError {
    /// The device rejected the request with an error status.
    #[error("invalid response from {url}: {} - {message}", .status.as_u16())]
    InvalidResponse {
        status: StatusCode,
        /// Reason phrase accompanying `status`.
        message: String,
        /// Decoded SOAP fault, when the body carried one.
        soap: Option<SoapFault>,
        /// Final response URL, or the requested URI if unavailable.
        url: String,
    },

    /// No complete response was received.
    #[error("no response from {url}: {message} - {code}")]
    NoResponse {
        code: TransportErrorKind,
        message: String,
        /// `SoapAction` of the failed request, or `"unknown"`.
        action: String,
        url: String,
    },

    /// The request could not be constructed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// A successful response body could not be decoded as XML.
    ///
    /// Only produced by [`crate::request::request_xml`], after the exchange
    /// itself succeeded.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FritzError>;

/// What the normalizer needs to know about the request that failed.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The URI the caller asked for.
    pub url: String,
    /// Outgoing `SoapAction` header value, or `"unknown"`.
    pub action: String,
}

impl RequestContext {
    pub fn new(url: impl Into<String>, action: Option<&str>) -> Self {
        RequestContext {
            url: url.into(),
            action: action.unwrap_or(UNKNOWN_ACTION).to_string(),
        }
    }
}

/// A failed exchange before classification.
#[derive(Debug)]
pub enum RequestFailure {
    /// A complete response arrived with a 4xx/5xx status.
    Status(HttpResponse),
    /// The transport could not build or complete the exchange.
    Transport(TransportError),
}

impl From<TransportError> for RequestFailure {
    fn from(err: TransportError) -> Self {
        RequestFailure::Transport(err)
    }
}

/// Maps a failure onto the public error taxonomy.
pub fn normalize(failure: RequestFailure, context: &RequestContext) -> FritzError {
    match failure {
        RequestFailure::Status(response) => {
            let url = if response.url.is_empty() {
                context.url.clone()
            } else {
                response.url
            };
            FritzError::InvalidResponse {
                status: response.status,
                message: response.status_text,
                soap: SoapFault::from_body(&response.body, &context.action),
                url,
            }
        }
        RequestFailure::Transport(TransportError::Failed { kind, message, url }) => {
            FritzError::NoResponse {
                code: kind,
                message,
                action: context.action.clone(),
                url: url.unwrap_or_else(|| context.url.clone()),
            }
        }
        RequestFailure::Transport(TransportError::Malformed(message)) => {
            FritzError::MalformedRequest(message)
        }
    }
}

/// Turns a raw transport outcome into the caller-facing result: success
/// statuses pass through, everything else is normalized.
pub fn settle(
    outcome: std::result::Result<HttpResponse, TransportError>,
    context: &RequestContext,
) -> Result<HttpResponse> {
    match outcome {
        Ok(response) if response.is_error_status() => {
            Err(normalize(RequestFailure::Status(response), context))
        }
        Ok(response) => Ok(response),
        Err(err) => Err(normalize(err.into(), context)),
    }
}
