//! Call shapes exposed to device API wrappers.
//!
//! - [`request`]: arbitrary request, digest-authenticated when
//!   credentials are supplied. Returns the raw response.
//! - [`request_xml`]: [`request`] plus XML decoding of the body, for
//!   SOAP/TR-064 actions and UPnP descriptions.
//! - [`request_aha`]: query-style command against the home automation
//!   HTTP interface (`/webservices/homeautoswitch.lua`).
//! - [`request_lua`]: form-encoded command against a `.lua` page, with
//!   optional `<input>` scraping of the result.
//!
//! All four share [`settle`] for failure handling, so the error taxonomy
//! is identical across them.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, Url};
use serde::Serialize;
use tracing::debug;

use crate::client::DigestClient;
use crate::digest::Credentials;
use crate::error::{FritzError, RequestContext, Result, settle};
use crate::scrape::{self, ScrapeOutput};
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::xml;

/// Path of the home automation HTTP interface.
pub const AHA_PATH: &str = "/webservices/homeautoswitch.lua";

/// Header carrying the SOAP action, reported back in errors.
const SOAP_ACTION: &str = "SoapAction";

/// Options for [`request`] and [`request_xml`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Defaults to `GET`.
    pub method: Method,
    pub headers: HeaderMap,
    /// Appended to the URI's query string.
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
    /// When set, the request is authenticated (digest unless
    /// `send_immediately` is set).
    pub credentials: Option<Credentials>,
    /// Send credentials preemptively as HTTP Basic instead of waiting for
    /// a digest challenge.
    pub send_immediately: bool,
}

impl RequestOptions {
    /// Outgoing `SoapAction` header, if any (header names are
    /// case-insensitive).
    pub fn soap_action(&self) -> Option<&str> {
        self.headers
            .get(SOAP_ACTION)
            .and_then(|value| value.to_str().ok())
    }
}

/// Builds the outbound request, or reports why it cannot be built.
fn build_request(
    method: Method,
    uri: &str,
    query: &[(String, String)],
    headers: HeaderMap,
    body: Option<String>,
) -> std::result::Result<HttpRequest, TransportError> {
    let mut url = Url::parse(uri).map_err(|e| TransportError::Malformed(format!("{uri}: {e}")))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    let mut request = HttpRequest::new(method, url);
    request.headers = headers;
    request.body = body;
    Ok(request)
}

fn basic_authorization(credentials: &Credentials) -> std::result::Result<HeaderValue, TransportError> {
    let token = STANDARD.encode(format!(
        "{}:{}",
        credentials.username(),
        credentials.password()
    ));
    HeaderValue::from_str(&format!("Basic {token}"))
        .map_err(|e| TransportError::Malformed(e.to_string()))
}

async fn dispatch<T: Transport + ?Sized>(
    transport: &T,
    uri: &str,
    options: RequestOptions,
) -> std::result::Result<HttpResponse, TransportError> {
    let RequestOptions {
        method,
        headers,
        query,
        body,
        credentials,
        send_immediately,
    } = options;
    let mut request = build_request(method, uri, &query, headers, body)?;

    match credentials {
        Some(credentials) if send_immediately => {
            request
                .headers
                .insert(AUTHORIZATION, basic_authorization(&credentials)?);
            transport.send(&request).await
        }
        Some(credentials) => DigestClient::new(transport, credentials).send(&request).await,
        None => transport.send(&request).await,
    }
}

/// Sends a request, answering a digest challenge if credentials are set.
///
/// Returns the response for any non-error status.
///
/// # Errors
///
/// - `FritzError::InvalidResponse`: 4xx/5xx status (after the digest
///   retry, if one happened). Carries the decoded SOAP fault if present.
/// - `FritzError::NoResponse`: transport-level failure.
/// - `FritzError::MalformedRequest`: the URI or headers were invalid.
pub async fn request<T: Transport + ?Sized>(
    transport: &T,
    uri: &str,
    options: RequestOptions,
) -> Result<HttpResponse> {
    let context = RequestContext::new(uri, options.soap_action());
    settle(dispatch(transport, uri, options).await, &context)
}

/// Sends a request and decodes the response body as XML.
///
/// See [`crate::xml`] for the shape of the returned value.
pub async fn request_xml<T: Transport + ?Sized>(
    transport: &T,
    uri: &str,
    options: RequestOptions,
) -> Result<serde_json::Value> {
    debug!(
        uri,
        method = %options.method,
        soap_action = options.soap_action().unwrap_or_default(),
        "request XML"
    );

    let response = request(transport, uri, options).await?;
    xml::parse(&response.body).map_err(|e| FritzError::Decode {
        url: response.url,
        message: e.to_string(),
    })
}

/// Issues a home automation command (`switchcmd`, `ain`, `sid`, ...) as a
/// GET query and returns the raw body.
pub async fn request_aha<T: Transport + ?Sized>(
    transport: &T,
    host: &str,
    command: &[(String, String)],
) -> Result<String> {
    let uri = format!("http://{host}{AHA_PATH}");
    debug!(uri = %uri, fields = ?field_names(command), "request AHA");

    let context = RequestContext::new(uri.as_str(), None);
    let outcome: std::result::Result<HttpResponse, TransportError> = async {
        let req = build_request(Method::GET, &uri, command, HeaderMap::new(), None)?;
        transport.send(&req).await
    }
    .await;
    Ok(settle(outcome, &context)?.body)
}

/// A form-encoded command against a device page.
#[derive(Debug, Clone, Default)]
pub struct LuaRequest {
    pub host: String,
    /// Page path including the leading slash (e.g. `/data.lua`).
    pub path: String,
    /// Form fields, encoded as `application/x-www-form-urlencoded`.
    pub params: Vec<(String, String)>,
    /// Name of the `<input>` elements to extract from the result page.
    pub target: Option<String>,
    /// Value the extracted `<input>` must carry.
    pub value: Option<String>,
    /// Skip scraping and decode the body as JSON (falling back to text).
    pub exec: bool,
}

/// Result of [`request_lua`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LuaOutput {
    Scraped(ScrapeOutput),
    Json(serde_json::Value),
    Text(String),
}

/// Posts a form command and interprets the response.
///
/// With a target (and `exec` unset) the page is scraped for matching
/// `<input>` elements; otherwise the body is decoded as JSON, or
/// returned as text if it is not JSON.
pub async fn request_lua<T: Transport + ?Sized>(
    transport: &T,
    lua: &LuaRequest,
) -> Result<LuaOutput> {
    let uri = format!("http://{}{}", lua.host, lua.path);
    debug!(
        uri = %uri,
        fields = ?field_names(&lua.params),
        target = ?lua.target,
        exec = lua.exec,
        "request LUA"
    );

    let context = RequestContext::new(uri.as_str(), None);
    let outcome: std::result::Result<HttpResponse, TransportError> = async {
        let form = encode_form(&lua.params)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let req = build_request(Method::POST, &uri, &[], headers, Some(form))?;
        transport.send(&req).await
    }
    .await;
    let response = settle(outcome, &context)?;

    let target = lua.target.as_deref().filter(|t| !t.is_empty());
    if target.is_some() && !lua.exec {
        return Ok(LuaOutput::Scraped(scrape::parse_output(
            &response.body,
            target,
            lua.value.as_deref(),
        )));
    }

    Ok(match serde_json::from_str(&response.body) {
        Ok(json) => LuaOutput::Json(json),
        Err(_) => LuaOutput::Text(response.body),
    })
}

/// Parameter names only; values such as `sid` are session secrets and
/// stay out of the logs.
fn field_names(params: &[(String, String)]) -> Vec<&str> {
    params.iter().map(|(name, _)| name.as_str()).collect()
}

fn encode_form(params: &[(String, String)]) -> std::result::Result<String, TransportError> {
    serde_urlencoded::to_string(params).map_err(|e| TransportError::Malformed(e.to_string()))
}
