//! Async HTTP request layer for FRITZ!Box-style device management endpoints.
//!
//! Provides HTTP Digest authentication (RFC 2617) with a single
//! challenge-then-retry cycle, three request shapes used by device API
//! wrappers, and one structured error type for every failure.
//!
//! # Modules
//!
//! - [`challenge`]: `WWW-Authenticate: Digest` parsing.
//! - [`digest`]: MD5 digest computation and `Authorization` header construction.
//! - [`client`]: Per-request digest state machine and the authenticating transport.
//! - [`transport`]: Transport capability and the reqwest-backed implementation.
//! - [`error`]: `FritzError` and the shared failure normalizer.
//! - [`request`]: Generic, XML, home automation and form command requests.
//! - [`xml`]: XML body decoding into `serde_json::Value`.
//! - [`scrape`]: `<input>` extraction from HTML result pages.
//!
//! # Quick Start
//!
//! ```ignore
//! use fritz_request::digest::Credentials;
//! use fritz_request::request::{RequestOptions, request_xml};
//! use fritz_request::transport::{ReqwestTransport, TransportConfig};
//!
//! let transport = ReqwestTransport::new(&TransportConfig::default())?;
//! let options = RequestOptions {
//!     credentials: Some(Credentials::new("admin", "secret")),
//!     ..Default::default()
//! };
//! let desc = request_xml(&transport, "http://fritz.box:49000/tr64desc.xml", options).await?;
//! ```

pub mod challenge;
pub mod client;
pub mod digest;
pub mod error;
pub mod request;
pub mod scrape;
pub mod transport;
pub mod xml;
