//! Digest-authenticating client.
//!
//! [`DigestExchange`] is the per-request state machine:
//!
//! ```text
//! Unauthenticated --(response with Digest challenge)--> AuthenticatedRetry --(any response)--> Complete
//!        |                                                                                        ^
//!        +--------------------(no challenge / Authorization already set)--------------------------+
//! ```
//!
//! The first request is sent exactly as the caller built it. If the
//! response carries a parseable `WWW-Authenticate: Digest` challenge and
//! the request had no `Authorization` header, the exchange produces a
//! copy of the request carrying the computed header. Whatever comes back
//! from that retry is final, so one logical request costs at most two
//! physical exchanges.
//!
//! [`DigestClient`] drives the state machine over any [`Transport`] and
//! is itself a `Transport`, so it can stand in wherever a plain one is
//! expected.

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{AUTHORIZATION, HeaderValue, WWW_AUTHENTICATE};
use tracing::debug;

use crate::challenge::Challenge;
use crate::digest::{Credentials, DigestResponse};
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

/// Where a [`DigestExchange`] currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// Original request is (or is about to be) in flight.
    Unauthenticated,
    /// The authenticated retry is in flight.
    AuthenticatedRetry,
    /// A final response has been handed out.
    Complete,
}

/// What the caller must do after feeding a response to the exchange.
#[derive(Debug)]
pub enum Step {
    /// Send this request; it carries the digest `Authorization` header.
    Retry(HttpRequest),
    /// The exchange is over; return this response to the caller.
    Done(HttpResponse),
}

/// State machine for one logical request.
pub struct DigestExchange<'a> {
    credentials: &'a Credentials,
    request: HttpRequest,
    state: ExchangeState,
}

impl<'a> DigestExchange<'a> {
    pub fn new(credentials: &'a Credentials, request: HttpRequest) -> Self {
        DigestExchange {
            credentials,
            request,
            state: ExchangeState::Unauthenticated,
        }
    }

    /// The original, unauthenticated request.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// Advances the state machine with the response to the most recently
    /// sent request.
    pub fn on_response(&mut self, response: HttpResponse) -> Step {
        if self.state != ExchangeState::Unauthenticated {
            self.state = ExchangeState::Complete;
            return Step::Done(response);
        }

        match self.authenticated_retry(&response) {
            Some(retry) => {
                self.state = ExchangeState::AuthenticatedRetry;
                Step::Retry(retry)
            }
            None => {
                self.state = ExchangeState::Complete;
                Step::Done(response)
            }
        }
    }

    fn authenticated_retry(&self, response: &HttpResponse) -> Option<HttpRequest> {
        if self.request.headers.contains_key(AUTHORIZATION) {
            return None;
        }

        let challenge = response
            .headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(Challenge::parse)?;

        debug!(
            realm = %challenge.realm,
            algorithm = ?challenge.algorithm,
            qop = ?challenge.qop,
            "received digest challenge"
        );

        // The transport may have followed redirects; the challenge belongs
        // to the URL that issued it.
        let mut retry = self.request.clone();
        if let Ok(challenged) = Url::parse(&response.url) {
            retry.url = challenged;
        }

        let digest = DigestResponse::new(
            &challenge,
            self.credentials,
            retry.method.as_str(),
            &retry.target(),
        );

        // A username with control characters cannot travel in a header;
        // the challenged response is then final.
        let value = HeaderValue::from_str(&digest.header_value()).ok()?;
        retry.headers.insert(AUTHORIZATION, value);
        Some(retry)
    }
}

/// [`Transport`] decorator answering digest challenges.
pub struct DigestClient<'t, T: Transport + ?Sized> {
    transport: &'t T,
    credentials: Credentials,
}

impl<'t, T: Transport + ?Sized> DigestClient<'t, T> {
    /// Captures the raw credentials used for hashing.
    pub fn new(transport: &'t T, credentials: Credentials) -> Self {
        DigestClient {
            transport,
            credentials,
        }
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for DigestClient<'_, T> {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut exchange = DigestExchange::new(&self.credentials, request.clone());
        let mut response = self.transport.send(exchange.request()).await?;

        // Terminates after at most two sends: the exchange only yields
        // Retry from the Unauthenticated state.
        loop {
            match exchange.on_response(response) {
                Step::Retry(retry) => {
                    debug!(url = %retry.url, "retrying with digest authorization");
                    response = self.transport.send(&retry).await?;
                }
                Step::Done(final_response) => return Ok(final_response),
            }
        }
    }
}
