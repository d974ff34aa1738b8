//! Digest computation and `Authorization` header construction (RFC 2617).
//!
//! Given a parsed [`Challenge`], the caller's [`Credentials`], the request
//! method and the request target, [`DigestResponse::new`] derives a fresh
//! client nonce and the final `response` hash, and
//! [`DigestResponse::header_value`] serializes the complete header value.
//!
//! Supported variants:
//! - `algorithm=MD5` (default) and `algorithm=MD5-sess`.
//! - `qop=auth` when the server offers it, otherwise the RFC 2069
//!   compatibility form without `qop`/`nc`/`cnonce`.
//!
//! A `DigestResponse` is single-use: the nonce count is fixed at
//! `00000001` because each challenge is answered exactly once.

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;

use crate::challenge::{Algorithm, Challenge, Qop};

/// Nonce count sent with every response. Never incremented because a
/// challenge is only ever answered by a single retried request.
pub const NONCE_COUNT: &str = "00000001";

/// Number of random bytes in a client nonce (hex-encoded to 32 chars).
const CNONCE_BYTES: usize = 16;

/// Lowercase hex MD5 of `text`.
pub fn md5_hex(text: &str) -> String {
    format!("{:x}", md5::compute(text.as_bytes()))
}

/// Generates a client nonce from the operating system's CSPRNG.
pub fn generate_cnonce() -> String {
    let mut bytes = [0u8; CNONCE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Username/password pair used for device authentication.
///
/// Values are kept exactly as supplied. The digest must be computed over
/// the raw strings; any transport-level encoding would change the hash.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A computed answer to one digest challenge.
///
/// Holds every attribute that goes on the wire so the header can be
/// serialized (and inspected by tests) without recomputing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestResponse {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    /// Echoed only when the challenge named an algorithm.
    pub algorithm: Option<Algorithm>,
    pub opaque: Option<String>,
    /// Present only when `qop=auth` was negotiated.
    pub qop: Option<Qop>,
    pub cnonce: String,
}

impl DigestResponse {
    /// Computes a response with a freshly generated client nonce.
    pub fn new(challenge: &Challenge, credentials: &Credentials, method: &str, uri: &str) -> Self {
        Self::with_cnonce(challenge, credentials, method, uri, &generate_cnonce())
    }

    /// Computes a response using the given client nonce.
    ///
    /// Pure function of its inputs: identical arguments always yield an
    /// identical response.
    pub fn with_cnonce(
        challenge: &Challenge,
        credentials: &Credentials,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> Self {
        let algorithm = challenge.algorithm.unwrap_or_default();

        let mut ha1 = md5_hex(&format!(
            "{}:{}:{}",
            credentials.username(),
            challenge.realm,
            credentials.password()
        ));
        if algorithm == Algorithm::Md5Sess {
            ha1 = md5_hex(&format!("{ha1}:{}:{cnonce}", challenge.nonce));
        }

        let ha2 = md5_hex(&format!("{method}:{uri}"));

        let response = match challenge.qop {
            Some(qop) => md5_hex(&format!(
                "{ha1}:{}:{NONCE_COUNT}:{cnonce}:{}:{ha2}",
                challenge.nonce,
                qop.as_str()
            )),
            None => md5_hex(&format!("{ha1}:{}:{ha2}", challenge.nonce)),
        };

        DigestResponse {
            username: credentials.username().to_string(),
            realm: challenge.realm.clone(),
            nonce: challenge.nonce.clone(),
            uri: uri.to_string(),
            response,
            algorithm: challenge.algorithm,
            opaque: challenge.opaque.clone(),
            qop: challenge.qop,
            cnonce: cnonce.to_string(),
        }
    }

    /// Serializes the `Authorization` header value.
    ///
    /// Attribute order: `username, realm, nonce, uri, response,
    /// [algorithm], [opaque], [qop, nc, cnonce]`.
    pub fn header_value(&self) -> String {
        let mut parts = vec![
            format!("username=\"{}\"", self.username),
            format!("realm=\"{}\"", self.realm),
            format!("nonce=\"{}\"", self.nonce),
            format!("uri=\"{}\"", self.uri),
            format!("response=\"{}\"", self.response),
        ];

        if let Some(algorithm) = self.algorithm {
            parts.push(format!("algorithm={}", algorithm.as_str()));
        }

        if let Some(opaque) = &self.opaque {
            parts.push(format!("opaque=\"{opaque}\""));
        }

        if let Some(qop) = self.qop {
            parts.push(format!("qop={}", qop.as_str()));
            parts.push(format!("nc={NONCE_COUNT}"));
            parts.push(format!("cnonce=\"{}\"", self.cnonce));
        }

        format!("Digest {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc2617_challenge() -> Challenge {
        Challenge::parse(
            r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#,
        )
        .unwrap()
    }

    fn mufasa() -> Credentials {
        Credentials::new("Mufasa", "Circle Of Life")
    }

    #[test]
    fn md5_hex_matches_known_vectors() {
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn cnonce_is_32_lowercase_hex_chars() {
        let cnonce = generate_cnonce();
        assert_eq!(cnonce.len(), 32);
        assert!(
            cnonce.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()),
            "cnonce should be lowercase hex, got {cnonce}"
        );
    }

    #[test]
    fn cnonce_differs_between_calls() {
        assert_ne!(generate_cnonce(), generate_cnonce());
    }

    #[test]
    fn rfc2617_worked_example_produces_documented_response() {
        // RFC 2617 section 3.5.
        let resp = DigestResponse::with_cnonce(
            &rfc2617_challenge(),
            &mufasa(),
            "GET",
            "/dir/index.html",
            "0a4f113b",
        );
        assert_eq!(resp.response, "6629fae49393a05397450978507c4ef1");
    }

    #[test]
    fn ha_components_match_rfc2617_intermediates() {
        assert_eq!(
            md5_hex("Mufasa:testrealm@host.com:Circle Of Life"),
            "939e7578ed9e3c518a452acee763bce9"
        );
        assert_eq!(
            md5_hex("GET:/dir/index.html"),
            "39aff3a2bab6126f332b942af96d3366"
        );
    }

    #[test]
    fn without_qop_uses_rfc2069_form() {
        let challenge = Challenge::parse(r#"Digest realm="box", nonce="n0nce""#).unwrap();
        let creds = Credentials::new("admin", "secret");
        let resp = DigestResponse::with_cnonce(&challenge, &creds, "GET", "/path?x=1", "c1");

        let ha1 = md5_hex("admin:box:secret");
        let ha2 = md5_hex("GET:/path?x=1");
        assert_eq!(resp.response, md5_hex(&format!("{ha1}:n0nce:{ha2}")));
    }

    #[test]
    fn qop_auth_among_other_tokens_uses_qop_form() {
        let challenge =
            Challenge::parse(r#"Digest realm="box", nonce="n1", qop="auth-int, auth""#).unwrap();
        let creds = Credentials::new("admin", "secret");
        let resp = DigestResponse::with_cnonce(&challenge, &creds, "POST", "/upnp", "cafe");

        let ha1 = md5_hex("admin:box:secret");
        let ha2 = md5_hex("POST:/upnp");
        assert_eq!(
            resp.response,
            md5_hex(&format!("{ha1}:n1:00000001:cafe:auth:{ha2}"))
        );
    }

    #[test]
    fn md5_sess_rederives_ha1_with_nonce_and_cnonce() {
        let challenge =
            Challenge::parse(r#"Digest realm="box", nonce="n2", algorithm=MD5-sess"#).unwrap();
        let creds = Credentials::new("admin", "secret");
        let resp = DigestResponse::with_cnonce(&challenge, &creds, "GET", "/", "abcd");

        let inner = md5_hex("admin:box:secret");
        let ha1 = md5_hex(&format!("{inner}:n2:abcd"));
        let ha2 = md5_hex("GET:/");
        assert_eq!(resp.response, md5_hex(&format!("{ha1}:n2:{ha2}")));

        let again = DigestResponse::with_cnonce(&challenge, &creds, "GET", "/", "abcd");
        assert_eq!(resp, again, "same inputs must produce the same response");
    }

    #[test]
    fn header_attributes_are_in_wire_order() {
        let resp = DigestResponse::with_cnonce(
            &rfc2617_challenge(),
            &mufasa(),
            "GET",
            "/dir/index.html",
            "0a4f113b",
        );
        assert_eq!(
            resp.header_value(),
            "Digest username=\"Mufasa\", realm=\"testrealm@host.com\", \
             nonce=\"dcd98b7102dd2f0e8b11d0f600bfb0c093\", uri=\"/dir/index.html\", \
             response=\"6629fae49393a05397450978507c4ef1\", \
             opaque=\"5ccc069c403ebaf9f0171e9517f40e41\", qop=auth, nc=00000001, \
             cnonce=\"0a4f113b\""
        );
    }

    #[test]
    fn header_echoes_algorithm_uppercased_when_challenge_names_one() {
        let challenge =
            Challenge::parse(r#"Digest realm="r", nonce="n", algorithm="md5-sess""#).unwrap();
        let header = DigestResponse::with_cnonce(&challenge, &mufasa(), "GET", "/", "c")
            .header_value();
        assert!(header.contains("algorithm=MD5-SESS"), "got {header}");
        assert!(!header.contains("qop="), "qop must be omitted when not offered");
        assert!(!header.contains("cnonce="), "cnonce travels only with qop");
    }

    #[test]
    fn header_omits_opaque_and_algorithm_when_absent() {
        let challenge = Challenge::parse(r#"Digest realm="r", nonce="n""#).unwrap();
        let header = DigestResponse::with_cnonce(&challenge, &mufasa(), "GET", "/", "c")
            .header_value();
        assert!(!header.contains("opaque="));
        assert!(!header.contains("algorithm="));
    }

    #[test]
    fn header_omits_empty_algorithm() {
        let challenge = Challenge::parse(r#"Digest realm="r", nonce="n", algorithm="""#).unwrap();
        let header = DigestResponse::with_cnonce(&challenge, &mufasa(), "GET", "/", "c")
            .header_value();
        assert!(!header.contains("algorithm="), "got {header}");
    }

    #[test]
    fn raw_password_is_hashed_not_an_encoded_form() {
        let challenge = Challenge::parse(r#"Digest realm="box", nonce="n""#).unwrap();
        let creds = Credentials::new("user name", "p@ss wörd%");
        let resp = DigestResponse::with_cnonce(&challenge, &creds, "GET", "/", "c");

        let ha1 = md5_hex("user name:box:p@ss wörd%");
        let ha2 = md5_hex("GET:/");
        assert_eq!(resp.response, md5_hex(&format!("{ha1}:n:{ha2}")));
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let rendered = format!("{:?}", Credentials::new("admin", "hunter2"));
        assert!(rendered.contains("admin"));
        assert!(
            !rendered.contains("hunter2"),
            "password must never appear in debug output"
        );
    }
}
