//! Parsing of `WWW-Authenticate: Digest ...` challenges.
//!
//! The parameter scanner is deliberately lenient: it walks the header
//! left to right picking up `key=value` pairs, where the value is either
//! a double-quoted string (quotes stripped, commas allowed inside) or an
//! unquoted token that stops at the first comma or whitespace. Keys are
//! kept exactly as the server sent them and a repeated key overwrites
//! the earlier value.
//!
//! A challenge without a `nonce` cannot be answered, so
//! [`Challenge::parse`] returns `None` rather than a partial record.

use std::collections::BTreeMap;

/// Hash algorithm variant requested by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Algorithm {
    #[default]
    Md5,
    /// `MD5-sess`: HA1 is re-hashed with the server and client nonces.
    Md5Sess,
}

impl Algorithm {
    /// Interprets an `algorithm` token case-insensitively. Anything other
    /// than `MD5-sess` is treated as plain MD5.
    pub fn from_token(token: &str) -> Self {
        if token.trim().eq_ignore_ascii_case("md5-sess") {
            Algorithm::Md5Sess
        } else {
            Algorithm::Md5
        }
    }

    /// Wire form echoed in the `Authorization` header.
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Md5Sess => "MD5-SESS",
        }
    }
}

/// Quality of protection. Only `auth` is supported; `auth-int` offers
/// are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qop {
    Auth,
}

impl Qop {
    /// Returns `Some(Qop::Auth)` if `auth` is one of the comma-separated
    /// options offered by the server.
    pub fn negotiate(options: &str) -> Option<Self> {
        options
            .split(',')
            .any(|token| token.trim() == "auth")
            .then_some(Qop::Auth)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Qop::Auth => "auth",
        }
    }
}

/// A parsed digest challenge. Always carries a non-empty nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    /// Protection space; empty when the server omitted it.
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    /// `None` when the server did not name an algorithm (MD5 is implied).
    pub algorithm: Option<Algorithm>,
    pub qop: Option<Qop>,
}

impl Challenge {
    /// Parses a `WWW-Authenticate` header value.
    ///
    /// Returns `None` for non-Digest schemes and for Digest challenges
    /// lacking a nonce.
    pub fn parse(header: &str) -> Option<Self> {
        let mut params = parse_digest_params(header)?;

        let nonce = params.remove("nonce").filter(|n| !n.is_empty())?;

        Some(Challenge {
            realm: params.remove("realm").unwrap_or_default(),
            nonce,
            opaque: params.remove("opaque").filter(|o| !o.is_empty()),
            algorithm: params
                .get("algorithm")
                .filter(|a| !a.trim().is_empty())
                .map(|a| Algorithm::from_token(a)),
            qop: params.get("qop").and_then(|q| Qop::negotiate(q)),
        })
    }
}

/// Strips a case-insensitive `Digest` scheme token (which must be
/// followed by whitespace) and scans the remainder for parameters.
///
/// Returns `None` if the value does not use the Digest scheme. The same
/// grammar covers `Authorization: Digest ...` values.
pub fn parse_digest_params(header: &str) -> Option<BTreeMap<String, String>> {
    let trimmed = header.trim();
    let scheme = trimmed.get(..6)?;
    if !scheme.eq_ignore_ascii_case("digest") {
        return None;
    }

    let rest = &trimmed[6..];
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }

    Some(scan_params(rest.trim_start()))
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_token_end(b: u8) -> bool {
    b == b',' || b.is_ascii_whitespace()
}

/// Scans `input` for `key=value` pairs. Later duplicates win.
fn scan_params(input: &str) -> BTreeMap<String, String> {
    let bytes = input.as_bytes();
    let mut params = BTreeMap::new();
    let mut pos = 0;

    while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'=') {
        let eq = pos + offset;

        // The key is the run of word characters immediately before '='.
        let key_start = bytes[pos..eq]
            .iter()
            .rposition(|&b| !is_word_byte(b))
            .map_or(pos, |i| pos + i + 1);

        if key_start == eq {
            pos = eq + 1;
            continue;
        }

        let value_start = eq + 1;
        let quoted_end = (bytes.get(value_start) == Some(&b'"'))
            .then(|| {
                bytes[value_start + 1..]
                    .iter()
                    .position(|&b| b == b'"')
                    .map(|i| value_start + 1 + i)
            })
            .flatten();

        let (value, next) = match quoted_end {
            Some(close) => (&input[value_start + 1..close], close + 1),
            None => {
                let len = bytes[value_start..]
                    .iter()
                    .position(|&b| is_token_end(b))
                    .unwrap_or(bytes.len() - value_start);
                if len == 0 {
                    pos = value_start;
                    continue;
                }
                (&input[value_start..value_start + len], value_start + len)
            }
        };

        params.insert(input[key_start..eq].to_string(), value.to_string());
        pos = next;
    }

    params
}
