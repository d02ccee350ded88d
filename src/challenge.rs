//! Claims challenge parsing
//!
//! Identity providers request additional claims in two places:
//!
//! - a resource server's `401` response, through a `WWW-Authenticate` header
//!   such as `Bearer realm="", error="insufficient_claims", claims="eyJhY2Nl..."`
//!   where `claims` is base64-encoded JSON
//! - a token endpoint error body carrying a raw JSON `claims` member

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD},
};
use serde::Deserialize;

/// `error` value marking a CAE claims challenge
pub const INSUFFICIENT_CLAIMS: &str = "insufficient_claims";

/// A claims challenge issued by an identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsChallenge {
    /// Decoded claims JSON, passed verbatim to redirect callbacks
    pub claims: String,
    /// Error code that accompanied the challenge
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    claims: Option<String>,
}

impl ClaimsChallenge {
    /// Create a challenge from already-decoded claims
    pub fn new(claims: impl Into<String>) -> Self {
        Self {
            claims: claims.into(),
            error: None,
        }
    }

    /// Parse a `WWW-Authenticate` header value.
    ///
    /// Returns `None` unless the header is a Bearer challenge with
    /// `error="insufficient_claims"` and a decodable `claims` parameter.
    #[must_use]
    pub fn from_www_authenticate(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, rest) = header.split_once(char::is_whitespace)?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let params = parse_auth_params(rest);
        let error = params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("error"))
            .map(|(_, v)| v.clone())?;
        if error != INSUFFICIENT_CLAIMS {
            return None;
        }

        let encoded = params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("claims"))
            .map(|(_, v)| v.as_str())?;
        let claims = decode_claims(encoded)?;

        Some(Self {
            claims,
            error: Some(error),
        })
    }

    /// Parse a token endpoint error body.
    ///
    /// Returns `None` for bodies that are not JSON or carry no claims.
    #[must_use]
    pub fn from_error_body(body: &str) -> Option<Self> {
        let body: ErrorBody = serde_json::from_str(body).ok()?;
        let claims = body.claims.filter(|c| !c.is_empty())?;
        Some(Self {
            claims,
            error: body.error,
        })
    }
}

/// Split `k="v", k2=v2` auth-params. Quoted values may contain commas.
fn parse_auth_params(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let key: String = chars.by_ref().take_while(|c| *c != '=').collect();
        let key = key.trim().to_string();
        if key.is_empty() {
            break;
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut escaped = false;
            for c in chars.by_ref() {
                match c {
                    _ if escaped => {
                        value.push(c);
                        escaped = false;
                    }
                    '\\' => escaped = true,
                    '"' => break,
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.peek() {
                if *c == ',' {
                    break;
                }
                value.push(*c);
                chars.next();
            }
            value = value.trim().to_string();
        }

        params.push((key, value));
    }

    params
}

fn decode_claims(encoded: &str) -> Option<String> {
    let encoded = encoded.trim();
    let bytes = [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD]
        .into_iter()
        .find_map(|engine| engine.decode(encoded).ok())?;
    String::from_utf8(bytes).ok()
}
