//! Built-in token request contexts for common OAuth grants
//!
//! # Overview
//!
//! - [`ClientCredentialContext`]: app-only tokens using a client secret
//! - [`AuthorizationCodeContext`]: delegated tokens from an authorization code,
//!   with an optional PKCE code verifier
//! - [`OnBehalfOfContext`]: delegated tokens exchanged for an incoming user assertion
//!
//! # Example
//!
//! ```no_run
//! use oauth_token_context::grants::ClientCredentialContext;
//! use oauth_token_context::TokenRequestContext;
//!
//! # fn example() -> oauth_token_context::Result<()> {
//! let mut context = ClientCredentialContext::new("tenant-id", "client-id", "secret")?
//!     .with_scopes(["https://graph.microsoft.com/.default"]);
//! context.set_cae_enabled(true);
//!
//! let params = context.params()?;
//! assert_eq!(params.get("grant_type"), Some("client_credentials"));
//! # Ok(())
//! # }
//! ```
//!
//! Each context offers `with_claims`, returning a copy that sends the claims of
//! a claims challenge. Redirect callbacks use it to derive the next context.

mod authorization_code;
mod client_credentials;
mod on_behalf_of;

pub use authorization_code::AuthorizationCodeContext;
pub use client_credentials::ClientCredentialContext;
pub use on_behalf_of::OnBehalfOfContext;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::context::{GrantType, TokenParams, claims_param};
use crate::error::{Result, TokenContextError};

/// Fail with `InvalidConfig` when a required constructor argument is empty
fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TokenContextError::invalid_config(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

/// Stable, non-reversible fingerprint of secret material used in identity keys
fn fingerprint(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Build a `:`-separated identity key.
///
/// `%` and `:` inside segments are percent-escaped so distinct principals
/// never share a key.
fn identity_key(kind: &str, segments: &[&str]) -> String {
    let mut key = String::from(kind);
    for segment in segments {
        key.push(':');
        for ch in segment.chars() {
            match ch {
                '%' => key.push_str("%25"),
                ':' => key.push_str("%3A"),
                _ => key.push(ch),
            }
        }
    }
    key
}

/// Client authentication fields shared by every grant
fn client_params(client_id: &str, client_secret: &str) -> Result<TokenParams> {
    let mut params = TokenParams::new();
    params.insert("client_id", client_id)?;
    params.insert("client_secret", client_secret)?;
    Ok(params)
}

/// Refresh parameters shared by every grant.
///
/// CAE-enabled contexts keep requesting the `cp1` capability on refresh.
fn refresh_params(
    client_id: &str,
    client_secret: &str,
    scope: &str,
    refresh_token: &str,
    cae_enabled: bool,
) -> Result<TokenParams> {
    if refresh_token.is_empty() {
        return Err(TokenContextError::parameter_build(
            "refresh token must not be empty",
        ));
    }

    let mut params = client_params(client_id, client_secret)?;
    params.insert("refresh_token", refresh_token)?;
    params.insert("grant_type", GrantType::RefreshToken.as_str())?;
    params.insert("scope", scope)?;
    add_claims(&mut params, cae_enabled, None)?;
    Ok(params)
}

/// Add the `claims` parameter when CAE or a challenge calls for it
fn add_claims(params: &mut TokenParams, cae_enabled: bool, claims: Option<&str>) -> Result<()> {
    if let Some(claims) = claims_param(cae_enabled, claims)? {
        params.insert("claims", claims)?;
    }
    Ok(())
}
