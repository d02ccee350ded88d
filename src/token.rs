//! Access tokens returned by a token endpoint

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds before expiry at which a token is treated as expired
const EXPIRY_SKEW_SECS: u64 = 60;

/// OAuth token information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Access token for API calls
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Scopes granted to this token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Unix timestamp when token expires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

impl TokenInfo {
    /// Create a new token info from a token endpoint response
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<u64>,
        scope: Option<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: default_token_type(),
            scope,
            expires_at: expires_in.map(|seconds| now_secs().saturating_add(seconds)),
        }
    }

    /// Check if the token is expired (with 60 second buffer)
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now_secs().saturating_add(EXPIRY_SKEW_SECS) >= expires_at)
    }

    /// Get the Authorization header value
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Get remaining validity duration, if known
    #[must_use]
    pub fn remaining_validity(&self) -> Option<Duration> {
        let now = now_secs();
        self.expires_at
            .filter(|expires_at| *expires_at > now)
            .map(|expires_at| Duration::from_secs(expires_at - now))
    }
}
