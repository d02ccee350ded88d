//! Error types for token request contexts and acquisition

use std::time::Duration;

use thiserror::Error;

/// Main error type for token request contexts
#[derive(Error, Debug)]
pub enum TokenContextError {
    /// A context could not build its request parameters
    #[error("Failed to build token request parameters: {0}")]
    ParameterBuild(String),

    /// The identity provider issued a claims challenge that this context cannot answer
    #[error(
        "Claims challenge received but CAE redirect is not available for this context\nSuggestion: enable CAE and set a redirect callback to re-authenticate"
    )]
    ClaimsChallengeUnsupported {
        /// Claims requested by the identity provider
        claims: String,
    },

    /// The CAE redirect callback failed to produce a new context
    #[error("CAE redirect failed: {0}")]
    CaeRedirect(String),

    /// Redirected contexts kept receiving claims challenges
    #[error("Claims challenge still unsatisfied after {redirects} redirect(s)")]
    ClaimsRedirectLimit {
        /// Number of redirects already performed
        redirects: u32,
    },

    /// The CAE redirect callback did not settle in time
    #[error("CAE redirect timed out after {timeout:?}")]
    RedirectTimeout {
        /// Configured redirect timeout
        timeout: Duration,
    },

    /// Acquisition was cancelled while waiting on a redirect
    #[error("Token acquisition cancelled")]
    Cancelled,

    /// Token endpoint returned an error response
    #[error("Token endpoint error: {0}")]
    TokenEndpoint(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON decode error
    #[error("JSON decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),
}

/// Result type alias for token context operations
pub type Result<T> = std::result::Result<T, TokenContextError>;

impl TokenContextError {
    /// Create a parameter build error
    pub fn parameter_build(msg: impl Into<String>) -> Self {
        Self::ParameterBuild(msg.into())
    }

    /// Create a claims challenge unsupported error
    pub fn claims_challenge_unsupported(claims: impl Into<String>) -> Self {
        Self::ClaimsChallengeUnsupported {
            claims: claims.into(),
        }
    }

    /// Create a CAE redirect error
    pub fn cae_redirect(msg: impl Into<String>) -> Self {
        Self::CaeRedirect(msg.into())
    }

    /// Create a redirect limit error
    #[must_use]
    pub fn claims_redirect_limit(redirects: u32) -> Self {
        Self::ClaimsRedirectLimit { redirects }
    }

    /// Create a redirect timeout error
    #[must_use]
    pub fn redirect_timeout(timeout: Duration) -> Self {
        Self::RedirectTimeout { timeout }
    }

    /// Create a token endpoint error
    pub fn token_endpoint(msg: impl Into<String>) -> Self {
        Self::TokenEndpoint(msg.into())
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this error is a claims challenge the context could not answer
    #[must_use]
    pub fn is_claims_challenge(&self) -> bool {
        matches!(
            self,
            Self::ClaimsChallengeUnsupported { .. } | Self::ClaimsRedirectLimit { .. }
        )
    }
}
