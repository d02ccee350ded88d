//! Token acquisition driven by a [`TokenRequestContext`]
//!
//! [`TokenAcquirer`] sends a context's parameters to a caller-supplied
//! [`TokenEndpoint`] and applies the claims-challenge rules:
//!
//! 1. A challenge is only redirected when the context has CAE enabled **and**
//!    a redirect callback set. Otherwise it fails with
//!    [`TokenContextError::ClaimsChallengeUnsupported`] and nothing is invoked.
//! 2. The callback is invoked once per challenge and awaited under
//!    [`AcquirerOptions::redirect_timeout`] and the optional cancellation token.
//! 3. A callback failure is returned to the caller as-is. It is never retried.
//! 4. The token request is repeated with the parameters of the context the
//!    callback resolved to. Further challenges are redirected until
//!    [`AcquirerOptions::max_claims_redirects`] is reached.
//!
//! The callback is read from the context when the challenge is handled, so
//! replacing it while a redirect is in flight only affects later challenges.
//!
//! # Example
//!
//! ```no_run
//! use oauth_token_context::acquisition::{TokenAcquirer, TokenEndpoint, TokenEndpointResponse};
//! use oauth_token_context::grants::ClientCredentialContext;
//! use oauth_token_context::{Result, TokenParams};
//! use async_trait::async_trait;
//!
//! struct MyEndpoint;
//!
//! #[async_trait]
//! impl TokenEndpoint for MyEndpoint {
//!     async fn request_token(
//!         &self,
//!         tenant_id: &str,
//!         params: &TokenParams,
//!     ) -> Result<TokenEndpointResponse> {
//!         // POST params as a form to the tenant's token endpoint, then:
//!         oauth_token_context::acquisition::parse_token_response(r#"{"access_token":"abc"}"#)
//!     }
//! }
//!
//! # async fn example() -> Result<()> {
//! let context = ClientCredentialContext::new("tenant", "client", "secret")?;
//! let acquirer = TokenAcquirer::new(MyEndpoint);
//! let acquired = acquirer.acquire(&context).await?;
//! println!("{}", acquired.token.authorization_header());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use typed_builder::TypedBuilder;

use crate::challenge::ClaimsChallenge;
use crate::context::{TokenParams, TokenRequestContext};
use crate::error::{Result, TokenContextError};
use crate::token::TokenInfo;
use crate::utils::{MAX_LOGGED_CLAIMS_BYTES, param_names, truncate_for_display};

/// Default time allowed for a redirect callback (interactive logins are slow)
pub const DEFAULT_REDIRECT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default number of redirects per acquisition
pub const DEFAULT_MAX_CLAIMS_REDIRECTS: u32 = 1;

// ============================================================================
// Token Endpoint
// ============================================================================

/// Outcome of a single token request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEndpointResponse {
    /// A token was issued
    Token(TokenInfo),
    /// The identity provider requires additional claims
    ClaimsChallenge(ClaimsChallenge),
}

/// Transport used to reach an OAuth token endpoint.
///
/// Implementations perform the HTTP request; [`parse_token_response`] turns a
/// JSON body into a [`TokenEndpointResponse`].
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Request a token from `tenant_id`'s token endpoint.
    async fn request_token(
        &self,
        tenant_id: &str,
        params: &TokenParams,
    ) -> Result<TokenEndpointResponse>;
}

#[async_trait]
impl<T: TokenEndpoint + ?Sized> TokenEndpoint for Arc<T> {
    async fn request_token(
        &self,
        tenant_id: &str,
        params: &TokenParams,
    ) -> Result<TokenEndpointResponse> {
        (**self).request_token(tenant_id, params).await
    }
}

/// Successful response from a token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Error response from a token endpoint
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Parse a token endpoint JSON body.
///
/// Error bodies carrying `claims` become a claims challenge; other error
/// bodies become `TokenContextError::TokenEndpoint`.
///
/// # Errors
///
/// Returns `TokenContextError::TokenEndpoint` for OAuth error bodies and
/// `TokenContextError::JsonDecode` for bodies that are neither.
pub fn parse_token_response(body: &str) -> Result<TokenEndpointResponse> {
    if let Some(challenge) = ClaimsChallenge::from_error_body(body) {
        return Ok(TokenEndpointResponse::ClaimsChallenge(challenge));
    }

    if let Ok(error) = serde_json::from_str::<ErrorResponse>(body) {
        let msg = error.error_description.unwrap_or(error.error);
        return Err(TokenContextError::token_endpoint(msg));
    }

    let response: TokenResponse = serde_json::from_str(body)?;
    let mut token = TokenInfo::new(
        response.access_token,
        response.refresh_token,
        response.expires_in,
        response.scope,
    );
    if let Some(token_type) = response.token_type {
        token.token_type = token_type;
    }

    Ok(TokenEndpointResponse::Token(token))
}

// ============================================================================
// Options
// ============================================================================

/// Options for [`TokenAcquirer`]
#[derive(Debug, Clone, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for AcquirerOptions"),
    builder_type(doc = "Builder for AcquirerOptions", vis = "pub"),
    build_method(doc = "Build the AcquirerOptions")
)]
pub struct AcquirerOptions {
    /// Time allowed for a redirect callback to settle (default: 5 minutes)
    #[builder(default = DEFAULT_REDIRECT_TIMEOUT)]
    pub redirect_timeout: Duration,

    /// Maximum redirects per acquisition (default: 1)
    #[builder(default = DEFAULT_MAX_CLAIMS_REDIRECTS)]
    pub max_claims_redirects: u32,

    /// Token cancelling pending redirects
    #[builder(default, setter(strip_option))]
    pub cancellation_token: Option<CancellationToken>,
}

impl Default for AcquirerOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

// ============================================================================
// Acquirer
// ============================================================================

/// A token together with the context that obtained it
#[derive(Debug)]
pub struct AcquiredToken {
    /// Issued token
    pub token: TokenInfo,
    /// Context produced by a CAE redirect, if one happened.
    ///
    /// Callers should use it for subsequent requests in place of the original.
    pub redirected_context: Option<Box<dyn TokenRequestContext>>,
}

impl AcquiredToken {
    /// Whether a CAE redirect produced this token
    #[must_use]
    pub fn was_redirected(&self) -> bool {
        self.redirected_context.is_some()
    }
}

enum Step {
    Request(TokenParams),
    Challenge(ClaimsChallenge),
}

/// Acquires tokens for contexts, handling claims challenges
pub struct TokenAcquirer {
    endpoint: Arc<dyn TokenEndpoint>,
    options: AcquirerOptions,
}

impl std::fmt::Debug for TokenAcquirer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAcquirer")
            .field("endpoint", &"<endpoint>")
            .field("options", &self.options)
            .finish()
    }
}

impl TokenAcquirer {
    /// Create an acquirer with default options
    pub fn new(endpoint: impl TokenEndpoint + 'static) -> Self {
        Self::with_options(endpoint, AcquirerOptions::default())
    }

    /// Create an acquirer with custom options
    pub fn with_options(endpoint: impl TokenEndpoint + 'static, options: AcquirerOptions) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
            options,
        }
    }

    /// Get the options
    #[must_use]
    pub fn options(&self) -> &AcquirerOptions {
        &self.options
    }

    /// Request a token using the context's primary parameters.
    ///
    /// # Errors
    ///
    /// Returns parameter build, endpoint, claims challenge and redirect errors.
    pub async fn acquire(&self, context: &dyn TokenRequestContext) -> Result<AcquiredToken> {
        let params = context.params()?;
        self.drive(context, Step::Request(params)).await
    }

    /// Exchange a refresh token using the context's refresh parameters.
    ///
    /// A claims challenge is handled as in [`acquire`](Self::acquire); the
    /// redirected context is then asked for its primary parameters.
    ///
    /// # Errors
    ///
    /// Returns parameter build, endpoint, claims challenge and redirect errors.
    pub async fn refresh(
        &self,
        context: &dyn TokenRequestContext,
        refresh_token: &str,
    ) -> Result<AcquiredToken> {
        let params = context.refresh_token_params(refresh_token)?;
        self.drive(context, Step::Request(params)).await
    }

    /// Answer a claims challenge received from a resource server.
    ///
    /// # Errors
    ///
    /// Returns `TokenContextError::ClaimsChallengeUnsupported` when the
    /// context cannot redirect, and any error of the redirect or the
    /// subsequent token request.
    pub async fn handle_claims_challenge(
        &self,
        context: &dyn TokenRequestContext,
        challenge: ClaimsChallenge,
    ) -> Result<AcquiredToken> {
        self.drive(context, Step::Challenge(challenge)).await
    }

    async fn drive(
        &self,
        context: &dyn TokenRequestContext,
        mut step: Step,
    ) -> Result<AcquiredToken> {
        let mut redirected: Option<Box<dyn TokenRequestContext>> = None;
        let mut redirects = 0u32;

        loop {
            let current: &dyn TokenRequestContext = match &redirected {
                Some(next) => &**next,
                None => context,
            };

            step = match step {
                Step::Request(params) => {
                    tracing::debug!(
                        identity = %current.identity(),
                        grant_type = current.grant_type(),
                        params = %param_names(&params),
                        "Requesting token"
                    );

                    match self
                        .endpoint
                        .request_token(current.tenant_id(), &params)
                        .await?
                    {
                        TokenEndpointResponse::Token(token) => {
                            return Ok(AcquiredToken {
                                token,
                                redirected_context: redirected,
                            });
                        }
                        TokenEndpointResponse::ClaimsChallenge(challenge) => {
                            Step::Challenge(challenge)
                        }
                    }
                }
                Step::Challenge(challenge) => {
                    let next = self.redirect(current, challenge, redirects).await?;
                    redirects += 1;
                    let params = next.params()?;
                    redirected = Some(next);
                    Step::Request(params)
                }
            };
        }
    }

    async fn redirect(
        &self,
        context: &dyn TokenRequestContext,
        challenge: ClaimsChallenge,
        redirects: u32,
    ) -> Result<Box<dyn TokenRequestContext>> {
        let logged_claims = truncate_for_display(&challenge.claims, MAX_LOGGED_CLAIMS_BYTES);

        let callback = match (context.is_cae_enabled(), context.cae_redirect_callback()) {
            (true, Some(callback)) => callback,
            (cae_enabled, callback) => {
                tracing::warn!(
                    identity = %context.identity(),
                    cae_enabled,
                    has_callback = callback.is_some(),
                    claims = %logged_claims,
                    "Claims challenge cannot be redirected"
                );
                return Err(TokenContextError::claims_challenge_unsupported(
                    challenge.claims,
                ));
            }
        };

        if redirects >= self.options.max_claims_redirects {
            tracing::warn!(
                identity = %context.identity(),
                redirects,
                claims = %logged_claims,
                "Claims challenge persisted after redirect"
            );
            return Err(TokenContextError::claims_redirect_limit(redirects));
        }

        tracing::debug!(
            identity = %context.identity(),
            claims = %logged_claims,
            "Invoking CAE redirect callback"
        );

        let timeout = self.options.redirect_timeout;
        let pending = async {
            match tokio::time::timeout(timeout, callback.call(challenge.claims)).await {
                Ok(result) => result,
                Err(_elapsed) => Err(TokenContextError::redirect_timeout(timeout)),
            }
        };

        let result = match &self.options.cancellation_token {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => Err(TokenContextError::Cancelled),
                    result = pending => result,
                }
            }
            None => pending.await,
        };

        if let Err(e) = &result {
            tracing::warn!(
                identity = %context.identity(),
                error = %e,
                "CAE redirect callback failed"
            );
        }

        result
    }
}
