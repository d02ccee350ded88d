//! # OAuth Token Request Contexts
//!
//! Describes *how* to obtain an OAuth 2.0 access token, independent of the
//! HTTP client that performs the request. A [`TokenRequestContext`] supplies
//! the grant type, the request and refresh parameters, and a stable identity
//! used as a token cache key. Contexts can opt in to Continuous Access
//! Evaluation (CAE) and carry an async redirect callback that re-authenticates
//! the user when the identity provider answers with a claims challenge.
//!
//! ## Quick Start
//!
//! ```no_run
//! use oauth_token_context::grants::AuthorizationCodeContext;
//! use oauth_token_context::callbacks::redirect_callback;
//! use oauth_token_context::TokenRequestContext;
//!
//! # fn example() -> oauth_token_context::Result<()> {
//! let mut context = AuthorizationCodeContext::new(
//!     "tenant-id",
//!     "client-id",
//!     "client-secret",
//!     "authorization-code",
//!     "http://localhost:8400/callback",
//! )?
//! .with_scopes(["User.Read"]);
//!
//! let base = context.clone();
//! context.set_cae_enabled(true);
//! context.set_cae_redirect_callback(Some(redirect_callback(move |claims| {
//!     // Send the user through login again, then redeem the new code.
//!     let next = base.with_code("new-authorization-code").with_claims(claims);
//!     async move { Ok(Box::new(next) as Box<dyn TokenRequestContext>) }
//! })));
//!
//! let params = context.params()?;
//! assert!(params.contains("claims"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`context`]: the [`TokenRequestContext`] trait, [`CaeSettings`] and [`TokenParams`]
//! - [`callbacks`]: the [`CaeRedirectCallback`] trait and closure wrappers
//! - [`grants`]: client credentials, authorization code and on-behalf-of contexts
//! - [`challenge`]: claims challenge parsing from headers and error bodies
//! - [`acquisition`]: [`TokenAcquirer`], which applies the claims-challenge rules
//!   against a caller-supplied [`TokenEndpoint`]
//! - [`token`]: the issued [`TokenInfo`]
//! - [`error`]: error types and handling
//!
//! ## Claims Challenges
//!
//! A claims challenge is redirected only when the context has CAE enabled and
//! a redirect callback set. Otherwise acquisition fails with
//! [`TokenContextError::ClaimsChallengeUnsupported`] instead of retrying, so a
//! provider that keeps challenging cannot cause a redirect loop.
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Secrets are never logged: parameter values are omitted and claims are truncated.
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, TokenContextError>`](Result):
//!
//! ```no_run
//! # use oauth_token_context::{TokenAcquirer, TokenContextError, TokenRequestContext};
//! # async fn example(acquirer: TokenAcquirer, context: &dyn TokenRequestContext) {
//! match acquirer.acquire(context).await {
//!     Ok(acquired) => { /* ... */ }
//!     Err(TokenContextError::ClaimsChallengeUnsupported { claims }) => {
//!         eprintln!("Re-authentication required: {claims}");
//!     }
//!     Err(e) => eprintln!("Error: {e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod acquisition;
pub mod callbacks;
pub mod challenge;
pub mod context;
pub mod error;
pub mod grants;
pub mod token;
pub mod utils;

// Re-export commonly used types
pub use acquisition::{
    AcquiredToken, AcquirerOptions, TokenAcquirer, TokenEndpoint, TokenEndpointResponse,
    parse_token_response,
};
pub use callbacks::{
    CaeRedirectCallback, FnCaeRedirectCallback, SharedCaeRedirectCallback, redirect_callback,
};
pub use challenge::ClaimsChallenge;
pub use context::{
    CAE_CLIENT_CAPABILITY, CaeSettings, DEFAULT_SCOPE, GrantType, TokenParams,
    TokenRequestContext,
};
pub use error::{Result, TokenContextError};
pub use grants::{AuthorizationCodeContext, ClientCredentialContext, OnBehalfOfContext};
pub use token::TokenInfo;

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
