//! Trait-based definition of the CAE redirect callback.
//!
//! When an identity provider answers a token request with a claims challenge,
//! the acquisition engine hands the challenge claims to the context's redirect
//! callback. The callback is expected to re-authenticate the user (for example
//! by sending them through an interactive login) and resolve to a new
//! [`TokenRequestContext`] carrying fresh credential material.
//!
//! Users can implement [`CaeRedirectCallback`] on their own types, or wrap a
//! closure with [`FnCaeRedirectCallback`].
//!
//! # Example
//!
//! ```no_run
//! use oauth_token_context::callbacks::CaeRedirectCallback;
//! use oauth_token_context::grants::AuthorizationCodeContext;
//! use oauth_token_context::{Result, TokenRequestContext};
//! use async_trait::async_trait;
//!
//! struct InteractiveLogin {
//!     base: AuthorizationCodeContext,
//! }
//!
//! #[async_trait]
//! impl CaeRedirectCallback for InteractiveLogin {
//!     async fn call(&self, claims: String) -> Result<Box<dyn TokenRequestContext>> {
//!         let code = String::from("code-from-new-login");
//!         Ok(Box::new(self.base.with_code(code).with_claims(claims)))
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::TokenRequestContext;
use crate::error::Result;

/// Callback invoked with the claims of a claims challenge.
///
/// Resolves to a new context to retry the token request with, or to an error
/// when re-authentication could not be completed. Errors are surfaced to the
/// original caller and are never retried.
#[async_trait]
pub trait CaeRedirectCallback: Send + Sync {
    /// Produce a new context able to satisfy `claims`.
    async fn call(&self, claims: String) -> Result<Box<dyn TokenRequestContext>>;
}

#[async_trait]
impl CaeRedirectCallback for Box<dyn CaeRedirectCallback> {
    async fn call(&self, claims: String) -> Result<Box<dyn TokenRequestContext>> {
        (**self).call(claims).await
    }
}

#[async_trait]
impl<T: CaeRedirectCallback + ?Sized> CaeRedirectCallback for Arc<T> {
    async fn call(&self, claims: String) -> Result<Box<dyn TokenRequestContext>> {
        (**self).call(claims).await
    }
}

/// Type alias for a shared redirect callback.
pub type SharedCaeRedirectCallback = Arc<dyn CaeRedirectCallback>;

/// Wrapper to convert a closure into a [`CaeRedirectCallback`].
///
/// # Example
///
/// ```no_run
/// use oauth_token_context::callbacks::{FnCaeRedirectCallback, SharedCaeRedirectCallback};
/// use oauth_token_context::{TokenContextError, TokenRequestContext};
/// use std::sync::Arc;
///
/// let callback = FnCaeRedirectCallback::new(|claims| {
///     Box::pin(async move {
///         Err::<Box<dyn TokenRequestContext>, _>(TokenContextError::cae_redirect(format!(
///             "login declined for {claims}"
///         )))
///     })
/// });
///
/// let shared: SharedCaeRedirectCallback = Arc::new(callback);
/// ```
pub struct FnCaeRedirectCallback<F>
where
    F: Fn(String) -> BoxFuture<'static, Result<Box<dyn TokenRequestContext>>> + Send + Sync,
{
    func: F,
}

impl<F> FnCaeRedirectCallback<F>
where
    F: Fn(String) -> BoxFuture<'static, Result<Box<dyn TokenRequestContext>>> + Send + Sync,
{
    /// Create a new function-based redirect callback.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> CaeRedirectCallback for FnCaeRedirectCallback<F>
where
    F: Fn(String) -> BoxFuture<'static, Result<Box<dyn TokenRequestContext>>> + Send + Sync,
{
    async fn call(&self, claims: String) -> Result<Box<dyn TokenRequestContext>> {
        (self.func)(claims).await
    }
}

/// Build a shared redirect callback from an async closure.
///
/// ```no_run
/// use oauth_token_context::callbacks::redirect_callback;
/// use oauth_token_context::grants::ClientCredentialContext;
/// use oauth_token_context::TokenRequestContext;
///
/// # fn example(base: ClientCredentialContext) {
/// let callback = redirect_callback(move |claims| {
///     let next = base.with_claims(claims);
///     async move { Ok(Box::new(next) as Box<dyn TokenRequestContext>) }
/// });
/// # }
/// ```
pub fn redirect_callback<F, Fut>(f: F) -> SharedCaeRedirectCallback
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<Box<dyn TokenRequestContext>>> + Send + 'static,
{
    Arc::new(FnCaeRedirectCallback::new(move |claims| {
        Box::pin(f(claims)) as BoxFuture<'static, _>
    }))
}
