//! The token request context abstraction
//!
//! A [`TokenRequestContext`] describes how to obtain an access token: which
//! grant to use, which parameters to send for the primary and refresh
//! requests, and which key identifies the principal in a token cache. It also
//! carries the Continuous Access Evaluation (CAE) settings consumed by the
//! acquisition engine when a claims challenge comes back.
//!
//! Concrete grants live in [`crate::grants`]; any other grant can implement
//! the trait by owning a [`CaeSettings`] value.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::callbacks::SharedCaeRedirectCallback;
use crate::error::{Result, TokenContextError};

/// Scope requested when a context is created without explicit scopes
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Claims object advertising the `cp1` client capability (CAE-ready client)
pub const CAE_CLIENT_CAPABILITY: &str = r#"{"access_token":{"xms_cc":{"values":["cp1"]}}}"#;

// ============================================================================
// Grant Types
// ============================================================================

/// OAuth grants with built-in contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantType {
    /// `client_credentials`
    ClientCredentials,
    /// `authorization_code`
    AuthorizationCode,
    /// `refresh_token`
    RefreshToken,
    /// JWT bearer assertion used by the on-behalf-of flow
    OnBehalfOf,
}

impl GrantType {
    /// Wire value of the `grant_type` parameter
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClientCredentials => "client_credentials",
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::OnBehalfOf => "urn:ietf:params:oauth:grant-type:jwt-bearer",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Token Parameters
// ============================================================================

/// OAuth request parameters, keyed by parameter name.
///
/// Keys are never empty. Iteration order is stable so requests built from the
/// same context are byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenParams(BTreeMap<String, String>);

impl TokenParams {
    /// Create an empty parameter set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `TokenContextError::ParameterBuild` if `key` is empty.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if key.is_empty() {
            return Err(TokenContextError::parameter_build(
                "parameter names must not be empty",
            ));
        }
        self.0.insert(key, value.into());
        Ok(())
    }

    /// Get a parameter value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Whether a parameter is present
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Remove a parameter, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    /// Number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no parameters are set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Form pairs suitable for an `application/x-www-form-urlencoded` body
    #[must_use]
    pub fn to_form_pairs(&self) -> Vec<(String, String)> {
        self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

impl<'a> IntoIterator for &'a TokenParams {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// CAE Settings
// ============================================================================

/// Continuous Access Evaluation settings carried by every context.
///
/// CAE is disabled by default: the `cp1` capability claim is only understood
/// by Microsoft identity, and other providers may reject it.
#[derive(Clone, Default)]
pub struct CaeSettings {
    enabled: bool,
    redirect_callback: Option<SharedCaeRedirectCallback>,
}

impl fmt::Debug for CaeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaeSettings")
            .field("enabled", &self.enabled)
            .field(
                "redirect_callback",
                &self.redirect_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl CaeSettings {
    /// Create disabled settings without a callback
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether CAE is enabled
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable CAE
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Current redirect callback
    #[must_use]
    pub fn redirect_callback(&self) -> Option<&SharedCaeRedirectCallback> {
        self.redirect_callback.as_ref()
    }

    /// Replace the redirect callback; `None` clears it
    pub fn set_redirect_callback(&mut self, callback: Option<SharedCaeRedirectCallback>) {
        self.redirect_callback = callback;
    }
}

// ============================================================================
// Token Request Context
// ============================================================================

/// Description of how to request an access token for one principal.
///
/// Parameter builders are pure. The only mutable state is the CAE flag and
/// redirect callback exposed through the provided methods.
pub trait TokenRequestContext: Send + Sync + fmt::Debug {
    /// Parameters for the grant's primary token request.
    ///
    /// # Errors
    ///
    /// Returns `TokenContextError::ParameterBuild` when the context is missing
    /// material required by its grant.
    fn params(&self) -> Result<TokenParams>;

    /// Parameters for exchanging `refresh_token` for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `TokenContextError::ParameterBuild` if `refresh_token` is empty.
    fn refresh_token_params(&self, refresh_token: &str) -> Result<TokenParams>;

    /// The `grant_type` sent with primary requests
    fn grant_type(&self) -> &str;

    /// Tenant of the authorization server
    fn tenant_id(&self) -> &str;

    /// Cache key for tokens issued to this principal
    fn identity(&self) -> String;

    /// CAE settings owned by the context
    fn cae_settings(&self) -> &CaeSettings;

    /// Mutable CAE settings owned by the context
    fn cae_settings_mut(&mut self) -> &mut CaeSettings;

    /// Whether the consumer should request CAE-capable tokens
    fn is_cae_enabled(&self) -> bool {
        self.cae_settings().enabled()
    }

    /// Toggle CAE-capable token requests
    fn set_cae_enabled(&mut self, enabled: bool) {
        self.cae_settings_mut().set_enabled(enabled);
    }

    /// Callback used to re-authenticate when a claims challenge is received
    fn cae_redirect_callback(&self) -> Option<SharedCaeRedirectCallback> {
        self.cae_settings().redirect_callback().cloned()
    }

    /// Set or clear (`None`) the redirect callback. Last set wins.
    fn set_cae_redirect_callback(&mut self, callback: Option<SharedCaeRedirectCallback>) {
        self.cae_settings_mut().set_redirect_callback(callback);
    }
}

impl<T: TokenRequestContext + ?Sized> TokenRequestContext for Box<T> {
    fn params(&self) -> Result<TokenParams> {
        (**self).params()
    }

    fn refresh_token_params(&self, refresh_token: &str) -> Result<TokenParams> {
        (**self).refresh_token_params(refresh_token)
    }

    fn grant_type(&self) -> &str {
        (**self).grant_type()
    }

    fn tenant_id(&self) -> &str {
        (**self).tenant_id()
    }

    fn identity(&self) -> String {
        (**self).identity()
    }

    fn cae_settings(&self) -> &CaeSettings {
        (**self).cae_settings()
    }

    fn cae_settings_mut(&mut self) -> &mut CaeSettings {
        (**self).cae_settings_mut()
    }
}

// ============================================================================
// Claims Helpers
// ============================================================================

/// Merge challenge claims with the `cp1` capability claim.
///
/// Both inputs are JSON objects. Object members present in both (such as
/// `access_token`) are combined; any other value from `challenge` wins.
///
/// # Errors
///
/// Returns `TokenContextError::ParameterBuild` if `challenge` is not a JSON object.
pub fn merge_claims(challenge: &str) -> Result<String> {
    let mut merged: Value = serde_json::from_str(CAE_CLIENT_CAPABILITY)?;
    let challenge: Value = serde_json::from_str(challenge).map_err(|e| {
        TokenContextError::parameter_build(format!("claims challenge is not valid JSON: {e}"))
    })?;

    let Value::Object(challenge) = challenge else {
        return Err(TokenContextError::parameter_build(
            "claims challenge must be a JSON object",
        ));
    };

    if let Value::Object(target) = &mut merged {
        for (key, value) in challenge {
            match (target.get_mut(&key), value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    existing.extend(incoming);
                }
                (_, value) => {
                    target.insert(key, value);
                }
            }
        }
    }

    Ok(merged.to_string())
}

/// Value of the `claims` parameter for a context, if any.
///
/// # Errors
///
/// Propagates [`merge_claims`] failures.
pub fn claims_param(cae_enabled: bool, challenge: Option<&str>) -> Result<Option<String>> {
    match (cae_enabled, challenge) {
        (true, Some(challenge)) => merge_claims(challenge).map(Some),
        (true, None) => Ok(Some(CAE_CLIENT_CAPABILITY.to_string())),
        (false, Some(challenge)) => Ok(Some(challenge.to_string())),
        (false, None) => Ok(None),
    }
}

/// Space-join scopes, falling back to [`DEFAULT_SCOPE`]
#[must_use]
pub fn join_scopes(scopes: &[String]) -> String {
    if scopes.is_empty() {
        DEFAULT_SCOPE.to_string()
    } else {
        scopes.join(" ")
    }
}
