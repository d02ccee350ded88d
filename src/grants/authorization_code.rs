//! Authorization code grant, optionally with a PKCE code verifier

use super::{add_claims, client_params, fingerprint, identity_key, refresh_params, require};
use crate::context::{CaeSettings, GrantType, TokenParams, TokenRequestContext, join_scopes};
use crate::error::{Result, TokenContextError};

/// Delegated token request redeeming an authorization code.
///
/// Without a user id hint the identity is derived from a fingerprint of the
/// code, so set [`with_user_id`](Self::with_user_id) when tokens for the same
/// user should share a cache entry across logins.
#[derive(Clone)]
pub struct AuthorizationCodeContext {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    code: String,
    redirect_uri: String,
    code_verifier: Option<String>,
    user_id: Option<String>,
    scopes: Vec<String>,
    claims: Option<String>,
    cae: CaeSettings,
}

impl std::fmt::Debug for AuthorizationCodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCodeContext")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("code", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("code_verifier", &self.code_verifier.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .field("scopes", &self.scopes)
            .field("claims", &self.claims)
            .field("cae", &self.cae)
            .finish()
    }
}

impl AuthorizationCodeContext {
    /// Create a context redeeming `code` issued for `redirect_uri`
    ///
    /// # Errors
    ///
    /// Returns `TokenContextError::InvalidConfig` if the tenant, client id,
    /// client secret or redirect URI is empty. An empty code is accepted here
    /// and rejected when parameters are built.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        code: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self> {
        let tenant_id = tenant_id.into();
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        let redirect_uri = redirect_uri.into();
        require("tenant_id", &tenant_id)?;
        require("client_id", &client_id)?;
        require("client_secret", &client_secret)?;
        require("redirect_uri", &redirect_uri)?;

        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
            code: code.into(),
            redirect_uri,
            code_verifier: None,
            user_id: None,
            scopes: Vec::new(),
            claims: None,
            cae: CaeSettings::default(),
        })
    }

    /// Set the requested scopes
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Send a PKCE code verifier with the code
    #[must_use]
    pub fn with_code_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.code_verifier = Some(verifier.into());
        self
    }

    /// Identify the signed-in user for cache keying
    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        let user_id: String = user_id.into();
        self.user_id = (!user_id.is_empty()).then_some(user_id);
        self
    }

    /// Copy of this context redeeming a new authorization code.
    ///
    /// Previous challenge claims are kept; PKCE verifiers are tied to a single
    /// authorization request and are dropped.
    #[must_use]
    pub fn with_code(&self, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            code_verifier: None,
            ..self.clone()
        }
    }

    /// Copy of this context that answers a claims challenge
    #[must_use]
    pub fn with_claims(&self, claims: impl Into<String>) -> Self {
        Self {
            claims: Some(claims.into()),
            ..self.clone()
        }
    }

    /// Redirect URI the code was issued for
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Challenge claims carried by this context
    #[must_use]
    pub fn claims(&self) -> Option<&str> {
        self.claims.as_deref()
    }
}

impl TokenRequestContext for AuthorizationCodeContext {
    fn params(&self) -> Result<TokenParams> {
        if self.code.is_empty() {
            return Err(TokenContextError::parameter_build(
                "authorization code must not be empty",
            ));
        }

        let mut params = client_params(&self.client_id, &self.client_secret)?;
        params.insert("code", self.code.as_str())?;
        params.insert("redirect_uri", self.redirect_uri.as_str())?;
        params.insert("scope", join_scopes(&self.scopes))?;
        params.insert("grant_type", GrantType::AuthorizationCode.as_str())?;
        if let Some(verifier) = &self.code_verifier {
            params.insert("code_verifier", verifier.as_str())?;
        }
        add_claims(&mut params, self.is_cae_enabled(), self.claims.as_deref())?;
        Ok(params)
    }

    fn refresh_token_params(&self, refresh_token: &str) -> Result<TokenParams> {
        refresh_params(
            &self.client_id,
            &self.client_secret,
            &join_scopes(&self.scopes),
            refresh_token,
            self.is_cae_enabled(),
        )
    }

    fn grant_type(&self) -> &str {
        GrantType::AuthorizationCode.as_str()
    }

    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn identity(&self) -> String {
        match &self.user_id {
            Some(user_id) => identity_key(
                "user",
                &[self.tenant_id.as_str(), self.client_id.as_str(), user_id.as_str()],
            ),
            None => {
                let code = fingerprint(&self.code);
                identity_key(
                    "code",
                    &[self.tenant_id.as_str(), self.client_id.as_str(), code.as_str()],
                )
            }
        }
    }

    fn cae_settings(&self) -> &CaeSettings {
        &self.cae
    }

    fn cae_settings_mut(&mut self) -> &mut CaeSettings {
        &mut self.cae
    }
}
