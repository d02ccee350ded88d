//! On-behalf-of grant (JWT bearer assertion exchange)

use super::{add_claims, client_params, fingerprint, identity_key, refresh_params, require};
use crate::context::{CaeSettings, GrantType, TokenParams, TokenRequestContext, join_scopes};
use crate::error::{Result, TokenContextError};

/// Delegated token request exchanging an incoming user assertion
#[derive(Clone)]
pub struct OnBehalfOfContext {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    assertion: String,
    scopes: Vec<String>,
    claims: Option<String>,
    cae: CaeSettings,
}

impl std::fmt::Debug for OnBehalfOfContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnBehalfOfContext")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("assertion", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("claims", &self.claims)
            .field("cae", &self.cae)
            .finish()
    }
}

impl OnBehalfOfContext {
    /// Create a context exchanging `assertion` (the caller's access token)
    ///
    /// # Errors
    ///
    /// Returns `TokenContextError::InvalidConfig` if any argument is empty.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        assertion: impl Into<String>,
    ) -> Result<Self> {
        let tenant_id = tenant_id.into();
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        let assertion = assertion.into();
        require("tenant_id", &tenant_id)?;
        require("client_id", &client_id)?;
        require("client_secret", &client_secret)?;
        require("assertion", &assertion)?;

        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
            assertion,
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

    /// Copy of this context exchanging a new assertion
    #[must_use]
    pub fn with_assertion(&self, assertion: impl Into<String>) -> Self {
        Self {
            assertion: assertion.into(),
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
}

impl TokenRequestContext for OnBehalfOfContext {
    fn params(&self) -> Result<TokenParams> {
        if self.assertion.is_empty() {
            return Err(TokenContextError::parameter_build(
                "assertion must not be empty",
            ));
        }

        let mut params = client_params(&self.client_id, &self.client_secret)?;
        params.insert("assertion", self.assertion.as_str())?;
        params.insert("requested_token_use", "on_behalf_of")?;
        params.insert("scope", join_scopes(&self.scopes))?;
        params.insert("grant_type", GrantType::OnBehalfOf.as_str())?;
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
        GrantType::OnBehalfOf.as_str()
    }

    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn identity(&self) -> String {
        let assertion = fingerprint(&self.assertion);
        identity_key(
            "obo",
            &[self.tenant_id.as_str(), self.client_id.as_str(), assertion.as_str()],
        )
    }

    fn cae_settings(&self) -> &CaeSettings {
        &self.cae
    }

    fn cae_settings_mut(&mut self) -> &mut CaeSettings {
        &mut self.cae
    }
}
