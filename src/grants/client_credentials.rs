//! Client credentials grant with a client secret

use super::{add_claims, client_params, fingerprint, identity_key, refresh_params, require};
use crate::context::{CaeSettings, GrantType, TokenParams, TokenRequestContext, join_scopes};
use crate::error::Result;

/// App-only token request using a client id and secret
#[derive(Clone)]
pub struct ClientCredentialContext {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    scopes: Vec<String>,
    claims: Option<String>,
    cae: CaeSettings,
}

impl std::fmt::Debug for ClientCredentialContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentialContext")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("claims", &self.claims)
            .field("cae", &self.cae)
            .finish()
    }
}

impl ClientCredentialContext {
    /// Create a context for the given tenant and application credentials
    ///
    /// # Errors
    ///
    /// Returns `TokenContextError::InvalidConfig` if any argument is empty.
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        let tenant_id = tenant_id.into();
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        require("tenant_id", &tenant_id)?;
        require("client_id", &client_id)?;
        require("client_secret", &client_secret)?;

        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
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

    /// Copy of this context that answers a claims challenge
    #[must_use]
    pub fn with_claims(&self, claims: impl Into<String>) -> Self {
        Self {
            claims: Some(claims.into()),
            ..self.clone()
        }
    }

    /// Client id
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Challenge claims carried by this context
    #[must_use]
    pub fn claims(&self) -> Option<&str> {
        self.claims.as_deref()
    }
}

impl TokenRequestContext for ClientCredentialContext {
    fn params(&self) -> Result<TokenParams> {
        let mut params = client_params(&self.client_id, &self.client_secret)?;
        params.insert("scope", join_scopes(&self.scopes))?;
        params.insert("grant_type", GrantType::ClientCredentials.as_str())?;
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
        GrantType::ClientCredentials.as_str()
    }

    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    fn identity(&self) -> String {
        let scope = fingerprint(&join_scopes(&self.scopes));
        identity_key("app", &[self.tenant_id.as_str(), self.client_id.as_str(), scope.as_str()])
    }

    fn cae_settings(&self) -> &CaeSettings {
        &self.cae
    }

    fn cae_settings_mut(&mut self) -> &mut CaeSettings {
        &mut self.cae
    }
}
