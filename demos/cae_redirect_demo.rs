//! CAE Redirect Demo
//!
//! Demonstrates claims-challenge handling end to end against an in-memory
//! token endpoint:
//! 1. First request is answered with a claims challenge
//! 2. The context's redirect callback "re-authenticates" and returns a new context
//! 3. The request is repeated with the new context's parameters
//!
//! Run with: cargo run --example cae_redirect_demo

use async_trait::async_trait;
use oauth_token_context::{
    AuthorizationCodeContext, ClaimsChallenge, Result, TokenAcquirer, TokenEndpoint,
    TokenEndpointResponse, TokenParams, TokenRequestContext, parse_token_response,
    redirect_callback,
};
use std::sync::atomic::{AtomicBool, Ordering};

/// Issues a challenge until the request carries challenge claims
struct DemoEndpoint {
    challenged: AtomicBool,
}

#[async_trait]
impl TokenEndpoint for DemoEndpoint {
    async fn request_token(
        &self,
        tenant_id: &str,
        params: &TokenParams,
    ) -> Result<TokenEndpointResponse> {
        println!("→ POST https://login.microsoftonline.com/{tenant_id}/oauth2/v2.0/token");
        for (name, value) in params.iter() {
            let shown = if name == "client_secret" { "<redacted>" } else { value };
            println!("    {name} = {shown}");
        }

        if !self.challenged.swap(true, Ordering::SeqCst) {
            println!("← claims challenge");
            return Ok(TokenEndpointResponse::ClaimsChallenge(ClaimsChallenge::new(
                r#"{"access_token":{"nbf":{"essential":true,"value":"1702682181"}}}"#,
            )));
        }

        println!("← token issued");
        parse_token_response(
            r#"{"access_token":"eyJ0eXAi.demo","token_type":"Bearer","expires_in":3599,"refresh_token":"0.AX0A"}"#,
        )
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oauth_token_context=debug".parse().unwrap()),
        )
        .init();

    let mut context = AuthorizationCodeContext::new(
        "contoso.onmicrosoft.com",
        "11111111-2222-3333-4444-555555555555",
        "demo-secret",
        "first-authorization-code",
        "http://localhost:8400/callback",
    )?
    .with_scopes(["User.Read"])
    .with_user_id("demo-user");
    context.set_cae_enabled(true);

    let base = context.clone();
    context.set_cae_redirect_callback(Some(redirect_callback(move |claims| {
        println!();
        println!("⟳ Redirecting user to login with claims: {claims}");
        let next = base
            .with_code("second-authorization-code")
            .with_claims(claims);
        async move { Ok(Box::new(next) as Box<dyn TokenRequestContext>) }
    })));

    let acquirer = TokenAcquirer::new(DemoEndpoint {
        challenged: AtomicBool::new(false),
    });

    let acquired = acquirer.acquire(&context).await?;

    println!();
    println!("✓ Authorization: {}", acquired.token.authorization_header());
    println!("  Cache key: {}", context.identity());
    println!("  Redirected: {}", acquired.was_redirected());

    Ok(())
}
