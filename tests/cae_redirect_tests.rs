//! Integration tests for claims-challenge handling
//!
//! These tests drive `TokenAcquirer` against a scripted token endpoint and
//! verify that redirect callbacks are invoked exactly when they should be.

use async_trait::async_trait;
use oauth_token_context::acquisition::{AcquirerOptions, TokenEndpointResponse};
use oauth_token_context::{
    AuthorizationCodeContext, CaeRedirectCallback, ClaimsChallenge, ClientCredentialContext,
    Result, SharedCaeRedirectCallback, TokenAcquirer, TokenContextError, TokenEndpoint,
    TokenInfo, TokenParams, TokenRequestContext, redirect_callback,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const CLAIMS: &str = r#"{"access_token":{"nbf":{"essential":true,"value":"1702682181"}}}"#;

// ============================================================================
// Test doubles
// ============================================================================

/// Token endpoint replaying scripted responses and recording requests
#[derive(Default)]
struct ScriptedEndpoint {
    responses: Mutex<VecDeque<TokenEndpointResponse>>,
    requests: Mutex<Vec<(String, TokenParams)>>,
}

impl ScriptedEndpoint {
    fn new(responses: impl IntoIterator<Item = TokenEndpointResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<(String, TokenParams)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenEndpoint for ScriptedEndpoint {
    async fn request_token(
        &self,
        tenant_id: &str,
        params: &TokenParams,
    ) -> Result<TokenEndpointResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((tenant_id.to_string(), params.clone()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TokenContextError::token_endpoint("no scripted response left"))
    }
}

fn token(access_token: &str) -> TokenEndpointResponse {
    TokenEndpointResponse::Token(TokenInfo::new(
        access_token.to_string(),
        Some("refresh".to_string()),
        Some(3600),
        None,
    ))
}

fn challenge() -> TokenEndpointResponse {
    TokenEndpointResponse::ClaimsChallenge(ClaimsChallenge::new(CLAIMS))
}

fn auth_code_context() -> AuthorizationCodeContext {
    AuthorizationCodeContext::new(
        "tenant",
        "client",
        "secret",
        "first-code",
        "http://localhost/callback",
    )
    .unwrap()
    .with_user_id("user-1")
}

/// Callback counting invocations and answering with a fresh authorization code
fn counting_callback(
    base: AuthorizationCodeContext,
    calls: Arc<AtomicU32>,
) -> SharedCaeRedirectCallback {
    redirect_callback(move |claims| {
        calls.fetch_add(1, Ordering::SeqCst);
        let next = base.with_code("second-code").with_claims(claims);
        async move { Ok(Box::new(next) as Box<dyn TokenRequestContext>) }
    })
}

// ============================================================================
// Context defaults and setters
// ============================================================================

#[test]
fn test_fresh_context_has_cae_disabled() {
    let context = auth_code_context();
    assert!(!context.is_cae_enabled());
    assert!(context.cae_redirect_callback().is_none());
}

#[test]
fn test_cae_toggle_has_no_hidden_state() {
    let mut context = auth_code_context();
    let before = context.params().unwrap();

    context.set_cae_enabled(true);
    assert!(context.is_cae_enabled());
    context.set_cae_enabled(false);
    assert!(!context.is_cae_enabled());

    assert_eq!(context.params().unwrap(), before);
}

#[test]
fn test_callback_set_get_clear() {
    let mut context = auth_code_context();
    let callback = counting_callback(auth_code_context(), Arc::new(AtomicU32::new(0)));

    context.set_cae_redirect_callback(Some(callback.clone()));
    let stored = context.cae_redirect_callback().unwrap();
    assert!(Arc::ptr_eq(&stored, &callback));

    let replacement = counting_callback(auth_code_context(), Arc::new(AtomicU32::new(0)));
    context.set_cae_redirect_callback(Some(replacement.clone()));
    assert!(Arc::ptr_eq(
        &context.cae_redirect_callback().unwrap(),
        &replacement
    ));

    context.set_cae_redirect_callback(None);
    assert!(context.cae_redirect_callback().is_none());
}

#[test]
fn test_identity_is_stable_and_deterministic() {
    let a = auth_code_context();
    let b = auth_code_context();
    assert_eq!(a.identity(), a.identity());
    assert_eq!(a.identity(), b.identity());

    let other = ClientCredentialContext::new("tenant", "client", "secret").unwrap();
    assert_ne!(a.identity(), other.identity());
}

#[tokio::test]
async fn test_callback_yields_context_with_marker_param() {
    struct MarkerRedirect;

    #[async_trait]
    impl CaeRedirectCallback for MarkerRedirect {
        async fn call(&self, claims: String) -> Result<Box<dyn TokenRequestContext>> {
            let next = ClientCredentialContext::new("tenant", "client", "secret")?
                .with_claims(claims);
            Ok(Box::new(next))
        }
    }

    let mut context = ClientCredentialContext::new("tenant", "client", "secret").unwrap();
    context.set_cae_redirect_callback(Some(Arc::new(MarkerRedirect)));

    let callback = context.cae_redirect_callback().unwrap();
    let next = callback.call("c1".to_string()).await.unwrap();

    assert_eq!(next.params().unwrap().get("claims"), Some("c1"));
    assert!(!context.params().unwrap().contains("claims"));
}

// ============================================================================
// Acquisition scenarios
// ============================================================================

#[tokio::test]
async fn test_acquire_without_challenge() {
    let endpoint = ScriptedEndpoint::new([token("a")]);
    let acquirer = TokenAcquirer::new(endpoint.clone());

    let acquired = acquirer.acquire(&auth_code_context()).await.unwrap();

    assert_eq!(acquired.token.access_token, "a");
    assert!(!acquired.was_redirected());
    let requests = endpoint.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "tenant");
    assert_eq!(requests[0].1.get("code"), Some("first-code"));
}

#[tokio::test]
async fn test_challenge_with_cae_disabled_is_unsupported() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut context = auth_code_context();
    context.set_cae_redirect_callback(Some(counting_callback(
        auth_code_context(),
        calls.clone(),
    )));

    let endpoint = ScriptedEndpoint::new([challenge(), token("unused")]);
    let acquirer = TokenAcquirer::new(endpoint.clone());

    let result = acquirer.acquire(&context).await;

    assert!(
        matches!(result, Err(TokenContextError::ClaimsChallengeUnsupported { ref claims }) if claims == CLAIMS)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0, "callback must not run");
    assert_eq!(endpoint.requests().len(), 1, "request must not be retried");
}

#[tokio::test]
async fn test_challenge_without_callback_is_unsupported() {
    let mut context = auth_code_context();
    context.set_cae_enabled(true);

    let endpoint = ScriptedEndpoint::new([challenge()]);
    let acquirer = TokenAcquirer::new(endpoint.clone());

    let err = acquirer.acquire(&context).await.unwrap_err();
    assert!(err.is_claims_challenge());
    assert_eq!(endpoint.requests().len(), 1);
}

#[tokio::test]
async fn test_challenge_redirects_once_and_uses_new_context() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut context = auth_code_context();
    context.set_cae_enabled(true);
    context.set_cae_redirect_callback(Some(counting_callback(
        context.clone(),
        calls.clone(),
    )));

    let endpoint = ScriptedEndpoint::new([challenge(), token("after-redirect")]);
    let acquirer = TokenAcquirer::new(endpoint.clone());

    let acquired = acquirer.acquire(&context).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(acquired.token.access_token, "after-redirect");

    let requests = endpoint.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].1.get("code"), Some("first-code"));
    assert_eq!(requests[1].1.get("code"), Some("second-code"));
    let claims = requests[1].1.get("claims").unwrap();
    assert!(claims.contains("nbf"));
    assert!(claims.contains("cp1"));

    let redirected = acquired.redirected_context.unwrap();
    assert_eq!(redirected.params().unwrap(), requests[1].1);
    assert_eq!(redirected.identity(), context.identity());
}

#[tokio::test]
async fn test_callback_rejection_propagates_without_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let mut context = auth_code_context();
    context.set_cae_enabled(true);
    context.set_cae_redirect_callback(Some(redirect_callback(move |_claims| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            Err::<Box<dyn TokenRequestContext>, _>(TokenContextError::cae_redirect(
                "user cancelled login",
            ))
        }
    })));

    let endpoint = ScriptedEndpoint::new([challenge(), token("unused")]);
    let acquirer = TokenAcquirer::new(endpoint.clone());

    let result = acquirer.acquire(&context).await;

    assert!(
        matches!(result, Err(TokenContextError::CaeRedirect(ref msg)) if msg == "user cancelled login")
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(endpoint.requests().len(), 1);
}

#[tokio::test]
async fn test_repeated_challenge_hits_redirect_limit() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut base = auth_code_context();
    base.set_cae_enabled(true);

    // The redirected context can redirect again, so only the limit stops the loop.
    let mut next = base.with_code("second-code");
    next.set_cae_redirect_callback(Some(counting_callback(base.clone(), calls.clone())));
    let mut context = base.clone();
    let counter = calls.clone();
    context.set_cae_redirect_callback(Some(redirect_callback(move |claims| {
        counter.fetch_add(1, Ordering::SeqCst);
        let next = next.with_claims(claims);
        async move { Ok(Box::new(next) as Box<dyn TokenRequestContext>) }
    })));

    let endpoint = ScriptedEndpoint::new([challenge(), challenge(), token("unused")]);
    let acquirer = TokenAcquirer::new(endpoint.clone());

    let result = acquirer.acquire(&context).await;

    assert!(matches!(
        result,
        Err(TokenContextError::ClaimsRedirectLimit { redirects: 1 })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(endpoint.requests().len(), 2);
}

#[tokio::test]
async fn test_redirect_limit_allows_chained_redirects() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut base = auth_code_context();
    base.set_cae_enabled(true);

    let mut next = base.with_code("second-code");
    next.set_cae_redirect_callback(Some(counting_callback(base.clone(), calls.clone())));
    let mut context = base.clone();
    let counter = calls.clone();
    context.set_cae_redirect_callback(Some(redirect_callback(move |claims| {
        counter.fetch_add(1, Ordering::SeqCst);
        let next = next.with_claims(claims);
        async move { Ok(Box::new(next) as Box<dyn TokenRequestContext>) }
    })));

    let endpoint = ScriptedEndpoint::new([challenge(), challenge(), token("third")]);
    let options = AcquirerOptions::builder().max_claims_redirects(2).build();
    let acquirer = TokenAcquirer::with_options(endpoint.clone(), options);

    let acquired = acquirer.acquire(&context).await.unwrap();

    assert_eq!(acquired.token.access_token, "third");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(endpoint.requests().len(), 3);
}

#[tokio::test]
async fn test_refresh_challenge_redirects_to_primary_params() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut context = auth_code_context();
    context.set_cae_enabled(true);
    context.set_cae_redirect_callback(Some(counting_callback(
        context.clone(),
        calls.clone(),
    )));

    let endpoint = ScriptedEndpoint::new([challenge(), token("fresh")]);
    let acquirer = TokenAcquirer::new(endpoint.clone());

    let acquired = acquirer.refresh(&context, "old-refresh").await.unwrap();

    assert_eq!(acquired.token.access_token, "fresh");
    let requests = endpoint.requests();
    assert_eq!(requests[0].1.get("grant_type"), Some("refresh_token"));
    assert_eq!(requests[0].1.get("refresh_token"), Some("old-refresh"));
    assert_eq!(requests[1].1.get("grant_type"), Some("authorization_code"));
}

#[tokio::test]
async fn test_refresh_with_empty_token_fails_before_request() {
    let endpoint = ScriptedEndpoint::new([token("unused")]);
    let acquirer = TokenAcquirer::new(endpoint.clone());

    let err = tokio_test::assert_err!(acquirer.refresh(&auth_code_context(), "").await);

    assert!(matches!(err, TokenContextError::ParameterBuild(_)));
    assert!(endpoint.requests().is_empty());
}

#[tokio::test]
async fn test_resource_challenge_from_header() {
    use base64::Engine;

    let calls = Arc::new(AtomicU32::new(0));
    let mut context = auth_code_context();
    context.set_cae_enabled(true);
    context.set_cae_redirect_callback(Some(counting_callback(
        context.clone(),
        calls.clone(),
    )));

    let header = format!(
        r#"Bearer realm="", error="insufficient_claims", claims="{}""#,
        base64::engine::general_purpose::STANDARD.encode(CLAIMS)
    );
    let challenge = ClaimsChallenge::from_www_authenticate(&header).unwrap();

    let endpoint = ScriptedEndpoint::new([token("cae-token")]);
    let acquirer = TokenAcquirer::new(endpoint.clone());

    let acquired = acquirer
        .handle_claims_challenge(&context, challenge)
        .await
        .unwrap();

    assert_eq!(acquired.token.access_token, "cae-token");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(endpoint.requests().len(), 1);
    assert!(acquired.was_redirected());
}

// ============================================================================
// Timeout and cancellation around the redirect
// ============================================================================

#[tokio::test]
async fn test_slow_callback_times_out() {
    let mut context = auth_code_context();
    context.set_cae_enabled(true);
    context.set_cae_redirect_callback(Some(redirect_callback(|_claims| async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Err::<Box<dyn TokenRequestContext>, _>(TokenContextError::cae_redirect(
            "should never finish",
        ))
    })));

    let endpoint = ScriptedEndpoint::new([challenge()]);
    let options = AcquirerOptions::builder()
        .redirect_timeout(Duration::from_millis(100))
        .build();
    let acquirer = TokenAcquirer::with_options(endpoint, options);

    let start = Instant::now();
    let result = acquirer.acquire(&context).await;
    let elapsed = start.elapsed();

    assert!(
        elapsed < Duration::from_secs(2),
        "Timeout failed! Took {:?}",
        elapsed
    );
    let err = result.unwrap_err();
    assert!(matches!(
        err,
        TokenContextError::RedirectTimeout { timeout } if timeout == Duration::from_millis(100)
    ));
    assert_eq!(err.to_string(), "CAE redirect timed out after 100ms");
}

#[tokio::test]
async fn test_cancellation_aborts_pending_redirect() {
    let mut context = auth_code_context();
    context.set_cae_enabled(true);
    context.set_cae_redirect_callback(Some(redirect_callback(|_claims| async move {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Err::<Box<dyn TokenRequestContext>, _>(TokenContextError::cae_redirect(
            "should never finish",
        ))
    })));

    let token = CancellationToken::new();
    let options = AcquirerOptions::builder()
        .cancellation_token(token.clone())
        .build();
    let acquirer = TokenAcquirer::with_options(ScriptedEndpoint::new([challenge()]), options);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let start = Instant::now();
    let result = acquirer.acquire(&context).await;
    canceller.await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(matches!(result, Err(TokenContextError::Cancelled)));
}

#[tokio::test]
async fn test_replacing_callback_does_not_affect_snapshot() {
    let first_calls = Arc::new(AtomicU32::new(0));
    let second_calls = Arc::new(AtomicU32::new(0));

    let mut context = auth_code_context();
    context.set_cae_enabled(true);
    context.set_cae_redirect_callback(Some(counting_callback(
        context.clone(),
        first_calls.clone(),
    )));

    let snapshot = context.cae_redirect_callback().unwrap();
    context.set_cae_redirect_callback(Some(counting_callback(
        context.clone(),
        second_calls.clone(),
    )));

    let _ = snapshot.call(CLAIMS.to_string()).await.unwrap();

    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cae_context_refresh_keeps_capability_claim() -> anyhow::Result<()> {
    let endpoint = ScriptedEndpoint::new([token("a"), token("b")]);
    let acquirer = TokenAcquirer::new(endpoint.clone());
    let mut context = auth_code_context();
    context.set_cae_enabled(true);

    let first = acquirer.acquire(&context).await?;
    let refresh_token = first
        .token
        .refresh_token
        .ok_or_else(|| anyhow::anyhow!("token without refresh token"))?;
    let second = acquirer.refresh(&context, &refresh_token).await?;

    assert_eq!(second.token.access_token, "b");
    let requests = endpoint.requests();
    let refresh = &requests[1].1;
    assert_eq!(refresh.get("grant_type"), Some("refresh_token"));
    assert_eq!(refresh.get("refresh_token"), Some("refresh"));
    assert!(!refresh.contains("code"));
    let claims = refresh
        .get("claims")
        .ok_or_else(|| anyhow::anyhow!("refresh request without claims"))?;
    assert!(claims.contains("cp1"));
    Ok(())
}
