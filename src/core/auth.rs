//! Bearer-token authentication for administrative routes
//!
//! Tokens are issued by an external identity provider and signed with RS256.
//! Verification keys come from the provider's published JSON Web Key Set,
//! cached in memory and re-fetched at most a few times per minute.
//!
//! - [`KeyProvider`]: where verification keys come from
//! - [`JwtVerifier`]: signature, audience, issuer and expiry checks
//! - [`AuthPolicy`]: permission requirements on top of authentication
//! - [`require_auth`]: axum middleware gating a route

use crate::core::error::ApiError;
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

/// The only signing algorithm accepted
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// How long fetched keys are trusted before a re-fetch
pub const JWKS_CACHE_TTL: Duration = Duration::from_secs(600);

/// Maximum key-set fetches per [`JWKS_RATE_WINDOW`]
pub const JWKS_REQUESTS_PER_WINDOW: usize = 5;
pub const JWKS_RATE_WINDOW: Duration = Duration::from_secs(60);

/// Why a token was rejected
///
/// Only ever logged; clients always see the same generic 401 message.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed authorization header")]
    MalformedHeader,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("no verification key for kid {0:?}")]
    UnknownKey(Option<String>),

    #[error("key set fetch rate limit exceeded")]
    RateLimited,

    #[error("failed to fetch key set: {0}")]
    KeySetUnavailable(String),
}

/// Claims read from a verified token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the administrator's identity)
    pub sub: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: u64,
    /// Permissions granted to the token (present when RBAC is enabled)
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Authorization context extracted from a request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
    pub permissions: Vec<String>,
}

impl AuthContext {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

impl From<Claims> for AuthContext {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            permissions: claims.permissions,
        }
    }
}

/// Authorization policy for a route
#[derive(Debug, Clone, Default)]
pub enum AuthPolicy {
    /// Any verified token
    #[default]
    Authenticated,

    /// Token must carry all of these permissions
    HasPermissions(Vec<String>),
}

impl AuthPolicy {
    /// Policy for a list of required permissions; empty means authentication alone
    pub fn from_permissions(permissions: Vec<String>) -> Self {
        if permissions.is_empty() {
            AuthPolicy::Authenticated
        } else {
            AuthPolicy::HasPermissions(permissions)
        }
    }

    /// Permissions required by this policy that the context lacks
    pub fn missing(&self, context: &AuthContext) -> Vec<String> {
        match self {
            AuthPolicy::Authenticated => Vec::new(),
            AuthPolicy::HasPermissions(required) => required
                .iter()
                .filter(|p| !context.has_permission(p))
                .cloned()
                .collect(),
        }
    }

    /// Check if auth context satisfies this policy
    pub fn check(&self, context: &AuthContext) -> bool {
        self.missing(context).is_empty()
    }
}

// =============================================================================
// Key providers
// =============================================================================

/// Source of token verification keys
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Key matching the token's `kid` header (if any)
    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, AuthError>;
}

/// A single fixed verification key
pub struct StaticKeyProvider {
    key: DecodingKey,
}

impl StaticKeyProvider {
    pub fn new(key: DecodingKey) -> Self {
        Self { key }
    }

    /// Build from a PEM-encoded RSA public key
    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self, AuthError> {
        DecodingKey::from_rsa_pem(pem)
            .map(Self::new)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn decoding_key(&self, _kid: Option<&str>) -> Result<DecodingKey, AuthError> {
        Ok(self.key.clone())
    }
}

#[derive(Default)]
struct JwksCache {
    keys: Vec<(Option<String>, DecodingKey)>,
    fetched_at: Option<Instant>,
    recent_fetches: VecDeque<Instant>,
}

impl JwksCache {
    fn is_fresh(&self) -> bool {
        self.fetched_at
            .is_some_and(|at| at.elapsed() < JWKS_CACHE_TTL)
    }

    fn find(&self, kid: Option<&str>) -> Option<DecodingKey> {
        match kid {
            Some(kid) => self
                .keys
                .iter()
                .find(|(key_id, _)| key_id.as_deref() == Some(kid))
                .map(|(_, key)| key.clone()),
            // Tokens without a kid are only accepted against a single-key set
            None if self.keys.len() == 1 => Some(self.keys[0].1.clone()),
            None => None,
        }
    }

    /// Record a fetch attempt if the rate limit allows one
    fn try_reserve_fetch(&mut self, now: Instant) -> bool {
        while self
            .recent_fetches
            .front()
            .is_some_and(|at| now.duration_since(*at) >= JWKS_RATE_WINDOW)
        {
            self.recent_fetches.pop_front();
        }
        if self.recent_fetches.len() >= JWKS_REQUESTS_PER_WINDOW {
            return false;
        }
        self.recent_fetches.push_back(now);
        true
    }

    fn replace(&mut self, set: &JwkSet) {
        self.keys = decoding_keys(set);
        self.fetched_at = Some(Instant::now());
    }
}

/// Convert every usable key of a key set, keeping its `kid`
pub fn decoding_keys(set: &JwkSet) -> Vec<(Option<String>, DecodingKey)> {
    set.keys
        .iter()
        .filter_map(|jwk| match DecodingKey::from_jwk(jwk) {
            Ok(key) => Some((jwk.common.key_id.clone(), key)),
            Err(e) => {
                tracing::warn!(kid = ?jwk.common.key_id, "skipping unusable JWK: {}", e);
                None
            }
        })
        .collect()
}

/// Keys fetched from the identity provider's `jwks.json`
pub struct JwksKeyProvider {
    jwks_uri: String,
    http: reqwest::Client,
    cache: RwLock<JwksCache>,
}

impl JwksKeyProvider {
    pub fn new(jwks_uri: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            http,
            cache: RwLock::new(JwksCache::default()),
        }
    }

    /// Provider for the conventional `https://<domain>/.well-known/jwks.json`
    pub fn for_domain(domain: &str, http: reqwest::Client) -> Self {
        Self::new(format!("https://{}/.well-known/jwks.json", domain), http)
    }

    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        tracing::debug!(uri = %self.jwks_uri, "fetching signing keys");
        let response = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?;
        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))
    }
}

#[async_trait]
impl KeyProvider for JwksKeyProvider {
    async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.cache.read().await;
            if cache.is_fresh() {
                if let Some(key) = cache.find(kid) {
                    return Ok(key);
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another request may have refreshed while we waited for the lock
        if cache.is_fresh() {
            if let Some(key) = cache.find(kid) {
                return Ok(key);
            }
        }

        if !cache.try_reserve_fetch(Instant::now()) {
            tracing::warn!(uri = %self.jwks_uri, "key set re-fetch rate limited");
            return cache.find(kid).ok_or(AuthError::RateLimited);
        }

        match self.fetch().await {
            Ok(set) => {
                cache.replace(&set);
                tracing::info!(keys = cache.keys.len(), "signing keys refreshed");
            }
            Err(e) => {
                tracing::error!("{}", e);
                // A stale key still verifies tokens it signed
                return cache.find(kid).ok_or(e);
            }
        }

        cache
            .find(kid)
            .ok_or_else(|| AuthError::UnknownKey(kid.map(str::to_string)))
    }
}

// =============================================================================
// Verifier
// =============================================================================

/// Verifies bearer tokens against a key provider
pub struct JwtVerifier {
    keys: Arc<dyn KeyProvider>,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(keys: Arc<dyn KeyProvider>, audience: &str, issuer: &str) -> Self {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

        Self { keys, validation }
    }

    /// Verifier for an identity-provider tenant (`https://<domain>/` issuer)
    pub fn for_domain(domain: &str, audience: &str, http: reqwest::Client) -> Self {
        Self::new(
            Arc::new(JwksKeyProvider::for_domain(domain, http)),
            audience,
            &issuer_for_domain(domain),
        )
    }

    /// Verify a raw token and return its claims
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if header.alg != SIGNING_ALGORITHM {
            return Err(AuthError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }

        let key = self.keys.decoding_key(header.kid.as_deref()).await?;
        let data = decode::<Claims>(token, &key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(format!("{:?}", e.kind())))?;

        Ok(data.claims)
    }
}

/// Issuer claim value for a provider domain
pub fn issuer_for_domain(domain: &str) -> String {
    format!("https://{}/", domain)
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingToken)?;
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token.trim())
}

// =============================================================================
// Middleware
// =============================================================================

/// Verifier plus the policy enforced on protected routes
#[derive(Clone)]
pub struct AuthGate {
    verifier: Arc<JwtVerifier>,
    policy: AuthPolicy,
}

impl AuthGate {
    pub fn new(verifier: JwtVerifier, policy: AuthPolicy) -> Self {
        Self {
            verifier: Arc::new(verifier),
            policy,
        }
    }

    /// Authenticate a request's authorization header and apply the policy
    pub async fn authorize(&self, header: Option<&str>) -> Result<AuthContext, ApiError> {
        let token = bearer_token(header)?;
        let context = AuthContext::from(self.verifier.verify(token).await?);

        let missing = self.policy.missing(&context);
        if !missing.is_empty() {
            tracing::warn!(subject = %context.subject, ?missing, "insufficient permissions");
            return Err(ApiError::Forbidden { missing });
        }

        Ok(context)
    }
}

/// Middleware that verifies the bearer token and stores the [`AuthContext`]
/// in request extensions
pub async fn require_auth(
    State(gate): State<AuthGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let context = gate.authorize(header).await?;
    tracing::debug!(subject = %context.subject, "request authenticated");

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(permissions: &[&str]) -> AuthContext {
        AuthContext {
            subject: "auth0|admin".to_string(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_policy_authenticated_accepts_any_context() {
        assert!(AuthPolicy::Authenticated.check(&context(&[])));
    }

    #[test]
    fn test_policy_from_empty_permissions_is_authenticated() {
        assert!(matches!(
            AuthPolicy::from_permissions(vec![]),
            AuthPolicy::Authenticated
        ));
    }

    #[test]
    fn test_policy_requires_all_permissions() {
        let policy = AuthPolicy::from_permissions(vec![
            "read:orders".to_string(),
            "update:orders".to_string(),
        ]);
        assert!(policy.check(&context(&["read:orders", "update:orders", "other"])));
        assert_eq!(
            policy.missing(&context(&["read:orders"])),
            vec!["update:orders".to_string()]
        );
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(Some("bearer abc")).unwrap(), "abc");
        assert!(matches!(bearer_token(None), Err(AuthError::MissingToken)));
        assert!(matches!(
            bearer_token(Some("Basic dXNlcjpwYXNz")),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            bearer_token(Some("Bearer")),
            Err(AuthError::MalformedHeader)
        ));
    }

    #[test]
    fn test_issuer_for_domain() {
        assert_eq!(
            issuer_for_domain("tenant.auth0.com"),
            "https://tenant.auth0.com/"
        );
    }

    #[test]
    fn test_jwks_uri_for_domain() {
        let provider = JwksKeyProvider::for_domain("tenant.auth0.com", reqwest::Client::new());
        assert_eq!(
            provider.jwks_uri(),
            "https://tenant.auth0.com/.well-known/jwks.json"
        );
    }

    #[test]
    fn test_fetch_rate_limit_window() {
        let mut cache = JwksCache::default();
        let start = Instant::now();
        for _ in 0..JWKS_REQUESTS_PER_WINDOW {
            assert!(cache.try_reserve_fetch(start));
        }
        assert!(!cache.try_reserve_fetch(start + Duration::from_secs(1)));
        assert!(cache.try_reserve_fetch(start + JWKS_RATE_WINDOW));
    }

    #[tokio::test]
    async fn test_verify_rejects_garbage_token() {
        let verifier = JwtVerifier::new(
            Arc::new(JwksKeyProvider::new("http://127.0.0.1:9/jwks.json", reqwest::Client::new())),
            "https://api.example.com",
            "https://tenant.example.com/",
        );
        assert!(matches!(
            verifier.verify("not-a-token").await,
            Err(AuthError::InvalidToken(_))
        ));
    }
}
