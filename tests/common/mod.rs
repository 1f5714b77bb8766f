//! Shared helpers for the integration suites: token minting and app setup

#![allow(dead_code)]

use axum::http::{HeaderName, HeaderValue, header};
use axum_test::TestServer;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use pizza_orders::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

pub const AUDIENCE: &str = "https://api.pizzeria.test";
pub const DOMAIN: &str = "pizzeria-test.auth0.com";
pub const KID: &str = "test-key-1";

pub const PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/test_private_key.pem");
pub const PUBLIC_KEY: &[u8] = include_bytes!("../fixtures/test_public_key.pem");
pub const OTHER_PRIVATE_KEY: &[u8] = include_bytes!("../fixtures/other_private_key.pem");
pub const JWKS: &str = include_str!("../fixtures/jwks.json");

pub fn issuer() -> String {
    format!("https://{}/", DOMAIN)
}

pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Claims of a valid admin token, expiring in one hour
pub fn admin_claims(permissions: &[&str]) -> Value {
    json!({
        "sub": "auth0|admin",
        "aud": AUDIENCE,
        "iss": issuer(),
        "iat": unix_now(),
        "exp": unix_now() + 3600,
        "permissions": permissions,
    })
}

/// Sign claims with RS256 using the given private key
pub fn sign_with(key: &[u8], claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    let key = EncodingKey::from_rsa_pem(key).expect("fixture key is valid");
    encode(&header, claims, &key).expect("token encodes")
}

pub fn sign(claims: &Value) -> String {
    sign_with(PRIVATE_KEY, claims)
}

pub fn admin_token() -> String {
    sign(&admin_claims(&[]))
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).expect("valid header"),
    )
}

/// Gate verifying against the fixture public key
pub fn static_gate(policy: AuthPolicy) -> AuthGate {
    let keys = StaticKeyProvider::from_rsa_pem(PUBLIC_KEY).expect("fixture key is valid");
    AuthGate::new(
        JwtVerifier::new(Arc::new(keys), AUDIENCE, &issuer()),
        policy,
    )
}

pub fn valid_draft() -> Value {
    json!({
        "pizza": "Margherita",
        "size": "mediana",
        "contactInfo": "5551234"
    })
}

/// Test server over a fresh in-memory repository
pub fn test_server(environment: Environment, policy: AuthPolicy) -> (TestServer, InMemoryOrderRepository) {
    let repository = InMemoryOrderRepository::new();
    let app = ServerBuilder::new()
        .with_repository(repository.clone())
        .with_auth_gate(static_gate(policy))
        .with_environment(environment)
        .build()
        .expect("Failed to build app");

    let server = TestServer::new(app);
    (server, repository)
}

pub fn default_server() -> TestServer {
    test_server(Environment::Test, AuthPolicy::Authenticated).0
}
