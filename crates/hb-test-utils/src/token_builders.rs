//! Builder patterns for test token construction
//!
//! Produces tokens the app did not issue: forged with the right key but
//! never stored, expired, signed with another key or algorithm, or
//! unsigned.

use crate::fixtures::{TEST_ISSUER, TEST_JWT_SECRET};
use crate::test_ids::{TEST_EMAIL_ALICE, TEST_USER_ALICE};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use common::jwt::{TokenKind, UserClaims};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use uuid::Uuid;

/// Builder for creating test JWTs
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user(TEST_USER_BOB)
///     .with_kind(TokenKind::Refresh)
///     .expires_in(-60)
///     .build();
/// ```
pub struct TestTokenBuilder {
    claims: UserClaims,
    secret: Vec<u8>,
    algorithm: Algorithm,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            claims: UserClaims {
                sub: TEST_USER_ALICE.to_string(),
                email: TEST_EMAIL_ALICE.to_string(),
                role: "student".to_string(),
                jti: Uuid::new_v4().simple().to_string(),
                iat: now.timestamp(),
                exp: (now + Duration::seconds(3600)).timestamp(),
                iss: TEST_ISSUER.to_string(),
                typ: TokenKind::Access,
            },
            secret: TEST_JWT_SECRET.as_bytes().to_vec(),
            algorithm: Algorithm::HS256,
        }
    }

    /// Set the subject
    pub fn for_user(mut self, user_id: Uuid) -> Self {
        self.claims.sub = user_id.to_string();
        self
    }

    /// Set a raw subject, including non-UUID values
    pub fn with_subject(mut self, sub: &str) -> Self {
        self.claims.sub = sub.to_string();
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.claims.email = email.to_string();
        self
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.claims.role = role.to_string();
        self
    }

    pub fn with_jti(mut self, jti: &str) -> Self {
        self.claims.jti = jti.to_string();
        self
    }

    pub fn with_kind(mut self, kind: TokenKind) -> Self {
        self.claims.typ = kind;
        self
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.claims.iss = issuer.to_string();
        self
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.claims.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.claims.iat = timestamp;
        self
    }

    /// Sign with a different HMAC secret
    pub fn signed_with(mut self, secret: &str) -> Self {
        self.secret = secret.as_bytes().to_vec();
        self
    }

    /// Sign with a different HMAC algorithm (HS384, HS512)
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// The claims the token will carry
    pub fn claims(&self) -> &UserClaims {
        &self.claims
    }

    /// Build the signed token
    ///
    /// # Panics
    ///
    /// Panics if the algorithm is not an HMAC algorithm.
    pub fn build(self) -> String {
        encode(
            &Header::new(self.algorithm),
            &self.claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .expect("HMAC signing of test claims must succeed")
    }

    /// Build an unsigned token with header `alg: none`
    ///
    /// # Panics
    ///
    /// Panics if the claims fail to serialize.
    pub fn build_unsigned(self) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&self.claims).expect("claims must serialize"));
        format!("{header}.{payload}.")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
