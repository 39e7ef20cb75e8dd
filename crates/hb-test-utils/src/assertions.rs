//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for tokens and response envelopes.

use crate::server_harness::TestResponse;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;

/// JWT header structure
#[derive(Debug, Deserialize)]
struct JwtHeader {
    pub alg: String,
}

/// JWT claims structure
#[derive(Debug, Deserialize)]
struct JwtClaims {
    pub sub: String,
    pub exp: i64,
    pub typ: String,
}

fn decode_part<T: for<'de> Deserialize<'de>>(token: &str, index: usize) -> T {
    let part = token
        .split('.')
        .nth(index)
        .unwrap_or_else(|| panic!("JWT is missing part {index}"));
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT part {index}: {e}"));
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("Failed to parse JWT part {index} JSON: {e}"))
}

/// Custom assertions for issued tokens
///
/// # Example
/// ```rust,ignore
/// session.access_token
///     .assert_valid_jwt()
///     .assert_kind("access")
///     .assert_expires_in(900);
/// ```
pub trait TokenAssertions {
    /// Assert that the token is a three-part HS256 JWT
    fn assert_valid_jwt(&self) -> &Self;

    /// Assert the `typ` claim (`access` or `refresh`)
    fn assert_kind(&self, kind: &str) -> &Self;

    /// Assert that the token expires within the specified seconds
    fn assert_expires_in(&self, seconds: u64) -> &Self;

    /// Assert that the token is for the specified subject
    fn assert_for_subject(&self, subject: &str) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_jwt(&self) -> &Self {
        let parts = self.split('.').count();
        assert_eq!(
            parts, 3,
            "JWT must have 3 parts (header.payload.signature), got {parts}"
        );

        let header: JwtHeader = decode_part(self, 0);
        assert_eq!(header.alg, "HS256", "Expected HS256 algorithm");

        let _claims: JwtClaims = decode_part(self, 1);
        self
    }

    fn assert_kind(&self, kind: &str) -> &Self {
        let claims: JwtClaims = decode_part(self, 1);
        assert_eq!(claims.typ, kind, "Unexpected token kind");
        self
    }

    fn assert_expires_in(&self, seconds: u64) -> &Self {
        let claims: JwtClaims = decode_part(self, 1);
        let expires_in = claims.exp - chrono::Utc::now().timestamp();

        // Allow 5-second tolerance for slow test runs
        assert!(
            (expires_in - seconds as i64).abs() <= 5,
            "Expected token to expire in {seconds} seconds, but expires in {expires_in} seconds"
        );
        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        let claims: JwtClaims = decode_part(self, 1);
        assert_eq!(claims.sub, subject, "Token subject mismatch");
        self
    }
}

/// Custom assertions for the response envelope
///
/// # Example
/// ```rust,ignore
/// response.assert_error(404, "NOT_FOUND");
/// ```
pub trait EnvelopeAssertions {
    /// Assert a success envelope with the given status
    fn assert_success(&self, status: u16) -> &Self;

    /// Assert an error envelope with the given status and code
    fn assert_error(&self, status: u16, code: &str) -> &Self;
}

impl EnvelopeAssertions for TestResponse {
    fn assert_success(&self, status: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            status,
            "Unexpected status, body: {}",
            self.text
        );
        assert_eq!(self.body["success"], true, "Expected success envelope");
        assert_eq!(self.body["status"], status, "Envelope status mismatch");
        assert!(
            self.body["request_id"].as_str().is_some_and(|id| !id.is_empty()),
            "Envelope is missing request_id"
        );
        self
    }

    fn assert_error(&self, status: u16, code: &str) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            status,
            "Unexpected status, body: {}",
            self.text
        );
        assert_eq!(self.body["success"], false, "Expected error envelope");
        assert_eq!(self.body["status"], status, "Envelope status mismatch");
        assert_eq!(self.error_code(), Some(code), "Error code mismatch");
        self
    }
}
