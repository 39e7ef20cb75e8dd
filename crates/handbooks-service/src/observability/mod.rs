//! Observability for the Handbooks service.
//!
//! # Privacy by Default
//!
//! Service functions use `#[instrument(skip_all)]` and add fields explicitly.
//! Fields are categorized as:
//! - **SAFE**: logged in plaintext (roles, operation names, token kinds, jti)
//! - **HASHED**: SHA-256 prefix for correlation (email, user id)
//! - **NEVER**: never logged (passwords, password hashes, tokens)

pub mod metrics;

use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars).
///
/// One-way and truncated; enough to follow a user across log lines without
/// writing their email or id in plaintext.
pub fn hash_for_correlation(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    hex::encode(result.get(..4).unwrap_or_default())
}
