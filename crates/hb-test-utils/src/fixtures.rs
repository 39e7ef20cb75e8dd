//! Deterministic configuration fixtures
//!
//! Tokens minted by the test app are signed with [`TEST_JWT_SECRET`], so
//! [`crate::TestTokenBuilder`] can forge tokens the app will accept.

use handbooks_service::config::Config;
use std::collections::HashMap;

/// Signing secret used by every test app (32+ bytes).
pub const TEST_JWT_SECRET: &str = "handbooks-test-secret-0123456789abcdef";

/// A different secret of valid length, for wrong-key tests.
pub const OTHER_JWT_SECRET: &str = "some-other-secret-fedcba9876543210-xyz";

/// Issuer the test app expects.
pub const TEST_ISSUER: &str = "handbooks";

/// Minimum bcrypt cost; keeps register/login fast in tests.
pub const TEST_BCRYPT_COST: u32 = 4;

/// Environment the test configuration is loaded from.
pub fn test_env() -> HashMap<String, String> {
    HashMap::from([
        (
            "DATABASE_URL".to_string(),
            "postgres://localhost/handbooks_test".to_string(),
        ),
        ("JWT_SECRET".to_string(), TEST_JWT_SECRET.to_string()),
        ("JWT_ISSUER".to_string(), TEST_ISSUER.to_string()),
        ("BCRYPT_COST".to_string(), TEST_BCRYPT_COST.to_string()),
        ("ACCESS_TOKEN_TTL_SECONDS".to_string(), "900".to_string()),
        ("REFRESH_TOKEN_TTL_SECONDS".to_string(), "604800".to_string()),
    ])
}

/// Configuration for the test app.
///
/// # Panics
///
/// Panics if the fixed test environment stops being a valid configuration.
pub fn test_config() -> Config {
    Config::from_vars(&test_env()).expect("test configuration must be valid")
}

/// Test configuration with extra variables layered on top.
///
/// # Panics
///
/// Panics if the overrides produce an invalid configuration.
pub fn test_config_with(overrides: &[(&str, &str)]) -> Config {
    let mut vars = test_env();
    for (name, value) in overrides {
        vars.insert((*name).to_string(), (*value).to_string());
    }
    Config::from_vars(&vars).expect("test configuration overrides must be valid")
}
