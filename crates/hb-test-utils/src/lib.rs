//! # Handbooks Test Utilities
//!
//! Shared test utilities for the Handbooks service.
//!
//! This crate provides:
//! - Fixed configuration and signing secret (reproducible tokens)
//! - Token builders for forged, expired and mis-signed tokens
//! - In-process app harness (TestApp over in-memory store and cache)
//! - Fixed test IDs and credentials
//! - Custom assertions (TokenAssertions, EnvelopeAssertions)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hb_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let app = TestApp::spawn()?;
//!     let session = app.register("alice@example.com", TEST_PASSWORD).await?;
//!
//!     let response = app.get("/api/v1/users/me", Some(&session.access_token)).await?;
//!     response.assert_success(200);
//!
//!     session.access_token.assert_valid_jwt().assert_kind("access");
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;
pub use server_harness::*;
pub use test_ids::*;
pub use token_builders::*;
