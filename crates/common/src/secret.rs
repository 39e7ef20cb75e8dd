//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for passwords, signing keys and
//! bearer tokens. `SecretString` implements `Debug` with redaction, so any
//! struct deriving `Debug` around it stays safe to log, and the value is
//! zeroized on drop.
//!
//! ```rust
//! use common::secret::SecretString;
//! use secrecy::ExposeSecret;
//!
//! #[derive(Debug)]
//! struct LoginRequest {
//!     email: String,
//!     password: SecretString,
//! }
//!
//! let req = LoginRequest {
//!     email: "a@b.com".to_string(),
//!     password: SecretString::from("secret123"),
//! };
//!
//! assert!(!format!("{req:?}").contains("secret123"));
//! assert_eq!(req.password.expose_secret(), "secret123");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
