//! Common utilities and types shared across Handbooks components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (claims, validation constants, iat checks)
pub mod jwt;
