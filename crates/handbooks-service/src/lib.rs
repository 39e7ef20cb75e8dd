//! Handbooks Service Library
//!
//! Backend for the Handbooks learning platform: account registration and
//! login, dual-token sessions (short-lived access tokens, rotating refresh
//! tokens) whose liveness is tracked in Redis, and CRUD over courses,
//! sections and lessons.
//!
//! # Modules
//!
//! - `cache` - Token liveness cache (Redis and in-memory)
//! - `config` - Service configuration
//! - `crypto` - JWT signing/verification, password hashing
//! - `errors` - Error types and the HTTP error envelope
//! - `handlers` - HTTP request handlers
//! - `middleware` - Request id and authentication gate
//! - `models` - Data models
//! - `repositories` - Generic record mapper over a SQL store
//! - `routes` - Router and shared application state
//! - `services` - Business logic layer

pub mod cache;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
