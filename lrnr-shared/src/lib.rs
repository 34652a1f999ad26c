//! # Lrnr Shared Library
//!
//! Authentication core for the Lrnr API: browser sessions carried in an
//! opaque cookie, and long-lived API keys carried as bearer tokens.
//!
//! ## Module Organization
//!
//! - `auth`: Token codec, session and API key managers, request resolver, axum middleware
//! - `clock`: Injectable time source
//! - `db`: Connection pool and migration runner
//! - `models`: Persisted credential records and principals
//! - `store`: `CredentialStore` trait with Postgres and in-memory implementations

pub mod auth;
pub mod clock;
pub mod db;
pub mod models;
pub mod store;

/// Current version of the Lrnr shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
