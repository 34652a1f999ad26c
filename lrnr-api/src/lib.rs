//! # Lrnr API Server Library
//!
//! Hosts the authentication subsystem from `lrnr-shared` behind an Axum router.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: Route handlers owned by the server itself
//! - `telemetry`: Tracing subscriber setup

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
pub mod telemetry;
