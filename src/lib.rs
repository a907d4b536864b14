//! Gatekeeper - token authentication, RBAC and rate limiting
//!
//! This is the library interface for Gatekeeper, exposing the token
//! codec, authenticator, access guard and rate limiter for embedding
//! in other services.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod rate_limit;
pub mod store;

pub use config::Config;
pub use error::Error;
