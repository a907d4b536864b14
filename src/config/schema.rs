//! Configuration schema definitions

use crate::auth::models::Role;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Accounts seeded into the credential store at startup. In a real
    /// deployment the credential store is an external database and this
    /// table stays empty.
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

/// Server configuration for the HTTP API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Token signing and lifetime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Symmetric signing secret, operator supplied, at least 32 bytes.
    #[serde(default)]
    pub secret: String,

    /// HMAC algorithm: HS256, HS384 or HS512.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    #[serde(default = "default_access_token_expiry_minutes")]
    pub access_token_expiry_minutes: i64,

    #[serde(default = "default_refresh_token_expiry_days")]
    pub refresh_token_expiry_days: i64,

    /// Role assigned to newly created credentials.
    #[serde(default = "default_role")]
    pub default_role: Role,
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_access_token_expiry_minutes() -> i64 {
    15
}

fn default_refresh_token_expiry_days() -> i64 {
    30
}

fn default_role() -> Role {
    Role::User
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: default_algorithm(),
            access_token_expiry_minutes: default_access_token_expiry_minutes(),
            refresh_token_expiry_days: default_refresh_token_expiry_days(),
            default_role: default_role(),
        }
    }
}

/// Rate limiting for designated (unauthenticated) routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_requests() -> u32 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

/// A credential seeded at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub email: String,
    /// Pre-computed bcrypt hash, never the plain password.
    pub password_hash: String,
    pub role: Role,
}

const MIN_SECRET_BYTES: usize = 32;

impl Config {
    /// Validate operator-supplied values before any component is built.
    pub fn validate(&self) -> Result<()> {
        let secret_bytes = self.auth.secret.len();
        if secret_bytes < MIN_SECRET_BYTES {
            return Err(Error::Config(format!(
                "signing secret must be at least {} bits ({} bytes), got {} bits ({} bytes)",
                MIN_SECRET_BYTES * 8,
                MIN_SECRET_BYTES,
                secret_bytes * 8,
                secret_bytes
            )));
        }

        if !matches!(self.auth.algorithm.as_str(), "HS256" | "HS384" | "HS512") {
            return Err(Error::Config(format!(
                "unsupported signing algorithm '{}', expected HS256, HS384 or HS512",
                self.auth.algorithm
            )));
        }

        if !(1..=999).contains(&self.auth.access_token_expiry_minutes) {
            return Err(Error::Config(format!(
                "invalid access token expiry {}, must be between 1 and 999 minutes",
                self.auth.access_token_expiry_minutes
            )));
        }

        if !(1..=999).contains(&self.auth.refresh_token_expiry_days) {
            return Err(Error::Config(format!(
                "invalid refresh token expiry {}, must be between 1 and 999 days",
                self.auth.refresh_token_expiry_days
            )));
        }

        if self.rate_limit.window_secs == 0 || self.rate_limit.max_requests == 0 {
            return Err(Error::Config(
                "rate limit window and max requests must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}
