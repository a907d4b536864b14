//! Signed session token encoding and decoding

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::Role;

/// The two token kinds differ only in lifetime and in which operations
/// they authorize: refresh tokens mint new access tokens and log out,
/// access tokens authorize business operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Access => write!(f, "access"),
            TokenKind::Refresh => write!(f, "refresh"),
        }
    }
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Role at issuance time; role changes take effect on next issuance
    pub role: Role,
    /// Token kind
    pub typ: TokenKind,
    /// Unique token id, the revocation key
    pub jti: Uuid,
    /// Issued at
    pub iat: i64,
    /// Expiration time
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_default()
    }

    /// Remaining validity at `now`, clamped at zero.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> std::time::Duration {
        let secs = (self.exp - now.timestamp()).max(0) as u64;
        std::time::Duration::from_secs(secs)
    }
}

/// A freshly issued token with its id and expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Encodes and decodes signed session tokens.
///
/// Pure with respect to the injected clock: issuing and verifying have
/// no side effects, which keeps both trivially testable.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    algorithm: Algorithm,
    validation: Validation,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let algorithm = match config.algorithm.as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => {
                return Err(Error::Config(format!(
                    "unsupported signing algorithm '{}'",
                    other
                )))
            }
        };

        // Expiry is checked against the caller-supplied clock, not the
        // system clock inside the JWT library.
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.required_spec_claims = Default::default();
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            algorithm,
            validation,
            access_lifetime: Duration::minutes(config.access_token_expiry_minutes),
            refresh_lifetime: Duration::days(config.refresh_token_expiry_days),
        })
    }

    fn lifetime(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_lifetime,
            TokenKind::Refresh => self.refresh_lifetime,
        }
    }

    /// Issue a signed token for the subject with a fresh token id.
    pub fn issue(
        &self,
        subject_id: Uuid,
        role: Role,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken> {
        let expires_at = now + self.lifetime(kind);
        let claims = Claims {
            sub: subject_id,
            role,
            typ: kind,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| Error::Config(format!("Failed to sign token: {}", e)))?;

        tracing::debug!(subject = %subject_id, kind = %kind, jti = %claims.jti, "issued token");

        Ok(IssuedToken {
            token,
            token_id: claims.jti,
            expires_at,
        })
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        let claims = self.decode_signed(token)?;
        if now.timestamp() >= claims.exp {
            return Err(Error::Expired);
        }
        Ok(claims)
    }

    /// Decode a token whose signature must verify but whose expiry is
    /// ignored. Logout uses this to extract the token id from tokens
    /// that may already have lapsed.
    pub fn decode_allow_expired(&self, token: &str) -> Result<Claims> {
        self.decode_signed(token)
    }

    fn decode_signed(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => Error::InvalidSignature,
                _ => Error::Malformed,
            })
    }
}
