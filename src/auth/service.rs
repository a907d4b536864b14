//! Login, refresh and logout orchestration

use crate::error::{Error, Result};
use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{Credential, Role};
use super::revocation::RevocationList;
use super::token::{IssuedToken, TokenCodec, TokenKind};

/// Contract with the external user store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>>;

    /// Store a new credential, rejecting an already registered email.
    async fn create(&self, credential: Credential) -> Result<()>;
}

/// In-memory credential store.
///
/// Stands in for the external relational store; real deployments
/// implement [`CredentialStore`] against their database instead.
pub struct InMemoryCredentialStore {
    users: Arc<RwLock<HashMap<String, Credential>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a credential with a pre-computed password hash,
    /// overwriting any existing entry. Used for seeding.
    pub async fn insert(&self, credential: Credential) {
        let mut users = self.users.write().await;
        users.insert(credential.email.clone(), credential);
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for InMemoryCredentialStore {
    fn clone(&self) -> Self {
        Self {
            users: Arc::clone(&self.users),
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>> {
        let users = self.users.read().await;
        Ok(users.get(email).cloned())
    }

    async fn create(&self, credential: Credential) -> Result<()> {
        // Existence check and insert under one write lock so two
        // concurrent signups cannot both claim the email.
        let mut users = self.users.write().await;
        if users.contains_key(&credential.email) {
            return Err(Error::EmailTaken);
        }
        users.insert(credential.email.clone(), credential);
        Ok(())
    }
}

/// Access and refresh token issued together at login
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

/// Orchestrates credential verification, token issuance and revocation.
///
/// Refresh tokens are not rotated on use: revocation happens only on
/// explicit logout. See DESIGN.md for the trade-off.
pub struct Authenticator {
    codec: Arc<TokenCodec>,
    revocation: RevocationList,
    users: Arc<dyn CredentialStore>,
    /// Hash verified for unknown emails so both login failure paths
    /// cost the same and don't leak which accounts exist.
    timing_pad_hash: String,
}

impl Authenticator {
    pub fn new(
        codec: Arc<TokenCodec>,
        revocation: RevocationList,
        users: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let timing_pad_hash = hash("gatekeeper-timing-pad", DEFAULT_COST)?;
        Ok(Self {
            codec,
            revocation,
            users,
            timing_pad_hash,
        })
    }

    /// Register a new account with a hashed password.
    pub async fn signup(&self, email: &str, password: &str, role: Role) -> Result<Credential> {
        let credential = Credential {
            subject_id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: hash(password, DEFAULT_COST)?,
            role,
        };
        self.users.create(credential.clone()).await?;

        tracing::info!(email, %role, "created credential");

        Ok(credential)
    }

    /// Verify credentials and issue one access and one refresh token.
    ///
    /// The response is identical whether the email is unknown or the
    /// password is wrong.
    pub async fn login(&self, email: &str, password: &str, now: DateTime<Utc>) -> Result<TokenPair> {
        let credential = match self.users.find_by_email(email).await? {
            Some(credential) => credential,
            None => {
                let _ = verify(password, &self.timing_pad_hash);
                return Err(Error::InvalidCredentials);
            }
        };

        let password_valid = verify(password, &credential.password_hash).unwrap_or_else(|e| {
            tracing::warn!(email, error = %e, "stored password hash could not be parsed");
            false
        });
        if !password_valid {
            return Err(Error::InvalidCredentials);
        }

        let access =
            self.codec
                .issue(credential.subject_id, credential.role, TokenKind::Access, now)?;
        let refresh =
            self.codec
                .issue(credential.subject_id, credential.role, TokenKind::Refresh, now)?;

        tracing::info!(subject = %credential.subject_id, role = %credential.role, "login successful");

        Ok(TokenPair { access, refresh })
    }

    /// Mint a new access token from a valid, unrevoked refresh token.
    pub async fn refresh(&self, refresh_token: &str, now: DateTime<Utc>) -> Result<IssuedToken> {
        let claims = self.codec.verify(refresh_token, now)?;

        if claims.typ != TokenKind::Refresh {
            return Err(Error::WrongTokenKind);
        }

        if self.revocation.is_revoked(claims.jti).await? {
            return Err(Error::Revoked);
        }

        let access = self
            .codec
            .issue(claims.sub, claims.role, TokenKind::Access, now)?;

        tracing::info!(subject = %claims.sub, "refreshed access token");

        Ok(access)
    }

    /// Revoke the presented tokens for the remainder of their lifetime.
    ///
    /// Tokens that fail signature verification or are absent are
    /// skipped: the caller is already logged out as far as those are
    /// concerned. Store failures propagate so revocation is never
    /// silently dropped.
    pub async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for token in [access_token, refresh_token].into_iter().flatten() {
            match self.codec.decode_allow_expired(token) {
                Ok(claims) => {
                    self.revocation
                        .revoke(claims.jti, claims.remaining_lifetime(now))
                        .await?;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unverifiable token at logout");
                }
            }
        }
        Ok(())
    }
}
