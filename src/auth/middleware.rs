//! Access guard middleware
//!
//! Request pipeline stage that validates the bearer token, checks the
//! revocation list and enforces the route's required capability before
//! the handler runs. On success the caller's [`AuthContext`] is
//! attached to the request extensions for downstream use.

use crate::error::{Error, Result};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::models::{AuthContext, Capability, RoleTable};
use super::revocation::RevocationList;
use super::token::{TokenCodec, TokenKind};

/// Extract the bearer token string from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Per-request authorization gate
#[derive(Clone)]
pub struct AccessGuard {
    codec: Arc<TokenCodec>,
    revocation: RevocationList,
    roles: Arc<RoleTable>,
}

impl AccessGuard {
    pub fn new(codec: Arc<TokenCodec>, revocation: RevocationList, roles: Arc<RoleTable>) -> Self {
        Self {
            codec,
            revocation,
            roles,
        }
    }

    /// Bind this guard to a route's required capability.
    pub fn require(&self, required: Capability) -> RouteGuard {
        RouteGuard {
            guard: self.clone(),
            required,
        }
    }

    /// Validate the token and enforce the capability.
    ///
    /// Token problems map to 401, an insufficient role to 403; a store
    /// failure during the revocation check propagates so the request is
    /// denied rather than let through unverified.
    pub async fn authorize(
        &self,
        token: &str,
        required: &Capability,
        now: DateTime<Utc>,
    ) -> Result<AuthContext> {
        let claims = self.codec.verify(token, now)?;

        // Refresh tokens only authorize minting and logout, never
        // business operations.
        if claims.typ != TokenKind::Access {
            return Err(Error::WrongTokenKind);
        }

        if self.revocation.is_revoked(claims.jti).await? {
            return Err(Error::Revoked);
        }

        if !required.permits(claims.role, &self.roles) {
            return Err(Error::Forbidden);
        }

        Ok(AuthContext {
            subject_id: claims.sub,
            role: claims.role,
        })
    }
}

/// An [`AccessGuard`] bound to one route's capability, used as
/// middleware state.
#[derive(Clone)]
pub struct RouteGuard {
    guard: AccessGuard,
    required: Capability,
}

/// Middleware enforcing the bound capability on every request.
pub async fn require_capability(
    State(route_guard): State<RouteGuard>,
    mut req: Request,
    next: Next,
) -> std::result::Result<Response, Error> {
    let token = bearer_token(req.headers()).ok_or(Error::MissingToken)?;
    let context = route_guard
        .guard
        .authorize(token, &route_guard.required, Utc::now())
        .await?;

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}
