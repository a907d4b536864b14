//! Authentication and authorization tests

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use chrono::{Duration, Utc};
use gatekeeper::auth::{
    require_capability, AccessGuard, Authenticator, Capability, Credential,
    InMemoryCredentialStore, RevocationList, Role, RoleTable, TokenCodec, TokenKind,
};
use gatekeeper::config::AuthConfig;
use gatekeeper::error::Error;
use gatekeeper::rate_limit::{rate_limit_middleware, RateLimiter};
use gatekeeper::store::{KeyValueStore, MemoryStore, StoreError};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";
// Low bcrypt cost keeps the suite fast; production uses DEFAULT_COST.
const TEST_COST: u32 = 4;

/// Store that refuses every command, standing in for an unreachable
/// backend.
struct FailingStore;

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn set_ex(
        &self,
        _key: &str,
        _value: &str,
        _ttl: std::time::Duration,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn exists(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn incr(&self, _key: &str) -> Result<i64, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn expire(&self, _key: &str, _ttl: std::time::Duration) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

fn auth_config() -> AuthConfig {
    AuthConfig {
        secret: TEST_SECRET.to_string(),
        ..Default::default()
    }
}

struct Fixture {
    codec: Arc<TokenCodec>,
    revocation: RevocationList,
    authenticator: Authenticator,
    guard: AccessGuard,
}

async fn fixture_with_store(store: Arc<dyn KeyValueStore>) -> Fixture {
    let codec = Arc::new(TokenCodec::new(&auth_config()).unwrap());
    let revocation = RevocationList::new(store);
    let users = Arc::new(InMemoryCredentialStore::new());

    users
        .insert(Credential {
            subject_id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
            password_hash: bcrypt::hash("Userpassword", TEST_COST).unwrap(),
            role: Role::User,
        })
        .await;
    users
        .insert(Credential {
            subject_id: Uuid::new_v4(),
            email: "admin@example.com".to_string(),
            password_hash: bcrypt::hash("Adminpassword", TEST_COST).unwrap(),
            role: Role::Admin,
        })
        .await;

    let authenticator =
        Authenticator::new(codec.clone(), revocation.clone(), users.clone()).unwrap();
    let guard = AccessGuard::new(
        codec.clone(),
        revocation.clone(),
        Arc::new(RoleTable::standard()),
    );

    Fixture {
        codec,
        revocation,
        authenticator,
        guard,
    }
}

async fn fixture() -> Fixture {
    fixture_with_store(Arc::new(MemoryStore::new())).await
}

#[tokio::test]
async fn test_full_session_scenario() {
    let fx = fixture().await;
    let now = Utc::now();

    // Login issues a 15-minute access token and a 30-day refresh token
    let pair = fx
        .authenticator
        .login("user@example.com", "Userpassword", now)
        .await
        .unwrap();
    assert_eq!(pair.access.expires_at, now + Duration::minutes(15));
    assert_eq!(pair.refresh.expires_at, now + Duration::days(30));

    // The access token passes a user-role route
    let user_route = Capability::MinimumRole(Role::User);
    let ctx = fx
        .guard
        .authorize(&pair.access.token, &user_route, now)
        .await
        .unwrap();
    assert_eq!(ctx.role, Role::User);
    let subject = ctx.subject_id;

    // ...but an admin-only route refuses it with Forbidden
    let admin_route = Capability::MinimumRole(Role::Admin);
    assert!(matches!(
        fx.guard.authorize(&pair.access.token, &admin_route, now).await,
        Err(Error::Forbidden)
    ));

    // After the access token expires, the refresh token mints a new one
    // carrying the same role
    let later = now + Duration::minutes(20);
    assert!(matches!(
        fx.guard.authorize(&pair.access.token, &user_route, later).await,
        Err(Error::Expired)
    ));

    let new_access = fx.authenticator.refresh(&pair.refresh.token, later).await.unwrap();
    let ctx = fx
        .guard
        .authorize(&new_access.token, &user_route, later)
        .await
        .unwrap();
    assert_eq!(ctx.role, Role::User);
    assert_eq!(ctx.subject_id, subject);
}

#[tokio::test]
async fn test_verify_preserves_subject_and_role() {
    let fx = fixture().await;
    let now = Utc::now();
    let subject = Uuid::new_v4();

    for role in [Role::Viewer, Role::User, Role::Admin] {
        let issued = fx
            .codec
            .issue(subject, role, TokenKind::Access, now)
            .unwrap();

        // Any instant within the lifetime returns the claims unchanged
        for offset in [0, 60, 14 * 60] {
            let at = now + Duration::seconds(offset);
            let claims = fx.codec.verify(&issued.token, at).unwrap();
            assert_eq!(claims.sub, subject);
            assert_eq!(claims.role, role);
        }
    }
}

#[tokio::test]
async fn test_revoked_token_fails_before_natural_expiry() {
    let fx = fixture().await;
    let now = Utc::now();

    let pair = fx
        .authenticator
        .login("user@example.com", "Userpassword", now)
        .await
        .unwrap();

    fx.authenticator
        .logout(Some(&pair.access.token), Some(&pair.refresh.token), now)
        .await
        .unwrap();

    // Still minutes away from natural expiry, yet rejected
    let soon = now + Duration::minutes(1);
    let result = fx
        .guard
        .authorize(&pair.access.token, &Capability::MinimumRole(Role::User), soon)
        .await;
    assert!(matches!(result, Err(Error::Revoked)));

    // There is no un-revoke: the same check keeps failing
    let result = fx
        .guard
        .authorize(&pair.access.token, &Capability::MinimumRole(Role::User), soon)
        .await;
    assert!(matches!(result, Err(Error::Revoked)));
}

#[tokio::test]
async fn test_logout_leaves_other_sessions_valid() {
    let fx = fixture().await;
    let now = Utc::now();

    let first = fx
        .authenticator
        .login("user@example.com", "Userpassword", now)
        .await
        .unwrap();
    let second = fx
        .authenticator
        .login("user@example.com", "Userpassword", now)
        .await
        .unwrap();

    fx.authenticator
        .logout(Some(&first.access.token), Some(&first.refresh.token), now)
        .await
        .unwrap();

    let user_route = Capability::MinimumRole(Role::User);
    assert!(matches!(
        fx.guard.authorize(&first.access.token, &user_route, now).await,
        Err(Error::Revoked)
    ));
    assert!(fx
        .guard
        .authorize(&second.access.token, &user_route, now)
        .await
        .is_ok());
    assert!(fx.authenticator.refresh(&second.refresh.token, now).await.is_ok());
}

#[tokio::test]
async fn test_admin_login_reaches_admin_routes() {
    let fx = fixture().await;
    let now = Utc::now();

    let pair = fx
        .authenticator
        .login("admin@example.com", "Adminpassword", now)
        .await
        .unwrap();

    let ctx = fx
        .guard
        .authorize(&pair.access.token, &Capability::MinimumRole(Role::Admin), now)
        .await
        .unwrap();
    assert_eq!(ctx.role, Role::Admin);
}

#[tokio::test]
async fn test_revocation_check_fails_closed_when_store_is_down() {
    let fx = fixture_with_store(Arc::new(FailingStore)).await;
    let now = Utc::now();

    let pair = fx
        .authenticator
        .login("user@example.com", "Userpassword", now)
        .await
        .unwrap();

    // The token itself is valid, but the revocation check cannot run:
    // the guard must deny with a retryable infrastructure error.
    let result = fx
        .guard
        .authorize(&pair.access.token, &Capability::MinimumRole(Role::User), now)
        .await;
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));

    // Refresh hits the same wall
    let result = fx.authenticator.refresh(&pair.refresh.token, now).await;
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));
}

#[tokio::test]
async fn test_rate_limiter_fails_open_while_guard_fails_closed() {
    let fx = fixture_with_store(Arc::new(FailingStore)).await;
    let now = Utc::now();

    let pair = fx
        .authenticator
        .login("user@example.com", "Userpassword", now)
        .await
        .unwrap();

    let limiter = RateLimiter::new(Arc::new(FailingStore), 1, std::time::Duration::from_secs(60));
    let app = Router::new()
        .route("/open", get(|| async { "ok" }))
        .layer(from_fn_with_state(limiter, rate_limit_middleware))
        .merge(
            Router::new()
                .route("/guarded", get(|| async { "ok" }))
                .layer(from_fn_with_state(
                    fx.guard.require(Capability::MinimumRole(Role::User)),
                    require_capability,
                )),
        );

    // With the store down the limiter lets requests through, even well
    // past its configured maximum of one.
    let addr: SocketAddr = "10.0.0.9:40000".parse().unwrap();
    for _ in 0..3 {
        let mut request = Request::builder()
            .uri("/open")
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // The guard's revocation check cannot run, so the same outage
    // denies protected routes with a retryable error instead.
    let request = Request::builder()
        .uri("/guarded")
        .header("Authorization", format!("Bearer {}", pair.access.token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_logout_fails_closed_on_store_error() {
    let fx = fixture_with_store(Arc::new(FailingStore)).await;
    let now = Utc::now();

    let pair = fx
        .authenticator
        .login("user@example.com", "Userpassword", now)
        .await
        .unwrap();

    // Revocation could not be recorded, so the error must surface
    // rather than pretending the session ended.
    let result = fx
        .authenticator
        .logout(Some(&pair.access.token), None, now)
        .await;
    assert!(matches!(result, Err(Error::StoreUnavailable(_))));
}

#[tokio::test]
async fn test_revocation_entry_never_outlives_token() {
    let fx = fixture().await;
    let now = Utc::now();

    let issued = fx
        .codec
        .issue(Uuid::new_v4(), Role::User, TokenKind::Access, now)
        .unwrap();
    let claims = fx.codec.verify(&issued.token, now).unwrap();

    // The ttl recorded on logout equals the remaining lifetime
    let in_five = now + Duration::minutes(5);
    let remaining = claims.remaining_lifetime(in_five);
    assert_eq!(remaining.as_secs(), 10 * 60);

    fx.revocation.revoke(claims.jti, remaining).await.unwrap();
    assert!(fx.revocation.is_revoked(claims.jti).await.unwrap());
}
