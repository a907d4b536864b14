//! HTTP API server

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::{
    require_capability, AccessGuard, Authenticator, Capability, Credential, CredentialStore,
    InMemoryCredentialStore, RevocationList, Role, RoleTable, TokenCodec,
};
use crate::config::Config;
use crate::error::Result;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::store::{KeyValueStore, MemoryStore};

use super::routes;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
    pub guard: AccessGuard,
    pub limiter: RateLimiter,
    /// Role assigned to accounts created through signup.
    pub default_role: Role,
}

impl AppState {
    /// Wire all components against the given stores.
    pub fn new(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        users: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let codec = Arc::new(TokenCodec::new(&config.auth)?);
        let revocation = RevocationList::new(store.clone());
        let roles = Arc::new(RoleTable::standard());

        let authenticator = Arc::new(Authenticator::new(
            codec.clone(),
            revocation.clone(),
            users,
        )?);
        let guard = AccessGuard::new(codec, revocation, roles);
        let limiter = RateLimiter::from_config(store, &config.rate_limit);

        Ok(Self {
            authenticator,
            guard,
            limiter,
            default_role: config.auth.default_role,
        })
    }
}

/// Run the HTTP API server
pub async fn run_server(config: Config) -> Result<()> {
    config.validate()?;

    let store = Arc::new(MemoryStore::new());
    let users = Arc::new(InMemoryCredentialStore::new());
    seed_users(&config, &users).await;

    let state = AppState::new(&config, store, users)?;
    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Load configured accounts into the in-memory credential store.
async fn seed_users(config: &Config, users: &InMemoryCredentialStore) {
    for seed in &config.users {
        users
            .insert(Credential {
                subject_id: Uuid::new_v4(),
                email: seed.email.clone(),
                password_hash: seed.password_hash.clone(),
                role: seed.role,
            })
            .await;
        tracing::info!(email = %seed.email, role = %seed.role, "seeded credential");
    }
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    // Unauthenticated routes carry the rate limiter keyed by source
    // address; the authenticated ones are gated per capability instead.
    let public = Router::new()
        .route("/auth/signup", post(routes::signup))
        .route("/auth/login", post(routes::login))
        .layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));

    // Refresh and logout validate the presented tokens themselves.
    let session = Router::new()
        .route("/auth/refresh", post(routes::refresh))
        .route("/auth/logout", post(routes::logout));

    let authenticated = Router::new()
        .route("/auth/me", get(routes::me))
        .layer(middleware::from_fn_with_state(
            state.guard.require(Capability::MinimumRole(Role::Viewer)),
            require_capability,
        ));

    let admin = Router::new()
        .route("/admin/status", get(routes::admin_status))
        .layer(middleware::from_fn_with_state(
            state.guard.require(Capability::MinimumRole(Role::Admin)),
            require_capability,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .merge(public)
        .merge(session)
        .merge(authenticated)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
