//! Per-route request rate limiting keyed by client address
//!
//! Fixed window over the ephemeral store's atomic INCR/EXPIRE: the
//! first request in a window creates the counter and stamps the window
//! TTL, later requests increment it. The counter keeps counting past
//! the threshold but every request above it is denied, so the policy
//! is uniform. Applied only to routes explicitly wrapped with
//! [`rate_limit_middleware`] (unauthenticated ones such as login).

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RateLimitConfig;
use crate::error::Error;
use crate::store::{KeyValueStore, StoreError};

const KEY_PREFIX: &str = "ratelimit:";

#[derive(Debug, PartialEq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Throttled { retry_after: Duration },
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window,
        }
    }

    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &RateLimitConfig) -> Self {
        Self::new(
            store,
            config.max_requests,
            Duration::from_secs(config.window_secs),
        )
    }

    /// Count this request against the client's window for the route and
    /// decide whether it may proceed.
    pub async fn check_and_increment(
        &self,
        client_id: &str,
        route_id: &str,
    ) -> Result<RateDecision, StoreError> {
        let key = format!("{}{}:{}", KEY_PREFIX, client_id, route_id);

        let count = self.store.incr(&key).await?;
        if count == 1 {
            // New window; entries without a TTL never expire. A counter
            // that misses its stamp would throttle the client forever
            // once over threshold, so retry once before surfacing the
            // failure.
            if let Err(e) = self.store.expire(&key, self.window).await {
                tracing::warn!(error = %e, "window stamp failed, retrying");
                self.store.expire(&key, self.window).await?;
            }
        }

        if count > self.max_requests as i64 {
            Ok(RateDecision::Throttled {
                retry_after: self.window,
            })
        } else {
            Ok(RateDecision::Allowed {
                remaining: self.max_requests - count as u32,
            })
        }
    }
}

/// Rate limiting middleware for designated routes.
///
/// The client identifier is the request's source address; no
/// authentication context is required. A store failure fails open with
/// a warning: the limiter protects capacity, and taking every request
/// down with the store would invert that purpose (see DESIGN.md).
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = addr.ip().to_string();
    let route = request.uri().path().to_string();

    match limiter.check_and_increment(&client, &route).await {
        Ok(RateDecision::Allowed { .. }) => next.run(request).await,
        Ok(RateDecision::Throttled { retry_after }) => {
            tracing::warn!(ip = %client, route = %route, "rate limit exceeded");
            Error::Throttled {
                retry_after_secs: retry_after.as_secs(),
            }
            .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "rate limit store unavailable, allowing request");
            next.run(request).await
        }
    }
}
