//! Per-client-IP request limiting backed by a shared counter store.
//!
//! The check reads the counter, compares it to the limit and only then
//! increments, so concurrent requests from one client can overshoot the limit
//! by the number that race past the read. Accepted for a rate limiter.

use std::net::SocketAddr;
use std::ops::DerefMut;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use deadpool_redis::{Config as RedisConfig, Pool as RedisPool, Runtime};
use thiserror::Error;
use tracing::warn;

use crate::error::AppError;
use crate::router::AppState;

pub const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("failed to create redis pool: {0}")]
    CreatePool(#[from] deadpool_redis::CreatePoolError),
}

/// Shared counters keyed by client
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn current(&self, key: &str) -> Result<u64, RateLimitError>;

    /// Increment and (re)arm the key's expiry
    async fn increment(&self, key: &str, window: Duration) -> Result<(), RateLimitError>;
}

pub struct RedisCounterStore {
    pool: RedisPool,
}

impl RedisCounterStore {
    /// Connections are opened lazily on first use
    pub fn from_url(url: &str) -> Result<Self, RateLimitError> {
        let pool = RedisConfig::from_url(url).create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn current(&self, key: &str) -> Result<u64, RateLimitError> {
        let mut conn = self.pool.get().await?;
        let count: Option<u64> = redis::cmd("GET").arg(key).query_async(conn.deref_mut()).await?;
        Ok(count.unwrap_or(0))
    }

    async fn increment(&self, key: &str, window: Duration) -> Result<(), RateLimitError> {
        let mut conn = self.pool.get().await?;
        let _: () = redis::pipe()
            .cmd("INCR")
            .arg(key)
            .ignore()
            .cmd("EXPIRE")
            .arg(key)
            .arg(window.as_secs())
            .ignore()
            .query_async(conn.deref_mut())
            .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    requests_per_minute: u64,
}

/// Outcome of one check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, requests_per_minute: u64) -> Self {
        Self {
            store,
            requests_per_minute,
        }
    }

    pub async fn check(&self, client: &str) -> Result<RateLimitDecision, RateLimitError> {
        let key = format!("rate_limit:{}", client);
        let count = self.store.current(&key).await?;

        if count >= self.requests_per_minute {
            return Ok(RateLimitDecision {
                allowed: false,
                limit: self.requests_per_minute,
                remaining: 0,
            });
        }

        self.store.increment(&key, WINDOW).await?;
        Ok(RateLimitDecision {
            allowed: true,
            limit: self.requests_per_minute,
            remaining: self.requests_per_minute.saturating_sub(count + 1),
        })
    }
}

/// First `X-Forwarded-For` hop, else the socket peer
pub fn client_ip(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return next.run(request).await;
    };

    let client = client_ip(&request);
    let decision = match limiter.check(&client).await {
        Ok(decision) => decision,
        Err(e) => {
            // Counter store unavailable: let the request through
            warn!(client = %client, error = %e, "rate limiter unavailable");
            return next.run(request).await;
        }
    };

    if !decision.allowed {
        warn!(client = %client, limit = decision.limit, "rate limit exceeded");
        return AppError::TooManyRequests.into_response();
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(decision.remaining),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryCounterStore;
    use axum::body::Body;

    #[tokio::test]
    async fn sequential_requests_stop_at_limit() {
        let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::default()), 3);

        for expected_remaining in [2, 1, 0] {
            let d = limiter.check("10.0.0.1").await.unwrap();
            assert!(d.allowed);
            assert_eq!(d.remaining, expected_remaining);
        }
        assert!(!limiter.check("10.0.0.1").await.unwrap().allowed);

        // Other clients have their own window
        assert!(limiter.check("10.0.0.2").await.unwrap().allowed);
    }

    #[tokio::test]
    async fn concurrent_overshoot_is_bounded_by_concurrency() {
        let limit = 10;
        let concurrency = 50;
        let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::default()), limit);

        let handles: Vec<_> = (0..concurrency)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.check("10.0.0.9").await.unwrap().allowed })
            })
            .collect();

        let mut allowed = 0u64;
        for h in handles {
            if h.await.unwrap() {
                allowed += 1;
            }
        }

        assert!(allowed >= limit);
        assert!(allowed <= concurrency);
    }

    #[tokio::test]
    async fn window_expiry_resets_the_counter() {
        let store = Arc::new(MemoryCounterStore::default());
        let limiter = RateLimiter::new(store.clone(), 1);

        assert!(limiter.check("c").await.unwrap().allowed);
        assert!(!limiter.check("c").await.unwrap().allowed);

        store.expire_all().await;
        assert!(limiter.check("c").await.unwrap().allowed);
    }

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 9000))));
        assert_eq!(client_ip(&request), "203.0.113.7");

        request.headers_mut().remove("x-forwarded-for");
        assert_eq!(client_ip(&request), "127.0.0.1");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&bare), "unknown");
    }
}
