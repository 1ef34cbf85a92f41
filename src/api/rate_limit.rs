//! Per-client-IP rate limiting.
//!
//! Token buckets keyed by client IP. Login, retrieval and the general API
//! each get their own limiter so brute forcing one cannot starve another.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::error::ApiError;
use crate::auth::middleware::client_ip;
use crate::config::RateLimitConfig;

/// Buckets kept before idle, fully refilled ones are dropped
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    last_refill: Instant,
    /// Tokens per second
    refill_rate_per_sec: f64,
}

impl TokenBucket {
    fn new(max_tokens: u32, refill_period: Duration) -> Self {
        let refill_rate_per_sec = max_tokens as f64 / refill_period.as_secs_f64();
        Self {
            tokens: max_tokens as f64,
            max_tokens: max_tokens as f64,
            last_refill: Instant::now(),
            refill_rate_per_sec,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate_per_sec).min(self.max_tokens);
        self.last_refill = now;
    }

    /// `Err(retry_after_secs)` when empty.
    fn try_consume(&mut self) -> Result<(), u32> {
        self.refill(Instant::now());

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let seconds_until_refill = (1.0 - self.tokens) / self.refill_rate_per_sec;
            Err(seconds_until_refill.ceil().max(1.0) as u32)
        }
    }

    fn is_full(&mut self, now: Instant) -> bool {
        self.refill(now);
        self.tokens >= self.max_tokens
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    name: &'static str,
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    max_tokens: u32,
    refill_period: Duration,
}

impl RateLimiter {
    /// `max_tokens` requests per `refill_period` for each key.
    pub fn new(name: &'static str, max_tokens: u32, refill_period: Duration) -> Self {
        Self { name, buckets: Arc::new(Mutex::new(HashMap::new())), max_tokens, refill_period }
    }

    /// `Err(retry_after_secs)` when the key is over its limit.
    pub async fn check_rate_limit(&self, key: &str) -> Result<(), u32> {
        let mut buckets = self.buckets.lock().await;

        if buckets.len() >= PRUNE_THRESHOLD {
            let now = Instant::now();
            buckets.retain(|_, bucket| !bucket.is_full(now));
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.max_tokens, self.refill_period));

        match bucket.try_consume() {
            Ok(()) => {
                debug!(
                    limiter = self.name,
                    key = %key,
                    remaining_tokens = bucket.tokens as u32,
                    "Rate limit check passed"
                );
                Ok(())
            }
            Err(retry_after) => {
                warn!(
                    limiter = self.name,
                    key = %key,
                    retry_after_seconds = retry_after,
                    "Rate limit exceeded"
                );
                Err(retry_after)
            }
        }
    }
}

/// The three limiters; `None` when rate limiting is disabled.
#[derive(Debug, Clone, Default)]
pub struct RateLimiters {
    pub login: Option<RateLimiter>,
    pub retrieval: Option<RateLimiter>,
    pub api: Option<RateLimiter>,
}

impl RateLimiters {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::default();
        }

        Self {
            login: Some(RateLimiter::new(
                "login",
                config.login_max_requests,
                Duration::from_secs(config.login_window_seconds),
            )),
            retrieval: Some(RateLimiter::new(
                "retrieval",
                config.retrieval_max_requests,
                Duration::from_secs(config.retrieval_window_seconds),
            )),
            api: Some(RateLimiter::new(
                "api",
                config.api_max_requests,
                Duration::from_secs(config.api_window_seconds),
            )),
        }
    }
}

/// Middleware keyed by the client IP. Requests without a resolvable IP
/// share one bucket.
pub async fn limit_by_client_ip(
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_ip(request.headers(), request.extensions())
        .unwrap_or_else(|| "unknown".to_string());

    limiter.check_rate_limit(&key).await.map_err(ApiError::too_many_requests)?;
    Ok(next.run(request).await)
}
