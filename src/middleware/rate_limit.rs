//! Login throttling middleware.
//!
//! Fixed window per client IP, in memory. Requests without a known client
//! address share one bucket.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Attempts allowed per window
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

/// Shared attempt counters
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<IpAddr, Window>>>,
}

struct Window {
    count: u32,
    started: Instant,
}

#[derive(Debug, PartialEq)]
enum Decision {
    Allowed { remaining: u32 },
    Exceeded { retry_after: Duration },
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn check(&self, ip: IpAddr) -> Decision {
        let mut state = self.state.lock();
        let now = Instant::now();

        let window = state.entry(ip).or_insert(Window {
            count: 0,
            started: now,
        });
        if now.duration_since(window.started) >= self.config.window {
            window.count = 0;
            window.started = now;
        }

        window.count += 1;
        if window.count > self.config.max_requests {
            Decision::Exceeded {
                retry_after: (window.started + self.config.window).saturating_duration_since(now),
            }
        } else {
            Decision::Allowed {
                remaining: self.config.max_requests - window.count,
            }
        }
    }

    /// Drop windows that have expired (run from a background task)
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.config.window;
        self.state
            .lock()
            .retain(|_, w| now.duration_since(w.started) < window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.state.lock().len()
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = connect_info
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match limiter.check(ip) {
        Decision::Allowed { remaining } => {
            debug!(ip = %ip, remaining = remaining, "Login attempt allowed");
            next.run(request).await
        }
        Decision::Exceeded { retry_after } => {
            let retry_secs = retry_after.as_secs().max(1);
            warn!(
                ip = %ip,
                retry_after_secs = retry_secs,
                "Login rate limit exceeded"
            );

            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_secs.to_string())],
                Json(serde_json::json!({
                    "success": false,
                    "error": "Too many login attempts. Please try again later.",
                })),
            )
                .into_response()
        }
    }
}
