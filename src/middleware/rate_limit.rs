// Per-client request throttling keyed by IP address

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, NotUntil, Quota, RateLimiter,
};
use serde_json::json;
use tracing::{debug, warn};

/// Checks between two sweeps of idle client entries
const SWEEP_EVERY: u64 = 1024;

/// Keyed limiter that periodically forgets clients whose quota has fully refilled
pub struct IpRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
    checks: AtomicU64,
    sweep_every: u64,
}

impl IpRateLimiter {
    fn new(quota: Quota, sweep_every: u64) -> Self {
        Self {
            limiter: RateLimiter::keyed(quota),
            checks: AtomicU64::new(0),
            sweep_every: sweep_every.max(1),
        }
    }

    pub fn check(
        &self,
        ip: &IpAddr,
    ) -> Result<(), NotUntil<<DefaultClock as Clock>::Instant>> {
        let checks = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if checks % self.sweep_every == 0 {
            self.sweep();
        }
        self.limiter.check_key(ip)
    }

    /// Drop entries indistinguishable from a client never seen before
    pub fn sweep(&self) {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        debug!(before, after = self.limiter.len(), "Swept rate limiter entries");
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

/// Keyed limiter allowing `per_minute` requests per client, or None if zero
pub fn build_rate_limiter(per_minute: u32) -> Option<Arc<IpRateLimiter>> {
    let per_minute = NonZeroU32::new(per_minute)?;
    Some(Arc::new(IpRateLimiter::new(
        Quota::per_minute(per_minute),
        SWEEP_EVERY,
    )))
}

/// Client address: the socket peer, else the first X-Forwarded-For hop
fn client_ip(request: &Request) -> IpAddr {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }

    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<IpRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    match limiter.check(&ip) {
        Ok(()) => next.run(request).await,
        Err(not_until) => {
            let retry_after = not_until
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1);
            warn!(ip = %ip, retry_after, "Rate limit exceeded");

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "detail": "Too many requests.",
                    "status": StatusCode::TOO_MANY_REQUESTS.as_u16()
                })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            response
        },
    }
}
