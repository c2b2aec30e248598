//! Per-client request quotas for the authenticated routes.
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};

use crate::utils::error_detail;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

// Past this many keys a limiter prunes itself before the next check.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// How often `prune_periodically` drops idle clients.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(thiserror::Error, Debug)]
#[error("Too Many Requests")]
pub struct RateLimitExceeded;

impl ResponseError for RateLimitExceeded {
    fn status_code(&self) -> StatusCode {
        StatusCode::TOO_MANY_REQUESTS
    }

    fn error_response(&self) -> HttpResponse {
        error_detail(self.status_code(), "Too Many Requests")
    }
}

/// Allows `times` requests per `period` to each client address.
pub struct RateLimit {
    limiter: KeyedLimiter,
}

impl RateLimit {
    pub fn new(times: u32, period: Duration) -> Self {
        let burst = NonZeroU32::new(times).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(period / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    pub fn check(&self, request: &HttpRequest) -> Result<(), RateLimitExceeded> {
        if self.limiter.len() >= MAX_TRACKED_CLIENTS {
            self.retain_recent();
        }
        let key = client_key(request);
        self.limiter.check_key(&key).map_err(|_| {
            tracing::warn!(client = %key, "Rate limit exceeded");
            RateLimitExceeded
        })
    }

    /// Forget clients whose quota is fully replenished.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

// Honors `Forwarded`/`X-Forwarded-For`, falls back to the peer address.
// Ports are dropped: every connection of a client shares one quota.
fn client_key(request: &HttpRequest) -> String {
    let info = request.connection_info();
    match info.realip_remote_addr() {
        Some(addr) => addr
            .parse::<SocketAddr>()
            .map(|socket| socket.ip().to_string())
            .unwrap_or_else(|_| addr.to_string()),
        None => "unknown".to_string(),
    }
}

/// One quota per limited route.
pub struct RateLimits {
    pub myself: RateLimit,
    pub change_avatar: RateLimit,
    pub get_contacts: RateLimit,
    pub get_contact: RateLimit,
    pub create_contact: RateLimit,
    pub update_contact: RateLimit,
    pub delete_contact: RateLimit,
    pub update_status_contact: RateLimit,
    pub search_contacts: RateLimit,
    pub birthday_contacts: RateLimit,
}

impl RateLimits {
    fn all(&self) -> [&RateLimit; 10] {
        [
            &self.myself,
            &self.change_avatar,
            &self.get_contacts,
            &self.get_contact,
            &self.create_contact,
            &self.update_contact,
            &self.delete_contact,
            &self.update_status_contact,
            &self.search_contacts,
            &self.birthday_contacts,
        ]
    }

    pub fn retain_recent(&self) {
        for limit in self.all() {
            limit.retain_recent();
        }
    }
}

/// Prune every limiter each `period`, for as long as the server runs.
pub async fn prune_periodically(limits: Arc<RateLimits>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        limits.retain_recent();
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        let minute = Duration::from_secs(60);
        Self {
            myself: RateLimit::new(2, Duration::from_secs(20)),
            change_avatar: RateLimit::new(1, minute),
            get_contacts: RateLimit::new(10, minute),
            get_contact: RateLimit::new(10, minute),
            create_contact: RateLimit::new(5, minute),
            update_contact: RateLimit::new(3, minute),
            delete_contact: RateLimit::new(1, minute),
            update_status_contact: RateLimit::new(3, minute),
            search_contacts: RateLimit::new(10, minute),
            birthday_contacts: RateLimit::new(10, minute),
        }
    }
}
