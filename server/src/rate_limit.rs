use std::{
    net::{IpAddr, Ipv4Addr},
    time::{Duration, Instant},
};

use dashmap::DashMap;
use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
};
use tracing::{debug, instrument, warn};

/// Token bucket refilled to capacity once per `refill_interval`.
#[derive(Debug)]
struct TokenBucket {
    last_refill: Instant,
    tokens: u32,
    capacity: u32,
    refill_interval: Duration,
}

impl TokenBucket {
    fn new(capacity: u32, refill_interval: Duration, now: Instant) -> Self {
        Self {
            last_refill: now,
            tokens: capacity,
            capacity,
            refill_interval,
        }
    }

    fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            debug!("Token consumed, remaining: {}", self.tokens);
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if !self.refill_interval.is_zero() && elapsed < self.refill_interval {
            return;
        }
        if self.tokens != self.capacity {
            debug!(
                "Token bucket refilled: {} -> {} tokens",
                self.tokens, self.capacity
            );
        }
        self.tokens = self.capacity;
        self.last_refill = now;
    }
}

/// Per-client limit on game creation.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<IpAddr, TokenBucket>,
    capacity: u32,
    refill_interval: Duration,
}

impl RateLimiter {
    pub fn per_minute(capacity: u32) -> Self {
        Self::new(capacity, Duration::from_secs(60))
    }

    pub fn new(capacity: u32, refill_interval: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity,
            refill_interval,
        }
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), Status> {
        self.check_at(ip, Instant::now())
    }

    #[instrument(level = "trace", skip(self, now))]
    fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), Status> {
        let mut bucket = self
            .buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_interval, now));

        if bucket.try_consume(now) {
            debug!("Rate limit check passed for {}", ip);
            Ok(())
        } else {
            warn!("Rate limit exceeded for {} - rejecting request", ip);
            Err(Status::TooManyRequests)
        }
    }
}

/// Best guess at the caller's address, honouring reverse-proxy headers.
#[derive(Debug)]
pub struct ClientIp(pub IpAddr);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let ip = req
            .headers()
            .get_one("X-Forwarded-For")
            .and_then(|header| header.split(',').next())
            .and_then(|ip| ip.trim().parse().ok())
            .or_else(|| {
                req.headers()
                    .get_one("X-Real-IP")
                    .and_then(|ip| ip.trim().parse().ok())
            })
            .or_else(|| req.client_ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        request::Outcome::Success(ClientIp(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    const BOB: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

    #[test]
    fn exhausts_then_refills_after_interval() {
        let limiter = RateLimiter::per_minute(2);
        let start = Instant::now();

        assert_eq!(limiter.check_at(ALICE, start), Ok(()));
        assert_eq!(limiter.check_at(ALICE, start), Ok(()));
        assert_eq!(
            limiter.check_at(ALICE, start + Duration::from_secs(30)),
            Err(Status::TooManyRequests)
        );
        assert_eq!(
            limiter.check_at(ALICE, start + Duration::from_secs(61)),
            Ok(())
        );
    }

    #[test]
    fn clients_have_separate_buckets() {
        let limiter = RateLimiter::per_minute(1);
        let now = Instant::now();

        assert_eq!(limiter.check_at(ALICE, now), Ok(()));
        assert_eq!(limiter.check_at(ALICE, now), Err(Status::TooManyRequests));
        assert_eq!(limiter.check_at(BOB, now), Ok(()));
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let limiter = RateLimiter::per_minute(0);
        assert_eq!(limiter.check(ALICE), Err(Status::TooManyRequests));
    }
}
