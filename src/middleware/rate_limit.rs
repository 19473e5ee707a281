use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header;
use actix_web::{Error, HttpMessage, HttpResponse};
use futures::future::LocalBoxFuture;
use std::collections::HashMap;
use std::future::{ready, Ready};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::models::AuthenticatedUser;

/// Fixed rejection message shared by every limiter.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit reached (no more requests can be sent)";

/// Stale windows are pruned once a limiter's key table grows past this.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u64,
}

/// Fixed-window limiter keyed by authenticated user id (when a verifier ran
/// earlier in the chain) or client IP. One instance per route, shared
/// across workers.
#[derive(Clone)]
pub struct RateLimit {
    limit: u64,
    window: Duration,
    state: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimit {
    pub fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 3 registrations per hour
    pub fn register() -> Self {
        Self::new(3, Duration::from_secs(60 * 60))
    }

    /// 5 login attempts per 15 minutes
    pub fn login() -> Self {
        Self::new(5, Duration::from_secs(15 * 60))
    }

    /// 60 profile reads per minute
    pub fn me() -> Self {
        Self::new(60, Duration::from_secs(60))
    }

    /// 30 logouts per minute
    pub fn logout() -> Self {
        Self::new(30, Duration::from_secs(60))
    }

    /// 60 catalog filter queries per minute
    pub fn catalog_filter() -> Self {
        Self::new(60, Duration::from_secs(60))
    }

    /// 180 single-title lookups per minute
    pub fn catalog_find_by_code() -> Self {
        Self::new(180, Duration::from_secs(60))
    }

    /// 300 genre listings per minute
    pub fn genre_list() -> Self {
        Self::new(300, Duration::from_secs(60))
    }

    fn check(&self, key: &str, now: Instant) -> Result<(), u64> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if state.len() > PRUNE_THRESHOLD {
            let window = self.window;
            state.retain(|_, entry| now.duration_since(entry.started) < window);
        }

        let entry = state.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.limit {
            let elapsed = now.duration_since(entry.started);
            let retry_after = self.window.saturating_sub(elapsed).as_secs().max(1);
            return Err(retry_after);
        }

        entry.count += 1;
        Ok(())
    }
}

/// First address in `x-forwarded-for`, then `x-real-ip`, then the peer.
fn extract_client_ip(req: &ServiceRequest) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or("unknown").trim().to_string())
        .or_else(|| {
            req.headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| {
            req.peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        })
}

fn rate_limit_key(req: &ServiceRequest) -> String {
    if let Some(user) = req.extensions().get::<AuthenticatedUser>() {
        return user._id.to_hex();
    }
    extract_client_ip(req)
}

fn rate_limit_response(retry_after: u64) -> HttpResponse {
    let mut response = HttpResponse::TooManyRequests().json(serde_json::json!({
        "ok": false,
        "error": RATE_LIMIT_MESSAGE,
    }));

    if let Ok(value) = retry_after.to_string().parse() {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }

    response
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service,
            limiter: self.clone(),
        }))
    }
}

pub struct RateLimitService<S> {
    service: S,
    limiter: RateLimit,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // CORS preflights never count against the window
        if req.method() == actix_web::http::Method::OPTIONS {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await.map(|res| res.map_into_left_body()) });
        }

        let key = rate_limit_key(&req);

        match self.limiter.check(&key, Instant::now()) {
            Ok(()) => {
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(|res| res.map_into_left_body()) })
            }
            Err(retry_after) => {
                log::warn!("Rate limit reached for {} on {}", key, req.path());
                let response = req
                    .into_response(rate_limit_response(retry_after))
                    .map_into_right_body();
                Box::pin(ready(Ok(response)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_within_limit_pass() {
        let limiter = RateLimit::new(3, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check("a", now).is_ok());
        assert!(limiter.check("a", now).is_ok());
        assert!(limiter.check("a", now).is_ok());
    }

    #[test]
    fn test_excess_requests_are_rejected() {
        let limiter = RateLimit::new(2, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check("a", now).is_ok());
        assert!(limiter.check("a", now).is_ok());

        let retry_after = limiter.check("a", now).unwrap_err();
        assert!(retry_after >= 1);
        assert!(retry_after <= 60);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimit::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check("a", now).is_ok());
        assert!(limiter.check("b", now).is_ok());
        assert!(limiter.check("a", now).is_err());
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = RateLimit::new(1, Duration::from_millis(10));
        let now = Instant::now();

        assert!(limiter.check("a", now).is_ok());
        assert!(limiter.check("a", now).is_err());

        let later = now + Duration::from_millis(11);
        assert!(limiter.check("a", later).is_ok());
    }

    #[test]
    fn test_route_presets() {
        assert_eq!(RateLimit::register().limit, 3);
        assert_eq!(RateLimit::register().window, Duration::from_secs(3600));
        assert_eq!(RateLimit::login().limit, 5);
        assert_eq!(RateLimit::login().window, Duration::from_secs(900));
        assert_eq!(RateLimit::me().limit, 60);
        assert_eq!(RateLimit::logout().limit, 30);
        assert_eq!(RateLimit::catalog_filter().limit, 60);
        assert_eq!(RateLimit::catalog_find_by_code().limit, 180);
        assert_eq!(RateLimit::genre_list().limit, 300);
    }

    #[test]
    fn test_clones_share_state() {
        let limiter = RateLimit::new(1, Duration::from_secs(60));
        let clone = limiter.clone();
        let now = Instant::now();

        assert!(limiter.check("a", now).is_ok());
        assert!(clone.check("a", now).is_err());
    }
}
