//! Request guard: per-client rate limiting in front of a GET response cache.
//!
//! Order of operations for each request:
//! 1. resolve the client id (API key, forwarded address, or "unknown")
//! 2. count the request against the client's window, rejecting with 429
//! 3. serve a fresh cached GET response without calling the handler
//! 4. call the handler, timing it
//! 5. store successful GET responses that do not forbid caching
//!
//! The guard owns its limiter and cache. Clones share the same state, so
//! one guard built at startup covers every worker.

use actix_web::{
    body::{self, BoxBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{
        header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
        Method,
    },
    Error, HttpResponse,
};
use futures_util::future::LocalBoxFuture;
use serde::Serialize;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};
use tracing::{debug, warn};

use super::cache::{CacheConfig, CachedResponse, ResponseCache};
use super::rate_limit::{
    retry_after_secs, ClientRateLimiter, RateLimitConfig, RateLimitDecision, RateLimitStatus,
};
use crate::clock::{SharedClock, SystemClock};
use crate::errors::ApiError;
use crate::metrics;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Paths that bypass the limiter, the cache and the guard's own counters
const EXEMPT_PATHS: [&str; 3] = ["/health", "/metrics", "/api/v1/guard/stats"];

/// Client bucket for a request: API key, then first forwarded hop, then real IP.
pub fn client_identifier(headers: &HeaderMap) -> String {
    if let Some(key) = header_str(headers, API_KEY_HEADER) {
        return format!("key:{}", key);
    }

    if let Some(forwarded) = header_str(headers, FORWARDED_FOR_HEADER) {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|hop| !hop.is_empty()) {
            return format!("ip:{}", first);
        }
    }

    if let Some(ip) = header_str(headers, REAL_IP_HEADER) {
        return format!("ip:{}", ip);
    }

    UNKNOWN_CLIENT.to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Headers the guard writes itself, never replayed from the cache
fn is_guard_header(name: &HeaderName) -> bool {
    *name == CONTENT_TYPE
        || *name == CACHE_CONTROL
        || *name == CONTENT_LENGTH
        || name.as_str() == "x-cache"
        || name.as_str().starts_with("x-ratelimit-")
}

/// True when a Cache-Control header carries no-cache or no-store
fn forbids_caching(headers: &HeaderMap) -> bool {
    headers
        .get_all(CACHE_CONTROL)
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|directive| directive.trim().to_ascii_lowercase())
        .any(|directive| directive == "no-cache" || directive == "no-store")
}

#[derive(Debug, Default)]
struct GuardCounters {
    total_requests: AtomicU64,
    blocked_requests: AtomicU64,
    handler_calls: AtomicU64,
    handler_micros: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

/// Point-in-time view of the guard counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardStats {
    pub total_requests: u64,
    pub blocked_requests: u64,
    pub handler_calls: u64,
    pub average_latency_ms: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_ratio: f64,
    pub cache_entries: usize,
    pub tracked_clients: usize,
}

struct GuardState {
    limiter: ClientRateLimiter,
    cache: ResponseCache,
    counters: GuardCounters,
}

impl GuardState {
    fn record_handler(&self, elapsed: StdDuration) {
        self.counters.handler_calls.fetch_add(1, Ordering::Relaxed);
        self.counters
            .handler_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        metrics::HANDLER_DURATION.observe(elapsed.as_secs_f64());
    }

    fn record_hit(&self) {
        self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
        metrics::CACHE_HITS.inc();
    }

    fn record_miss(&self) {
        self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
        metrics::CACHE_MISSES.inc();
    }

    fn cache_control(&self) -> String {
        format!("public, max-age={}", self.cache.ttl().num_seconds())
    }
}

#[derive(Clone)]
pub struct RequestGuard {
    state: Arc<GuardState>,
}

impl RequestGuard {
    pub fn new(rate_limit: RateLimitConfig, cache: CacheConfig) -> Self {
        Self::with_clock(rate_limit, cache, Arc::new(SystemClock))
    }

    pub fn with_clock(rate_limit: RateLimitConfig, cache: CacheConfig, clock: SharedClock) -> Self {
        Self {
            state: Arc::new(GuardState {
                limiter: ClientRateLimiter::new(rate_limit, clock.clone()),
                cache: ResponseCache::new(cache, clock),
                counters: GuardCounters::default(),
            }),
        }
    }

    pub fn limiter(&self) -> &ClientRateLimiter {
        &self.state.limiter
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.state.cache
    }

    pub fn stats(&self) -> GuardStats {
        let c = &self.state.counters;
        let handler_calls = c.handler_calls.load(Ordering::Relaxed);
        let handler_micros = c.handler_micros.load(Ordering::Relaxed);
        let cache_hits = c.cache_hits.load(Ordering::Relaxed);
        let cache_misses = c.cache_misses.load(Ordering::Relaxed);

        let average_latency_ms = if handler_calls == 0 {
            0.0
        } else {
            handler_micros as f64 / handler_calls as f64 / 1000.0
        };

        let lookups = cache_hits + cache_misses;
        let cache_hit_ratio = if lookups == 0 {
            0.0
        } else {
            cache_hits as f64 / lookups as f64
        };

        GuardStats {
            total_requests: c.total_requests.load(Ordering::Relaxed),
            blocked_requests: c.blocked_requests.load(Ordering::Relaxed),
            handler_calls,
            average_latency_ms,
            cache_hits,
            cache_misses,
            cache_hit_ratio,
            cache_entries: self.state.cache.len(),
            tracked_clients: self.state.limiter.tracked_clients(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestGuardMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestGuardMiddleware {
            service: Rc::new(service),
            state: self.state.clone(),
        }))
    }
}

pub struct RequestGuardMiddleware<S> {
    service: Rc<S>,
    state: Arc<GuardState>,
}

impl<S, B> Service<ServiceRequest> for RequestGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let state = self.state.clone();

        Box::pin(async move {
            if EXEMPT_PATHS.contains(&req.path()) {
                let res = service.call(req).await?;
                return Ok(res.map_into_boxed_body());
            }

            state.counters.total_requests.fetch_add(1, Ordering::Relaxed);

            let client_id = client_identifier(req.headers());
            let quota = match state.limiter.check(&client_id) {
                RateLimitDecision::Allowed(status) => status,
                RateLimitDecision::Limited {
                    status,
                    retry_after,
                } => {
                    state.counters.blocked_requests.fetch_add(1, Ordering::Relaxed);
                    metrics::RATE_LIMITED_TOTAL.inc();
                    metrics::HTTP_REQUESTS_TOTAL
                        .with_label_values(&[req.method().as_str(), "429"])
                        .inc();
                    warn!("Rate limit exceeded for {} on {}", client_id, req.path());

                    let err = ApiError::RateLimited {
                        limit: status.limit,
                        reset_at: status.reset_at,
                        retry_after_secs: retry_after_secs(retry_after),
                    };
                    return Ok(req.error_response(err));
                }
            };

            let cache_key = (state.cache.enabled()
                && req.method() == Method::GET
                && !forbids_caching(req.headers()))
            .then(|| ResponseCache::key(req.method().as_str(), req.path(), req.query_string()));

            if let Some(key) = &cache_key {
                match state.cache.get(key) {
                    Some(cached) => {
                        state.record_hit();
                        metrics::HTTP_REQUESTS_TOTAL
                            .with_label_values(&[req.method().as_str(), cached.status.as_str()])
                            .inc();
                        debug!("Cache hit: {}", key);

                        let mut response = cached_response(&cached, &state.cache_control());
                        apply_quota_headers(response.headers_mut(), &quota);
                        return Ok(req.into_response(response));
                    }
                    None => state.record_miss(),
                }
            }

            let method = req.method().clone();
            let started = Instant::now();
            let result = service.call(req).await;
            state.record_handler(started.elapsed());

            let mut res = result?;
            metrics::HTTP_REQUESTS_TOTAL
                .with_label_values(&[method.as_str(), res.status().as_str()])
                .inc();
            apply_quota_headers(res.headers_mut(), &quota);

            let key = match cache_key {
                Some(key) if res.status().is_success() && !forbids_caching(res.headers()) => key,
                _ => return Ok(res.map_into_boxed_body()),
            };

            let (http_req, http_res) = res.into_parts();
            let (mut http_res, body) = http_res.into_parts();
            let bytes = body::to_bytes(body).await.map_err(|e| {
                let err: Box<dyn std::error::Error> = e.into();
                ApiError::InternalError(format!("Failed to read response body: {}", err))
            })?;

            let content_type = http_res
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);

            let headers = http_res
                .headers()
                .iter()
                .filter(|(name, _)| !is_guard_header(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();

            let evicted = state.cache.insert(
                key,
                CachedResponse {
                    status: http_res.status(),
                    content_type,
                    headers,
                    body: bytes.clone(),
                },
            );
            if evicted.is_some() {
                metrics::CACHE_EVICTIONS.inc();
            }

            let headers = http_res.headers_mut();
            headers.insert(HeaderName::from_static("x-cache"), HeaderValue::from_static("MISS"));
            if let Ok(value) = HeaderValue::from_str(&state.cache_control()) {
                headers.insert(CACHE_CONTROL, value);
            }

            let http_res = http_res.set_body(bytes).map_into_boxed_body();
            Ok(ServiceResponse::new(http_req, http_res))
        })
    }
}

fn cached_response(cached: &CachedResponse, cache_control: &str) -> HttpResponse {
    let content_type = cached
        .content_type
        .as_deref()
        .unwrap_or("application/json");

    let mut builder = HttpResponse::build(cached.status);
    for (name, value) in &cached.headers {
        builder.append_header((name.clone(), value.clone()));
    }

    builder
        .insert_header((CONTENT_TYPE, content_type))
        .insert_header(("X-Cache", "HIT"))
        .insert_header((CACHE_CONTROL, cache_control))
        .body(cached.body.clone())
}

fn apply_quota_headers(headers: &mut HeaderMap, quota: &RateLimitStatus) {
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(quota.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(quota.remaining),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(quota.reset_at.timestamp()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_client_identifier_prefers_api_key() {
        let req = TestRequest::default()
            .insert_header(("X-API-Key", "abc123"))
            .insert_header(("X-Forwarded-For", "10.0.0.1"))
            .to_http_request();
        assert_eq!(client_identifier(req.headers()), "key:abc123");
    }

    #[test]
    fn test_client_identifier_uses_first_forwarded_hop() {
        let req = TestRequest::default()
            .insert_header(("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .to_http_request();
        assert_eq!(client_identifier(req.headers()), "ip:203.0.113.7");
    }

    #[test]
    fn test_client_identifier_falls_back() {
        let req = TestRequest::default()
            .insert_header(("X-Real-IP", "198.51.100.4"))
            .to_http_request();
        assert_eq!(client_identifier(req.headers()), "ip:198.51.100.4");

        let req = TestRequest::default().to_http_request();
        assert_eq!(client_identifier(req.headers()), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_forbids_caching() {
        let req = TestRequest::default()
            .insert_header((CACHE_CONTROL, "private, No-Store"))
            .to_http_request();
        assert!(forbids_caching(req.headers()));

        let req = TestRequest::default()
            .insert_header((CACHE_CONTROL, "max-age=60"))
            .to_http_request();
        assert!(!forbids_caching(req.headers()));
    }

    #[test]
    fn test_stats_start_empty() {
        let guard = RequestGuard::new(RateLimitConfig::default(), CacheConfig::default());
        let stats = guard.stats();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.cache_hit_ratio, 0.0);
        assert_eq!(stats.average_latency_ms, 0.0);
    }
}
