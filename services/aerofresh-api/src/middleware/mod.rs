pub mod cache;
pub mod guard;
pub mod rate_limit;

pub use cache::{CacheConfig, CachedResponse, ResponseCache};
pub use guard::{client_identifier, GuardStats, RequestGuard};
pub use rate_limit::{ClientRateLimiter, RateLimitConfig, RateLimitDecision, RateLimitStatus};
