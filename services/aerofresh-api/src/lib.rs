pub mod clock;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use database::{AircraftStore, MemoryStore, PgStore};
pub use errors::{ApiError, ApiResult};
pub use middleware::RequestGuard;
