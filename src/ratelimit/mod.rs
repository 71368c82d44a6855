//! Rate limiting module
//!
//! One limiter per endpoint, created only for endpoints that declare a
//! `rate_limit`. Every outbound call passes through
//! [`RateLimitManager::acquire`], and every response (successful or not)
//! is fed back through [`RateLimitManager::update_from_response`].
//!
//! # Example
//!
//! ```rust,ignore
//! let mut manager = RateLimitManager::new();
//! manager.create_limiter("users", &RateLimitSpec::token_bucket(10.0, 1))?;
//! manager.acquire("users", &TokioSleeper).await;
//! ```

mod headers;
mod limiter;
mod manager;

pub use headers::RateLimitHeaders;
pub use limiter::{RateLimitSpec, RateLimitStrategy, RateLimiter, ServerHints};
pub use manager::RateLimitManager;
