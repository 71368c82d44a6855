//! Rate limit manager
//!
//! Holds one limiter per endpoint name. Endpoints without a declared limit
//! have no limiter and never wait.

use super::limiter::{RateLimitSpec, RateLimiter};
use crate::error::Result;
use crate::sleep::Sleeper;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Registry of per-endpoint limiters
#[derive(Debug, Default, Clone)]
pub struct RateLimitManager {
    limiters: HashMap<String, Arc<RateLimiter>>,
}

impl RateLimitManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) the limiter for an endpoint
    pub fn create_limiter(
        &mut self,
        endpoint: impl Into<String>,
        spec: &RateLimitSpec,
    ) -> Result<()> {
        let endpoint = endpoint.into();
        let limiter = RateLimiter::new(spec)?;
        debug!(endpoint = %endpoint, rate = spec.rate, "Created rate limiter");
        self.limiters.insert(endpoint, Arc::new(limiter));
        Ok(())
    }

    /// Limiter for an endpoint, if one was configured
    pub fn get_limiter(&self, endpoint: &str) -> Option<&RateLimiter> {
        self.limiters.get(endpoint).map(Arc::as_ref)
    }

    /// Whether an endpoint is rate limited
    pub fn has_limiter(&self, endpoint: &str) -> bool {
        self.limiters.contains_key(endpoint)
    }

    /// Number of rate-limited endpoints
    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    /// Wait for permission to call an endpoint; returns the time waited
    pub async fn acquire(&self, endpoint: &str, sleeper: &dyn Sleeper) -> Duration {
        match self.limiters.get(endpoint) {
            Some(limiter) => limiter.acquire(sleeper).await,
            None => Duration::ZERO,
        }
    }

    /// Feed response headers to the endpoint's limiter
    pub fn update_from_response(&self, endpoint: &str, headers: &HeaderMap) {
        if let Some(limiter) = self.limiters.get(endpoint) {
            limiter.update_from_headers(headers);
        }
    }
}
