//! Injectable sleep primitive
//!
//! Every wait in the crate (retry backoff, SSE reconnect delay, rate-limit
//! throttling) goes through a [`Sleeper`], so tests can observe and skip
//! waits deterministically.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Something that can pause the current task
#[async_trait]
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    /// Wait for the given duration
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by `tokio::time::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Sleeper that records requested durations and returns immediately.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All durations requested so far, in order
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().clone()
    }

    /// Number of sleeps requested
    pub fn count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.calls.lock().push(duration);
        // Let other tasks (and the wall clock) make progress.
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_sleeper_records_in_order() {
        let sleeper = RecordingSleeper::new();
        let shared = sleeper.clone();

        sleeper.sleep(Duration::from_millis(100)).await;
        sleeper.sleep(Duration::from_secs(2)).await;

        assert_eq!(
            shared.calls(),
            vec![Duration::from_millis(100), Duration::from_secs(2)]
        );
        assert_eq!(shared.count(), 2);
    }

    #[tokio::test]
    async fn test_tokio_sleeper_zero_is_immediate() {
        TokioSleeper.sleep(Duration::ZERO).await;
    }
}
