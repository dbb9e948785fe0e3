use std::{future::Future, time::Duration};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};

/// Reusable retry primitive: bounded attempt count with exponential backoff
/// and jitter, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Attempt ceiling used for off-chain vote submission.
    pub fn offchain_vote() -> Self {
        Self::new(10, Duration::from_secs(1), Duration::from_secs(30))
    }

    pub async fn run<A, F, T, E>(&self, action: A) -> Result<T, E>
    where
        A: FnMut() -> F,
        F: Future<Output = Result<T, E>>,
    {
        let factor = (self.base_delay.as_millis() as u64 / 2).max(1);
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1));

        Retry::spawn(strategy, action).await
    }
}
