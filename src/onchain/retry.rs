//! Bounded exponential backoff for read-only RPC calls.
//!
//! Only reads go through here. Submissions are never retried: a resent
//! `execTransaction` would race the Safe nonce.

use crate::onchain::types::ChainError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Run `op`, retrying on error with a doubling delay: base, 2x, 4x, ...
    pub async fn run<T, F, Fut>(&self, call: &'static str, mut op: F) -> Result<T, ChainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let mut delay = self.base_delay;
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < self.max_retries => {
                    debug!(call, attempt, error = %e, delay_ms = delay.as_millis() as u64, "rpc read failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    if self.max_retries > 0 {
                        warn!(call, attempts = attempt + 1, error = %e, "rpc read failed after retries");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = fast(3)
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ChainError::rpc("test", "connection reset"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = fast(2)
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ChainError::rpc("test", "down")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_retry_policy_calls_once() {
        let calls = AtomicU32::new(0);
        let _: Result<(), _> = RetryPolicy::none()
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ChainError::rpc("test", "down")) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
