//! Exponential backoff with jitter, shared by search, generation and delivery.
//!
//! The delay between attempts follows:
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=jitter)
//! ```
//! Only errors whose [`Transient::is_transient`] returns `true` are retried;
//! anything else is returned immediately.

use crate::error::Transient;
use rand::{Rng, rng};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, warn};

/// Backoff policy: how many retries and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Retries after the first attempt. `0` means a single attempt.
    pub max_retries: usize,
    /// Delay before the first retry; doubles with each further retry.
    pub base_delay: Duration,
    /// Upper bound for the exponential part of the delay.
    pub max_delay: Duration,
    /// Upper bound for the random jitter added to every delay.
    pub max_jitter: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based), without jitter.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(31) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng().random_range(0..=max_ms))
    }

    /// Run `op` until it succeeds, fails permanently, or retries run out.
    ///
    /// `label` only appears in log events.
    pub async fn retry<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        E: Transient + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !e.is_transient() {
                        warn!(
                            label,
                            attempt,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            error = %e,
                            "permanent failure; not retrying"
                        );
                        return Err(e);
                    }

                    if attempt > self.max_retries {
                        error!(
                            label,
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt) + self.jitter();
                    warn!(
                        label,
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        elapsed_ms_total = total_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    struct Flaky {
        transient: bool,
    }

    impl fmt::Display for Flaky {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "flaky(transient={})", self.transient)
        }
    }

    impl Transient for Flaky {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    fn fast(max_retries: usize) -> Backoff {
        Backoff {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            max_jitter: Duration::ZERO,
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let b = Backoff {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::ZERO,
        };
        assert_eq!(b.delay_for(1), Duration::from_secs(1));
        assert_eq!(b.delay_for(2), Duration::from_secs(2));
        assert_eq!(b.delay_for(3), Duration::from_secs(4));
        assert_eq!(b.delay_for(5), Duration::from_secs(16));
        assert_eq!(b.delay_for(6), Duration::from_secs(30));
        assert_eq!(b.delay_for(60), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = Cell::new(0);
        let res: Result<u32, Flaky> = fast(3)
            .retry("test", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(Flaky { transient: true })
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(res.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = Cell::new(0);
        let res: Result<(), Flaky> = fast(2)
            .retry("test", || {
                calls.set(calls.get() + 1);
                async { Err(Flaky { transient: true }) }
            })
            .await;
        assert!(res.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Cell::new(0);
        let res: Result<(), Flaky> = fast(5)
            .retry("test", || {
                calls.set(calls.get() + 1);
                async { Err(Flaky { transient: false }) }
            })
            .await;
        assert!(res.is_err());
        assert_eq!(calls.get(), 1);
    }
}
