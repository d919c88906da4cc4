//! Polling with exponential backoff, used for readiness checks.

use futures::future::BoxFuture;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::{PlayError, PlayResult};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Delay before the first attempt
    pub lead_sleep: Duration,
    pub initial_interval: Duration,
    pub backoff_factor: f64,
    pub max_interval: Duration,
}

impl RetryPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            lead_sleep: Duration::from_millis(100),
            initial_interval: Duration::from_millis(50),
            backoff_factor: 1.25,
            max_interval: Duration::from_secs(5),
        }
    }
}

/// Repeat `predicate` on `state` until it yields `Ok(true)`.
///
/// An `Err` from the predicate aborts immediately. Running out of time yields
/// `PlayError::Timeout` carrying `msg`.
pub async fn retry<S, F>(policy: &RetryPolicy, msg: &str, state: &mut S, mut predicate: F) -> PlayResult<()>
where
    S: ?Sized,
    F: for<'a> FnMut(&'a mut S) -> BoxFuture<'a, PlayResult<bool>>,
{
    let deadline = Instant::now() + policy.timeout;
    if !policy.lead_sleep.is_zero() {
        sleep(policy.lead_sleep).await;
    }

    let mut interval = policy.initial_interval;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if predicate(&mut *state).await? {
            trace!(attempt, "Predicate satisfied");
            return Ok(());
        }

        if Instant::now() >= deadline {
            return Err(PlayError::timeout(msg));
        }

        sleep(interval).await;
        interval = interval.mul_f64(policy.backoff_factor).min(policy.max_interval);
    }
}
