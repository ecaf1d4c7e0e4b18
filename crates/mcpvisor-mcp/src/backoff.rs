//! Delay policy between connect attempts.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Maps the number of a failed attempt (counting from 1) to the wait before
/// the next one.
///
/// Injectable so tests can run retry loops without real delays.
#[derive(Clone)]
pub struct BackoffPolicy(Arc<dyn Fn(u32) -> Duration + Send + Sync>);

impl BackoffPolicy {
    /// `base * 2^(attempt - 1)`: base, 2×base, 4×base, ...
    pub fn exponential(base: Duration) -> Self {
        Self::from_fn(move |attempt| {
            let exponent = attempt.saturating_sub(1).min(16);
            base.saturating_mul(1 << exponent)
        })
    }

    /// The same delay after every failure.
    pub fn constant(delay: Duration) -> Self {
        Self::from_fn(move |_| delay)
    }

    /// Retry immediately.
    pub fn none() -> Self {
        Self::constant(Duration::ZERO)
    }

    pub fn from_fn(f: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Delay to wait after `failed_attempt` failed.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        (self.0)(failed_attempt)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(500))
    }
}

impl fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BackoffPolicy")
            .field(&[self.delay_after(1), self.delay_after(2), self.delay_after(3)])
            .finish()
    }
}
