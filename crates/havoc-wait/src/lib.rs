//! Backoff primitives and the retry driver for the havoc chaos pipeline.
//!
//! A [`Backoff`] produces the next sleep duration between attempts;
//! [`execute_with_backoff`] drives an async predicate until it succeeds,
//! fails unrecoverably, or a timeout expires.

use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;

mod exponential;
mod minmax;

pub use exponential::ExponentialBackoff;
pub use minmax::MinMaxBackoff;

/// Produces the next duration to wait before re-attempting an operation.
pub trait Backoff: Send {
    /// Returns the next wait duration. Stepping mutates the backoff; it is
    /// not idempotent.
    fn step(&mut self) -> Duration;
}

/// Repeatedly evaluates `predicate` until it returns `Ok(true)`, sleeping
/// `backoff.step()` between attempts.
///
/// The timeout is checked *after* each predicate call, so the predicate is
/// always evaluated at least once. Once `timeout` has elapsed the most
/// recent predicate outcome is returned as-is: `Ok(false)` means the
/// condition was never met, `Err` carries the last failure. A zero timeout
/// means no timeout at all.
pub async fn execute_with_backoff<B, F, Fut>(
    backoff: &mut B,
    mut predicate: F,
    timeout: Duration,
) -> Result<bool>
where
    B: Backoff + ?Sized,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<bool>>,
{
    let start = Instant::now();

    loop {
        let outcome = predicate().await;

        if !timeout.is_zero() && start.elapsed() > timeout {
            return outcome;
        }

        if matches!(outcome, Ok(true)) {
            return outcome;
        }

        tokio::time::sleep(backoff.step()).await;
    }
}
