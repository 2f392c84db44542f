use std::time::Duration;

use rand::Rng;

use crate::Backoff;

/// Exponentially growing backoff with optional jitter and cap.
///
/// Fields are public so call sites can configure it with struct-literal
/// syntax and `..Default::default()`.
#[derive(Debug, Clone, Default)]
pub struct ExponentialBackoff {
    /// Current duration; the seed for the next step. A zero or unset value
    /// is replaced with 10 seconds on the first step.
    pub duration: Duration,
    /// Upper bound on the stepped duration. Zero means uncapped.
    pub cap: Duration,
    /// Growth factor applied each step when greater than zero.
    pub factor: f64,
    /// Maximum fraction of random variation added each step, in `(0, 1]`.
    pub jitter: f64,
}

impl Backoff for ExponentialBackoff {
    fn step(&mut self) -> Duration {
        if self.duration.is_zero() {
            self.duration = Duration::from_secs(10);
        }

        let mut next = self.duration.as_secs_f64();
        if self.factor > 0.0 {
            next *= self.factor;
        }

        if self.jitter > 0.0 && self.jitter <= 1.0 {
            next += rand::thread_rng().gen::<f64>() * self.jitter * next;
        }

        self.duration = Duration::from_secs_f64(next);

        if !self.cap.is_zero() && self.duration > self.cap {
            self.duration = self.cap;
        }

        self.duration
    }
}
