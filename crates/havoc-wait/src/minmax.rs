use std::time::Duration;

use rand::Rng;

use crate::Backoff;

/// Backoff yielding a uniformly random duration in `[min, max)` each step.
///
/// Callers must ensure `max > min`.
#[derive(Debug, Clone, Copy)]
pub struct MinMaxBackoff {
    pub min: Duration,
    pub max: Duration,
}

impl Backoff for MinMaxBackoff {
    fn step(&mut self) -> Duration {
        let nanos = rand::thread_rng().gen_range(self.min.as_nanos()..self.max.as_nanos());
        Duration::from_nanos(nanos as u64)
    }
}
