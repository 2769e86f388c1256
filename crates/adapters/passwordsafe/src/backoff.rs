//! Exponential backoff with jitter and a bounded retry window
//!
//! Each interval is randomised by `±randomization_factor`, then the base
//! interval grows by `multiplier` up to `max_interval`. Once the time spent
//! so far plus the next interval would exceed `max_elapsed`, the backoff
//! stops and the last error is returned.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use pwsafe_config::RetrySettings;
use tokio::time::Instant;
use tracing::{info, warn};

/// Retry schedule state
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    randomization_factor: f64,
    multiplier: f64,
    max_interval: Duration,
    max_elapsed: Duration,
    current_interval: Duration,
    start: Instant,
}

impl ExponentialBackoff {
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            initial_interval: settings.initial_interval(),
            randomization_factor: settings.randomization_factor,
            multiplier: settings.multiplier,
            max_interval: settings.max_interval(),
            max_elapsed: settings.max_elapsed(),
            current_interval: settings.initial_interval(),
            start: Instant::now(),
        }
    }

    /// Restart the schedule and the elapsed-time clock
    pub fn reset(&mut self) {
        self.current_interval = self.initial_interval;
        self.start = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn max_elapsed(&self) -> Duration {
        self.max_elapsed
    }

    /// Delay before the next attempt, or `None` when the retry window is used up
    pub fn next_backoff(&mut self) -> Option<Duration> {
        let elapsed = self.elapsed();
        let next = randomized_interval(
            self.current_interval,
            self.randomization_factor,
            rand::random::<f64>(),
        );
        self.increment_interval();

        if elapsed + next > self.max_elapsed {
            return None;
        }
        Some(next)
    }

    fn increment_interval(&mut self) {
        let grown = self.current_interval.as_secs_f64() * self.multiplier;
        // a non-finite product saturates at the cap
        self.current_interval = if !grown.is_finite() || grown >= self.max_interval.as_secs_f64() {
            self.max_interval
        } else {
            Duration::from_secs_f64(grown)
        };
    }
}

/// Pick a point in `[interval - factor*interval, interval + factor*interval]`.
/// `random` is expected in `[0, 1)`.
fn randomized_interval(interval: Duration, factor: f64, random: f64) -> Duration {
    let base = interval.as_secs_f64();
    let delta = factor * base;
    let min = base - delta;
    let max = base + delta;
    let secs = min + random * (max - min);
    if secs.is_nan() {
        return interval;
    }
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(interval)
}

/// Why a retried operation gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// The operation failed with an error the caller chose not to retry
    Permanent(E),
    /// The retry window closed; carries the last error seen
    Exhausted { last: E, attempts: u32 },
}

/// Run `operation` until it succeeds, `should_retry` rejects its error, or
/// the backoff window closes.
pub async fn retry<F, Fut, T, E, P>(
    backoff: &mut ExponentialBackoff,
    operation_name: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    backoff.reset();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = backoff.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if !should_retry(&e) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    error = %e,
                    "Operation failed with a non-retryable error"
                );
                return Err(RetryError::Permanent(e));
            }
            Err(e) => match backoff.next_backoff() {
                Some(delay) => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        error = %e,
                        elapsed_ms = backoff.elapsed().as_millis() as u64,
                        "Operation failed, retry window exhausted"
                    );
                    return Err(RetryError::Exhausted { last: e, attempts: attempt });
                }
            },
        }
    }
}
