//! Bounded exponential backoff for sink deliveries.
//!
//! [`send_with_retry`] takes the sink, the backoff policy, and a classifier
//! predicate deciding which errors are transient. Exhausting the attempt
//! budget abandons the batch; it is never retried again.

use crate::batch::Batch;
use crate::config::RetryPolicy;
use crate::error::SinkError;
use crate::metrics::{record_backoff, record_giveup, record_publish_duration};
use crate::sink::StreamSink;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Successive backoff waits: base, base*factor, ... capped at the ceiling.
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    next_ms: f64,
    factor: f64,
    max_ms: f64,
}

impl BackoffSchedule {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            next_ms: policy.base_delay_ms as f64,
            factor: policy.backoff_factor,
            max_ms: policy.max_delay_ms as f64,
        }
    }

    /// The next wait; each call grows the following one geometrically until
    /// the ceiling.
    pub fn next_delay(&mut self) -> Duration {
        let wait = self.next_ms.min(self.max_ms);
        self.next_ms = (self.next_ms * self.factor).min(self.max_ms);
        Duration::from_millis(wait as u64)
    }
}

/// Terminal result of one batch delivery, retries included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The sink accepted the whole batch.
    Delivered { retries: u32 },
    /// Every attempt failed transiently; the batch is abandoned.
    GaveUp { attempts: u32 },
}

/// Deliver `batch` to `sink`, retrying transient failures with exponential
/// backoff until delivered or the attempt budget is spent.
///
/// `is_transient` is the single decision point for what is worth retrying.
/// Non-transient errors are returned immediately without a retry; the caller
/// (the worker loop) decides what to do with them.
///
/// Each batch starts a fresh schedule, so backoff never carries over from a
/// previous, unrelated failure sequence.
pub async fn send_with_retry<S: StreamSink + ?Sized>(
    sink: &mut S,
    batch: &Batch,
    policy: &RetryPolicy,
    is_transient: impl Fn(&SinkError) -> bool,
) -> Result<SendOutcome, SinkError> {
    let mut schedule = BackoffSchedule::new(policy);
    let mut attempt: u32 = 1;

    loop {
        let started = Instant::now();
        match sink.send_batch(batch.entries()).await {
            Ok(()) => {
                record_publish_duration(started.elapsed());
                if attempt > 1 {
                    info!(retries = attempt - 1, "Sink healthy again, resuming");
                }
                return Ok(SendOutcome::Delivered {
                    retries: attempt - 1,
                });
            }
            Err(e) if !is_transient(&e) => return Err(e),
            Err(e) => {
                if attempt >= policy.max_attempts {
                    record_giveup();
                    error!(
                        error = %e,
                        attempts = attempt,
                        dropped = batch.len(),
                        "Retries exhausted, dropping batch"
                    );
                    return Ok(SendOutcome::GaveUp { attempts: attempt });
                }

                let wait = schedule.next_delay();
                record_backoff();
                warn!(
                    error = %e,
                    attempt = attempt,
                    wait_ms = wait.as_millis() as u64,
                    "Sink unreachable, retrying after backoff"
                );
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_doubles_from_base() {
        let policy = RetryPolicy::default();
        let mut schedule = BackoffSchedule::new(&policy);

        assert_eq!(schedule.next_delay(), Duration::from_millis(50));
        assert_eq!(schedule.next_delay(), Duration::from_millis(100));
        assert_eq!(schedule.next_delay(), Duration::from_millis(200));
        assert_eq!(schedule.next_delay(), Duration::from_millis(400));
    }

    #[test]
    fn test_schedule_caps_at_ceiling() {
        let policy = RetryPolicy {
            base_delay_ms: 1000,
            backoff_factor: 3.0,
            max_delay_ms: 5000,
            ..RetryPolicy::default()
        };
        let mut schedule = BackoffSchedule::new(&policy);

        assert_eq!(schedule.next_delay(), Duration::from_millis(1000));
        assert_eq!(schedule.next_delay(), Duration::from_millis(3000));
        assert_eq!(schedule.next_delay(), Duration::from_millis(5000));
        assert_eq!(schedule.next_delay(), Duration::from_millis(5000));
    }

    #[test]
    fn test_fresh_schedule_restarts_at_base() {
        let policy = RetryPolicy::default();
        let mut first = BackoffSchedule::new(&policy);
        first.next_delay();
        first.next_delay();

        let mut second = BackoffSchedule::new(&policy);
        assert_eq!(second.next_delay(), Duration::from_millis(50));
    }
}
