//! Stage-level metrics: what the loop consumed, skipped, and spent on
//! transforming. Publisher-side metrics live in the stream-relay crate.

use metrics::{counter, histogram};
use std::time::Duration;

pub(crate) fn record_consumed() {
    counter!("relay_messages_consumed_total").increment(1);
}

pub(crate) fn record_skipped(reason: &'static str) {
    counter!("relay_messages_skipped_total", "reason" => reason).increment(1);
}

pub(crate) fn record_transform_duration(duration: Duration) {
    histogram!("relay_transform_duration_seconds").record(duration.as_secs_f64());
}
