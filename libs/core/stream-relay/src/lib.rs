//! Stream Relay Core
//!
//! The reliable buffered publisher at the heart of the relay stage: it
//! decouples "a message is ready to send" from "the message has been handed
//! to the downstream Redis", so a slow or unreachable sink never blocks the
//! read path.
//!
//! ## Features
//!
//! - **Bounded buffer**: fixed-capacity FIFO with drop-oldest backpressure
//! - **Batched delivery**: one pipelined round-trip per drain cycle
//! - **Bounded retry**: exponential backoff on transient sink failures,
//!   give-up after a capped attempt count
//! - **Supervised worker**: a single background task that survives every
//!   error class
//! - **Prometheus metrics**: built-in observability for drops, backoffs and
//!   publish latency
//!
//! ## Example
//!
//! ```ignore
//! use stream_relay::{connect, RedisStreamSink, RelaySender, SenderConfig};
//!
//! let conn = connect("redis://target:6379").await?;
//! let sink = RedisStreamSink::new(conn, 100);
//! let sender = RelaySender::start(sink, SenderConfig::default());
//!
//! sender.publish("output:cam1", payload_bytes);
//!
//! // On shutdown: signal the worker and wait (bounded).
//! sender.stop().await;
//! ```

mod batch;
mod buffer;
mod config;
mod consumer;
mod error;
mod health;
pub mod metrics;
mod retry;
mod sender;
mod sink;

// Re-export main types
pub use batch::Batch;
pub use buffer::{BufferEntry, RelayBuffer};
pub use config::{RetryPolicy, SenderConfig};
pub use consumer::SourceConsumer;
pub use error::{RelayError, SinkError};
pub use health::{health_router, HealthState};
pub use metrics::init_metrics;
pub use retry::{send_with_retry, BackoffSchedule, SendOutcome};
pub use sender::{RelaySender, SenderHandle, SenderWorker};
pub use sink::{connect, connect_with_timeout, RedisStreamSink, StreamSink, PAYLOAD_FIELD};
