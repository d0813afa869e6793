//! Sink client: the seam between the publisher and the downstream Redis.
//!
//! [`StreamSink`] is the trait the retry layer talks to; tests substitute a
//! scripted fake, production uses [`RedisStreamSink`].

use crate::buffer::BufferEntry;
use crate::error::SinkError;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::Client;
use std::time::Duration;
use tracing::info;

/// Field name under which payload bytes are stored in stream entries, on
/// both the source and destination side.
pub const PAYLOAD_FIELD: &str = "proto_data";

/// Downstream store abstraction. One call delivers one whole batch; partial
/// delivery is not representable here, the operation is atomic from the
/// relay's perspective.
#[async_trait]
pub trait StreamSink: Send {
    async fn send_batch(&mut self, entries: &[BufferEntry]) -> Result<(), SinkError>;
}

/// Publishes batches onto Redis streams, one pipelined round-trip per batch,
/// trimming each destination to a bounded length with `MAXLEN ~`.
pub struct RedisStreamSink {
    conn: ConnectionManager,
    stream_maxlen: i64,
}

impl RedisStreamSink {
    pub fn new(conn: ConnectionManager, stream_maxlen: i64) -> Self {
        Self {
            conn,
            stream_maxlen,
        }
    }
}

#[async_trait]
impl StreamSink for RedisStreamSink {
    async fn send_batch(&mut self, entries: &[BufferEntry]) -> Result<(), SinkError> {
        let mut pipe = redis::pipe();
        for entry in entries {
            pipe.cmd("XADD")
                .arg(&entry.destination)
                .arg("MAXLEN")
                .arg("~")
                .arg(self.stream_maxlen)
                .arg("*")
                .arg(PAYLOAD_FIELD)
                .arg(entry.payload.as_slice())
                .ignore();
        }
        pipe.query_async::<()>(&mut self.conn).await?;
        Ok(())
    }
}

/// Connect to Redis and verify the connection with a PING.
///
/// The returned `ConnectionManager` reconnects on its own after the
/// underlying connection drops; commands issued while it is down fail fast
/// and surface to the retry layer.
pub async fn connect(url: &str) -> redis::RedisResult<ConnectionManager> {
    info!(url = %url, "Connecting to Redis");

    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    info!("Redis connection established");
    Ok(manager)
}

/// Like [`connect`], with a bound on how long any single command may wait
/// for a response. Timeouts surface as transient errors.
pub async fn connect_with_timeout(
    url: &str,
    response_timeout: Duration,
) -> redis::RedisResult<ConnectionManager> {
    info!(url = %url, timeout_ms = response_timeout.as_millis() as u64, "Connecting to Redis");

    let client = Client::open(url)?;
    let config = ConnectionManagerConfig::new().set_response_timeout(response_timeout);
    let manager = ConnectionManager::new_with_config(client, config).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    info!("Redis connection established");
    Ok(manager)
}
