//! Source-side consumer: fans in messages from the upstream Redis streams.
//!
//! One blocking `XREAD` per cycle across all configured input streams,
//! tracking the last-delivered entry id per stream. Reading starts at `$`,
//! so a (re)started relay only sees messages produced from then on.

use crate::error::RelayError;
use crate::sink::PAYLOAD_FIELD;
use redis::aio::ConnectionManager;
use tracing::warn;

/// XREAD reply shape: stream key → entries of (id, field/value pairs).
type StreamReadReply = Vec<(String, Vec<(String, Vec<(String, Vec<u8>)>)>)>;

/// Reads `(stream key, payload bytes)` pairs from the configured set of
/// input streams.
pub struct SourceConsumer {
    conn: ConnectionManager,
    stream_keys: Vec<String>,
    last_ids: Vec<String>,
    block_ms: u64,
    count: usize,
}

impl SourceConsumer {
    pub fn new(conn: ConnectionManager, stream_keys: Vec<String>, block_ms: u64, count: usize) -> Self {
        let last_ids = vec!["$".to_string(); stream_keys.len()];
        Self {
            conn,
            stream_keys,
            last_ids,
            block_ms,
            count,
        }
    }

    pub fn stream_keys(&self) -> &[String] {
        &self.stream_keys
    }

    /// One read cycle, blocking server-side for up to the configured window.
    /// Returns pairs in arrival order; empty when the window elapses without
    /// traffic. Entries missing the payload field are skipped with a warning.
    pub async fn read(&mut self) -> Result<Vec<(String, Vec<u8>)>, RelayError> {
        let mut cmd = redis::cmd("XREAD");
        cmd.arg("BLOCK")
            .arg(self.block_ms)
            .arg("COUNT")
            .arg(self.count)
            .arg("STREAMS");
        for key in &self.stream_keys {
            cmd.arg(key);
        }
        for id in &self.last_ids {
            cmd.arg(id);
        }

        let reply: Option<StreamReadReply> = cmd.query_async(&mut self.conn).await?;

        let mut messages = Vec::new();
        let Some(streams) = reply else {
            return Ok(messages);
        };

        for (key, entries) in streams {
            let Some(pos) = self.stream_keys.iter().position(|k| k == &key) else {
                continue;
            };
            for (id, fields) in entries {
                self.last_ids[pos] = id.clone();
                match fields.into_iter().find(|(name, _)| name == PAYLOAD_FIELD) {
                    Some((_, payload)) => messages.push((key.clone(), payload)),
                    None => {
                        warn!(stream = %key, entry = %id, "Entry has no payload field, skipping")
                    }
                }
            }
        }

        Ok(messages)
    }
}
