//! The background publisher: the relay's single long-lived unit of
//! concurrency.
//!
//! [`SenderWorker`] owns the sink connection for its whole lifetime and
//! loops: drain a batch, ship it with bounded retry, idle briefly when the
//! buffer is empty. Every failure inside an iteration is logged and counted;
//! nothing may kill the loop, because a dead worker with a live buffer is
//! silent total data loss.
//!
//! [`RelaySender`] is the lifecycle wrapper: it builds the buffer, spawns
//! the worker, hands out the enqueue capability, and joins the worker with a
//! bounded wait on shutdown.

use crate::batch::Batch;
use crate::buffer::RelayBuffer;
use crate::config::SenderConfig;
use crate::error::SinkError;
use crate::metrics::record_worker_error;
use crate::retry::{send_with_retry, SendOutcome};
use crate::sink::StreamSink;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Drains the buffer and ships batches until told to stop.
pub struct SenderWorker<S: StreamSink> {
    buffer: Arc<RelayBuffer>,
    sink: S,
    config: SenderConfig,
}

impl<S: StreamSink> SenderWorker<S> {
    pub fn new(buffer: Arc<RelayBuffer>, sink: S, config: SenderConfig) -> Self {
        Self {
            buffer,
            sink,
            config,
        }
    }

    /// Run the worker loop.
    ///
    /// Exits only when the shutdown channel flips to true, observed between
    /// work units: an in-flight send finishes (or exhausts its retry budget)
    /// before the signal is honored.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            buffer_length = self.config.buffer_length,
            max_attempts = self.config.retry.max_attempts,
            "Publisher worker started"
        );

        let idle_wait = Duration::from_millis(self.config.idle_wait_ms);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = Batch::assemble(&self.buffer, self.config.buffer_length);

            if batch.is_empty() {
                // The sole voluntary yield point: wait out the idle interval
                // unless shutdown is signaled first. A closed channel means
                // the lifecycle wrapper is gone, so stop too.
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(idle_wait) => {}
                }
                continue;
            }

            match send_with_retry(
                &mut self.sink,
                &batch,
                &self.config.retry,
                SinkError::is_transient,
            )
            .await
            {
                Ok(SendOutcome::Delivered { retries }) => {
                    if retries > 0 {
                        debug!(retries, size = batch.len(), "Batch delivered after retries");
                    }
                }
                // Already counted and logged by the retry layer.
                Ok(SendOutcome::GaveUp { .. }) => {}
                Err(e) => {
                    // Unclassified failure: account for it and keep going.
                    record_worker_error();
                    error!(error = %e, dropped = batch.len(), "Unexpected publish failure, continuing");
                }
            }
        }

        info!("Publisher worker stopped");
    }
}

/// Cloneable enqueue capability handed to the stage loop.
#[derive(Clone)]
pub struct SenderHandle {
    buffer: Arc<RelayBuffer>,
}

impl SenderHandle {
    /// Enqueue one message for delivery. Never blocks and never fails; when
    /// the buffer is full the oldest entry is dropped to make room.
    pub fn publish(&self, destination: impl Into<String>, payload: Vec<u8>) {
        self.buffer.push(destination, payload);
    }
}

/// Owns the background worker for one publisher session.
///
/// Entries still buffered when the session ends are discarded; there is no
/// flush-on-shutdown guarantee.
pub struct RelaySender {
    handle: SenderHandle,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
    stop_timeout: Duration,
}

impl RelaySender {
    /// Build the buffer, spawn the worker, and return the running sender.
    /// The sink is acquired by the worker once and released when it exits.
    pub fn start<S: StreamSink + 'static>(sink: S, config: SenderConfig) -> Self {
        let buffer = Arc::new(RelayBuffer::new(config.buffer_length));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stop_timeout = Duration::from_millis(config.stop_timeout_ms);

        let worker = tokio::spawn(SenderWorker::new(buffer.clone(), sink, config).run(shutdown_rx));

        Self {
            handle: SenderHandle { buffer },
            shutdown_tx,
            worker,
            stop_timeout,
        }
    }

    /// A cloneable handle for the producing side.
    pub fn handle(&self) -> SenderHandle {
        self.handle.clone()
    }

    /// Enqueue one message. See [`SenderHandle::publish`].
    pub fn publish(&self, destination: impl Into<String>, payload: Vec<u8>) {
        self.handle.publish(destination, payload);
    }

    /// Signal shutdown and wait for the worker, bounded by the configured
    /// stop timeout. A worker that overruns the wait is aborted; teardown
    /// proceeds either way.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(self.stop_timeout, &mut self.worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Publisher worker terminated abnormally"),
            Err(_) => {
                warn!(
                    timeout_ms = self.stop_timeout.as_millis() as u64,
                    "Publisher worker did not stop in time, abandoning it"
                );
                self.worker.abort();
            }
        }
    }
}
