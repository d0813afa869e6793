//! Relay Writer Service
//!
//! Relays messages from local Redis streams to a remote, less reliable
//! Redis, optionally redacting the raw frame data on the way.
//!
//! ## Architecture
//!
//! ```text
//! Source Redis (objecttracker:{id}, XREAD BLOCK)
//!   ↓
//! Stage loop: consume → redact → derive output key
//!   ↓ publish() (never blocks)
//! RelaySender (bounded buffer, drop-oldest)
//!   ↓ background worker (batches + bounded backoff retry)
//! Target Redis (output:{id}, XADD MAXLEN ~)
//! ```
//!
//! ## Features
//!
//! - Buffered publishing that never blocks the consume path
//! - Exponential-backoff retry with give-up after a capped attempt count
//! - Frame-data redaction with a metadata whitelist
//! - Graceful SIGINT/SIGTERM shutdown
//! - Health probes and Prometheus metrics on an HTTP port

mod metrics;
mod settings;
mod transform;

pub use settings::{SourceSettings, TargetSettings, WriterSettings};
pub use transform::FrameRedactor;

use core_config::server::ServerConfig;
use core_config::{app_info, Environment, FromEnv};
use eyre::{Result, WrapErr};
use std::time::Duration;
use stream_relay::{
    connect, connect_with_timeout, health_router, HealthState, RedisStreamSink, RelaySender,
    SenderHandle, SourceConsumer,
};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Start the health and metrics HTTP server.
///
/// Endpoints: `/health`, `/healthz`, `/ready`, `/readyz`, `/metrics`.
async fn start_health_server(health_state: HealthState, address: String) -> Result<()> {
    let app = health_router(health_state);

    let listener = TcpListener::bind(&address)
        .await
        .wrap_err_with(|| format!("Failed to bind health server to {}", address))?;

    info!(address = %address, "Health server listening");

    axum::serve(listener, app)
        .await
        .wrap_err("Health server failed")?;

    Ok(())
}

/// Run the relay writer stage.
///
/// 1. Sets up structured logging and the Prometheus recorder
/// 2. Loads and validates settings from the environment
/// 3. Connects to the source and target Redis
/// 4. Starts the health server and the buffered publisher
/// 5. Runs the consume → transform → publish loop until SIGINT/SIGTERM
///
/// # Errors
///
/// Returns an error if configuration is invalid or either Redis connection
/// cannot be established. Sink failures during operation never surface here;
/// they are absorbed by the publisher.
pub async fn run() -> Result<()> {
    core_config::tracing::install_color_eyre();
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    stream_relay::init_metrics();

    let app_info = app_info!();
    info!(name = %app_info.name, version = %app_info.version, "Starting relay writer stage");
    info!("Environment: {:?}", environment);

    let settings = WriterSettings::from_env().wrap_err("Failed to load relay settings")?;
    let sender_config = settings.sender_config();
    sender_config
        .validate()
        .wrap_err("Invalid sender configuration")?;

    let server_config = ServerConfig::from_env().wrap_err("Failed to load server configuration")?;

    info!(
        source = %settings.source.url,
        target = %settings.target.url(),
        streams = ?settings.source.stream_keys(),
        buffer_length = settings.target.buffer_length,
        redact_frame_data = settings.redact_frame_data,
        "Relay configuration loaded"
    );

    let source = connect(&settings.source.url)
        .await
        .wrap_err("Failed to connect to source Redis")?;

    let target = connect_with_timeout(
        &settings.target.url(),
        Duration::from_millis(settings.target.response_timeout_ms),
    )
    .await
    .wrap_err("Failed to connect to target Redis")?;

    // Shutdown signal fan-out
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!("Error waiting for shutdown signal: {}", e);
        }
        let _ = shutdown_tx.send(true);
    });

    // Health server in the background
    let health_state = HealthState::new(source.clone(), app_info.name, app_info.version);
    let address = server_config.address();
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state, address).await {
            error!(error = %e, "Health server failed");
        }
    });

    // The publisher owns the target connection for its whole lifetime.
    let sink = RedisStreamSink::new(target, settings.target.target_stream_maxlen);
    let sender = RelaySender::start(sink, sender_config);

    let consumer = SourceConsumer::new(
        source,
        settings.source.stream_keys(),
        settings.source.read_block_ms,
        settings.source.read_count,
    );

    run_stage_loop(consumer, sender.handle(), &settings, shutdown_rx).await;

    info!("Stage loop exited, stopping publisher");
    sender.stop().await;

    info!("Relay writer stage stopped");
    Ok(())
}

/// The sequential glue: consume, redact, derive the output key, enqueue.
async fn run_stage_loop(
    mut consumer: SourceConsumer,
    publisher: SenderHandle,
    settings: &WriterSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let redactor = FrameRedactor::new(settings.redact_frame_data);
    let output_prefix = settings.target.output_stream_prefix.as_str();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let messages = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            result = consumer.read() => match result {
                Ok(messages) => messages,
                Err(e) => {
                    error!(error = %e, "Source read failed, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            }
        };

        for (stream_key, payload) in messages {
            metrics::record_consumed();

            let Some(destination) = output_key(output_prefix, &stream_key) else {
                warn!(stream = %stream_key, "Source key has no stream id, skipping");
                metrics::record_skipped("bad_key");
                continue;
            };

            let outgoing = match redactor.apply(&payload) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(stream = %stream_key, error = %e, "Unparseable envelope, skipping");
                    metrics::record_skipped("bad_envelope");
                    continue;
                }
            };

            publisher.publish(destination, outgoing);
        }
    }
}

/// `objecttracker:cam7` → `output:cam7`; None when the source key carries no
/// stream id.
fn output_key(prefix: &str, source_key: &str) -> Option<String> {
    source_key
        .split_once(':')
        .map(|(_, stream_id)| format!("{}:{}", prefix, stream_id))
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_key_swaps_prefix() {
        assert_eq!(
            output_key("output", "objecttracker:cam7"),
            Some("output:cam7".to_string())
        );
    }

    #[test]
    fn test_output_key_keeps_extra_separators() {
        assert_eq!(
            output_key("output", "objecttracker:site1:cam7"),
            Some("output:site1:cam7".to_string())
        );
    }

    #[test]
    fn test_output_key_rejects_missing_id() {
        assert_eq!(output_key("output", "objecttracker"), None);
    }
}
