//! Relay Writer Service - Entry Point
//!
//! Relays messages from local Redis streams to a remote Redis, redacting
//! frame data on the way when configured.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    relay_writer::run().await
}
