pub mod configs;
pub mod error;
pub mod services;

use std::sync::Arc;

pub use error::{BridgeError, Result};

use crate::configs::Settings;
use crate::services::serial_service::{self, SerialReader};
use crate::services::{AudioEngine, BridgeConfig, CommandChannel, EventBridge, SilentEngine};

/// Runs the bridge until the process receives Ctrl-C.
///
/// A missing serial board only disables the serial side; a listener that
/// cannot bind aborts startup.
pub async fn run(settings: &Arc<Settings>) -> Result<()> {
    let (commands, source) = match serial_service::open_port(&settings.serial) {
        Ok(port) => match port.try_clone() {
            Ok(writer) => (CommandChannel::new(writer), Some(port)),
            Err(e) => {
                tracing::warn!("Failed to clone serial port for writing: {}", e);
                (CommandChannel::disconnected(), Some(port))
            }
        },
        Err(e) => {
            tracing::warn!(
                "Serial port {} unavailable, running without board: {}",
                settings.serial.port_path,
                e
            );
            (CommandChannel::disconnected(), None)
        }
    };

    let bridge = Arc::new(EventBridge::with_udp(
        BridgeConfig::from(&settings.bridge),
        Arc::new(commands),
    ));
    bridge.start(
        settings.bridge.listen_port,
        &settings.remote.host,
        settings.remote.port,
    )?;

    let mut reader = match source {
        Some(port) => {
            let bridge = bridge.clone();
            Some(SerialReader::spawn(port, move |line| {
                bridge.on_serial_event(line);
            })?)
        }
        None => None,
    };

    let mut audio = SilentEngine::default();
    if let Err(e) = audio.start(
        settings.audio.sample_rate,
        settings.audio.block_size,
        settings.audio.channels,
    ) {
        bridge.stop();
        return Err(e);
    }

    tracing::info!("Bridge {} ready, press Ctrl-C to exit", bridge.device_id());
    let signal = tokio::signal::ctrl_c().await;

    tracing::info!("Shutting down");
    audio.stop();
    if let Some(reader) = reader.as_mut() {
        reader.stop();
    }
    bridge.stop();

    let stats = bridge.stats();
    tracing::info!(
        "Sent {} events ({} dropped), {} hellos, applied {} commands",
        stats.events_sent,
        stats.events_dropped,
        stats.hellos_sent,
        stats.commands_applied
    );

    signal.map_err(BridgeError::from)
}
