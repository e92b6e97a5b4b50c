use std::io;

use umi_api::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to bind listener on UDP {port}: {source}")]
    Bind { port: u16, source: io::Error },

    #[error("Bridge is already running")]
    AlreadyRunning,

    #[error("Heartbeat period must be non-zero")]
    ZeroHeartbeat,

    #[error("Datagram of {0} bytes exceeds the UDP payload limit")]
    Oversized(usize),

    #[error("Uplink has no remote endpoint")]
    NoRemote,

    #[error("Failed to connect to {endpoint}: {source}")]
    Connect { endpoint: String, source: io::Error },

    #[error("Send failed: {0}")]
    Send(#[source] io::Error),

    #[error("Malformed datagram: {0}")]
    Codec(#[from] CodecError),

    #[error("Serial error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Audio error: {0}")]
    Audio(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
