use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logger {
    pub level: String,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bridge {
    pub device_id: String,
    pub listen_port: u16,
    pub heartbeat_ms: u64,
    pub blink_on_detect: bool,
}

impl Bridge {
    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self {
            device_id: "pi-01".into(),
            listen_port: 9100,
            heartbeat_ms: 5000,
            blink_on_detect: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Remote {
    pub host: String,
    pub port: u16,
}

impl Default for Remote {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".into(),
            port: 9000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Serial {
    pub port_path: String,
    pub baud_rate: u32,
    /// Read timeout, bounds how long the reader takes to notice a stop request
    pub timeout_ms: u64,
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            port_path: "/dev/ttyUSB0".into(),
            baud_rate: 115_200,
            timeout_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Audio {
    pub sample_rate: u32,
    pub block_size: u32,
    pub channels: u16,
}

impl Default for Audio {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 256,
            channels: 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logger: Logger,
    pub bridge: Bridge,
    pub remote: Remote,
    pub serial: Serial,
    pub audio: Audio,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());

        Config::builder()
            .add_source(File::with_name("configs/default").required(false))
            .add_source(File::with_name(&format!("configs/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("UMI").separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
