use crate::error::{BridgeError, Result};

/// Host audio processing engine started alongside the bridge
pub trait AudioEngine: Send {
    fn start(&mut self, sample_rate: u32, block_size: u32, channels: u16) -> Result<()>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Engine that accepts a stream configuration and produces nothing
#[derive(Debug, Default)]
pub struct SilentEngine {
    running: bool,
    sample_rate: u32,
    block_size: u32,
    channels: u16,
}

impl AudioEngine for SilentEngine {
    fn start(&mut self, sample_rate: u32, block_size: u32, channels: u16) -> Result<()> {
        if sample_rate == 0 {
            return Err(BridgeError::Audio("sample rate must be non-zero".into()));
        }
        if block_size == 0 {
            return Err(BridgeError::Audio("block size must be non-zero".into()));
        }

        self.sample_rate = sample_rate;
        self.block_size = block_size;
        self.channels = channels.max(1);
        self.running = true;

        tracing::info!(
            "Audio engine started: {} Hz, block {}, {} channel(s)",
            sample_rate,
            block_size,
            self.channels
        );
        Ok(())
    }

    fn stop(&mut self) {
        if self.running {
            self.running = false;
            tracing::info!("Audio engine stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_and_stop() {
        let mut engine = SilentEngine::default();
        engine.start(48_000, 256, 2).unwrap();
        assert!(engine.is_running());
        assert_eq!(engine.sample_rate, 48_000);
        assert_eq!(engine.block_size, 256);

        engine.stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn test_invalid_configuration() {
        let mut engine = SilentEngine::default();
        assert!(matches!(engine.start(0, 256, 2), Err(BridgeError::Audio(_))));
        assert!(matches!(engine.start(48_000, 0, 2), Err(BridgeError::Audio(_))));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_channels_clamped() {
        let mut engine = SilentEngine::default();
        engine.start(44_100, 128, 0).unwrap();
        assert_eq!(engine.channels, 1);
    }
}
