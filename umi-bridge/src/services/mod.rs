pub mod audio_service;
pub mod bridge_service;
pub mod command_service;
pub mod indicator_service;
pub mod serial_service;
pub mod transport;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use audio_service::{AudioEngine, SilentEngine};
pub use bridge_service::{BridgeConfig, BridgeState, BridgeStats, EventBridge};
pub use command_service::CommandChannel;
pub use indicator_service::ActivityIndicator;
pub use serial_service::SerialReader;

/// Locks a mutex, recovering the guard if a previous holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
