use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use umi_api::models::{LED_OFF_COMMAND, LED_ON_COMMAND};

use super::CommandChannel;

pub const DEFAULT_ON_DURATION: Duration = Duration::from_millis(250);
pub const DEFAULT_GUARD_DURATION: Duration = Duration::from_millis(150);

/// Owned worker that blinks the board LED once per pulse.
///
/// Pulses that arrive while a blink is in flight are dropped.
pub struct ActivityIndicator {
    trigger: Option<SyncSender<()>>,
    busy: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ActivityIndicator {
    pub fn spawn(commands: Arc<CommandChannel>) -> io::Result<Self> {
        Self::with_timing(commands, DEFAULT_ON_DURATION, DEFAULT_GUARD_DURATION)
    }

    pub fn with_timing(
        commands: Arc<CommandChannel>,
        on_duration: Duration,
        guard_duration: Duration,
    ) -> io::Result<Self> {
        let (trigger, pulses) = mpsc::sync_channel::<()>(1);
        let busy = Arc::new(AtomicBool::new(false));
        let worker_busy = busy.clone();

        let worker = thread::Builder::new()
            .name("umi-indicator".into())
            .spawn(move || {
                while pulses.recv().is_ok() {
                    commands.send_line(LED_ON_COMMAND);
                    thread::sleep(on_duration);
                    commands.send_line(LED_OFF_COMMAND);
                    thread::sleep(guard_duration);
                    worker_busy.store(false, Ordering::Release);
                }
                tracing::debug!("Activity indicator stopped");
            })?;

        Ok(Self {
            trigger: Some(trigger),
            busy,
            worker: Some(worker),
        })
    }

    /// Requests a blink. Returns `false` when one is already running.
    pub fn pulse(&self) -> bool {
        let Some(trigger) = self.trigger.as_ref() else {
            return false;
        };

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        match trigger.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => {
                self.busy.store(false, Ordering::Release);
                false
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Closes the pulse channel and waits for an in-flight blink to finish.
    pub fn shutdown(&mut self) {
        self.trigger.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Activity indicator worker panicked");
            }
        }
    }
}

impl Drop for ActivityIndicator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_single_blink_sequence() {
        let buffer = SharedBuffer::default();
        let commands = Arc::new(CommandChannel::new(buffer.clone()));
        let mut indicator = ActivityIndicator::with_timing(
            commands,
            Duration::from_millis(20),
            Duration::from_millis(10),
        )
        .unwrap();

        assert!(indicator.pulse());
        indicator.shutdown();

        assert_eq!(&*buffer.0.lock().unwrap(), b"C5\nC0\n");
        assert!(!indicator.is_busy());
    }

    #[test]
    fn test_pulse_while_busy_is_dropped() {
        let buffer = SharedBuffer::default();
        let commands = Arc::new(CommandChannel::new(buffer.clone()));
        let mut indicator = ActivityIndicator::with_timing(
            commands,
            Duration::from_millis(100),
            Duration::from_millis(50),
        )
        .unwrap();

        assert!(indicator.pulse());
        assert!(!indicator.pulse());
        assert!(!indicator.pulse());
        indicator.shutdown();

        assert_eq!(&*buffer.0.lock().unwrap(), b"C5\nC0\n");
    }

    #[test]
    fn test_pulse_after_shutdown() {
        let commands = Arc::new(CommandChannel::disconnected());
        let mut indicator = ActivityIndicator::spawn(commands).unwrap();
        indicator.shutdown();
        assert!(!indicator.pulse());
    }
}
