use std::io::Write;
use std::sync::Mutex;

use super::lock;

/// Best-effort line writer towards the serial board
pub struct CommandChannel {
    sink: Mutex<Option<Box<dyn Write + Send>>>,
}

impl CommandChannel {
    pub fn new<W: Write + Send + 'static>(sink: W) -> Self {
        Self {
            sink: Mutex::new(Some(Box::new(sink))),
        }
    }

    /// Channel with no sink; every write reports failure
    pub fn disconnected() -> Self {
        Self {
            sink: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.sink).is_some()
    }

    /// Writes `command` plus a trailing `\n` as a single line.
    ///
    /// Returns `false` if the sink is missing or rejects the write. Nothing is retried.
    pub fn send_line(&self, command: &str) -> bool {
        let mut sink = lock(&self.sink);
        let Some(writer) = sink.as_mut() else {
            tracing::debug!("No serial sink, dropping {}", command);
            return false;
        };

        let mut line = String::with_capacity(command.len() + 1);
        line.push_str(command);
        line.push('\n');

        match writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.flush())
        {
            Ok(()) => {
                tracing::debug!("Serial command {} written", command);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to write serial command {}: {}", command, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

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

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_send_line_appends_terminator() {
        let buffer = SharedBuffer::default();
        let channel = CommandChannel::new(buffer.clone());

        assert!(channel.send_line("C5"));
        assert!(channel.send_line("C0"));
        assert_eq!(&*buffer.0.lock().unwrap(), b"C5\nC0\n");
    }

    #[test]
    fn test_failed_write_reports_false() {
        let channel = CommandChannel::new(BrokenPipe);
        assert!(channel.is_connected());
        assert!(!channel.send_line("C5"));
    }

    #[test]
    fn test_disconnected_channel() {
        let channel = CommandChannel::disconnected();
        assert!(!channel.is_connected());
        assert!(!channel.send_line("C5"));
    }
}
