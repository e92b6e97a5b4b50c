use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use umi_api::LineFramer;

use crate::configs::Serial;
use crate::error::Result;

const READ_CHUNK: usize = 256;
const ERROR_BACKOFF: Duration = Duration::from_millis(200);

/// Opens the sensor board port as 8N1 without flow control.
pub fn open_port(serial: &Serial) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(&serial.port_path, serial.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::from_millis(serial.timeout_ms))
        .open()?;

    tracing::info!("Serial port {} opened at {} baud", serial.port_path, serial.baud_rate);
    Ok(port)
}

/// Background reader that frames a byte source into lines.
///
/// The thread ends on end-of-stream. A source with a read timeout keeps the
/// reader responsive; one without must be closed to stop it.
pub struct SerialReader {
    worker: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl SerialReader {
    pub fn spawn<R, F>(mut source: R, on_line: F) -> io::Result<Self>
    where
        R: Read + Send + 'static,
        F: FnMut(&str) + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();

        let worker = thread::Builder::new()
            .name("umi-serial".into())
            .spawn(move || {
                let mut framer = LineFramer::new(on_line);
                let mut buffer = [0u8; READ_CHUNK];

                while !worker_stop.load(Ordering::Acquire) {
                    match source.read(&mut buffer) {
                        Ok(0) => {
                            tracing::info!("Serial stream closed");
                            break;
                        }
                        Ok(n) => framer.feed(&buffer[..n]),
                        Err(e)
                            if matches!(
                                e.kind(),
                                io::ErrorKind::TimedOut
                                    | io::ErrorKind::WouldBlock
                                    | io::ErrorKind::Interrupted
                            ) => {}
                        Err(e) => {
                            tracing::warn!("Serial read failed: {}", e);
                            thread::sleep(ERROR_BACKOFF);
                        }
                    }
                }
            })?;

        Ok(Self {
            worker: Some(worker),
            stop,
        })
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|worker| !worker.is_finished())
    }

    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Serial reader panicked");
            }
        }
    }
}

impl Drop for SerialReader {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn test_reader_frames_until_eof() {
        let (tx, rx) = mpsc::channel();
        let source = Cursor::new(b"D\r\n*\r\n\r\nnoise\n".to_vec());

        let mut reader = SerialReader::spawn(source, move |line| {
            tx.send(line.to_string()).unwrap();
        })
        .unwrap();

        let lines: Vec<String> = rx.iter().collect();
        assert_eq!(lines, vec!["D", "*", "noise"]);

        reader.stop();
        assert!(!reader.is_running());
    }

    #[test]
    fn test_partial_line_not_emitted_at_eof() {
        let (tx, rx) = mpsc::channel();
        let source = Cursor::new(b"D\nhalf".to_vec());

        let mut reader = SerialReader::spawn(source, move |line| {
            tx.send(line.to_string()).unwrap();
        })
        .unwrap();

        let lines: Vec<String> = rx.iter().collect();
        assert_eq!(lines, vec!["D"]);
        reader.stop();
    }
}
