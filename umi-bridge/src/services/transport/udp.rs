use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use umi_api::codec::MAX_PACKET_SIZE;

use super::Uplink;

/// Receive timeout, bounds how long the listener takes to observe a stop request
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
pub struct UdpUplink {
    socket: Option<UdpSocket>,
}

impl UdpUplink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Uplink for UdpUplink {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.socket = None;

        let remote = (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no address for {host}:{port}"))
        })?;

        let local: SocketAddr = if remote.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };

        let socket = UdpSocket::bind(local)?;
        socket.connect(remote)?;
        self.socket = Some(socket);

        Ok(())
    }

    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        let socket = self.socket.as_ref().ok_or(io::ErrorKind::NotConnected)?;

        let written = socket.send(datagram)?;
        if written != datagram.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "datagram truncated by transport",
            ));
        }

        Ok(())
    }

    fn disconnect(&mut self) {
        self.socket = None;
    }
}

/// Inbound UDP listener owning its receive thread
pub struct UdpListener {
    socket: UdpSocket,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl UdpListener {
    /// Binds on all interfaces; port 0 lets the OS choose
    pub fn bind(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;

        Ok(Self {
            socket,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        })
    }

    pub fn local_port(&self) -> io::Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }

    /// Spawns the receive thread. `handler` runs on that thread for every datagram.
    pub fn start<H>(&mut self, mut handler: H) -> io::Result<()>
    where
        H: FnMut(&[u8], SocketAddr) + Send + 'static,
    {
        if self.worker.is_some() {
            return Ok(());
        }

        let socket = self.socket.try_clone()?;
        let running = Arc::clone(&self.running);
        running.store(true, Ordering::Release);

        let worker = thread::Builder::new()
            .name("umi-rx".into())
            .spawn(move || {
                let mut buffer = vec![0u8; MAX_PACKET_SIZE];

                while running.load(Ordering::Acquire) {
                    match socket.recv_from(&mut buffer) {
                        Ok((len, from)) => handler(&buffer[..len], from),
                        Err(e) if is_poll_timeout(&e) => continue,
                        Err(e) => {
                            tracing::warn!("UDP receive failed: {}", e);
                            thread::sleep(POLL_INTERVAL);
                        }
                    }
                }

                tracing::debug!("Receive thread exiting");
            });

        match worker {
            Ok(worker) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Signals the receive thread and waits for it to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("Receive thread panicked");
            }
        }
    }
}

impl Drop for UdpListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn is_poll_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
