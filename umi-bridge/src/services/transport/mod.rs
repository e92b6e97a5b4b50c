pub mod udp;

use std::io;

pub use udp::{UdpListener, UdpUplink};

/// Outbound datagram link with connect-on-demand semantics
pub trait Uplink: Send {
    /// Resolve and attach to the remote endpoint
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    /// Send one datagram to the attached endpoint
    fn send(&mut self, datagram: &[u8]) -> io::Result<()>;

    /// Release the link; a later send requires a new connect
    fn disconnect(&mut self);
}
