mod decode;
mod encode;
pub mod error;

pub use decode::decode;
pub use encode::{encode, encode_message};
pub use error::{CodecError, Result};

/// Marker opening every bundle
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Deepest bundle nesting accepted by the decoder
pub const MAX_BUNDLE_DEPTH: usize = 16;

/// Largest datagram the codec is expected to handle
pub const MAX_PACKET_SIZE: usize = 65_507;

/// Rounds a field length up to the 4-byte wire alignment.
pub(crate) const fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}
