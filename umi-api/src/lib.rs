#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod codec;
pub mod framing;
pub mod message;
pub mod models;

pub use codec::{CodecError, MAX_BUNDLE_DEPTH, decode, encode};
pub use framing::LineFramer;
pub use message::{Argument, Bundle, Message, Packet};
pub use models::{Command, HelloAnnouncement, SensorEvent};
