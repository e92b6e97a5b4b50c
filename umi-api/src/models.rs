use alloc::string::String;

use crate::message::{Argument, Message};

/// Outbound detection transition
pub const PROX_ADDRESS: &str = "/umi/prox";
/// Outbound liveness announcement
pub const HELLO_ADDRESS: &str = "/umi/hello";
/// Inbound indicator control
pub const LED_ADDRESS: &str = "/umi/led";

/// Serial line reported when an object enters the sensor field
pub const DETECTED_LINE: &str = "D";
/// Serial line reported when the sensor field clears
pub const CLEARED_LINE: &str = "*";

/// Serial command lighting the indicator (persisted by the board)
pub const LED_ON_COMMAND: &str = "C5";
/// Serial command switching the indicator off
pub const LED_OFF_COMMAND: &str = "C0";

/// Maps a framed serial line to a detection state, `None` for anything else.
pub fn classify_line(line: &str) -> Option<bool> {
    match line {
        DETECTED_LINE => Some(true),
        CLEARED_LINE => Some(false),
        _ => None,
    }
}

/// Detection transition observed on the serial line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorEvent {
    /// Identity of the reporting node
    pub device_id: String,
    /// Per-bridge counter starting at 1, wrapping on overflow
    pub sequence: u32,
    /// Whether an object is present
    pub detected: bool,
    /// 32-bit monotonic millisecond counter, wraps after ~49 days
    pub timestamp_ms: u32,
}

impl SensorEvent {
    /// `/umi/prox [id:s, seq:i, detected:i, ts:i]`
    pub fn to_message(&self) -> Message {
        Message::new(PROX_ADDRESS)
            .with_string(self.device_id.clone())
            .with_int(self.sequence as i32)
            .with_int(self.detected as i32)
            .with_int(self.timestamp_ms as i32)
    }
}

/// Periodic liveness broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloAnnouncement {
    pub device_id: String,
    /// Port the bridge listens on for commands
    pub listen_port: u16,
    pub hello_sequence: u32,
}

impl HelloAnnouncement {
    /// `/umi/hello [id:s, port:i, seq:i]`
    pub fn to_message(&self) -> Message {
        Message::new(HELLO_ADDRESS)
            .with_string(self.device_id.clone())
            .with_int(self.listen_port as i32)
            .with_int(self.hello_sequence as i32)
    }
}

/// Inbound instruction recognised by the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set and persist the indicator state
    Led { on: bool },
}

impl Command {
    /// Interprets a message, returning `None` for addresses this node does not handle.
    pub fn parse(message: &Message) -> Option<Self> {
        match message.address.as_str() {
            LED_ADDRESS => {
                let level = match message.args.first()? {
                    Argument::Int(value) => *value,
                    Argument::Float(value) => libm::roundf(*value) as i32,
                    // Non-numeric payloads switch the indicator off
                    _ => 0,
                };
                Some(Self::Led { on: level != 0 })
            }
            _ => None,
        }
    }

    /// Line written to the serial board to apply this command
    pub fn serial_line(&self) -> &'static str {
        match self {
            Self::Led { on: true } => LED_ON_COMMAND,
            Self::Led { on: false } => LED_OFF_COMMAND,
        }
    }
}
