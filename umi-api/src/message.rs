use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Bundle time tag meaning "apply on receipt"
pub const IMMEDIATELY: u64 = 1;

/// Typed message argument
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// 32-bit big-endian integer, type tag `i`
    Int(i32),
    /// 32-bit IEEE float, type tag `f`
    Float(f32),
    /// NUL-terminated string, type tag `s`
    String(String),
    /// Size-prefixed opaque bytes, type tag `b`
    Blob(Vec<u8>),
}

impl Argument {
    pub fn type_tag(&self) -> char {
        match self {
            Self::Int(_) => 'i',
            Self::Float(_) => 'f',
            Self::String(_) => 's',
            Self::Blob(_) => 'b',
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "int:{}", value),
            Self::Float(value) => write!(f, "float:{}", value),
            Self::String(value) => write!(f, "str:{}", value),
            Self::Blob(value) => write!(f, "blob({}B)", value.len()),
        }
    }
}

/// Addressed message with ordered arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Hierarchical address path, always starting with `/`
    pub address: String,
    pub args: Vec<Argument>,
}

impl Message {
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    pub fn with_int(mut self, value: i32) -> Self {
        self.args.push(Argument::Int(value));
        self
    }

    pub fn with_float(mut self, value: f32) -> Self {
        self.args.push(Argument::Float(value));
        self
    }

    pub fn with_string<S: Into<String>>(mut self, value: S) -> Self {
        self.args.push(Argument::String(value.into()));
        self
    }

    pub fn with_blob(mut self, value: Vec<u8>) -> Self {
        self.args.push(Argument::Blob(value));
        self
    }

    /// Type tag string as sent on the wire, e.g. `,sii`
    pub fn type_tags(&self) -> String {
        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        for arg in &self.args {
            tags.push(arg.type_tag());
        }
        tags
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "addr={} argc={}", self.address, self.args.len())?;
        for (i, arg) in self.args.iter().enumerate() {
            write!(f, "  arg{}={}", i, arg)?;
        }
        Ok(())
    }
}

/// Ordered container of messages and nested bundles
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub time_tag: u64,
    pub elements: Vec<Packet>,
}

impl Bundle {
    pub fn new(time_tag: u64) -> Self {
        Self {
            time_tag,
            elements: Vec::new(),
        }
    }

    pub fn immediate() -> Self {
        Self::new(IMMEDIATELY)
    }

    pub fn with<P: Into<Packet>>(mut self, element: P) -> Self {
        self.elements.push(element.into());
        self
    }
}

/// A single wire unit: either one message or a bundle
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Message(Message),
    Bundle(Bundle),
}

impl Packet {
    /// Visits every message depth-first, preserving element order.
    pub fn for_each_message<F: FnMut(&Message)>(&self, visit: &mut F) {
        match self {
            Self::Message(message) => visit(message),
            Self::Bundle(bundle) => {
                for element in &bundle.elements {
                    element.for_each_message(visit);
                }
            }
        }
    }

    pub fn message_count(&self) -> usize {
        let mut count = 0;
        self.for_each_message(&mut |_| count += 1);
        count
    }
}

impl From<Message> for Packet {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

impl From<Bundle> for Packet {
    fn from(bundle: Bundle) -> Self {
        Self::Bundle(bundle)
    }
}
