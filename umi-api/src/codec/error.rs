use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended inside a field
    UnexpectedEnd,
    /// Packet length is not a multiple of four
    Misaligned(usize),
    /// String field is not NUL-terminated UTF-8
    InvalidString,
    /// Address does not start with `/`
    InvalidAddress,
    /// Type tag string does not start with `,`
    InvalidTypeTag,
    /// Argument type outside `i`, `f`, `s`, `b`
    UnsupportedType(char),
    /// Bundle header is truncated or malformed
    InvalidBundle,
    /// Bundle element size is non-positive, unaligned or overruns the bundle
    InvalidElementSize(i32),
    /// Bundles nested deeper than the configured bound
    NestingTooDeep(usize),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd => write!(f, "Unexpected end of packet"),
            Self::Misaligned(len) => write!(f, "Packet length {} is not 4-byte aligned", len),
            Self::InvalidString => write!(f, "Invalid string field"),
            Self::InvalidAddress => write!(f, "Invalid address pattern"),
            Self::InvalidTypeTag => write!(f, "Invalid type tag string"),
            Self::UnsupportedType(tag) => write!(f, "Unsupported argument type: {}", tag),
            Self::InvalidBundle => write!(f, "Invalid bundle header"),
            Self::InvalidElementSize(size) => write!(f, "Invalid bundle element size: {}", size),
            Self::NestingTooDeep(depth) => write!(f, "Bundle nesting exceeds {} levels", depth),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

pub type Result<T> = core::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CodecError::UnsupportedType('d').to_string(),
            "Unsupported argument type: d"
        );
        assert_eq!(
            CodecError::NestingTooDeep(16).to_string(),
            "Bundle nesting exceeds 16 levels"
        );
        assert_eq!(
            CodecError::Misaligned(7).to_string(),
            "Packet length 7 is not 4-byte aligned"
        );
    }
}
