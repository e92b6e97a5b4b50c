use alloc::string::String;
use alloc::vec::Vec;

use crate::message::{Argument, Bundle, Message, Packet};

use super::error::{CodecError, Result};
use super::{BUNDLE_TAG, MAX_BUNDLE_DEPTH, padded_len};

/// Bundle header size: tag(8) + time tag(8)
const BUNDLE_HEADER_SIZE: usize = 16;

/// Decodes one datagram payload into a message or a bundle tree
pub fn decode(data: &[u8]) -> Result<Packet> {
    decode_packet(data, 0)
}

fn decode_packet(data: &[u8], depth: usize) -> Result<Packet> {
    if data.is_empty() {
        return Err(CodecError::UnexpectedEnd);
    }
    if data.len() % 4 != 0 {
        return Err(CodecError::Misaligned(data.len()));
    }

    if data.starts_with(BUNDLE_TAG) {
        decode_bundle(data, depth + 1).map(Packet::Bundle)
    } else {
        decode_message(data).map(Packet::Message)
    }
}

fn decode_bundle(data: &[u8], depth: usize) -> Result<Bundle> {
    if depth > MAX_BUNDLE_DEPTH {
        return Err(CodecError::NestingTooDeep(MAX_BUNDLE_DEPTH));
    }
    if data.len() < BUNDLE_HEADER_SIZE {
        return Err(CodecError::InvalidBundle);
    }

    let mut reader = Reader::new(&data[BUNDLE_TAG.len()..]);
    let time_tag = reader.read_u64()?;
    let mut elements = Vec::new();

    while !reader.is_empty() {
        let size = reader.read_i32()?;
        // Every element consumes at least one aligned word, so the loop always advances
        if size <= 0 || size % 4 != 0 || size as usize > reader.remaining() {
            return Err(CodecError::InvalidElementSize(size));
        }

        let element = reader.take(size as usize)?;
        elements.push(decode_packet(element, depth)?);
    }

    Ok(Bundle { time_tag, elements })
}

fn decode_message(data: &[u8]) -> Result<Message> {
    let mut reader = Reader::new(data);

    let address = reader.read_string()?;
    if !address.starts_with('/') {
        return Err(CodecError::InvalidAddress);
    }

    let mut message = Message::new(address);

    // Senders predating type tags omit the tag string entirely
    if reader.is_empty() {
        return Ok(message);
    }

    let tags = reader.read_string()?;
    let mut tags = tags.chars();
    if tags.next() != Some(',') {
        return Err(CodecError::InvalidTypeTag);
    }

    for tag in tags {
        let arg = match tag {
            'i' => Argument::Int(reader.read_i32()?),
            'f' => Argument::Float(f32::from_bits(reader.read_i32()? as u32)),
            's' => Argument::String(reader.read_string()?),
            'b' => Argument::Blob(reader.read_blob()?),
            other => return Err(CodecError::UnsupportedType(other)),
        };
        message.args.push(arg);
    }

    Ok(message)
}

struct Reader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(CodecError::UnexpectedEnd);
        }
        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let bytes = self.take(8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(word))
    }

    fn read_string(&mut self) -> Result<String> {
        let rest = &self.data[self.position..];
        let terminator = rest
            .iter()
            .position(|&byte| byte == 0)
            .ok_or(CodecError::InvalidString)?;

        let text = core::str::from_utf8(&rest[..terminator])
            .map_err(|_| CodecError::InvalidString)?;
        let text = String::from(text);

        self.take(padded_len(terminator + 1))?;
        Ok(text)
    }

    fn read_blob(&mut self) -> Result<Vec<u8>> {
        let len = self.read_i32()?;
        if len < 0 {
            return Err(CodecError::UnexpectedEnd);
        }

        let bytes = self.take(padded_len(len as usize))?;
        Ok(bytes[..len as usize].to_vec())
    }
}
