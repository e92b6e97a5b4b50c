use alloc::vec::Vec;

use crate::message::{Argument, Bundle, Message, Packet};

use super::{BUNDLE_TAG, padded_len};

/// Encodes a packet into a single datagram payload
pub fn encode(packet: &Packet) -> Vec<u8> {
    let mut buffer = Vec::new();
    write_packet(&mut buffer, packet);
    buffer
}

pub fn encode_message(message: &Message) -> Vec<u8> {
    let mut buffer = Vec::new();
    write_message(&mut buffer, message);
    buffer
}

fn write_packet(buffer: &mut Vec<u8>, packet: &Packet) {
    match packet {
        Packet::Message(message) => write_message(buffer, message),
        Packet::Bundle(bundle) => write_bundle(buffer, bundle),
    }
}

fn write_message(buffer: &mut Vec<u8>, message: &Message) {
    write_string(buffer, &message.address);
    write_string(buffer, &message.type_tags());

    for arg in &message.args {
        match arg {
            Argument::Int(value) => buffer.extend_from_slice(&value.to_be_bytes()),
            Argument::Float(value) => buffer.extend_from_slice(&value.to_bits().to_be_bytes()),
            Argument::String(value) => write_string(buffer, value),
            Argument::Blob(value) => write_blob(buffer, value),
        }
    }
}

fn write_bundle(buffer: &mut Vec<u8>, bundle: &Bundle) {
    buffer.extend_from_slice(BUNDLE_TAG);
    buffer.extend_from_slice(&bundle.time_tag.to_be_bytes());

    for element in &bundle.elements {
        let size_offset = buffer.len();
        buffer.extend_from_slice(&[0; 4]);
        write_packet(buffer, element);

        let size = (buffer.len() - size_offset - 4) as i32;
        buffer[size_offset..size_offset + 4].copy_from_slice(&size.to_be_bytes());
    }
}

fn write_string(buffer: &mut Vec<u8>, value: &str) {
    let start = buffer.len();
    buffer.extend_from_slice(value.as_bytes());
    // At least one terminator, then pad to the boundary
    buffer.resize(start + padded_len(value.len() + 1), 0);
}

fn write_blob(buffer: &mut Vec<u8>, value: &[u8]) {
    buffer.extend_from_slice(&(value.len() as i32).to_be_bytes());
    let start = buffer.len();
    buffer.extend_from_slice(value);
    buffer.resize(start + padded_len(value.len()), 0);
}
