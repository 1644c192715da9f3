//! RFC 6455 frame encode/decode primitives: the opcode set, bit-accessor
//! helpers over the two header bytes, and client-side masked frame
//! construction.
//!
//! Grounded on `snakecord/connection.py`'s `WebsocketFrame`, a `cstruct`
//! subclass. The decoder in [`crate::receive`] reads `fbyte`/`sbyte`
//! directly off the byte stream rather than through
//! [`shardkit_model::RecordLayout`] — the record layout's declarative
//! pack/unpack assumes a whole buffer up front, which doesn't fit a
//! decoder fed one `read()` at a time; only the extended 16/64-bit
//! length field reuses C1, via [`shardkit_model::read_uint`].

use rand::RngCore;
use shardkit_model::{ByteOrder, read_uint};

/// The WebSocket opcode set this codec understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Cont,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl Opcode {
    pub const fn as_u8(self) -> u8 {
        match self {
            Opcode::Cont => 0x00,
            Opcode::Text => 0x01,
            Opcode::Binary => 0x02,
            Opcode::Close => 0x08,
            Opcode::Ping => 0x09,
            Opcode::Pong => 0x0A,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Opcode::Cont),
            0x01 => Ok(Opcode::Text),
            0x02 => Ok(Opcode::Binary),
            0x08 => Ok(Opcode::Close),
            0x09 => Ok(Opcode::Ping),
            0x0A => Ok(Opcode::Pong),
            other => Err(other),
        }
    }
}

/// A fully decoded (or about-to-be-encoded) WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub opcode_byte: u8,
    pub masked: bool,
    pub payload: Vec<u8>,
}

impl Frame {
    /// The frame's opcode, or `None` if the 4-bit code isn't one this
    /// codec recognises.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::try_from(self.opcode_byte).ok()
    }
}

// ---------------------------------------------------------------------------
// Bit accessor helpers — operate on a single header byte, per RFC 6455.
// ---------------------------------------------------------------------------

pub const fn get_fin(byte: u8) -> bool {
    byte & 0b1000_0000 != 0
}

pub const fn get_rsv1(byte: u8) -> bool {
    byte & 0b0100_0000 != 0
}

pub const fn get_rsv2(byte: u8) -> bool {
    byte & 0b0010_0000 != 0
}

pub const fn get_rsv3(byte: u8) -> bool {
    byte & 0b0001_0000 != 0
}

pub const fn get_opcode(byte: u8) -> u8 {
    byte & 0b0000_1111
}

pub const fn get_mask(byte: u8) -> bool {
    byte & 0b1000_0000 != 0
}

pub const fn get_length(byte: u8) -> u8 {
    byte & 0b0111_1111
}

/// Decode a big-endian extended length field (2 or 8 bytes).
pub fn decode_extended_length(buf: &[u8]) -> u64 {
    read_uint(buf, ByteOrder::Big)
}

fn apply_mask(mask: [u8; 4], data: &mut [u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Encoding options for [`create_frame`]. Mirrors the source's keyword
/// defaults (`opcode=TEXT, fin=True, rsv1/2/3=False, masked=True`).
#[derive(Debug, Clone, Copy)]
pub struct FrameOptions {
    pub opcode: Opcode,
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    pub masked: bool,
}

impl Default for FrameOptions {
    fn default() -> Self {
        FrameOptions {
            opcode: Opcode::Text,
            fin: true,
            rsv1: false,
            rsv2: false,
            rsv3: false,
            masked: true,
        }
    }
}

/// Encode `payload` into a wire-ready RFC 6455 frame.
///
/// Client-originated frames must be masked (`options.masked = true`,
/// the default); a fresh 4-byte mask is drawn from the OS RNG per call.
pub fn create_frame(payload: &[u8], options: FrameOptions) -> Vec<u8> {
    let mut buffer = vec![0u8; 2];

    if options.fin {
        buffer[0] |= 0b1000_0000;
    }
    if options.rsv1 {
        buffer[0] |= 0b0100_0000;
    }
    if options.rsv2 {
        buffer[0] |= 0b0010_0000;
    }
    if options.rsv3 {
        buffer[0] |= 0b0001_0000;
    }
    buffer[0] |= options.opcode.as_u8();

    if options.masked {
        buffer[1] |= 0b1000_0000;
    }

    let length = payload.len();
    if length <= 125 {
        buffer[1] |= length as u8;
    } else if length <= 0xFFFF {
        buffer[1] |= 126;
        buffer.extend_from_slice(&(length as u16).to_be_bytes());
    } else {
        buffer[1] |= 127;
        buffer.extend_from_slice(&(length as u64).to_be_bytes());
    }

    if options.masked {
        let mut mask = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut mask);
        let mut data = payload.to_vec();
        apply_mask(mask, &mut data);
        buffer.extend_from_slice(&mask);
        buffer.extend_from_slice(&data);
    } else {
        buffer.extend_from_slice(payload);
    }

    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receive::FrameDecoder;

    #[test]
    fn bit_accessors_match_rfc6455_layout() {
        let fbyte = 0b1100_1001;
        assert!(get_fin(fbyte));
        assert!(get_rsv1(fbyte));
        assert!(!get_rsv2(fbyte));
        assert_eq!(get_opcode(fbyte), 0x09);

        let sbyte = 0b1111_1110;
        assert!(get_mask(sbyte));
        assert_eq!(get_length(sbyte), 126);
    }

    #[test]
    fn decode_extended_length_reads_big_endian() {
        assert_eq!(decode_extended_length(&[0x01, 0x00]), 256);
        assert_eq!(decode_extended_length(&[0, 0, 0, 0, 0, 1, 0, 0]), 65536);
    }

    /// P2: for all payloads and masking flags, decode(encode(p)) yields a
    /// frame whose payload, opcode, and flags match what was supplied.
    #[test]
    fn frame_round_trip_small_medium_and_large_payloads_both_masked_states() {
        for masked in [true, false] {
            for len in [0usize, 10, 200, 70_000] {
                let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
                let options = FrameOptions {
                    opcode: Opcode::Binary,
                    masked,
                    ..FrameOptions::default()
                };
                let encoded = create_frame(&payload, options);

                let mut decoder = FrameDecoder::new();
                let frames = decoder.feed(&encoded);
                assert_eq!(frames.len(), 1, "len={len} masked={masked}");
                let frame = &frames[0];
                assert_eq!(frame.payload, payload);
                assert_eq!(frame.opcode(), Some(Opcode::Binary));
                assert!(frame.fin);
            }
        }
    }
}
