//! Packet framing.
//!
//! Every payload travels as one or more frames: a 3-byte little-endian
//! length, a 1-byte sequence id, then the frame body. Payloads of
//! `MAX_FRAME_LEN` bytes or more are split; a frame of exactly
//! `MAX_FRAME_LEN` bytes is always followed by another frame, which is
//! empty when nothing remains.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

/// Largest frame body the protocol allows.
pub const MAX_FRAME_LEN: usize = 0xFF_FFFF;

/// Frame header as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct PacketHeader {
    length: [u8; 3],
    sequence_id: u8,
}

impl PacketHeader {
    pub fn new(length: usize, sequence_id: u8) -> Self {
        let le = (length as u32).to_le_bytes();
        Self {
            length: [le[0], le[1], le[2]],
            sequence_id,
        }
    }

    /// Body length of this frame.
    pub fn length(&self) -> usize {
        usize::from(self.length[0])
            | (usize::from(self.length[1]) << 8)
            | (usize::from(self.length[2]) << 16)
    }

    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    /// Parse a header from its 4 wire bytes.
    pub fn from_bytes(bytes: &[u8; 4]) -> Self {
        Self {
            length: [bytes[0], bytes[1], bytes[2]],
            sequence_id: bytes[3],
        }
    }
}

/// Sequence-id bookkeeping and frame splitting for one connection.
///
/// One counter serves both directions: it is reset to 0 when a command
/// starts and advances by one for every frame written or accepted.
#[derive(Debug, Clone)]
pub struct Framer {
    sequence_id: u8,
    max_frame_len: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Self {
            sequence_id: 0,
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    /// A framer that splits at `max_frame_len` instead of the protocol maximum.
    #[cfg(test)]
    pub(crate) fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            sequence_id: 0,
            max_frame_len,
        }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Sequence id the next frame will carry (or must carry, when reading).
    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    /// Start a new command cycle.
    pub fn reset(&mut self) {
        self.sequence_id = 0;
    }

    /// Append `payload` to `out` as a run of frames.
    pub fn encode(&mut self, payload: &[u8], out: &mut Vec<u8>) {
        let mut rest = payload;
        loop {
            let len = rest.len().min(self.max_frame_len);
            let (chunk, tail) = rest.split_at(len);
            out.extend_from_slice(PacketHeader::new(len, self.next_sequence_id()).as_bytes());
            out.extend_from_slice(chunk);
            rest = tail;
            if len < self.max_frame_len {
                break;
            }
        }
        tracing::trace!(
            len = payload.len(),
            next_seq = self.sequence_id,
            "encoded payload"
        );
    }

    /// Validate the header of an incoming frame and advance the counter.
    ///
    /// Returns the body length and whether more frames of the same payload follow.
    pub fn accept(&mut self, header: &PacketHeader) -> Result<(usize, bool)> {
        let expected = self.sequence_id;
        if header.sequence_id() != expected {
            return Err(Error::Protocol(format!(
                "packet sequence mismatch: expected {}, got {}",
                expected,
                header.sequence_id()
            )));
        }
        self.next_sequence_id();
        let len = header.length();
        Ok((len, len == self.max_frame_len))
    }

    fn next_sequence_id(&mut self) -> u8 {
        let id = self.sequence_id;
        self.sequence_id = self.sequence_id.wrapping_add(1);
        id
    }
}

/// Reassemble a payload from a complete in-memory frame sequence.
///
/// Returns the number of bytes consumed from `data`.
pub fn decode_frames(framer: &mut Framer, data: &[u8], out: &mut Vec<u8>) -> Result<usize> {
    let mut offset = 0;
    loop {
        let header_bytes: &[u8; 4] = data
            .get(offset..offset + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or(Error::ConnectionClosed)?;
        let header = PacketHeader::from_bytes(header_bytes);
        let (len, more) = framer.accept(&header)?;
        offset += 4;
        let body = data.get(offset..offset + len).ok_or(Error::ConnectionClosed)?;
        out.extend_from_slice(body);
        offset += len;
        if !more {
            return Ok(offset);
        }
    }
}
