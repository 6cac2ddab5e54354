//! Fixed-capacity byte accumulator for one in-flight datagram.

use super::TAIL_LEN;

/// Accumulates the bytes of a single datagram.
///
/// The backing storage is allocated once with the configured capacity and
/// reused across datagrams. While a datagram body is being collected the
/// length stays at or below `capacity - TAIL_LEN`; the remaining bytes are
/// only ever filled by the fill-count and checksum tail.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    capacity: usize,
}

impl FrameBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Whether one more body byte still leaves room for the tail.
    pub fn has_body_room(&self) -> bool {
        self.buf.len() + TAIL_LEN < self.capacity
    }

    /// Append a body byte. Returns `false` and leaves the buffer untouched if
    /// the byte would cut into the tail reserve.
    pub fn push_body(&mut self, byte: u8) -> bool {
        if !self.has_body_room() {
            return false;
        }
        self.buf.push(byte);
        true
    }

    /// Append a tail byte. The reserve guarantees room for exactly
    /// [`TAIL_LEN`] of these after the body.
    pub fn push_tail(&mut self, byte: u8) -> bool {
        if self.buf.len() >= self.capacity {
            return false;
        }
        self.buf.push(byte);
        true
    }

    pub fn extend_body(&mut self, bytes: &[u8]) -> bool {
        if self.buf.len() + bytes.len() + TAIL_LEN > self.capacity {
            return false;
        }
        self.buf.extend_from_slice(bytes);
        true
    }

    pub fn ends_with(&self, suffix: &[u8]) -> bool {
        self.buf.ends_with(suffix)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
