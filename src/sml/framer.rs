//! Incremental SML framer.
//!
//! The meter's serial output is an unframed byte stream; the reader may be
//! attached mid-datagram and the line may drop or corrupt bytes. The framer is
//! fed one byte at a time and resynchronizes purely on the start and end
//! escape sequences. It never allocates after construction and never looks
//! further back than the bytes it already holds.
//!
//! Start-marker matching resets to the beginning on any mismatch and does not
//! re-examine the mismatching byte, so a marker that begins inside a failed
//! partial match is missed. Real meters pause between datagrams, which keeps
//! that case from occurring on a live line.
use log::{debug, trace};

use super::buffer::FrameBuffer;
use super::{END_SEQUENCE, MIN_DATAGRAM_LEN, START_SEQUENCE, TAIL_LEN};
use crate::errors::PipelineError;
use crate::logutil::hex_dump;

/// Where the framer is within the current datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    /// Scanning for the start marker; `matched` bytes of it have been seen.
    WaitStart { matched: usize },
    /// Collecting the datagram body until the end marker shows up.
    Accumulate,
    /// End marker seen; `remaining` tail bytes still to come.
    AwaitTail { remaining: usize },
    /// A complete datagram is held in the buffer.
    Done,
}

/// What a single byte did to the framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// Nothing noteworthy; keep feeding.
    Pending,
    /// The start marker just completed and a new datagram body begins.
    StartFound,
    /// The end marker just completed.
    EndFound,
    /// The tail arrived; [`Framer::datagram`] now returns the datagram.
    Complete,
}

/// Byte-stream state machine producing one datagram at a time.
#[derive(Debug)]
pub struct Framer {
    state: FramerState,
    buffer: FrameBuffer,
}

impl Framer {
    /// Framer holding datagrams of up to `capacity` bytes. Capacities below
    /// [`MIN_DATAGRAM_LEN`] are raised to it.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: FramerState::WaitStart { matched: 0 },
            buffer: FrameBuffer::with_capacity(capacity.max(MIN_DATAGRAM_LEN)),
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Bytes currently held, including the start marker once it matched.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial datagram and go back to scanning for a start marker.
    pub fn reset(&mut self) {
        if self.state != (FramerState::WaitStart { matched: 0 }) {
            debug!("framer: state is WaitStart");
        }
        self.buffer.clear();
        self.state = FramerState::WaitStart { matched: 0 };
    }

    /// Feed one byte.
    ///
    /// On [`PipelineError::BufferOverflow`] the partial datagram has already
    /// been discarded and `byte` has been rescanned as a potential start of
    /// the next marker, so the caller simply carries on with the next byte.
    pub fn push(&mut self, byte: u8) -> Result<FrameEvent, PipelineError> {
        match self.state {
            FramerState::WaitStart { matched } => Ok(self.scan_start(matched, byte)),
            FramerState::Accumulate => {
                if !self.buffer.push_body(byte) {
                    let capacity = self.buffer.capacity();
                    self.reset();
                    let _ = self.scan_start(0, byte);
                    return Err(PipelineError::BufferOverflow { capacity });
                }
                if self.buffer.ends_with(&END_SEQUENCE) {
                    debug!(
                        "framer: end sequence found after {} bytes, state is AwaitTail",
                        self.buffer.len()
                    );
                    self.state = FramerState::AwaitTail {
                        remaining: TAIL_LEN,
                    };
                    return Ok(FrameEvent::EndFound);
                }
                Ok(FrameEvent::Pending)
            }
            FramerState::AwaitTail { remaining } => {
                // The body never exceeds capacity - TAIL_LEN, so the tail always fits.
                let _ = self.buffer.push_tail(byte);
                if remaining > 1 {
                    self.state = FramerState::AwaitTail {
                        remaining: remaining - 1,
                    };
                    return Ok(FrameEvent::Pending);
                }
                self.state = FramerState::Done;
                debug!("framer: datagram of {} bytes read", self.buffer.len());
                trace!("framer: datagram {}", hex_dump(self.buffer.as_slice()));
                Ok(FrameEvent::Complete)
            }
            FramerState::Done => Ok(FrameEvent::Complete),
        }
    }

    fn scan_start(&mut self, matched: usize, byte: u8) -> FrameEvent {
        let matched = if byte == START_SEQUENCE[matched] {
            matched + 1
        } else {
            0
        };
        if matched == START_SEQUENCE.len() {
            self.buffer.clear();
            if !self.buffer.extend_body(&START_SEQUENCE) {
                self.state = FramerState::WaitStart { matched: 0 };
                return FrameEvent::Pending;
            }
            self.state = FramerState::Accumulate;
            debug!("framer: start sequence found, state is Accumulate");
            return FrameEvent::StartFound;
        }
        self.state = FramerState::WaitStart { matched };
        FrameEvent::Pending
    }

    /// The completed datagram, available only in [`FramerState::Done`].
    pub fn datagram(&self) -> Option<Datagram<'_>> {
        match self.state {
            FramerState::Done => Datagram::from_bytes(self.buffer.as_slice()),
            _ => None,
        }
    }
}

/// A complete datagram: start marker through checksum. Always at least
/// [`MIN_DATAGRAM_LEN`] bytes, with both markers in place.
#[derive(Debug, Clone, Copy)]
pub struct Datagram<'a> {
    bytes: &'a [u8],
}

impl<'a> Datagram<'a> {
    /// Wrap bytes that were framed elsewhere, e.g. a captured datagram.
    /// Returns `None` if the slice cannot hold both markers and the tail.
    pub fn from_bytes(bytes: &'a [u8]) -> Option<Self> {
        if bytes.len() < MIN_DATAGRAM_LEN
            || !bytes.starts_with(&START_SEQUENCE)
            || !bytes[..bytes.len() - TAIL_LEN].ends_with(&END_SEQUENCE)
        {
            return None;
        }
        Some(Self { bytes })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes between the start and end markers.
    pub fn payload(&self) -> &'a [u8] {
        let end = self
            .bytes
            .len()
            .saturating_sub(TAIL_LEN + END_SEQUENCE.len());
        self.bytes.get(START_SEQUENCE.len()..end).unwrap_or(&[])
    }

    /// Number of padding bytes the sender reports before the end marker.
    pub fn fill_count(&self) -> u8 {
        self.bytes[self.bytes.len() - TAIL_LEN]
    }

    /// Checksum as carried on the wire (little-endian).
    pub fn embedded_checksum(&self) -> u16 {
        let n = self.bytes.len();
        u16::from_le_bytes([self.bytes[n - 2], self.bytes[n - 1]])
    }

    /// Everything the checksum covers.
    pub fn checksummed(&self) -> &'a [u8] {
        &self.bytes[..self.bytes.len() - 2]
    }
}
