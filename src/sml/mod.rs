//! # SML Datagram Handling
//!
//! Smart meters with an optical D0/IR port push Smart Message Language (SML)
//! datagrams continuously, usually once per second at 9600 baud. Nothing on the
//! line marks where a datagram starts except its content, so this module
//! resynchronizes purely from the escape sequences:
//!
//! ```text
//! 1B 1B 1B 1B 01 01 01 01 | payload ... | 1B 1B 1B 1B 1A | fill | crc_lo crc_hi
//! ```
//!
//! The checksum is CRC-16/X.25 over everything from the start marker up to and
//! including the fill-count byte.
//!
//! Only enough of SML is understood to frame a datagram, validate it, and pull
//! a handful of OBIS-coded readings out of it by pattern:
//!
//! - [`framer`] - byte-at-a-time state machine producing one [`framer::Datagram`]
//! - [`checksum`] - CRC validation of a completed datagram
//! - [`extract`] - pattern search and TLV walk for the known metrics
//! - [`cursor`] - bounds-checked reader used by the TLV walk
//! - [`buffer`] - fixed-capacity accumulator backing the framer

pub mod buffer;
pub mod checksum;
pub mod cursor;
pub mod extract;
pub mod framer;

pub use buffer::FrameBuffer;
pub use extract::{DecodedValue, MetricPattern, METRICS};
pub use framer::{Datagram, FrameEvent, Framer, FramerState};

/// Escape sequence followed by the version 1 marker.
pub const START_SEQUENCE: [u8; 8] = [0x1B, 0x1B, 0x1B, 0x1B, 0x01, 0x01, 0x01, 0x01];

/// Escape sequence followed by the end-of-message marker.
pub const END_SEQUENCE: [u8; 5] = [0x1B, 0x1B, 0x1B, 0x1B, 0x1A];

/// Fill-count byte plus the two checksum bytes that follow the end marker.
pub const TAIL_LEN: usize = 3;

/// Longest datagram the framer will accumulate, about four seconds of line time at 9600 baud.
pub const DEFAULT_BUFFER_CAPACITY: usize = 3840;

/// Shortest possible datagram: both markers and the tail with an empty payload.
pub const MIN_DATAGRAM_LEN: usize = START_SEQUENCE.len() + END_SEQUENCE.len() + TAIL_LEN;
