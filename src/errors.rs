use thiserror::Error;

/// Failures raised while turning the meter byte stream into published registers.
///
/// Every variant except [`PipelineError::Io`] is recoverable: the pipeline logs
/// it, drops the affected datagram or metric and keeps running.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Accumulating one more byte would eat into the space reserved for the
    /// fill-count and checksum tail.
    #[error("frame buffer would overflow (capacity {capacity} bytes)")]
    BufferOverflow { capacity: usize },

    /// The CRC-16/X.25 over the datagram does not match the embedded one.
    #[error("checksum mismatch: computed {computed:#06x}, datagram carries {expected:#06x}")]
    ChecksumMismatch { computed: u16, expected: u16 },

    /// No complete datagram arrived within the watchdog window.
    #[error("no complete datagram within {timeout_secs}s")]
    TimeoutExpired { timeout_secs: u64 },

    /// A TLV field would have been read past the end of the datagram.
    #[error("field underrun at offset {offset}: need {needed} bytes, datagram has {len}")]
    FieldUnderrun {
        offset: usize,
        needed: usize,
        len: usize,
    },

    /// The metric's position has no corresponding register in the sink.
    #[error("metric index {index} exceeds the {slots} available register slots")]
    SlotOverflow { index: usize, slots: usize },

    /// The register sink refused a write.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// Reading from the byte source failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a [`crate::sink::RegisterSink`].
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("register slot {index} does not exist (sink has {slots})")]
    NoSuchSlot { index: usize, slots: usize },

    #[error("failed to persist registers: {0}")]
    Persist(#[from] std::io::Error),

    #[error("failed to encode registers: {0}")]
    Encode(#[from] serde_json::Error),
}
