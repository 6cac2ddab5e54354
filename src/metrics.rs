//! Pipeline counters.
//!
//! A [`PipelineMetrics`] is owned by the pipeline and can be shared through an
//! `Arc` with whatever reports it (the `run` command logs a [`Snapshot`]
//! periodically).
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    bytes_read: AtomicU64,
    datagrams_framed: AtomicU64,
    datagrams_valid: AtomicU64,
    buffer_overflows: AtomicU64,
    checksum_mismatches: AtomicU64,
    timeouts: AtomicU64,
    field_underruns: AtomicU64,
    slot_overflows: AtomicU64,
    sink_errors: AtomicU64,
    publishes: AtomicU64,
}

impl PipelineMetrics {
    pub fn add_bytes_read(&self, n: u64) {
        self.bytes_read.fetch_add(n, Ordering::Relaxed);
    }
    pub fn inc_datagrams_framed(&self) {
        self.datagrams_framed.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_datagrams_valid(&self) {
        self.datagrams_valid.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_buffer_overflows(&self) {
        self.buffer_overflows.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_checksum_mismatches(&self) {
        self.checksum_mismatches.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_field_underruns(&self) {
        self.field_underruns.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_slot_overflows(&self) {
        self.slot_overflows.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_sink_errors(&self) {
        self.sink_errors.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_publishes(&self) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            datagrams_framed: self.datagrams_framed.load(Ordering::Relaxed),
            datagrams_valid: self.datagrams_valid.load(Ordering::Relaxed),
            buffer_overflows: self.buffer_overflows.load(Ordering::Relaxed),
            checksum_mismatches: self.checksum_mismatches.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            field_underruns: self.field_underruns.load(Ordering::Relaxed),
            slot_overflows: self.slot_overflows.load(Ordering::Relaxed),
            sink_errors: self.sink_errors.load(Ordering::Relaxed),
            publishes: self.publishes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Snapshot {
    pub bytes_read: u64,
    pub datagrams_framed: u64,
    pub datagrams_valid: u64,
    pub buffer_overflows: u64,
    pub checksum_mismatches: u64,
    pub timeouts: u64,
    pub field_underruns: u64,
    pub slot_overflows: u64,
    pub sink_errors: u64,
    pub publishes: u64,
}

impl Snapshot {
    /// Share of framed datagrams that passed the checksum, if any were framed.
    pub fn valid_ratio(&self) -> Option<f64> {
        if self.datagrams_framed == 0 {
            None
        } else {
            Some(self.datagrams_valid as f64 / self.datagrams_framed as f64)
        }
    }
}
