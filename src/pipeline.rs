//! # Pipeline Controller
//!
//! Ties the framer, checksum validation, extraction and publishing together.
//! The controller is driven by [`Pipeline::tick`], called once per scheduling
//! cycle. A tick never blocks: it drains whatever the byte source has right
//! now and returns as soon as the source is empty or a datagram has been
//! handled. State carries over between ticks.
//!
//! ```text
//! ByteSource ──► Framer ──► checksum ──► extract ──► publish ──► RegisterSink
//!                  ▲                                      │
//!                  └──────────── reset ◄──────────────────┘
//! ```
//!
//! A watchdog bounds how long a started datagram may stay incomplete. It is
//! armed when the start marker is found and checked at the top of every tick;
//! once it expires the partial datagram is dropped. The window is measured
//! from the start marker rather than from the last reset, so time spent
//! waiting for a marker on a quiet line never counts against it. A datagram
//! fails only if it started and did not complete within the window.
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::errors::PipelineError;
use crate::metrics::PipelineMetrics;
use crate::publish::{publish_all, Published};
use crate::sink::RegisterSink;
use crate::sml::checksum;
use crate::sml::extract::extract;
use crate::sml::{DecodedValue, FrameEvent, Framer, FramerState, MetricPattern, METRICS};
use crate::source::ByteSource;

/// Everything that came out of one accepted datagram.
#[derive(Debug, Serialize)]
pub struct DatagramReport {
    /// Datagram length, markers and tail included.
    pub length: usize,
    /// Decoded readings, one per metric pattern.
    pub decoded: Vec<Option<DecodedValue>>,
    /// Registers written.
    pub published: Vec<Published>,
    /// Per-metric failures (field underruns, slot overflows, sink errors).
    #[serde(skip)]
    pub failures: Vec<(usize, PipelineError)>,
}

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// The source ran dry before a datagram completed.
    Idle,
    /// A datagram passed validation and its readings were published.
    Published(DatagramReport),
    /// A datagram was dropped (overflow or checksum mismatch).
    Rejected(PipelineError),
    /// The watchdog discarded a partial datagram.
    TimedOut,
}

pub struct Pipeline<K: RegisterSink> {
    framer: Framer,
    patterns: Vec<MetricPattern>,
    sink: K,
    watchdog: Duration,
    armed_at: Option<Instant>,
    stats: Arc<PipelineMetrics>,
}

impl<K: RegisterSink> Pipeline<K> {
    /// Pipeline for the built-in [`METRICS`].
    pub fn new(config: &PipelineConfig, sink: K) -> Self {
        Self::with_patterns(config, METRICS.to_vec(), sink)
    }

    pub fn with_patterns(config: &PipelineConfig, patterns: Vec<MetricPattern>, sink: K) -> Self {
        Self {
            framer: Framer::new(config.buffer_capacity),
            patterns,
            sink,
            watchdog: config.watchdog_timeout(),
            armed_at: None,
            stats: Arc::new(PipelineMetrics::default()),
        }
    }

    pub fn state(&self) -> FramerState {
        self.framer.state()
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut K {
        &mut self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Shared handle to the pipeline's counters.
    pub fn stats(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.stats)
    }

    /// Discard any partial datagram and wait for the next start marker.
    pub fn reset(&mut self) {
        self.framer.reset();
        self.armed_at = None;
    }

    /// Run one scheduling cycle.
    ///
    /// Only a failing byte source is returned as `Err`; every datagram-level
    /// problem is logged, counted and reported through [`TickOutcome`].
    pub fn tick<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
        now: Instant,
    ) -> Result<TickOutcome, PipelineError> {
        if let Some(armed_at) = self.armed_at {
            if now.saturating_duration_since(armed_at) > self.watchdog {
                let err = PipelineError::TimeoutExpired {
                    timeout_secs: self.watchdog.as_secs(),
                };
                warn!("{}, starting over", err);
                self.stats.inc_timeouts();
                self.reset();
                return Ok(TickOutcome::TimedOut);
            }
        }

        while let Some(byte) = source.next_byte()? {
            self.stats.add_bytes_read(1);
            match self.framer.push(byte) {
                Ok(FrameEvent::StartFound) => self.armed_at = Some(now),
                Ok(FrameEvent::Complete) => return Ok(self.process_datagram()),
                Ok(FrameEvent::Pending) | Ok(FrameEvent::EndFound) => {}
                Err(e) => {
                    warn!("{}, starting over", e);
                    self.stats.inc_buffer_overflows();
                    // The framer has already reset itself and rescanned the byte.
                    self.armed_at = None;
                    return Ok(TickOutcome::Rejected(e));
                }
            }
        }
        Ok(TickOutcome::Idle)
    }

    fn process_datagram(&mut self) -> TickOutcome {
        self.stats.inc_datagrams_framed();
        let outcome = match self.framer.datagram() {
            None => TickOutcome::Idle,
            Some(datagram) => match checksum::verify(&datagram) {
                Err(e) => {
                    warn!("{}, starting over", e);
                    self.stats.inc_checksum_mismatches();
                    TickOutcome::Rejected(e)
                }
                Ok(()) => {
                    self.stats.inc_datagrams_valid();
                    let length = datagram.len();
                    let extraction = extract(&datagram, &self.patterns);
                    let publish = publish_all(&self.patterns, &extraction.values, &mut self.sink);

                    let mut failures = extraction.errors;
                    for (_, e) in &failures {
                        if matches!(e, PipelineError::FieldUnderrun { .. }) {
                            self.stats.inc_field_underruns();
                        }
                    }
                    for (_, e) in &publish.failures {
                        match e {
                            PipelineError::SlotOverflow { .. } => self.stats.inc_slot_overflows(),
                            _ => self.stats.inc_sink_errors(),
                        }
                    }
                    for _ in &publish.published {
                        self.stats.inc_publishes();
                    }
                    failures.extend(publish.failures);
                    debug!(
                        "Datagram of {} bytes processed, {} registers written",
                        length,
                        publish.published.len()
                    );
                    TickOutcome::Published(DatagramReport {
                        length,
                        decoded: extraction.values,
                        published: publish.published,
                        failures,
                    })
                }
            },
        };
        self.reset();
        outcome
    }
}
