//! # smlbridge - SML smart meter to register bridge
//!
//! smlbridge reads the SML datagrams a German-style electricity meter pushes
//! out of its optical interface, validates them and publishes a few readings
//! (energy drawn, energy fed in, current power) as scaled 32-bit registers
//! for downstream reporting hardware.
//!
//! ## Features
//!
//! - **Resynchronizing framer**: finds datagrams in an unframed, possibly
//!   corrupted byte stream using the SML escape sequences.
//! - **Integrity checks**: CRC-16/X.25 validation of every datagram.
//! - **Bounds-checked decoding**: readings located by OBIS pattern and decoded
//!   from their TLV fields without ever reading past the datagram.
//! - **Unattended operation**: every malformed input and stalled datagram is
//!   recovered from locally; a watchdog bounds how long a datagram may take.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Instant;
//! use smlbridge::config::Config;
//! use smlbridge::pipeline::{Pipeline, TickOutcome};
//! use smlbridge::sink::RegisterBank;
//! use smlbridge::source::ReplaySource;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let mut pipeline = Pipeline::new(&config.pipeline, RegisterBank::new(config.sink.slots));
//! let mut source = ReplaySource::new(std::fs::read("capture.bin")?);
//! while !source.is_exhausted() {
//!     if let TickOutcome::Published(report) = pipeline.tick(&mut source, Instant::now())? {
//!         println!("{:?}", report.published);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`sml`] - framing, checksum and extraction of SML datagrams
//! - [`pipeline`] - per-tick controller with watchdog
//! - [`publish`] - scaling and register writes
//! - [`sink`] - register sink capability and implementations
//! - [`source`] - non-blocking byte sources (replay, serial)
//! - [`config`] - TOML configuration
//! - [`metrics`] - pipeline counters
//! - [`errors`] - error types
//! - [`logutil`] - hex rendering for logs

pub mod config;
pub mod errors;
pub mod logutil;
pub mod metrics;
pub mod pipeline;
pub mod publish;
pub mod sink;
pub mod sml;
pub mod source;
