//! # Byte Sources
//!
//! The pipeline pulls bytes one at a time from a [`ByteSource`] and must never
//! block while doing so: a source hands out what it already has and reports
//! `None` once it is drained for now.
//!
//! - [`ReplaySource`] - bytes held in memory (captures, tests)
//! - [`SerialSource`] - the meter's IR reading head on a serial port
//!   (requires the `serial` feature)
use std::io;

use anyhow::{anyhow, bail, Result};
use bytes::{Buf, Bytes};

/// Non-blocking supplier of meter bytes.
pub trait ByteSource {
    /// The next byte if one is available right now.
    fn next_byte(&mut self) -> io::Result<Option<u8>>;
}

/// Serves a fixed byte sequence, optionally in bounded chunks to mimic bytes
/// trickling in over several scheduling ticks.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    data: Bytes,
    chunk: Option<usize>,
    served_in_chunk: usize,
}

impl ReplaySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            chunk: None,
            served_in_chunk: 0,
        }
    }

    /// Report "no data" after every `chunk` bytes until [`ReplaySource::next_chunk`].
    pub fn chunked(data: impl Into<Bytes>, chunk: usize) -> Self {
        Self {
            data: data.into(),
            chunk: Some(chunk.max(1)),
            served_in_chunk: 0,
        }
    }

    /// Make the next chunk available.
    pub fn next_chunk(&mut self) {
        self.served_in_chunk = 0;
    }

    pub fn remaining(&self) -> usize {
        self.data.remaining()
    }

    pub fn is_exhausted(&self) -> bool {
        !self.data.has_remaining()
    }

    /// Parse a whitespace-separated hex dump such as `1B 1B 1B 1B 01 ...`.
    /// `0x` prefixes and line comments starting with `#` are accepted.
    pub fn from_hex(text: &str) -> Result<Self> {
        let mut out = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or("");
            for token in line.split_whitespace() {
                let token = token.trim_start_matches("0x").trim_start_matches("0X");
                if token.len() % 2 != 0 {
                    bail!("line {}: odd-length hex token '{}'", line_no + 1, token);
                }
                for pair in token.as_bytes().chunks(2) {
                    let b = std::str::from_utf8(pair)
                        .ok()
                        .and_then(|s| u8::from_str_radix(s, 16).ok())
                        .ok_or_else(|| {
                            anyhow!(
                                "line {}: invalid hex byte '{}'",
                                line_no + 1,
                                String::from_utf8_lossy(pair)
                            )
                        })?;
                    out.push(b);
                }
            }
        }
        Ok(Self::new(out))
    }
}

impl ByteSource for ReplaySource {
    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(chunk) = self.chunk {
            if self.served_in_chunk >= chunk {
                return Ok(None);
            }
        }
        if !self.data.has_remaining() {
            return Ok(None);
        }
        self.served_in_chunk += 1;
        Ok(Some(self.data.get_u8()))
    }
}

#[cfg(feature = "serial")]
pub use serial::SerialSource;

#[cfg(feature = "serial")]
mod serial {
    use std::io::{self, Read};
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use bytes::{Buf, BytesMut};
    use log::{debug, info, trace};
    use serialport::SerialPort;

    use super::ByteSource;
    use crate::logutil::hex_snippet;

    const READ_CHUNK: usize = 512;

    /// Meter reading head attached to a serial port (8N1).
    ///
    /// Bytes are pulled from the OS only when `bytes_to_read` reports some,
    /// so [`ByteSource::next_byte`] never waits on the line.
    pub struct SerialSource {
        port_name: String,
        port: Box<dyn SerialPort>,
        pending: BytesMut,
    }

    impl SerialSource {
        pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
            info!("Opening meter port {} at {} baud", port_name, baud_rate);
            let mut builder =
                serialport::new(port_name, baud_rate).timeout(Duration::from_millis(10));
            #[cfg(unix)]
            {
                builder = builder
                    .data_bits(serialport::DataBits::Eight)
                    .stop_bits(serialport::StopBits::One)
                    .parity(serialport::Parity::None);
            }
            let port = builder
                .open()
                .map_err(|e| anyhow!("Failed to open serial port {}: {}", port_name, e))?;
            Ok(Self {
                port_name: port_name.to_string(),
                port,
                pending: BytesMut::with_capacity(READ_CHUNK),
            })
        }

        pub fn port_name(&self) -> &str {
            &self.port_name
        }

        fn refill(&mut self) -> io::Result<()> {
            let available = self.port.bytes_to_read().map_err(io::Error::from)? as usize;
            if available == 0 {
                return Ok(());
            }
            let mut buf = [0u8; READ_CHUNK];
            let want = available.min(READ_CHUNK);
            match self.port.read(&mut buf[..want]) {
                Ok(n) => {
                    trace!("RAW {} bytes: {}", n, hex_snippet(&buf[..n], 32));
                    self.pending.extend_from_slice(&buf[..n]);
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                    debug!("serial read timed out despite {} bytes pending", available);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
    }

    impl ByteSource for SerialSource {
        fn next_byte(&mut self) -> io::Result<Option<u8>> {
            if !self.pending.has_remaining() {
                self.refill()?;
            }
            if self.pending.has_remaining() {
                Ok(Some(self.pending.get_u8()))
            } else {
                Ok(None)
            }
        }
    }
}
