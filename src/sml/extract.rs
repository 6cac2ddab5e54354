//! Pattern-based extraction of known readings from a validated datagram.
//!
//! Each reading in an SML `GetList.Res` is an SML_ListEntry whose object name
//! is an OBIS code. Instead of parsing the full list structure, the extractor
//! searches for the TLV-encoded object name and walks the fixed sequence of
//! fields that follows it:
//!
//! ```text
//! <obis pattern> <status> <valTime> <unit> <scaler> <value> ...
//! ```
//!
//! Every field starts with a TL byte whose low nibble is the field's total
//! length including the TL byte itself. For the value field, bits 4..6 carry
//! the type (`0x50` signed integer, `0x60` unsigned). Both are accumulated
//! big-endian into 64 bits and the pattern is read as an `i64`; a signed field
//! shorter than 8 bytes is not sign-extended.
use log::{debug, warn};
use serde::Serialize;

use super::cursor::Cursor;
use super::framer::Datagram;
use crate::errors::PipelineError;

const TL_LENGTH_MASK: u8 = 0x0F;

/// A named OBIS object-name pattern. Position in [`METRICS`] is the output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricPattern {
    pub name: &'static str,
    pub pattern: &'static [u8],
}

/// Readings published by the bridge, in register order.
pub const METRICS: &[MetricPattern] = &[
    // 1.8.0: total energy drawn from the grid
    MetricPattern {
        name: "power_in",
        pattern: &[0x77, 0x07, 0x01, 0x00, 0x01, 0x08, 0x00, 0xFF],
    },
    // 2.8.0: total energy fed into the grid
    MetricPattern {
        name: "power_out",
        pattern: &[0x77, 0x07, 0x01, 0x00, 0x02, 0x08, 0x00, 0xFF],
    },
    // 16.7.0: current active power
    MetricPattern {
        name: "power_current",
        pattern: &[0x77, 0x07, 0x01, 0x00, 0x10, 0x07, 0x00, 0xFF],
    },
];

/// One reading as carried in the datagram: `value * 10^scaler` in `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodedValue {
    pub value: i64,
    /// DLMS unit code.
    pub unit: u8,
    /// Decimal exponent.
    pub scaler: i8,
}

/// Symbol for the DLMS unit codes these meters report; used for log output only.
pub fn unit_symbol(unit: u8) -> &'static str {
    match unit {
        0x1B => "W",
        0x1E => "Wh",
        0x21 => "A",
        0x23 => "V",
        0x2C => "Hz",
        _ => "?",
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Skip a field whose value is not needed.
fn skip_field(cursor: &mut Cursor<'_>) -> Result<(), PipelineError> {
    let len = cursor.peek(0)? & TL_LENGTH_MASK;
    cursor.advance(len as usize)
}

/// Read the single byte following a field's TL byte, then skip the field.
fn read_byte_field(cursor: &mut Cursor<'_>) -> Result<u8, PipelineError> {
    let len = cursor.peek(0)? & TL_LENGTH_MASK;
    let value = cursor.peek(1)?;
    cursor.advance(len as usize)?;
    Ok(value)
}

fn read_integer_field(cursor: &mut Cursor<'_>) -> Result<i64, PipelineError> {
    let offset = cursor.position();
    let tl = cursor.read_u8()?;
    let len = (tl & TL_LENGTH_MASK) as usize;
    if len == 0 {
        // A length nibble of zero cannot even cover the TL byte.
        return Err(PipelineError::FieldUnderrun {
            offset,
            needed: 1,
            len: cursor.position() + cursor.remaining(),
        });
    }
    let payload = cursor.take(len - 1)?;
    let raw = payload
        .iter()
        .fold(0u64, |acc, &b| (acc << 8) | u64::from(b));

    // Reinterpreted, not sign-extended: only 8-byte fields come out negative.
    Ok(raw as i64)
}

/// Decode the reading that follows `pattern` in `data`.
///
/// `Ok(None)` means the pattern does not occur. A field that would run past
/// the end of `data` is reported as [`PipelineError::FieldUnderrun`].
pub fn decode_metric(data: &[u8], pattern: &[u8]) -> Result<Option<DecodedValue>, PipelineError> {
    let Some(found_at) = find(data, pattern) else {
        return Ok(None);
    };
    let mut cursor = Cursor::new(data, found_at + pattern.len());

    skip_field(&mut cursor)?; // status
    skip_field(&mut cursor)?; // valTime
    let unit = read_byte_field(&mut cursor)?;
    let scaler = read_byte_field(&mut cursor)? as i8;
    let value = read_integer_field(&mut cursor)?;

    Ok(Some(DecodedValue {
        value,
        unit,
        scaler,
    }))
}

/// Result of running every pattern over one datagram.
#[derive(Debug, Default)]
pub struct Extraction {
    /// One entry per metric, in pattern order; `None` if absent or undecodable.
    pub values: Vec<Option<DecodedValue>>,
    /// Metrics whose fields could not be decoded, by index.
    pub errors: Vec<(usize, PipelineError)>,
}

/// Decode every metric in `metrics` independently.
///
/// A metric whose fields run off the end is logged, recorded in
/// [`Extraction::errors`] and left as `None` without affecting the others.
pub fn extract(datagram: &Datagram<'_>, metrics: &[MetricPattern]) -> Extraction {
    let mut out = Extraction::default();
    for (index, metric) in metrics.iter().enumerate() {
        match decode_metric(datagram.bytes(), metric.pattern) {
            Ok(Some(v)) => {
                debug!(
                    "Found metric {}: value={} unit={} scaler={}",
                    metric.name, v.value, v.unit, v.scaler
                );
                out.values.push(Some(v));
            }
            Ok(None) => out.values.push(None),
            Err(e) => {
                warn!("Skipping metric {}: {}", metric.name, e);
                out.values.push(None);
                out.errors.push((index, e));
            }
        }
    }
    out
}
