//! Logging helpers for rendering binary meter data on a single log line.

use std::fmt::Write;

/// Longest dump rendered in full; larger buffers are cut with an ellipsis.
const MAX_DUMP_BYTES: usize = 512;

/// Space-separated uppercase hex, e.g. `1B 1B 01`.
/// Truncates buffers longer than [`MAX_DUMP_BYTES`] so a corrupted datagram
/// near capacity does not flood the log.
pub fn hex_dump(data: &[u8]) -> String {
    let shown = data.len().min(MAX_DUMP_BYTES);
    let mut out = String::with_capacity(shown * 3 + 16);
    for (i, b) in data[..shown].iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(&mut out, "{:02X}", b);
    }
    if data.len() > shown {
        let _ = write!(&mut out, " … (+{} bytes)", data.len() - shown);
    }
    out
}

/// Compact lowercase hex of at most `max` leading bytes.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    data.iter()
        .take(max)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dumps_and_truncates() {
        assert_eq!(hex_dump(&[0x1B, 0x01, 0xFF]), "1B 01 FF");
        assert_eq!(hex_dump(&[]), "");
        let big = vec![0u8; MAX_DUMP_BYTES + 3];
        assert!(hex_dump(&big).ends_with("… (+3 bytes)"));
    }

    #[test]
    fn snippet_is_capped() {
        assert_eq!(hex_snippet(&[0xAB, 0xCD, 0xEF], 2), "abcd");
    }
}
