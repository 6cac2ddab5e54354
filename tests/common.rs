//! Test utilities: builders for synthetic SML datagrams.

use smlbridge::sml::checksum::crc16_x25;
use smlbridge::sml::{END_SEQUENCE, START_SEQUENCE};

/// Header bytes of a typical `GetList.Res` before the list entries. Contains
/// no escape bytes so single-bit flips cannot form a marker.
pub const LIST_PREFIX: &[u8] = &[
    0x76, 0x05, 0x03, 0x2B, 0x18, 0x11, 0x62, 0x00, 0x62, 0x00, 0x72, 0x63, 0x07, 0x01, 0x77,
    0x01, 0x0B, 0x0A, 0x01, 0x49, 0x53, 0x4B, 0x00, 0x04, 0x78, 0x0D, 0x46, 0x01, 0x72, 0x62,
    0x01, 0x65, 0x00, 0x1C, 0x7C, 0x9E, 0x79,
];

/// One SML_ListEntry for `pattern`, value encoded as a signed 64-bit integer.
pub fn list_entry(pattern: &[u8], value: i64, unit: u8, scaler: i8) -> Vec<u8> {
    let mut field = vec![0x59];
    field.extend_from_slice(&value.to_be_bytes());
    list_entry_with_field(pattern, &field, unit, scaler)
}

/// One SML_ListEntry for `pattern` carrying `value_field` (TL byte included)
/// as given.
#[allow(dead_code)]
pub fn list_entry_with_field(pattern: &[u8], value_field: &[u8], unit: u8, scaler: i8) -> Vec<u8> {
    let mut out = pattern.to_vec();
    out.extend_from_slice(&[0x65, 0x00, 0x1C, 0x01, 0x04]); // status, unsigned32
    out.push(0x01); // valTime absent
    out.extend_from_slice(&[0x62, unit]);
    out.extend_from_slice(&[0x52, scaler as u8]);
    out.extend_from_slice(value_field);
    out.push(0x01); // valueSignature absent
    out
}

/// Frame `payload` with markers, a zero fill-count and a valid checksum.
#[allow(dead_code)]
pub fn seal(payload: &[u8]) -> Vec<u8> {
    seal_with_fill(payload, 0)
}

#[allow(dead_code)]
pub fn seal_with_fill(payload: &[u8], fill: u8) -> Vec<u8> {
    let mut out = START_SEQUENCE.to_vec();
    out.extend_from_slice(payload);
    out.extend_from_slice(&END_SEQUENCE);
    out.push(fill);
    let crc = crc16_x25(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// Deterministic noise without escape bytes.
#[allow(dead_code)]
pub fn noise(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| {
            let b = (i as u8).wrapping_mul(37).wrapping_add(seed);
            if b == 0x1B {
                0x2B
            } else {
                b
            }
        })
        .collect()
}
