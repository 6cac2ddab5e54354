//! CRC-16/X.25 validation of complete datagrams.
//!
//! X.25 is catalogued by the `crc` crate as `CRC_16_IBM_SDLC`
//! (poly 0x1021, reflected, init and xorout 0xFFFF).
use crc::{Crc, CRC_16_IBM_SDLC};

use super::framer::Datagram;
use crate::errors::PipelineError;

const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_SDLC);

/// CRC-16/X.25 of `data`.
pub fn crc16_x25(data: &[u8]) -> u16 {
    X25.checksum(data)
}

/// Check the embedded checksum of `datagram` against the computed one.
pub fn verify(datagram: &Datagram<'_>) -> Result<(), PipelineError> {
    let computed = crc16_x25(datagram.checksummed());
    let expected = datagram.embedded_checksum();
    if computed != expected {
        return Err(PipelineError::ChecksumMismatch { computed, expected });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sml::{END_SEQUENCE, START_SEQUENCE};

    #[test]
    fn x25_check_value() {
        assert_eq!(crc16_x25(b"123456789"), 0x906E);
    }

    fn sealed(payload: &[u8]) -> Vec<u8> {
        let mut out = START_SEQUENCE.to_vec();
        out.extend_from_slice(payload);
        out.extend_from_slice(&END_SEQUENCE);
        out.push(0x00);
        let crc = crc16_x25(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    #[test]
    fn accepts_matching_checksum() {
        let raw = sealed(&[0x76, 0x05, 0x00, 0x11]);
        let dg = Datagram::from_bytes(&raw).unwrap();
        assert!(verify(&dg).is_ok());
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let mut raw = sealed(&[0x76, 0x05, 0x00, 0x11]);
        let n = raw.len();
        raw[n - 1] ^= 0x01;
        let dg = Datagram::from_bytes(&raw).unwrap();
        match verify(&dg) {
            Err(PipelineError::ChecksumMismatch { computed, expected }) => {
                assert_eq!(computed ^ 0x0100, expected);
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }
}
