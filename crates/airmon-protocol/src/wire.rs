//! Wire buffer encoding and decoding.
//!
//! Outbound commands are bare 2-byte big-endian opcodes. Inbound data is a
//! sequence of 3-byte groups, each a 2-byte big-endian word followed by its
//! CRC-8 checksum:
//!
//! ```text
//! +--------+--------+-----+--------+--------+-----+ ...
//! | word0  hi | lo  | crc | word1  hi | lo  | crc |
//! +--------+--------+-----+--------+--------+-----+ ...
//! ```
//!
//! [`decode_checked`] validates every group and compacts the plain words into
//! a contiguous buffer. A wire buffer never leaves this module with its
//! checksums still attached.

use bytes::{BufMut, BytesMut};

use crate::checksum::{crc8, verify};
use crate::error::ProtocolError;

/// Payload bytes per protected word.
pub const WORD_SIZE: usize = 2;

/// Checksum bytes trailing each word on the wire.
pub const CRC_LEN: usize = 1;

/// Encode a command opcode for transmission. Commands carry no checksum.
pub fn encode_command(opcode: u16) -> [u8; 2] {
    opcode.to_be_bytes()
}

/// Encode a 32-bit data payload as two checksummed words (6 bytes out).
///
/// Used when a command carries a data argument; neither sensor family's read
/// path needs this, but writes such as setting an offset do.
pub fn encode_data_word(value: u32) -> [u8; 6] {
    let mut buf = BytesMut::with_capacity(2 * (WORD_SIZE + CRC_LEN));
    for word in [(value >> 16) as u16, value as u16] {
        buf.put_u16(word);
        buf.put_u8(crc8(word.to_be_bytes()));
    }
    let mut out = [0u8; 6];
    out.copy_from_slice(&buf);
    out
}

/// Number of raw bytes to read off the bus for `expected_plain_len` plain
/// bytes. Fails with [`ProtocolError::Framing`] when the plain length is odd,
/// so callers reject a bad length before touching the bus.
pub fn wire_len(expected_plain_len: u16) -> Result<usize, ProtocolError> {
    if expected_plain_len as usize % WORD_SIZE != 0 {
        return Err(ProtocolError::Framing(expected_plain_len));
    }
    Ok((expected_plain_len as usize / WORD_SIZE) * (WORD_SIZE + CRC_LEN))
}

/// Validate a raw wire buffer and strip its checksums.
///
/// Each 3-byte group's checksum is verified; the first mismatch aborts with
/// [`ProtocolError::Checksum`] and no partial data is returned. On success the
/// plain words are returned compacted, in order.
pub fn decode_checked(raw: &[u8], expected_plain_len: u16) -> Result<Vec<u8>, ProtocolError> {
    let wire = wire_len(expected_plain_len)?;
    if raw.len() != wire {
        return Err(ProtocolError::Size { expected: wire, actual: raw.len() });
    }

    let mut plain = BytesMut::with_capacity(expected_plain_len as usize);
    for group in raw.chunks_exact(WORD_SIZE + CRC_LEN) {
        let word = [group[0], group[1]];
        let claimed = group[WORD_SIZE];
        if !verify(word, claimed) {
            log::debug!(
                "checksum mismatch on wire group {:02X?} (expected 0x{:02X})",
                group,
                crc8(word)
            );
            return Err(ProtocolError::Checksum { computed: crc8(word), received: claimed });
        }
        plain.put_slice(&word);
    }

    Ok(plain.to_vec())
}

/// Reassemble a plain word as an unsigned big-endian 16-bit integer.
pub fn decode_u16(word: [u8; 2]) -> u16 {
    u16::from_be_bytes(word)
}

/// Reassemble a plain word as a signed 16-bit integer (same bit pattern).
pub fn decode_i16(word: [u8; 2]) -> i16 {
    i16::from_be_bytes(word)
}

/// Decode a checksummed wire buffer into a string.
///
/// Runs [`decode_checked`], then copies bytes up to the first NUL or the full
/// plain length, whichever comes first.
pub fn decode_string(raw: &[u8], expected_plain_len: u16) -> Result<String, ProtocolError> {
    let plain = decode_checked(raw, expected_plain_len)?;
    let end = plain.iter().position(|&b| b == 0).unwrap_or(plain.len());
    Ok(String::from_utf8_lossy(&plain[..end]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a wire buffer from plain words, appending a valid checksum to each.
    fn encode_words(words: &[u16]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(words.len() * (WORD_SIZE + CRC_LEN));
        for word in words {
            let bytes = word.to_be_bytes();
            buf.extend_from_slice(&bytes);
            buf.push(crc8(bytes));
        }
        buf
    }

    #[test]
    fn test_encode_command_big_endian() {
        assert_eq!(encode_command(0x21B1), [0x21, 0xB1]);
        assert_eq!(encode_command(0x0021), [0x00, 0x21]);
    }

    #[test]
    fn test_encode_data_word() {
        let encoded = encode_data_word(0xBEEF_BEEF);
        assert_eq!(encoded, [0xBE, 0xEF, 0x92, 0xBE, 0xEF, 0x92]);
    }

    #[test]
    fn test_decode_checked_roundtrip() {
        let words = [0x0190, 0x6667, 0x5EB9];
        let raw = encode_words(&words);
        let plain = decode_checked(&raw, 6).unwrap();
        assert_eq!(plain, [0x01, 0x90, 0x66, 0x67, 0x5E, 0xB9]);
    }

    #[test]
    fn test_odd_plain_length_is_framing_error() {
        assert_eq!(wire_len(3), Err(ProtocolError::Framing(3)));
        assert_eq!(decode_checked(&[0; 9], 3), Err(ProtocolError::Framing(3)));
    }

    #[test]
    fn test_corrupt_payload_byte_is_checksum_error() {
        let mut raw = encode_words(&[0x0190, 0x6667]);
        raw[0] ^= 0x01; // flip a payload bit, not the checksum
        match decode_checked(&raw, 4) {
            Err(ProtocolError::Checksum { .. }) => {}
            other => panic!("expected checksum error, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_checksum_byte_is_checksum_error() {
        let mut raw = encode_words(&[0x0190]);
        raw[2] ^= 0xFF;
        assert!(matches!(decode_checked(&raw, 2), Err(ProtocolError::Checksum { .. })));
    }

    #[test]
    fn test_short_raw_buffer_is_size_error() {
        let raw = encode_words(&[0x0190]);
        assert_eq!(
            decode_checked(&raw, 4),
            Err(ProtocolError::Size { expected: 6, actual: 3 })
        );
    }

    #[test]
    fn test_decode_u16_i16() {
        assert_eq!(decode_u16([0x03, 0x84]), 900);
        assert_eq!(decode_i16([0xFF, 0xFF]), -1);
        assert_eq!(decode_i16([0x7F, 0xFF]), i16::MAX);
    }

    #[test]
    fn test_decode_string_stops_at_nul() {
        let mut words = Vec::new();
        for chunk in b"SEN55\0\0\0".chunks_exact(2) {
            words.push(u16::from_be_bytes([chunk[0], chunk[1]]));
        }
        let raw = encode_words(&words);
        assert_eq!(decode_string(&raw, 8).unwrap(), "SEN55");
    }

    #[test]
    fn test_decode_string_without_nul_takes_full_length() {
        let words = [u16::from_be_bytes(*b"AB"), u16::from_be_bytes(*b"CD")];
        let raw = encode_words(&words);
        assert_eq!(decode_string(&raw, 4).unwrap(), "ABCD");
    }
}
