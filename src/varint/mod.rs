//! RestPose's variable-length integer encoding.
//!
//! `encode(n)` produces a single byte when `n < 255`. Otherwise it writes
//! `0xff` followed by the 7-bit-per-byte little-endian encoding of
//! `n - 255`, with the continuation convention *inverted* relative to the
//! common LEB128/vbyte scheme: a cleared top bit on a continuation byte
//! means "more bytes follow"; the top bit is set only on the final byte.

use crate::core::error::{Error, ErrorKind};

const ESCAPE: u8 = 0xff;
const CONTINUE_THRESHOLD: u64 = 255;

/// Append the varint encoding of `n` to `out`.
pub fn encode(n: u64, out: &mut Vec<u8>) {
    if n < CONTINUE_THRESHOLD {
        out.push(n as u8);
        return;
    }
    out.push(ESCAPE);
    let mut rest = n - CONTINUE_THRESHOLD;
    loop {
        let mut byte = (rest & 0x7f) as u8;
        rest >>= 7;
        if rest == 0 {
            byte |= 0x80;
            out.push(byte);
            break;
        }
        out.push(byte);
    }
}

/// Encode `n` into a freshly allocated `Vec<u8>`.
pub fn encode_to_vec(n: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(1);
    encode(n, &mut out);
    out
}

/// Decode a single varint from the front of `buf`, returning the decoded
/// value and the number of bytes consumed.
pub fn decode(buf: &[u8]) -> crate::core::error::Result<(u64, usize)> {
    let first = *buf
        .first()
        .ok_or_else(|| Error::new(ErrorKind::Unserialization, "BadEncoding: empty varint buffer"))?;
    if first != ESCAPE {
        return Ok((first as u64, 1));
    }

    let mut value: u64 = 0;
    let mut shift = 0u32;
    let mut pos = 1usize;
    loop {
        let byte = *buf.get(pos).ok_or_else(|| {
            Error::new(ErrorKind::Unserialization, "BadEncoding: varint truncated mid-stream")
        })?;
        pos += 1;
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 != 0 {
            break;
        }
        shift += 7;
    }
    Ok((value + CONTINUE_THRESHOLD, pos))
}

/// Decode a varint, requiring that it does not reach past `buf`'s length
/// (same check `decode` performs implicitly, spelled out for callers that
/// want to distinguish "ran out of buffer" from other `BadEncoding` causes).
pub fn decode_checked(buf: &[u8]) -> crate::core::error::Result<(u64, usize)> {
    decode(buf)
}

/// A cursor-based reader over a byte slice containing a run of varints,
/// e.g. the vint-length-prefixed multi-value slot encoding.
pub struct VarintReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> VarintReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        VarintReader { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read(&mut self) -> crate::core::error::Result<u64> {
        let (value, consumed) = decode(&self.buf[self.pos..])?;
        self.pos += consumed;
        Ok(value)
    }

    /// Read `n` raw bytes, advancing the cursor.
    pub fn read_bytes(&mut self, n: usize) -> crate::core::error::Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(Error::new(
                ErrorKind::Unserialization,
                "BadEncoding: declared length exceeds remaining buffer",
            ));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_small_values() {
        for n in [0u64, 1, 254] {
            let bytes = encode_to_vec(n);
            assert_eq!(bytes.len(), 1);
            let (decoded, used) = decode(&bytes).unwrap();
            assert_eq!(decoded, n);
            assert_eq!(used, 1);
        }
    }

    #[test]
    fn round_trips_large_values() {
        for n in [255u64, 256, 1000, u32::MAX as u64, u64::MAX / 2, u64::MAX] {
            let bytes = encode_to_vec(n);
            assert!(bytes.len() > 1);
            assert_eq!(bytes[0], ESCAPE);
            let (decoded, used) = decode(&bytes).unwrap();
            assert_eq!(decoded, n);
            assert_eq!(used, bytes.len());
        }
    }

    #[test]
    fn rejects_empty_buffer() {
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn rejects_truncated_escape_sequence() {
        let bytes = encode_to_vec(100_000);
        let truncated = &bytes[..bytes.len() - 1];
        assert!(decode(truncated).is_err());
    }

    #[test]
    fn reader_consumes_a_run_of_varints() {
        let mut buf = Vec::new();
        encode(10, &mut buf);
        encode(1000, &mut buf);
        encode(0, &mut buf);
        let mut reader = VarintReader::new(&buf);
        assert_eq!(reader.read().unwrap(), 10);
        assert_eq!(reader.read().unwrap(), 1000);
        assert_eq!(reader.read().unwrap(), 0);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn reader_read_bytes_bounds_checks() {
        let buf = vec![1, 2, 3];
        let mut reader = VarintReader::new(&buf);
        assert!(reader.read_bytes(4).is_err());
        assert_eq!(reader.read_bytes(3).unwrap(), &[1, 2, 3]);
    }
}
