//! Value-slot encodings (spec §4.3): the three byte layouts a document's
//! value slots can take, and a decoder able to iterate back over whichever
//! one was used to write them.

use crate::core::error::{Error, ErrorKind, Result};
use crate::varint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueEncoding {
    /// The whole slot buffer is a single value.
    Single,
    /// A run of `vint(len) || bytes` entries.
    VintLengthMulti,
    /// A run of fixed 6-byte entries (used for geo-encoded coordinates).
    GeoencodeMulti,
}

/// Concatenate `values` into a single slot buffer using `encoding`.
pub fn encode(encoding: ValueEncoding, values: &[&[u8]]) -> Result<Vec<u8>> {
    match encoding {
        ValueEncoding::Single => {
            if values.len() != 1 {
                return Err(Error::new(
                    ErrorKind::InvalidValue,
                    "singly-valued slot encoding requires exactly one value",
                ));
            }
            Ok(values[0].to_vec())
        }
        ValueEncoding::VintLengthMulti => {
            let mut out = Vec::new();
            for v in values {
                varint::encode(v.len() as u64, &mut out);
                out.extend_from_slice(v);
            }
            Ok(out)
        }
        ValueEncoding::GeoencodeMulti => {
            let mut out = Vec::with_capacity(values.len() * 6);
            for v in values {
                if v.len() != 6 {
                    return Err(Error::new(
                        ErrorKind::InvalidValue,
                        "geoencode-multi entries must be exactly 6 bytes",
                    ));
                }
                out.extend_from_slice(v);
            }
            Ok(out)
        }
    }
}

/// A cursor over a slot's raw byte buffer, yielding successive values
/// according to the buffer's encoding.
pub struct SlotDecoder<'a> {
    encoding: ValueEncoding,
    buf: &'a [u8],
    pos: usize,
    single_yielded: bool,
}

impl<'a> SlotDecoder<'a> {
    /// Bind a decoder to a slot's encoding.
    pub fn new(encoding: ValueEncoding) -> Self {
        SlotDecoder { encoding, buf: &[], pos: 0, single_yielded: false }
    }

    /// Load a document's raw slot bytes, resetting the cursor.
    pub fn newdoc(&mut self, buf: &'a [u8]) -> Result<()> {
        if self.encoding == ValueEncoding::GeoencodeMulti && buf.len() % 6 != 0 {
            return Err(Error::new(
                ErrorKind::Unserialization,
                "BadEncoding: geoencode-multi slot length is not a multiple of 6",
            ));
        }
        self.buf = buf;
        self.pos = 0;
        self.single_yielded = false;
        Ok(())
    }

    /// Yield the next value as a `(start, len)` view into the loaded
    /// buffer, or `None` when exhausted.
    pub fn next(&mut self) -> Result<Option<&'a [u8]>> {
        match self.encoding {
            ValueEncoding::Single => {
                if self.single_yielded || self.buf.is_empty() {
                    Ok(None)
                } else {
                    self.single_yielded = true;
                    Ok(Some(self.buf))
                }
            }
            ValueEncoding::VintLengthMulti => {
                if self.pos >= self.buf.len() {
                    return Ok(None);
                }
                let (len, used) = varint::decode(&self.buf[self.pos..])?;
                let start = self.pos + used;
                let end = start
                    .checked_add(len as usize)
                    .filter(|&e| e <= self.buf.len())
                    .ok_or_else(|| {
                        Error::new(
                            ErrorKind::Unserialization,
                            "BadEncoding: vint-length-multi entry overruns slot buffer",
                        )
                    })?;
                self.pos = end;
                Ok(Some(&self.buf[start..end]))
            }
            ValueEncoding::GeoencodeMulti => {
                if self.pos >= self.buf.len() {
                    return Ok(None);
                }
                let end = self.pos + 6;
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(Some(slice))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_yields_buffer_once() {
        let buf = encode(ValueEncoding::Single, &[b"hello"]).unwrap();
        let mut dec = SlotDecoder::new(ValueEncoding::Single);
        dec.newdoc(&buf).unwrap();
        assert_eq!(dec.next().unwrap(), Some(&b"hello"[..]));
        assert_eq!(dec.next().unwrap(), None);
    }

    #[test]
    fn vint_length_multi_round_trips() {
        let values: Vec<&[u8]> = vec![b"one", b"two-longer", b""];
        let buf = encode(ValueEncoding::VintLengthMulti, &values).unwrap();
        let mut dec = SlotDecoder::new(ValueEncoding::VintLengthMulti);
        dec.newdoc(&buf).unwrap();
        assert_eq!(dec.next().unwrap(), Some(&b"one"[..]));
        assert_eq!(dec.next().unwrap(), Some(&b"two-longer"[..]));
        assert_eq!(dec.next().unwrap(), Some(&b""[..]));
        assert_eq!(dec.next().unwrap(), None);
    }

    #[test]
    fn geoencode_multi_round_trips() {
        let a = [1u8, 2, 3, 4, 5, 6];
        let b = [9u8, 8, 7, 6, 5, 4];
        let buf = encode(ValueEncoding::GeoencodeMulti, &[&a, &b]).unwrap();
        let mut dec = SlotDecoder::new(ValueEncoding::GeoencodeMulti);
        dec.newdoc(&buf).unwrap();
        assert_eq!(dec.next().unwrap(), Some(&a[..]));
        assert_eq!(dec.next().unwrap(), Some(&b[..]));
        assert_eq!(dec.next().unwrap(), None);
    }

    #[test]
    fn geoencode_multi_rejects_non_multiple_of_six() {
        let mut dec = SlotDecoder::new(ValueEncoding::GeoencodeMulti);
        assert!(dec.newdoc(&[1, 2, 3]).is_err());
    }

    #[test]
    fn vint_length_multi_rejects_truncated_entry() {
        let mut buf = Vec::new();
        varint::encode(10, &mut buf);
        buf.extend_from_slice(b"short");
        let mut dec = SlotDecoder::new(ValueEncoding::VintLengthMulti);
        dec.newdoc(&buf).unwrap();
        assert!(dec.next().is_err());
    }
}
