use crate::error::{Error, Result};

/// Forward-only cursor over a byte slice. Every read is bounds-checked and
/// fails with `TruncatedInput` naming the field being read.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn take(&mut self, what: &'static str, len: usize) -> Result<&'a [u8]> {
        let available = self.data.len() - self.pos;
        if available < len {
            return Err(Error::TruncatedInput {
                what,
                expected: len,
                available,
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn take_array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N]> {
        let bytes = self.take(what, N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    pub fn read_u8(&mut self, what: &'static str) -> Result<u8> {
        Ok(self.take_array::<1>(what)?[0])
    }

    pub fn read_u16(&mut self, what: &'static str) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take_array(what)?))
    }

    pub fn read_u32(&mut self, what: &'static str) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take_array(what)?))
    }

    /// Consume everything that is left.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }
}

/// Big-endian encoding of `value` in exactly `width` bytes (1, 2 or 4).
pub fn encode_uint(value: u32, width: usize) -> Result<Vec<u8>> {
    let max = match width {
        1 => u8::MAX as u32,
        2 => u16::MAX as u32,
        4 => u32::MAX,
        _ => return Err(Error::MalformedBinary(format!("unsupported integer width {width}"))),
    };
    if value > max {
        return Err(Error::MalformedBinary(format!(
            "{value} does not fit in {width} byte(s)"
        )));
    }
    Ok(value.to_be_bytes()[4 - width..].to_vec())
}

/// Inverse of [`encode_uint`]; the slice length selects the width.
pub fn decode_uint(bytes: &[u8]) -> Result<u32> {
    match bytes.len() {
        1 | 2 | 4 => Ok(bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)),
        n => Err(Error::MalformedBinary(format!("unsupported integer width {n}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_sequential_reads() {
        let data = [0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x03, 0xAA];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u8("a").unwrap(), 1);
        assert_eq!(r.read_u16("b").unwrap(), 2);
        assert_eq!(r.read_u32("c").unwrap(), 3);
        assert_eq!(r.position(), 7);
        assert_eq!(r.rest(), &[0xAA]);
        assert!(r.remaining().is_empty());
    }

    #[test]
    fn test_reader_truncated_names_field() {
        let mut r = Reader::new(&[0u8; 3]);
        let err = r.read_u32("signCount").unwrap_err();
        match err {
            Error::TruncatedInput {
                what,
                expected,
                available,
            } => {
                assert_eq!(what, "signCount");
                assert_eq!(expected, 4);
                assert_eq!(available, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        // A failed read does not advance the cursor
        assert_eq!(r.position(), 0);
    }

    #[test]
    fn test_encode_uint_widths() {
        assert_eq!(encode_uint(0x1d, 1).unwrap(), vec![0x1d]);
        assert_eq!(encode_uint(32, 2).unwrap(), vec![0x00, 0x20]);
        assert_eq!(encode_uint(42, 4).unwrap(), vec![0, 0, 0, 42]);
    }

    #[test]
    fn test_encode_uint_overflow() {
        assert!(encode_uint(256, 1).is_err());
        assert!(encode_uint(0x1_0000, 2).is_err());
        assert!(encode_uint(1, 3).is_err());
    }

    #[test]
    fn test_decode_uint() {
        assert_eq!(decode_uint(&[0x1d]).unwrap(), 0x1d);
        assert_eq!(decode_uint(&[0x01, 0x00]).unwrap(), 256);
        assert_eq!(decode_uint(&[0xff, 0xff, 0xff, 0xff]).unwrap(), u32::MAX);
        assert!(decode_uint(&[0, 0, 0]).is_err());
    }
}
