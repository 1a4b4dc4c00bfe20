use std::io;

use ciborium::value::Value;

use crate::error::{Error, Result};

/// Slice reader that remembers how far into the input the decoder wanted
/// to read when it ran out.
struct SliceReader<'a> {
    data:   &'a [u8],
    pos:    usize,
    wanted: usize,
}

impl io::Read for SliceReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let end = self.pos + buf.len();
        if end > self.data.len() {
            self.wanted = end;
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        buf.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(())
    }
}

/// Decode the first CBOR item in `data` and report how many bytes it used.
/// Running out of input is `TruncatedInput` naming the length the item
/// needed as far as it could be parsed; anything else is `Cbor`.
pub(crate) fn decode_first(what: &'static str, data: &[u8]) -> Result<(Value, usize)> {
    let mut reader = SliceReader { data, pos: 0, wanted: 0 };
    let value: Value = ciborium::from_reader(&mut reader).map_err(|e| match e {
        ciborium::de::Error::Io(_) => Error::TruncatedInput {
            what,
            expected: reader.wanted.max(data.len() + 1),
            available: data.len(),
        },
        other => Error::Cbor(other.to_string()),
    })?;
    Ok((value, reader.pos))
}

pub(crate) fn to_vec(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).map_err(|e| Error::Cbor(e.to_string()))?;
    Ok(out)
}

pub(crate) fn cbor_get<'a>(map: &'a [(Value, Value)], key: i64) -> Option<&'a Value> {
    let target = Value::Integer(key.into());
    map.iter().find(|(k, _)| k == &target).map(|(_, v)| v)
}

pub(crate) fn cbor_get_str<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Text(s) if s == key))
        .map(|(_, v)| v)
}

pub(crate) fn cbor_bytes(v: &Value) -> Option<&[u8]> {
    match v { Value::Bytes(b) => Some(b), _ => None }
}

pub(crate) fn cbor_text(v: &Value) -> Option<&str> {
    match v { Value::Text(s) => Some(s), _ => None }
}

pub(crate) fn cbor_int(v: &Value) -> Option<i64> {
    match v {
        Value::Integer(i) => i64::try_from(i128::from(*i)).ok(),
        _ => None,
    }
}

pub(crate) fn cbor_map(v: &Value) -> Option<&[(Value, Value)]> {
    match v { Value::Map(m) => Some(m), _ => None }
}

pub(crate) fn cbor_array(v: &Value) -> Option<&[Value]> {
    match v { Value::Array(a) => Some(a), _ => None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_first_reports_consumed() {
        // {1: 2} followed by trailing 0xFF
        let data = [0xA1, 0x01, 0x02, 0xFF];
        let (value, used) = decode_first("map", &data).unwrap();
        assert_eq!(used, 3);
        let map = cbor_map(&value).unwrap();
        assert_eq!(cbor_get(map, 1).and_then(cbor_int), Some(2));
    }

    #[test]
    fn test_decode_first_truncated() {
        // map header claims one pair, body missing
        let err = decode_first("map", &[0xA1, 0x01]).unwrap_err();
        assert!(
            matches!(err, Error::TruncatedInput { what: "map", expected: 3, available: 2 }),
            "got {err}"
        );
    }

    #[test]
    fn test_truncated_byte_string_names_full_length() {
        // h'0102030405' cut after two payload bytes
        let err = decode_first("bytes", &[0x45, 0x01, 0x02]).unwrap_err();
        assert!(
            matches!(err, Error::TruncatedInput { expected: 6, available: 3, .. }),
            "got {err}"
        );
    }

    #[test]
    fn test_negative_int_keys() {
        let v = Value::Map(vec![(Value::Integer((-2i64).into()), Value::Bytes(vec![7]))]);
        let bytes = to_vec(&v).unwrap();
        assert_eq!(bytes, vec![0xA1, 0x21, 0x41, 0x07]);
        let (back, _) = decode_first("map", &bytes).unwrap();
        let map = cbor_map(&back).unwrap();
        assert_eq!(cbor_get(map, -2).and_then(cbor_bytes), Some(&[7u8][..]));
    }
}
