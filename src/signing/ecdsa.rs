use crate::error::{Error, Result};
use crate::keys::EcCurve;

/// DER-encode a fixed-width ECDSA signature (r || s).
pub fn raw_to_der(raw: &[u8], crv: EcCurve) -> Result<Vec<u8>> {
    let width = crv.width();
    if raw.len() != 2 * width {
        return Err(Error::MalformedBinary(format!(
            "raw {crv:?} signature must be {} bytes, got {}",
            2 * width,
            raw.len()
        )));
    }
    let r_der = der_integer(&raw[..width]);
    let s_der = der_integer(&raw[width..]);
    let mut out = vec![0x30u8];
    push_len(&mut out, r_der.len() + s_der.len());
    out.extend_from_slice(&r_der);
    out.extend_from_slice(&s_der);
    Ok(out)
}

fn der_integer(n: &[u8]) -> Vec<u8> {
    let n: Vec<u8> = n.iter().skip_while(|&&b| b == 0).copied().collect();
    let n = if n.is_empty() { vec![0u8] } else { n };
    let pad = n[0] & 0x80 != 0;
    let mut out = vec![0x02u8];
    push_len(&mut out, n.len() + pad as usize);
    if pad {
        out.push(0);
    }
    out.extend_from_slice(&n);
    out
}

// P-521 signatures exceed 127 content bytes and need the long form.
fn push_len(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        out.push(0x81);
        out.push(len as u8);
    }
}

/// Decode a DER ECDSA signature into fixed-width r || s for `crv`.
pub fn der_to_raw(der: &[u8], crv: EcCurve) -> Result<Vec<u8>> {
    let width = crv.width();
    let mut pos = 0;
    expect_tag(der, &mut pos, 0x30)?;
    let seq_len = read_len(der, &mut pos)?;
    if pos + seq_len != der.len() {
        return Err(Error::MalformedBinary("DER signature length mismatch".into()));
    }
    let mut out = Vec::with_capacity(2 * width);
    for _ in 0..2 {
        expect_tag(der, &mut pos, 0x02)?;
        let len = read_len(der, &mut pos)?;
        let int = der
            .get(pos..pos + len)
            .ok_or_else(|| Error::MalformedBinary("DER integer overruns signature".into()))?;
        pos += len;
        if int.is_empty() || int[0] & 0x80 != 0 {
            return Err(Error::MalformedBinary("DER integer is empty or negative".into()));
        }
        let int: &[u8] = {
            let start = int.iter().position(|&b| b != 0).unwrap_or(int.len());
            &int[start..]
        };
        if int.len() > width {
            return Err(Error::MalformedBinary(format!(
                "DER integer wider than {width} bytes"
            )));
        }
        out.extend(std::iter::repeat_n(0u8, width - int.len()));
        out.extend_from_slice(int);
    }
    if pos != der.len() {
        return Err(Error::MalformedBinary("trailing bytes in DER signature".into()));
    }
    Ok(out)
}

fn expect_tag(der: &[u8], pos: &mut usize, tag: u8) -> Result<()> {
    match der.get(*pos) {
        Some(&t) if t == tag => {
            *pos += 1;
            Ok(())
        }
        _ => Err(Error::MalformedBinary(format!("expected DER tag {tag:#04x}"))),
    }
}

fn read_len(der: &[u8], pos: &mut usize) -> Result<usize> {
    let first = *der
        .get(*pos)
        .ok_or_else(|| Error::MalformedBinary("DER length missing".into()))?;
    *pos += 1;
    match first {
        n if n < 0x80 => Ok(n as usize),
        0x81 => {
            let n = *der
                .get(*pos)
                .ok_or_else(|| Error::MalformedBinary("DER length missing".into()))?;
            *pos += 1;
            Ok(n as usize)
        }
        _ => Err(Error::MalformedBinary("unsupported DER length form".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_der_ecdsa_structure() {
        let mut raw = [0u8; 64];
        raw[0] = 0x01;
        raw[32] = 0x01;
        let der = raw_to_der(&raw, EcCurve::P256).unwrap();
        assert_eq!(der[0], 0x30, "must start with SEQUENCE tag 0x30");
        assert_eq!(der.len(), 2 + der[1] as usize, "DER length field must be accurate");
        assert_eq!(der[2], 0x02, "r must start with INTEGER tag 0x02");
    }

    #[test]
    fn test_der_ecdsa_high_bit_padding() {
        let mut raw = [0u8; 64];
        raw[31] = 0x80;
        raw[63] = 0x01;
        let der = raw_to_der(&raw, EcCurve::P256).unwrap();
        assert_eq!(der[3], 2, "padded integer must be 2 bytes (0x00, 0x80)");
        assert_eq!(der[4], 0x00, "must be padded with 0x00 prefix");
        assert_eq!(der[5], 0x80);
    }

    #[test]
    fn test_der_ecdsa_all_zeros_encodes_as_single_zero() {
        let der = raw_to_der(&[0u8; 96], EcCurve::P384).unwrap();
        assert_eq!(der, vec![0x30, 0x06, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00]);
        assert_eq!(der_to_raw(&der, EcCurve::P384).unwrap(), vec![0u8; 96]);
    }

    #[test]
    fn test_p521_uses_long_form_length() {
        let mut raw = vec![0u8; 132];
        raw[0] = 0x01;
        raw[1..66].fill(0xFF);
        raw[66] = 0x01;
        raw[67..].fill(0xEE);
        let der = raw_to_der(&raw, EcCurve::P521).unwrap();
        assert_eq!(der[0], 0x30);
        assert_eq!(der[1], 0x81, "P-521 sequence needs long-form length");
        assert_eq!(der[2] as usize, der.len() - 3);
        assert_eq!(der_to_raw(&der, EcCurve::P521).unwrap(), raw);
    }

    #[test]
    fn test_der_to_raw_restores_width() {
        let mut raw = [0u8; 64];
        raw[31] = 0x80;
        raw[40] = 0x7F;
        let der = raw_to_der(&raw, EcCurve::P256).unwrap();
        assert_eq!(der_to_raw(&der, EcCurve::P256).unwrap(), raw.to_vec());
    }

    #[test]
    fn test_wrong_raw_width_rejected() {
        assert!(raw_to_der(&[1u8; 64], EcCurve::P384).is_err());
    }

    #[test]
    fn test_malformed_der_rejected() {
        assert!(der_to_raw(&[0x31, 0x00], EcCurve::P256).is_err());
        assert!(der_to_raw(&[0x30, 0x03, 0x02, 0x01, 0x01], EcCurve::P256).is_err());
        // negative r
        assert!(der_to_raw(&[0x30, 0x06, 0x02, 0x01, 0x80, 0x02, 0x01, 0x01], EcCurve::P256).is_err());
        // r wider than the curve
        let mut der = vec![0x30, 0x26, 0x02, 0x21];
        der.extend_from_slice(&[0x7F; 33]);
        der.extend_from_slice(&[0x02, 0x01, 0x01]);
        assert!(der_to_raw(&der, EcCurve::P256).is_err());
    }
}
