//! MySQL wire protocol encoding and decoding primitives.
//!
//! MySQL uses little-endian for all fixed-width integers and a
//! length-encoded integer ("lenenc") for variable-width counts and strings.

use crate::error::{Error, Result};
use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{U16, U32, U64};

/// Lenenc prefix byte that marks a NULL column value in text rows.
pub const LENENC_NULL: u8 = 0xFB;

/// Read 1-byte unsigned integer.
#[inline]
pub fn read_u8(data: &[u8]) -> Result<(u8, &[u8])> {
    match data.split_first() {
        Some((&value, rest)) => Ok((value, rest)),
        None => Err(Error::Protocol("read_u8: empty buffer".into())),
    }
}

/// Read 2-byte little-endian unsigned integer.
#[inline]
pub fn read_u16(data: &[u8]) -> Result<(u16, &[u8])> {
    let (bytes, rest) = read_bytes(data, 2)?;
    let value = U16::read_from_bytes(bytes)
        .map_err(|e| Error::Protocol(format!("read_u16: {e:?}")))?
        .get();
    Ok((value, rest))
}

/// Read 3-byte little-endian unsigned integer.
#[inline]
pub fn read_u24(data: &[u8]) -> Result<(u32, &[u8])> {
    let (bytes, rest) = read_bytes(data, 3)?;
    let value = u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16);
    Ok((value, rest))
}

/// Read 4-byte little-endian unsigned integer.
#[inline]
pub fn read_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    let (bytes, rest) = read_bytes(data, 4)?;
    let value = U32::read_from_bytes(bytes)
        .map_err(|e| Error::Protocol(format!("read_u32: {e:?}")))?
        .get();
    Ok((value, rest))
}

/// Read 8-byte little-endian unsigned integer.
#[inline]
pub fn read_u64(data: &[u8]) -> Result<(u64, &[u8])> {
    let (bytes, rest) = read_bytes(data, 8)?;
    let value = U64::read_from_bytes(bytes)
        .map_err(|e| Error::Protocol(format!("read_u64: {e:?}")))?
        .get();
    Ok((value, rest))
}

/// Read fixed-length bytes.
#[inline]
pub fn read_bytes(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(Error::Protocol(format!(
            "read_bytes: buffer too short: {} < {}",
            data.len(),
            len
        )));
    }
    Ok(data.split_at(len))
}

/// Read null-terminated string.
/// Returns the string bytes (without the null terminator) and remaining data.
#[inline]
pub fn read_cstring(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match memchr::memchr(0, data) {
        Some(pos) => Ok((&data[..pos], &data[pos + 1..])),
        None => Err(Error::Protocol(
            "read_cstring: no null terminator found".into(),
        )),
    }
}

/// Read null-terminated string as &str.
#[inline]
pub fn read_cstr(data: &[u8]) -> Result<(&str, &[u8])> {
    let (bytes, rest) = read_cstring(data)?;
    let s = simdutf8::compat::from_utf8(bytes)
        .map_err(|e| Error::Protocol(format!("read_cstr: invalid UTF-8: {e}")))?;
    Ok((s, rest))
}

/// Read a length-encoded integer.
#[inline]
pub fn read_lenenc_int(data: &[u8]) -> Result<(u64, &[u8])> {
    let (first, rest) = read_u8(data)?;
    match first {
        0x00..=0xFA => Ok((u64::from(first), rest)),
        0xFC => read_u16(rest).map(|(v, rest)| (u64::from(v), rest)),
        0xFD => read_u24(rest).map(|(v, rest)| (u64::from(v), rest)),
        0xFE => read_u64(rest),
        _ => Err(Error::Protocol(format!(
            "read_lenenc_int: invalid prefix 0x{first:02X}"
        ))),
    }
}

/// Read a length-encoded byte string.
#[inline]
pub fn read_lenenc_bytes(data: &[u8]) -> Result<(&[u8], &[u8])> {
    let (len, rest) = read_lenenc_int(data)?;
    let len = usize::try_from(len)
        .map_err(|_| Error::Protocol(format!("read_lenenc_bytes: length {len} too large")))?;
    read_bytes(rest, len)
}

/// Read a length-encoded string as &str.
#[inline]
pub fn read_lenenc_str(data: &[u8]) -> Result<(&str, &[u8])> {
    let (bytes, rest) = read_lenenc_bytes(data)?;
    let s = simdutf8::compat::from_utf8(bytes)
        .map_err(|e| Error::Protocol(format!("read_lenenc_str: invalid UTF-8: {e}")))?;
    Ok((s, rest))
}

/// Read a length-encoded value that may be NULL (`0xFB`).
#[inline]
pub fn read_lenenc_nullable(data: &[u8]) -> Result<(Option<&[u8]>, &[u8])> {
    match data.first() {
        Some(&LENENC_NULL) => Ok((None, &data[1..])),
        _ => read_lenenc_bytes(data).map(|(v, rest)| (Some(v), rest)),
    }
}

/// Write 1-byte unsigned integer.
#[inline]
pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Write 2-byte little-endian unsigned integer.
#[inline]
pub fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 3-byte little-endian unsigned integer.
#[inline]
pub fn write_u24(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes()[..3]);
}

/// Write 4-byte little-endian unsigned integer.
#[inline]
pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write 8-byte little-endian unsigned integer.
#[inline]
pub fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write raw bytes.
#[inline]
pub fn write_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(data);
}

/// Write null-terminated string.
#[inline]
pub fn write_cstring(out: &mut Vec<u8>, s: &[u8]) {
    out.extend_from_slice(s);
    out.push(0);
}

/// Write null-terminated string from &str.
#[inline]
pub fn write_cstr(out: &mut Vec<u8>, s: &str) {
    write_cstring(out, s.as_bytes());
}

/// Write a length-encoded integer.
#[inline]
pub fn write_lenenc_int(out: &mut Vec<u8>, value: u64) {
    if value < 0xFB {
        out.push(value as u8);
    } else if value <= 0xFFFF {
        out.push(0xFC);
        write_u16(out, value as u16);
    } else if value <= 0xFF_FFFF {
        out.push(0xFD);
        write_u24(out, value as u32);
    } else {
        out.push(0xFE);
        write_u64(out, value);
    }
}

/// Write a length-encoded byte string.
#[inline]
pub fn write_lenenc_bytes(out: &mut Vec<u8>, data: &[u8]) {
    write_lenenc_int(out, data.len() as u64);
    out.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenenc_int_boundaries() {
        for (value, encoded_len) in [
            (0u64, 1),
            (250, 1),
            (251, 3),
            (0xFFFF, 3),
            (0x1_0000, 4),
            (0xFF_FFFF, 4),
            (0x100_0000, 9),
            (u64::MAX, 9),
        ] {
            let mut buf = Vec::new();
            write_lenenc_int(&mut buf, value);
            assert_eq!(buf.len(), encoded_len, "value {value}");
            let (decoded, rest) = read_lenenc_int(&buf).unwrap();
            assert_eq!(decoded, value);
            assert!(rest.is_empty());
        }
    }

    #[test]
    fn lenenc_invalid_prefix() {
        assert!(read_lenenc_int(&[0xFF]).is_err());
        assert!(read_lenenc_int(&[0xFC, 0x01]).is_err());
    }

    #[test]
    fn lenenc_nullable() {
        let (value, rest) = read_lenenc_nullable(&[0xFB, 0x01, b'a']).unwrap();
        assert_eq!(value, None);
        let (value, rest) = read_lenenc_nullable(rest).unwrap();
        assert_eq!(value, Some(&b"a"[..]));
        assert!(rest.is_empty());
    }

    #[test]
    fn little_endian_ints() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05];
        assert_eq!(read_u16(&data).unwrap().0, 0x0201);
        assert_eq!(read_u24(&data).unwrap().0, 0x03_0201);
        assert_eq!(read_u32(&data).unwrap().0, 0x0403_0201);
        assert!(read_u64(&data).is_err());
    }

    #[test]
    fn cstring() {
        let (s, rest) = read_cstr(b"8.0.36\0tail").unwrap();
        assert_eq!(s, "8.0.36");
        assert_eq!(rest, b"tail");
        assert!(read_cstring(b"no terminator").is_err());
    }
}
