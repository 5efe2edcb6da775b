//! Encoding of a single packed-list entry.
//!
//! An entry is laid out as `[prefix][payload][trailer]`. The trailer is the tagged varint of
//! the whole entry size, stored byte-reversed so that it can be decoded from its last byte
//! while walking backwards.
//!
//! | Prefix | Payload |
//! | --- | --- |
//! | `0..=63` | bytes of that length |
//! | `64` | tagged varint length, then bytes |
//! | `65..=72` | unsigned integer of 1 to 8 bytes, big-endian |
//! | `73..=80` | negative integer `v` of 1 to 8 bytes, stored as `-1 - v` |
//! | `81`, `82`, `83` | half, float, double |
//! | `84`, `85`, `86`, `87` | true, false, null, void |
//! | `88` | tagged varint atom key |
//! | `89`, `90` | 128-bit signed and unsigned integers, big-endian |
//! | `128..=255` | immediate unsigned `0..=127` |
use std::borrow::Cow;

use crate::databox::Databox;
use crate::error::{Error, Result};
use crate::varint::{external, prelude::*, tagged, Tagged};

const SHORT_BYTES_MAX: u8 = 63;
const LONG_BYTES: u8 = 64;
const UNSIGNED_BASE: u8 = 64;
const NEGATIVE_BASE: u8 = 72;
const HALF: u8 = 81;
const FLOAT: u8 = 82;
const DOUBLE: u8 = 83;
const TRUE: u8 = 84;
const FALSE: u8 = 85;
const NULL: u8 = 86;
const VOID: u8 = 87;
const ATOM: u8 = 88;
const SIGNED128: u8 = 89;
const UNSIGNED128: u8 = 90;
const IMMEDIATE: u8 = 128;

/// Returns the width of the trailer closing an entry whose prefix and payload take `base` bytes.
#[inline(always)]
pub(crate) fn trailer_width(base: usize) -> usize {
    let mut width = Tagged::encoded_len(base as u64 + 1);
    loop {
        let next = Tagged::encoded_len((base + width) as u64);
        if next == width {
            return width;
        }
        width = next;
    }
}

/// Returns the number of bytes `val` takes as a whole entry.
pub(crate) fn encoded_size(val: &Databox<'_>) -> usize {
    let base = 1 + payload_len_of(val);
    base + trailer_width(base)
}

fn payload_len_of(val: &Databox<'_>) -> usize {
    match val {
        Databox::Void | Databox::True | Databox::False | Databox::Null => 0,
        Databox::Unsigned(v) => unsigned_payload_len(*v),
        Databox::Signed(v) if *v >= 0 => unsigned_payload_len(*v as u64),
        Databox::Signed(v) => external::encoded_width(!*v as u64),
        Databox::Signed128(v) => match narrow_i128(*v) {
            Some(n) => payload_len_of(&n),
            None => 16,
        },
        Databox::Unsigned128(v) => match u64::try_from(*v) {
            Ok(n) => unsigned_payload_len(n),
            Err(_) => 16,
        },
        Databox::Float32(v) => {
            if half::from_f32_exact(*v).is_some() {
                2
            } else {
                4
            }
        }
        Databox::Double64(_) => 8,
        Databox::Bytes(b) if b.len() <= SHORT_BYTES_MAX as usize => b.len(),
        Databox::Bytes(b) => Tagged::encoded_len(b.len() as u64) + b.len(),
        Databox::Atom(k) => Tagged::encoded_len(*k),
    }
}

#[inline(always)]
fn unsigned_payload_len(v: u64) -> usize {
    if v < 128 {
        0
    } else {
        external::encoded_width(v)
    }
}

fn narrow_i128(v: i128) -> Option<Databox<'static>> {
    if let Ok(u) = u64::try_from(v) {
        Some(Databox::Unsigned(u))
    } else {
        i64::try_from(v).ok().map(Databox::Signed)
    }
}

/// Appends `val` as a complete entry to `out`, returning the number of bytes appended.
pub(crate) fn encode_append(val: &Databox<'_>, out: &mut Vec<u8>) -> usize {
    let start = out.len();
    match val {
        Databox::Void => out.push(VOID),
        Databox::True => out.push(TRUE),
        Databox::False => out.push(FALSE),
        Databox::Null => out.push(NULL),
        Databox::Unsigned(v) => push_unsigned(*v, out),
        Databox::Signed(v) if *v >= 0 => push_unsigned(*v as u64, out),
        Databox::Signed(v) => {
            let stored = !*v as u64;
            let width = external::encoded_width(stored);
            out.push(NEGATIVE_BASE + width as u8);
            out.extend_from_slice(&stored.to_be_bytes()[8 - width..]);
        }
        Databox::Signed128(v) => match narrow_i128(*v) {
            Some(n) => return encode_append(&n, out),
            None => {
                out.push(SIGNED128);
                out.extend_from_slice(&v.to_be_bytes());
            }
        },
        Databox::Unsigned128(v) => match u64::try_from(*v) {
            Ok(n) => push_unsigned(n, out),
            Err(_) => {
                out.push(UNSIGNED128);
                out.extend_from_slice(&v.to_be_bytes());
            }
        },
        Databox::Float32(v) => match half::from_f32_exact(*v) {
            Some(h) => {
                out.push(HALF);
                out.extend_from_slice(&h.to_be_bytes());
            }
            None => {
                out.push(FLOAT);
                out.extend_from_slice(&v.to_bits().to_be_bytes());
            }
        },
        Databox::Double64(v) => {
            out.push(DOUBLE);
            out.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        Databox::Bytes(b) => {
            if b.len() <= SHORT_BYTES_MAX as usize {
                out.push(b.len() as u8);
            } else {
                out.push(LONG_BYTES);
                Tagged::encode_append(b.len() as u64, out);
            }
            out.extend_from_slice(b);
        }
        Databox::Atom(k) => {
            out.push(ATOM);
            Tagged::encode_append(*k, out);
        }
    }
    let base = out.len() - start;
    let width = trailer_width(base);
    tagged::encode_reversed_append((base + width) as u64, out);
    out.len() - start
}

#[inline(always)]
fn push_unsigned(v: u64, out: &mut Vec<u8>) {
    if v < 128 {
        out.push(IMMEDIATE + v as u8);
    } else {
        let width = external::encoded_width(v);
        out.push(UNSIGNED_BASE + width as u8);
        out.extend_from_slice(&v.to_be_bytes()[8 - width..]);
    }
}

/// Returns the number of prefix and payload bytes of the entry at `off`.
fn base_len(buf: &[u8], off: usize) -> Result<usize> {
    let prefix = *buf
        .get(off)
        .ok_or_else(|| Error::InvalidEncoding(format!("entry offset {off} is past the end.")))?;
    let payload = match prefix {
        0..=SHORT_BYTES_MAX => prefix as usize,
        LONG_BYTES => {
            let (len, width) = Tagged::decode(&buf[off + 1..])?;
            width + len as usize
        }
        65..=72 => (prefix - UNSIGNED_BASE) as usize,
        73..=80 => (prefix - NEGATIVE_BASE) as usize,
        HALF => 2,
        FLOAT => 4,
        DOUBLE => 8,
        TRUE | FALSE | NULL | VOID => 0,
        ATOM => Tagged::decode_len(&buf[off + 1..]).ok_or_else(|| {
            Error::InvalidEncoding(format!("atom key at {off} is truncated."))
        })?,
        SIGNED128 | UNSIGNED128 => 16,
        IMMEDIATE..=255 => 0,
        _ => {
            return Err(Error::InvalidEncoding(format!(
                "prefix {prefix} at {off} is unknown."
            )))
        }
    };
    Ok(1 + payload)
}

/// Returns the total size of the entry at `off`, trailer included.
///
/// # Errors
///
/// An error is returned if the entry is malformed or extends past `buf`.
pub(crate) fn size_at(buf: &[u8], off: usize) -> Result<usize> {
    let base = base_len(buf, off)?;
    let size = base + trailer_width(base);
    if off + size > buf.len() {
        return Err(Error::InvalidEncoding(format!(
            "entry at {off} of {size} bytes exceeds the buffer of {} bytes.",
            buf.len()
        )));
    }
    Ok(size)
}

/// Checks the trailer of the entry at `off` against its forward size.
pub(crate) fn check_trailer(buf: &[u8], off: usize, size: usize) -> Result<()> {
    let (stored, _) = tagged::decode_reversed(buf, off + size)?;
    if stored as usize != size {
        return Err(Error::InvalidEncoding(format!(
            "trailer at {off} records {stored} bytes, but the entry has {size}."
        )));
    }
    Ok(())
}

#[inline(always)]
fn be_u64(bytes: &[u8]) -> u64 {
    let mut be = [0; 8];
    be[8 - bytes.len()..].copy_from_slice(bytes);
    u64::from_be_bytes(be)
}

#[inline(always)]
fn be_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Decodes the entry at `off`, borrowing byte strings from `buf`.
pub(crate) fn decode(buf: &[u8], off: usize) -> Result<Databox<'_>> {
    let prefix = buf[off];
    let p = &buf[off + 1..];
    let val = match prefix {
        0..=SHORT_BYTES_MAX => Databox::Bytes(Cow::Borrowed(&p[..prefix as usize])),
        LONG_BYTES => {
            let (len, width) = Tagged::decode(p)?;
            Databox::Bytes(Cow::Borrowed(&p[width..width + len as usize]))
        }
        65..=72 => Databox::Unsigned(be_u64(&p[..(prefix - UNSIGNED_BASE) as usize])),
        73..=80 => Databox::Signed(!(be_u64(&p[..(prefix - NEGATIVE_BASE) as usize]) as i64)),
        HALF => Databox::Float32(half::to_f32(u16::from_be_bytes(be_array(p)))),
        FLOAT => Databox::Float32(f32::from_bits(u32::from_be_bytes(be_array(p)))),
        DOUBLE => Databox::Double64(f64::from_bits(u64::from_be_bytes(be_array(p)))),
        TRUE => Databox::True,
        FALSE => Databox::False,
        NULL => Databox::Null,
        VOID => Databox::Void,
        ATOM => Databox::Atom(Tagged::decode(p)?.0),
        SIGNED128 => Databox::Signed128(i128::from_be_bytes(be_array(p))),
        UNSIGNED128 => Databox::Unsigned128(u128::from_be_bytes(be_array(p))),
        IMMEDIATE..=255 => Databox::Unsigned((prefix - IMMEDIATE) as u64),
        _ => {
            return Err(Error::InvalidEncoding(format!(
                "prefix {prefix} at {off} is unknown."
            )))
        }
    };
    Ok(val)
}

/// Conversions between `f32` and IEEE 754 binary16 bit patterns.
pub(crate) mod half {
    /// Returns the half bit pattern of `v` if the conversion loses nothing.
    pub fn from_f32_exact(v: f32) -> Option<u16> {
        let bits = v.to_bits();
        let sign = ((bits >> 16) & 0x8000) as u16;
        let exp = ((bits >> 23) & 0xff) as i32;
        let mant = bits & 0x7f_ffff;

        if exp == 0xff {
            // Infinity, or a NaN whose payload survives truncation.
            return if mant & 0x1fff == 0 && (mant == 0 || mant >> 13 != 0) {
                Some(sign | 0x7c00 | (mant >> 13) as u16)
            } else {
                None
            };
        }
        if exp == 0 {
            return if mant == 0 { Some(sign) } else { None };
        }
        let e = exp - 127;
        if (-14..=15).contains(&e) {
            if mant & 0x1fff != 0 {
                return None;
            }
            return Some(sign | (((e + 15) as u16) << 10) | (mant >> 13) as u16);
        }
        if (-24..-14).contains(&e) {
            let full = mant | 0x80_0000;
            let shift = (-1 - e) as u32;
            if full & ((1 << shift) - 1) != 0 {
                return None;
            }
            return Some(sign | (full >> shift) as u16);
        }
        None
    }

    /// Expands a half bit pattern into `f32`.
    pub fn to_f32(h: u16) -> f32 {
        let sign = ((h as u32) & 0x8000) << 16;
        let exp = ((h >> 10) & 0x1f) as u32;
        let mant = (h & 0x3ff) as u32;
        match exp {
            0 => {
                let magnitude = mant as f32 * f32::from_bits(0x3380_0000); // 2^-24
                f32::from_bits(sign | magnitude.to_bits())
            }
            0x1f => f32::from_bits(sign | 0x7f80_0000 | (mant << 13)),
            _ => f32::from_bits(sign | ((exp + 112) << 23) | (mant << 13)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(val: Databox<'_>) -> (Databox<'static>, usize) {
        let mut buf = vec![0xaa];
        let size = encode_append(&val, &mut buf);
        assert_eq!(size, encoded_size(&val));
        assert_eq!(size_at(&buf, 1).unwrap(), size);
        check_trailer(&buf, 1, size).unwrap();
        (decode(&buf, 1).unwrap().into_owned(), size)
    }

    #[test]
    fn test_integer_sizes() {
        assert_eq!(roundtrip(Databox::Unsigned(0)), (Databox::Unsigned(0), 2));
        assert_eq!(roundtrip(Databox::Unsigned(127)), (Databox::Unsigned(127), 2));
        assert_eq!(roundtrip(Databox::Unsigned(128)), (Databox::Unsigned(128), 3));
        assert_eq!(
            roundtrip(Databox::Unsigned(u64::MAX)),
            (Databox::Unsigned(u64::MAX), 10)
        );
        assert_eq!(roundtrip(Databox::Signed(-1)), (Databox::Signed(-1), 3));
        assert_eq!(
            roundtrip(Databox::Signed(i64::MIN)),
            (Databox::Signed(i64::MIN), 10)
        );
        assert_eq!(roundtrip(Databox::Signed(5)), (Databox::Unsigned(5), 2));
    }

    #[test]
    fn test_wide_integers() {
        let big = (1i128 << 100) + 3;
        assert_eq!(roundtrip(Databox::Signed128(big)).0, Databox::Signed128(big));
        assert_eq!(roundtrip(Databox::Signed128(-big)).0, Databox::Signed128(-big));
        assert_eq!(roundtrip(Databox::Signed128(-9)).0, Databox::Signed(-9));
        assert_eq!(
            roundtrip(Databox::Unsigned128(u128::MAX)).0,
            Databox::Unsigned128(u128::MAX)
        );
    }

    #[test]
    fn test_floats() {
        assert_eq!(roundtrip(Databox::Float32(2.5)), (Databox::Float32(2.5), 4));
        assert_eq!(roundtrip(Databox::Float32(0.1)), (Databox::Float32(0.1), 6));
        assert_eq!(roundtrip(Databox::Double64(2.5)), (Databox::Double64(2.5), 10));
    }

    #[test]
    fn test_bytes() {
        let short = vec![7u8; 63];
        let long = vec![9u8; 64];
        let huge = vec![1u8; 300];
        assert_eq!(roundtrip(Databox::from(short.clone())).0, Databox::from(short));
        let (val, size) = roundtrip(Databox::from(long.clone()));
        assert_eq!(val, Databox::from(long));
        assert_eq!(size, 1 + 1 + 64 + 1);
        let (val, size) = roundtrip(Databox::from(huge.clone()));
        assert_eq!(val, Databox::from(huge));
        // 1 + 2 (length) + 300 + 2 (trailer)
        assert_eq!(size, 305);
    }

    #[test]
    fn test_markers_and_atoms() {
        for val in [Databox::True, Databox::False, Databox::Null, Databox::Void] {
            assert_eq!(roundtrip(val.clone()), (val, 2));
        }
        assert_eq!(roundtrip(Databox::Atom(70000)).0, Databox::Atom(70000));
    }

    #[test]
    fn test_trailer_width_fixpoint() {
        assert_eq!(trailer_width(1), 1);
        assert_eq!(trailer_width(239), 1);
        // 240 + 1 would be 241, which needs two bytes.
        assert_eq!(trailer_width(240), 2);
        assert_eq!(trailer_width(2285), 2);
        assert_eq!(trailer_width(2286), 3);
    }

    #[test]
    fn test_half_exact() {
        for v in [0.0f32, -0.0, 1.0, -2.5, 65504.0, 6.1035156e-5, 5.9604645e-8] {
            let h = half::from_f32_exact(v).unwrap();
            assert_eq!(half::to_f32(h).to_bits(), v.to_bits(), "v={v}");
        }
        assert_eq!(half::from_f32_exact(f32::INFINITY), Some(0x7c00));
        assert_eq!(half::from_f32_exact(0.1), None);
        assert_eq!(half::from_f32_exact(65536.0), None);
        assert_eq!(half::from_f32_exact(1.0e-10), None);
    }

    #[test]
    fn test_unknown_prefix() {
        let buf = [100u8, 0, 0];
        let e = size_at(&buf, 0);
        assert_eq!(
            e.err().map(|x| x.to_string()),
            Some("invalid encoding: prefix 100 at 0 is unknown.".to_string())
        );
    }
}
