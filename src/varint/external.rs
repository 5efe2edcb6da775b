//! Big-endian integers whose width is carried out of band.
//!
//! The width is a parameter of every call, so the payload has no prefix at all.
//! Encodings of equal width compare by `memcmp` in numeric order.
use crate::error::{Error, Result};

/// Maximum width in bytes.
pub const MAX_WIDTH: usize = 8;

/// Returns the minimum width in bytes to store `val`, at least 1.
///
/// # Examples
///
/// ```
/// use datakit::varint::external;
///
/// assert_eq!(external::encoded_width(0), 1);
/// assert_eq!(external::encoded_width(255), 1);
/// assert_eq!(external::encoded_width(256), 2);
/// assert_eq!(external::encoded_width(u64::MAX), 8);
/// ```
#[inline(always)]
pub const fn encoded_width(val: u64) -> usize {
    let bytes = 8 - (val.leading_zeros() / 8) as usize;
    if bytes == 0 {
        1
    } else {
        bytes
    }
}

/// Returns the minimum width in bytes to store `val` in two's complement.
#[inline(always)]
pub const fn encoded_width_signed(val: i64) -> usize {
    let magnitude = (if val < 0 { !val } else { val }) as u64;
    // One extra bit for the sign.
    let bits = 64 - magnitude.leading_zeros() as usize + 1;
    (bits + 7) / 8
}

#[inline(always)]
fn check_width(width: usize, available: usize) -> Result<()> {
    if !(1..=MAX_WIDTH).contains(&width) {
        return Err(Error::WidthMismatch(format!(
            "width must be in 1..={MAX_WIDTH}, but got {width}."
        )));
    }
    if available < width {
        return Err(Error::WidthMismatch(format!(
            "width={width} exceeds the {available} available bytes."
        )));
    }
    Ok(())
}

/// Writes `val` big-endian into the first `width` bytes of `buf`.
///
/// # Errors
///
/// An error is returned if
///
///  - `width` is not in `1..=8` or exceeds `buf.len()`, or
///  - `val` does not fit in `width` bytes.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use datakit::varint::external;
///
/// let mut buf = [0; 3];
/// external::put(&mut buf, 3, 0x010203)?;
/// assert_eq!(buf, [1, 2, 3]);
/// assert_eq!(external::get(&buf, 3)?, 0x010203);
/// assert!(external::put(&mut buf, 1, 256).is_err());
/// # Ok(())
/// # }
/// ```
pub fn put(buf: &mut [u8], width: usize, val: u64) -> Result<()> {
    check_width(width, buf.len())?;
    if width < MAX_WIDTH && val >> (8 * width) != 0 {
        return Err(Error::ValueTooLarge {
            value: val,
            width: 8 * width,
        });
    }
    put_quick(buf, width, val);
    Ok(())
}

/// Writes the low `width` bytes of `val` big-endian, for widths already known valid.
#[inline(always)]
pub(crate) fn put_quick(buf: &mut [u8], width: usize, val: u64) {
    buf[..width].copy_from_slice(&val.to_be_bytes()[MAX_WIDTH - width..]);
}

/// Reads `width` big-endian bytes, for widths already known valid.
#[inline(always)]
pub(crate) fn get_quick(bytes: &[u8], width: usize) -> u64 {
    let mut be = [0; MAX_WIDTH];
    be[MAX_WIDTH - width..].copy_from_slice(&bytes[..width]);
    u64::from_be_bytes(be)
}

/// Reads a big-endian value from the first `width` bytes of `bytes`.
///
/// # Errors
///
/// An error is returned if `width` is not in `1..=8` or exceeds `bytes.len()`.
pub fn get(bytes: &[u8], width: usize) -> Result<u64> {
    check_width(width, bytes.len())?;
    Ok(get_quick(bytes, width))
}

/// Writes `val` in two's complement into the first `width` bytes of `buf`.
///
/// # Errors
///
/// An error is returned if `width` is invalid or `val` does not fit in `width` bytes.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use datakit::varint::external;
///
/// let mut buf = [0; 2];
/// external::put_signed(&mut buf, 2, -2)?;
/// assert_eq!(buf, [0xff, 0xfe]);
/// assert_eq!(external::get_signed(&buf, 2)?, -2);
/// # Ok(())
/// # }
/// ```
pub fn put_signed(buf: &mut [u8], width: usize, val: i64) -> Result<()> {
    check_width(width, buf.len())?;
    if encoded_width_signed(val) > width {
        return Err(Error::ValueTooLarge {
            value: val as u64,
            width: 8 * width,
        });
    }
    buf[..width].copy_from_slice(&val.to_be_bytes()[MAX_WIDTH - width..]);
    Ok(())
}

/// Reads a two's complement value from the first `width` bytes of `bytes`,
/// extending its top bit as the sign.
///
/// # Errors
///
/// An error is returned if `width` is not in `1..=8` or exceeds `bytes.len()`.
pub fn get_signed(bytes: &[u8], width: usize) -> Result<i64> {
    let raw = get(bytes, width)?;
    let shift = 64 - 8 * width as u32;
    Ok(((raw << shift) as i64) >> shift)
}

/// Encodes `val` into a new vector of its minimum width.
pub fn encode(val: u64) -> Vec<u8> {
    let width = encoded_width(val);
    val.to_be_bytes()[MAX_WIDTH - width..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    #[test]
    fn test_widths() {
        assert_eq!(encoded_width(0xff_ffff), 3);
        assert_eq!(encoded_width(0x100_0000), 4);
        assert_eq!(encoded_width_signed(0), 1);
        assert_eq!(encoded_width_signed(127), 1);
        assert_eq!(encoded_width_signed(128), 2);
        assert_eq!(encoded_width_signed(-128), 1);
        assert_eq!(encoded_width_signed(-129), 2);
        assert_eq!(encoded_width_signed(i64::MIN), 8);
        assert_eq!(encoded_width_signed(i64::MAX), 8);
    }

    #[test]
    fn test_random_unsigned() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        for _ in 0..10000 {
            let val = rng.gen::<u64>() >> rng.gen_range(0..64);
            let width = encoded_width(val);
            let mut buf = [0; 8];
            put(&mut buf, width, val).unwrap();
            assert_eq!(get(&buf, width).unwrap(), val);
            assert_eq!(encode(val), buf[..width].to_vec());
        }
    }

    #[test]
    fn test_random_signed() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        for _ in 0..10000 {
            let val = rng.gen::<i64>() >> rng.gen_range(0..64);
            let width = encoded_width_signed(val);
            let mut buf = [0; 8];
            put_signed(&mut buf, width, val).unwrap();
            assert_eq!(get_signed(&buf, width).unwrap(), val);
        }
    }

    #[test]
    fn test_same_width_sortable() {
        let a = encode(0x1234);
        let b = encode(0x1300);
        assert!(a < b);
    }

    #[test]
    fn test_bad_width() {
        let mut buf = [0; 4];
        let e = put(&mut buf, 0, 1);
        assert_eq!(
            e.err().map(|x| x.to_string()),
            Some("width mismatch: width must be in 1..=8, but got 0.".to_string())
        );
        let e = get(&buf, 5);
        assert_eq!(
            e.err().map(|x| x.to_string()),
            Some("width mismatch: width=5 exceeds the 4 available bytes.".to_string())
        );
        let e = put(&mut buf, 2, 1 << 16);
        assert_eq!(
            e.err().map(|x| x.to_string()),
            Some("val must fit in width=16 bits, but got 65536.".to_string())
        );
        assert!(put_signed(&mut buf, 1, 200).is_err());
    }
}
