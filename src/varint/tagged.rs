//! Tagged varints whose first byte announces the total width.
//!
//! | First byte `b0` | Width | Value |
//! | --- | :-: | --- |
//! | `0..=240` | 1 | `b0` |
//! | `241..=248` | 2 | `240 + (b0 - 241) * 256 + b1` |
//! | `249` | 3 | `2288 + 256 * b1 + b2` |
//! | `250..=255` | `b0 - 246` | big-endian `b1..` |
//!
//! Canonical encodings of non-negative integers compare by `memcmp` in the same order as
//! the integers themselves.
use crate::error::{Error, Result};
use crate::varint::VarintCodec;

/// Largest value encodable in one byte.
pub const MAX_1: u64 = 240;
/// Largest value encodable in two bytes.
pub const MAX_2: u64 = 2287;
/// Largest value encodable in three bytes.
pub const MAX_3: u64 = 67823;

/// Codec of tagged varints.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use datakit::varint::{prelude::*, Tagged};
///
/// let bytes = Tagged::encode(67824);
/// assert_eq!(bytes, vec![250, 1, 8, 240]);
/// assert_eq!(Tagged::decode(&bytes)?, (67824, 4));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tagged;

impl Tagged {
    /// Returns the total width announced by the first byte `b0`.
    #[inline(always)]
    pub const fn width_from_first_byte(b0: u8) -> usize {
        match b0 {
            0..=240 => 1,
            241..=248 => 2,
            249 => 3,
            _ => (b0 - 246) as usize,
        }
    }

    /// Encodes `val` into exactly `width` bytes at the front of `buf`.
    ///
    /// Used to reserve a slot of a known width for later in-place updates.
    ///
    /// # Arguments
    ///
    ///  - `val`: Value to encode.
    ///  - `width`: Target width in bytes.
    ///  - `buf`: Destination.
    ///
    /// # Errors
    ///
    /// An error is returned if
    ///
    ///  - `width` is not in `1..=9`,
    ///  - `val` is not representable in `width` bytes, or
    ///  - `buf` is shorter than `width`.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use datakit::varint::{prelude::*, Tagged};
    ///
    /// let mut buf = [0; 5];
    /// Tagged::encode_fixed_width(7, 5, &mut buf)?;
    /// assert_eq!(buf, [251, 0, 0, 0, 7]);
    /// assert_eq!(Tagged::decode(&buf)?, (7, 5));
    /// # Ok(())
    /// # }
    /// ```
    pub fn encode_fixed_width(val: u64, width: usize, buf: &mut [u8]) -> Result<()> {
        if !(1..=9).contains(&width) {
            return Err(Error::WidthMismatch(format!(
                "width must be in 1..=9, but got {width}."
            )));
        }
        let fits = match width {
            1 => val <= MAX_1,
            2 => (MAX_1..=MAX_2).contains(&val),
            3 => (MAX_2 + 1..=MAX_3).contains(&val),
            9 => true,
            w => val >> (8 * (w - 1)) == 0,
        };
        if !fits {
            return Err(Error::WidthMismatch(format!(
                "val={val} cannot be encoded in width={width} bytes."
            )));
        }
        if buf.len() < width {
            return Err(Error::CapacityExceeded(format!(
                "buf must have at least {width} bytes, but got {}.",
                buf.len()
            )));
        }
        match width {
            1 => buf[0] = val as u8,
            2 => {
                let v = val - MAX_1;
                buf[0] = 241 + (v >> 8) as u8;
                buf[1] = v as u8;
            }
            3 => {
                let v = val - (MAX_2 + 1);
                buf[0] = 249;
                buf[1] = (v >> 8) as u8;
                buf[2] = v as u8;
            }
            w => {
                buf[0] = (w + 246) as u8;
                buf[1..w].copy_from_slice(&val.to_be_bytes()[9 - w..]);
            }
        }
        Ok(())
    }

    /// Adds `delta` to the value stored at `offset` in `buf`, re-encoding it canonically.
    ///
    /// If the width changes, the bytes following the slot are shifted, so offsets
    /// that point past the slot move by the returned width difference.
    ///
    /// # Arguments
    ///
    ///  - `buf`: Buffer holding the encoded value.
    ///  - `offset`: Position of the first byte of the value.
    ///  - `delta`: Signed amount to add.
    ///
    /// # Errors
    ///
    /// An error is returned if the bytes at `offset` are malformed or the result
    /// leaves the range of `u64`.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use datakit::varint::{prelude::*, Tagged};
    ///
    /// let mut buf = vec![240, 0xaa];
    /// let width = Tagged::add_grow(&mut buf, 0, 1)?;
    /// assert_eq!(width, 2);
    /// assert_eq!(buf, vec![241, 1, 0xaa]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_grow(buf: &mut Vec<u8>, offset: usize, delta: i64) -> Result<usize> {
        let (val, old_width) = Self::decode(buf.get(offset..).unwrap_or(&[]))?;
        let new_val = val.checked_add_signed(delta).ok_or_else(|| {
            Error::CapacityExceeded(format!("val={val} plus delta={delta} overflows u64."))
        })?;
        let encoded = Self::encode(new_val);
        buf.splice(offset..offset + old_width, encoded.iter().copied());
        Ok(encoded.len())
    }

    /// Adds `delta` to the value at the front of `buf` without changing its width.
    ///
    /// # Errors
    ///
    /// An error is returned if the result does not fit the existing width.
    ///
    /// # Examples
    ///
    /// ```
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use datakit::varint::{prelude::*, Tagged};
    ///
    /// let mut buf = Tagged::encode(1000);
    /// Tagged::add_no_grow(&mut buf, 5)?;
    /// assert_eq!(Tagged::decode(&buf)?, (1005, 2));
    /// assert!(Tagged::add_no_grow(&mut buf, 5000).is_err());
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_no_grow(buf: &mut [u8], delta: i64) -> Result<usize> {
        let (val, width) = Self::decode(buf)?;
        let new_val = val.checked_add_signed(delta).ok_or_else(|| {
            Error::CapacityExceeded(format!("val={val} plus delta={delta} overflows u64."))
        })?;
        if Self::encoded_len(new_val) > width {
            return Err(Error::CapacityExceeded(format!(
                "val={new_val} needs more than width={width} bytes."
            )));
        }
        Self::encode_fixed_width(new_val, width, buf)?;
        Ok(width)
    }
}

impl VarintCodec for Tagged {
    const MAX_LEN: usize = 9;

    #[inline(always)]
    fn encoded_len(val: u64) -> usize {
        if val <= MAX_1 {
            1
        } else if val <= MAX_2 {
            2
        } else if val <= MAX_3 {
            3
        } else {
            let bytes = 8 - (val.leading_zeros() / 8) as usize;
            bytes.max(3) + 1
        }
    }

    #[inline(always)]
    fn decode_len(bytes: &[u8]) -> Option<usize> {
        bytes.first().map(|&b0| Self::width_from_first_byte(b0))
    }

    fn encode_into(val: u64, buf: &mut [u8]) -> Result<usize> {
        let width = Self::encoded_len(val);
        Self::encode_fixed_width(val, width, buf)?;
        Ok(width)
    }

    fn decode(bytes: &[u8]) -> Result<(u64, usize)> {
        let width = Self::decode_len(bytes)
            .ok_or_else(|| Error::InvalidEncoding("tagged varint is empty.".to_string()))?;
        if bytes.len() < width {
            return Err(Error::InvalidEncoding(format!(
                "tagged varint needs {width} bytes, but got {}.",
                bytes.len()
            )));
        }
        let b0 = bytes[0] as u64;
        let val = match width {
            1 => b0,
            2 => MAX_1 + (b0 - 241) * 256 + bytes[1] as u64,
            3 => MAX_2 + 1 + 256 * bytes[1] as u64 + bytes[2] as u64,
            w => {
                let mut be = [0; 8];
                be[9 - w..].copy_from_slice(&bytes[1..w]);
                u64::from_be_bytes(be)
            }
        };
        Ok((val, width))
    }
}

/// Reads a tagged varint stored byte-reversed and ending right before `end`,
/// returning the value and its width.
///
/// This lets a trailer written after a record be decoded while walking backwards.
pub(crate) fn decode_reversed(bytes: &[u8], end: usize) -> Result<(u64, usize)> {
    if end == 0 || end > bytes.len() {
        return Err(Error::InvalidEncoding(format!(
            "reversed tagged varint cannot end at {end}."
        )));
    }
    let width = Tagged::width_from_first_byte(bytes[end - 1]);
    if width > end {
        return Err(Error::InvalidEncoding(format!(
            "reversed tagged varint needs {width} bytes, but only {end} precede it."
        )));
    }
    let mut tmp = [0u8; 9];
    for (i, b) in bytes[end - width..end].iter().rev().enumerate() {
        tmp[i] = *b;
    }
    Tagged::decode(&tmp[..width])
}

/// Appends `val` as a byte-reversed tagged varint.
pub(crate) fn encode_reversed_append(val: u64, buf: &mut Vec<u8>) -> usize {
    let encoded = Tagged::encode(val);
    buf.extend(encoded.iter().rev());
    encoded.len()
}
