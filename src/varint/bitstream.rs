//! Bit-packed values of arbitrary width over 64-bit slots.
//!
//! Bits are addressed most-significant first inside each slot, so a value straddling two
//! slots keeps its high bits in the first and its low bits in the second.
use std::fmt;

use crate::error::{Error, Result};

/// The number of bits in a slot.
pub const SLOT_LEN: usize = 64;

#[inline(always)]
const fn value_mask(width: usize) -> u64 {
    if width == 0 {
        0
    } else {
        u64::MAX >> (SLOT_LEN - width)
    }
}

#[inline(always)]
fn check_value(val: u64, width: usize) -> Result<()> {
    if !(1..=SLOT_LEN).contains(&width) {
        return Err(Error::WidthMismatch(format!(
            "width must be in 1..={SLOT_LEN}, but got {width}."
        )));
    }
    if val & !value_mask(width) != 0 {
        return Err(Error::ValueTooLarge { value: val, width });
    }
    Ok(())
}

/// Writes the low `width` bits of `val` into `slots` starting at bit `offset`.
///
/// Every bit outside `offset..offset + width` is left untouched.
///
/// # Arguments
///
///  - `slots`: Destination slots.
///  - `offset`: Position of the first bit.
///  - `width`: Number of bits to write, in `1..=64`.
///  - `val`: Value to write.
///
/// # Errors
///
/// An error is returned if
///
///  - `width` is not in `1..=64`,
///  - `val` does not fit in `width` bits, or
///  - the range exceeds `slots`.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use datakit::varint::bitstream;
///
/// let mut slots = [0u64; 2];
/// bitstream::set_bits(&mut slots, 60, 8, 0xab)?;
/// assert_eq!(slots[0], 0xa);
/// assert_eq!(slots[1], 0xb << 60);
/// assert_eq!(bitstream::get_bits(&slots, 60, 8)?, 0xab);
/// # Ok(())
/// # }
/// ```
pub fn set_bits(slots: &mut [u64], offset: usize, width: usize, val: u64) -> Result<()> {
    check_value(val, width)?;
    check_range(slots.len(), offset, width)?;
    let mask = value_mask(width);
    let slot = offset / SLOT_LEN;
    let high = SLOT_LEN - offset % SLOT_LEN;
    if high >= width {
        let low = high - width;
        slots[slot] = (slots[slot] & !(mask << low)) | (val << low);
    } else {
        let spill = width - high;
        let keep = SLOT_LEN - spill;
        slots[slot] = (slots[slot] & !(mask >> spill)) | (val >> spill);
        slots[slot + 1] = (slots[slot + 1] & !(mask << keep)) | (val << keep);
    }
    Ok(())
}

/// Reads `width` bits from `slots` starting at bit `offset`.
///
/// # Errors
///
/// An error is returned if `width` is not in `1..=64` or the range exceeds `slots`.
pub fn get_bits(slots: &[u64], offset: usize, width: usize) -> Result<u64> {
    check_value(0, width)?;
    check_range(slots.len(), offset, width)?;
    let mask = value_mask(width);
    let slot = offset / SLOT_LEN;
    let high = SLOT_LEN - offset % SLOT_LEN;
    if high >= width {
        Ok((slots[slot] >> (high - width)) & mask)
    } else {
        let spill = width - high;
        let keep = SLOT_LEN - spill;
        let upper = slots[slot] & (mask >> spill);
        Ok((upper << spill) | (slots[slot + 1] >> keep))
    }
}

#[inline(always)]
fn check_range(num_slots: usize, offset: usize, width: usize) -> Result<()> {
    if num_slots * SLOT_LEN < offset + width {
        return Err(Error::CapacityExceeded(format!(
            "bits {offset}..{} exceed the {} available bits.",
            offset + width,
            num_slots * SLOT_LEN
        )));
    }
    Ok(())
}

/// Converts a native signed integer into the packed form of `width` bits,
/// where the top bit carries the sign and the rest carries the magnitude.
///
/// # Errors
///
/// An error is returned if the magnitude of `val` does not fit in `width - 1` bits.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use datakit::varint::bitstream;
///
/// let packed = bitstream::prepare_signed(-5, 8)?;
/// assert_eq!(packed, 0x85);
/// assert_eq!(bitstream::restore_signed(packed, 8), -5);
/// assert_eq!(bitstream::prepare_signed(5, 8)?, 5);
/// # Ok(())
/// # }
/// ```
pub fn prepare_signed(val: i64, width: usize) -> Result<u64> {
    if !(2..=SLOT_LEN).contains(&width) {
        return Err(Error::WidthMismatch(format!(
            "width must be in 2..={SLOT_LEN}, but got {width}."
        )));
    }
    let magnitude = val.unsigned_abs();
    if magnitude & !value_mask(width - 1) != 0 {
        return Err(Error::ValueTooLarge {
            value: magnitude,
            width: width - 1,
        });
    }
    if val < 0 {
        Ok(magnitude ^ (1 << (width - 1)))
    } else {
        Ok(magnitude)
    }
}

/// Converts the packed form produced by [`prepare_signed()`] back to a native integer.
pub fn restore_signed(packed: u64, width: usize) -> i64 {
    let sign = 1u64 << (width.clamp(1, SLOT_LEN) - 1);
    if packed & sign != 0 {
        -((packed ^ sign) as i64)
    } else {
        packed as i64
    }
}

/// Growable sequence of fixed-width values packed into 64-bit slots.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use datakit::varint::Bitstream;
///
/// let mut bs = Bitstream::new(5)?;
/// bs.push(7)?;
/// bs.push(31)?;
/// assert_eq!(bs.len(), 2);
/// assert_eq!(bs.get(1), Some(31));
///
/// bs.set(0, 2)?;
/// assert_eq!(bs.get(0), Some(2));
/// assert!(bs.push(32).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Bitstream {
    slots: Vec<u64>,
    len: usize,
    width: usize,
}

impl Bitstream {
    /// Creates a new empty sequence of `width`-bit values.
    ///
    /// # Errors
    ///
    /// An error is returned if `width` is not in `1..=64`.
    pub fn new(width: usize) -> Result<Self> {
        Self::with_capacity(0, width)
    }

    /// Creates a new empty sequence that reserves room for at least `capa` values.
    ///
    /// # Errors
    ///
    /// An error is returned if `width` is not in `1..=64`.
    pub fn with_capacity(capa: usize, width: usize) -> Result<Self> {
        check_value(0, width)?;
        Ok(Self {
            slots: Vec::with_capacity(Self::slots_for(capa * width)),
            len: 0,
            width,
        })
    }

    #[inline(always)]
    const fn slots_for(bits: usize) -> usize {
        (bits + SLOT_LEN - 1) / SLOT_LEN
    }

    /// Returns the `pos`-th value, or [`None`] if out of bounds.
    pub fn get(&self, pos: usize) -> Option<u64> {
        if pos < self.len {
            get_bits(&self.slots, pos * self.width, self.width).ok()
        } else {
            None
        }
    }

    /// Updates the `pos`-th value to `val`.
    ///
    /// # Errors
    ///
    /// An error is returned if `self.len() <= pos` or `val` does not fit in
    /// [`Self::width()`] bits.
    pub fn set(&mut self, pos: usize, val: u64) -> Result<()> {
        if self.len <= pos {
            return Err(Error::OutOfRange {
                index: pos as i64,
                len: self.len,
            });
        }
        set_bits(&mut self.slots, pos * self.width, self.width, val)
    }

    /// Pushes `val` at the end.
    ///
    /// # Errors
    ///
    /// An error is returned if `val` does not fit in [`Self::width()`] bits.
    pub fn push(&mut self, val: u64) -> Result<()> {
        check_value(val, self.width)?;
        let end = (self.len + 1) * self.width;
        if self.slots.len() < Self::slots_for(end) {
            self.slots.resize(Self::slots_for(end), 0);
        }
        set_bits(&mut self.slots, self.len * self.width, self.width, val)?;
        self.len += 1;
        Ok(())
    }

    /// Creates an iterator for enumerating values.
    pub const fn iter(&self) -> Iter {
        Iter::new(self)
    }

    /// Gets the number of values.
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if the sequence is empty.
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Gets the bit width of each value.
    #[inline(always)]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Returns the backing slots.
    pub fn slots(&self) -> &[u64] {
        &self.slots
    }
}

impl fmt::Debug for Bitstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vals: Vec<u64> = self.iter().collect();
        f.debug_struct("Bitstream")
            .field("vals", &vals)
            .field("len", &self.len)
            .field("width", &self.width)
            .finish()
    }
}

/// Iterator for enumerating values, created by [`Bitstream::iter()`].
pub struct Iter<'a> {
    bs: &'a Bitstream,
    pos: usize,
}

impl<'a> Iter<'a> {
    /// Creates a new iterator.
    pub const fn new(bs: &'a Bitstream) -> Self {
        Self { bs, pos: 0 }
    }
}

impl Iterator for Iter<'_> {
    type Item = u64;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        let val = self.bs.get(self.pos)?;
        self.pos += 1;
        Some(val)
    }

    #[inline(always)]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.bs.len() - self.pos;
        (rest, Some(rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    #[test]
    fn test_set_get_preserves_neighbors() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        for _ in 0..10000 {
            let mut slots: Vec<u64> = (0..4).map(|_| rng.gen()).collect();
            let width = rng.gen_range(1..=64);
            let offset = rng.gen_range(0..=4 * SLOT_LEN - width);
            let val = rng.gen::<u64>() & value_mask(width);
            let before = slots.clone();

            set_bits(&mut slots, offset, width, val).unwrap();
            assert_eq!(get_bits(&slots, offset, width).unwrap(), val);

            for bit in (0..4 * SLOT_LEN).filter(|&b| b < offset || offset + width <= b) {
                let (s, shift) = (bit / SLOT_LEN, SLOT_LEN - 1 - bit % SLOT_LEN);
                assert_eq!(
                    (slots[s] >> shift) & 1,
                    (before[s] >> shift) & 1,
                    "bit={bit}, offset={offset}, width={width}"
                );
            }
        }
    }

    #[test]
    fn test_value_too_large() {
        let mut slots = [0u64; 1];
        let e = set_bits(&mut slots, 0, 3, 8);
        assert_eq!(
            e.err().map(|x| x.to_string()),
            Some("val must fit in width=3 bits, but got 8.".to_string())
        );
        assert_eq!(slots[0], 0);
    }

    #[test]
    fn test_out_of_slots() {
        let mut slots = [0u64; 1];
        let e = set_bits(&mut slots, 60, 8, 1);
        assert_eq!(
            e.err().map(|x| x.to_string()),
            Some("capacity exceeded: bits 60..68 exceed the 64 available bits.".to_string())
        );
        assert!(get_bits(&slots, 0, 65).is_err());
    }

    #[test]
    fn test_signed_random() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        for _ in 0..10000 {
            let width = rng.gen_range(2..=64);
            let bound = value_mask(width - 1) as i64;
            let val = rng.gen_range(-bound..=bound);
            let packed = prepare_signed(val, width).unwrap();
            assert_eq!(packed & !value_mask(width), 0);
            assert_eq!(restore_signed(packed, width), val);
        }
        assert!(prepare_signed(-128, 8).is_err());
        assert!(prepare_signed(127, 8).is_ok());
    }

    #[test]
    fn test_bitstream_random() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        for width in [1, 7, 13, 31, 63, 64] {
            let vals: Vec<u64> = (0..1000)
                .map(|_| rng.gen::<u64>() & value_mask(width))
                .collect();
            let mut bs = Bitstream::with_capacity(vals.len(), width).unwrap();
            for &v in &vals {
                bs.push(v).unwrap();
            }
            assert_eq!(bs.len(), vals.len());
            assert_eq!(bs.iter().collect::<Vec<_>>(), vals);
            assert_eq!(bs.slots().len(), (vals.len() * width + 63) / 64);
        }
    }

    #[test]
    fn test_bitstream_set_oob() {
        let mut bs = Bitstream::new(4).unwrap();
        bs.push(1).unwrap();
        let e = bs.set(1, 2);
        assert_eq!(
            e.err().map(|x| x.to_string()),
            Some("index must be in -1..1, but got 1.".to_string())
        );
        assert_eq!(bs.get(1), None);
    }

    #[test]
    fn test_bitstream_bad_width() {
        let e = Bitstream::new(0);
        assert_eq!(
            e.err().map(|x| x.to_string()),
            Some("width mismatch: width must be in 1..=64, but got 0.".to_string())
        );
    }
}
