//! Continuation-bit varints in the SQLite big-endian flavour.
use crate::error::{Error, Result};
use crate::varint::VarintCodec;

/// Codec of chained varints.
///
/// Every byte but the ninth contributes its low 7 bits, most-significant group first,
/// and sets its high bit while more bytes follow. A ninth byte, if reached, contributes
/// all 8 bits, so any `u64` fits in at most 9 bytes.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use datakit::varint::{prelude::*, Chained};
///
/// assert_eq!(Chained::encode(16384), vec![0x81, 0x80, 0x00]);
/// assert_eq!(Chained::decode(&[0x81, 0x00])?, (128, 2));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Chained;

const NINE_BYTE_MASK: u64 = 0xff00_0000_0000_0000;

impl VarintCodec for Chained {
    const MAX_LEN: usize = 9;

    #[inline(always)]
    fn encoded_len(val: u64) -> usize {
        if val & NINE_BYTE_MASK != 0 {
            9
        } else {
            let bits = 64 - val.leading_zeros() as usize;
            ((bits + 6) / 7).max(1)
        }
    }

    fn decode_len(bytes: &[u8]) -> Option<usize> {
        for (i, &b) in bytes.iter().take(8).enumerate() {
            if b & 0x80 == 0 {
                return Some(i + 1);
            }
        }
        if bytes.len() >= 9 {
            Some(9)
        } else {
            None
        }
    }

    fn encode_into(mut val: u64, buf: &mut [u8]) -> Result<usize> {
        let len = Self::encoded_len(val);
        if buf.len() < len {
            return Err(Error::CapacityExceeded(format!(
                "buf must have at least {len} bytes, but got {}.",
                buf.len()
            )));
        }
        if len == 9 {
            buf[8] = val as u8;
            val >>= 8;
            for b in buf[..8].iter_mut().rev() {
                *b = (val & 0x7f) as u8 | 0x80;
                val >>= 7;
            }
        } else {
            for (i, b) in buf[..len].iter_mut().rev().enumerate() {
                *b = (val & 0x7f) as u8 | if i == 0 { 0 } else { 0x80 };
                val >>= 7;
            }
        }
        Ok(len)
    }

    fn decode(bytes: &[u8]) -> Result<(u64, usize)> {
        let mut val = 0u64;
        for (i, &b) in bytes.iter().take(8).enumerate() {
            val = (val << 7) | (b & 0x7f) as u64;
            if b & 0x80 == 0 {
                return Ok((val, i + 1));
            }
        }
        match bytes.get(8) {
            Some(&b) => Ok(((val << 8) | b as u64, 9)),
            _ => Err(Error::InvalidEncoding(format!(
                "chained varint is truncated after {} bytes.",
                bytes.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    #[test]
    fn test_vectors() {
        let cases: [(u64, &[u8]); 5] = [
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x81, 0x00]),
            (300, &[0x82, 0x2c]),
            (16384, &[0x81, 0x80, 0x00]),
        ];
        for (val, bytes) in cases {
            assert_eq!(Chained::encode(val), bytes.to_vec(), "val={val}");
            assert_eq!(Chained::decode(bytes).unwrap(), (val, bytes.len()));
        }
    }

    #[test]
    fn test_nine_byte_form() {
        let top = 1u64 << 63;
        let bytes = Chained::encode(top);
        assert_eq!(
            bytes,
            vec![0xc0, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x00]
        );
        assert_eq!(Chained::decode(&bytes).unwrap(), (top, 9));

        // All-zero groups with the continuation bit decode to zero.
        let zeros = [0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x00];
        assert_eq!(Chained::decode(&zeros).unwrap(), (0, 9));

        let bytes = Chained::encode(u64::MAX);
        assert_eq!(bytes, vec![0xff; 9]);
        assert_eq!(Chained::decode(&bytes).unwrap(), (u64::MAX, 9));
    }

    #[test]
    fn test_length_boundaries() {
        assert_eq!(Chained::encoded_len(0), 1);
        assert_eq!(Chained::encoded_len((1 << 56) - 1), 8);
        assert_eq!(Chained::encoded_len(1 << 56), 9);
    }

    #[test]
    fn test_random() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        for _ in 0..10000 {
            let shift = rng.gen_range(0..64);
            let val = rng.gen::<u64>() >> shift;
            let bytes = Chained::encode(val);
            assert_eq!(Chained::decode_len(&bytes), Some(bytes.len()));
            assert_eq!(Chained::decode(&bytes).unwrap(), (val, bytes.len()));
        }
    }

    #[test]
    fn test_truncated() {
        let e = Chained::decode(&[0x81, 0x80]);
        assert_eq!(
            e.err().map(|x| x.to_string()),
            Some("invalid encoding: chained varint is truncated after 2 bytes.".to_string())
        );
        assert!(Chained::decode(&[0x80; 8]).is_err());
        assert_eq!(Chained::decode_len(&[0x80; 8]), None);
    }
}
