//! Top module for variable-length integer codecs.
//!
//! # Introduction
//!
//! Four independent codecs are provided. Any unsigned 64-bit integer round-trips through
//! each of them bit for bit.
//!
//! | Codec | Width prefix | 1-byte max | Sortable by byte comparison |
//! | --- | --- | :-: | :-: |
//! | [`Tagged`] | first byte announces the total width (1 to 9 bytes) | 240 | yes |
//! | [`Chained`] | continuation bit per byte, 9th byte carries 8 bits | 127 | no |
//! | [`external`] | width carried out of band, big-endian payload of 1 to 8 bytes | 255 | yes (same width) |
//! | [`Bitstream`] | arbitrary bit widths over 64-bit slots | -- | -- |
//!
//! [`Tagged`] is the default for sortable keys, [`Chained`] is the SQLite-compatible wire
//! format, [`external`] serves headers whose width is known from context, and
//! [`Bitstream`] packs values narrower than a byte.
//!
//! # Examples
//!
//! The self-delimiting codecs implement [`VarintCodec`], which [`prelude`] brings
//! into scope.
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use datakit::varint::{prelude::*, Chained, Tagged};
//!
//! assert_eq!(Tagged::encode(2287), vec![248, 255]);
//! assert_eq!(Chained::encode(300), vec![0x82, 0x2c]);
//!
//! assert_eq!(Tagged::decode(&[248, 255])?, (2287, 2));
//! # Ok(())
//! # }
//! ```
pub mod bitstream;
pub mod chained;
pub mod external;
pub mod prelude;
pub mod tagged;

pub use bitstream::Bitstream;
pub use chained::Chained;
pub use tagged::Tagged;

use crate::error::Result;

/// Interface of self-delimiting integer codecs over byte slices.
pub trait VarintCodec {
    /// Maximum number of bytes an encoding can occupy.
    const MAX_LEN: usize;

    /// Returns the number of bytes needed to encode `val`.
    fn encoded_len(val: u64) -> usize;

    /// Returns the total encoded length announced by the bytes at the front of `bytes`,
    /// or [`None`] if it cannot be determined from the available bytes.
    fn decode_len(bytes: &[u8]) -> Option<usize>;

    /// Writes `val` at the front of `buf`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// An error is returned if `buf` is shorter than [`Self::encoded_len()`].
    fn encode_into(val: u64, buf: &mut [u8]) -> Result<usize>;

    /// Reads the value at the front of `bytes`, returning it with its encoded length.
    ///
    /// # Errors
    ///
    /// An error is returned if `bytes` does not start with a complete encoding.
    fn decode(bytes: &[u8]) -> Result<(u64, usize)>;

    /// Encodes `val` into a new vector.
    fn encode(val: u64) -> Vec<u8> {
        let mut buf = vec![0; Self::MAX_LEN];
        // NOTE: MAX_LEN bytes always suffice.
        let len = Self::encode_into(val, &mut buf).unwrap_or(0);
        buf.truncate(len);
        buf
    }

    /// Appends the encoding of `val` to `buf`, returning the number of bytes appended.
    fn encode_append(val: u64, buf: &mut Vec<u8>) -> usize {
        let start = buf.len();
        buf.resize(start + Self::encoded_len(val), 0);
        Self::encode_into(val, &mut buf[start..]).unwrap_or(0)
    }
}
