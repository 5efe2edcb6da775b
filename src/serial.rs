//! Byte-copy serialization of containers.
//!
//! The encodings are in-memory copies meant for round trips within one build of the crate,
//! not a stable on-disk format.
#![cfg(target_pointer_width = "64")]

pub mod primitive;

use std::io::{Read, Write};

use anyhow::Result;

/// Trait to serialize/deserialize data structures.
///
/// # Examples
///
/// ```
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use datakit::{Databox, Endpoint, Flex, Serializable};
///
/// let mut f = Flex::new();
/// f.push(&Databox::from("key"), Endpoint::Tail);
/// f.push(&Databox::from(-7i64), Endpoint::Tail);
///
/// let mut bytes = vec![];
/// let size = f.serialize_into(&mut bytes)?;
/// let other = Flex::deserialize_from(&bytes[..])?;
///
/// assert_eq!(f, other);
/// assert_eq!(size, bytes.len());
/// assert_eq!(size, f.size_in_bytes());
/// # Ok(())
/// # }
/// ```
pub trait Serializable: Sized {
    /// Serializes the data structure into the writer,
    /// returning the number of serialized bytes.
    ///
    /// # Arguments
    ///
    /// - `writer`: [`Write`] variable.
    fn serialize_into<W: Write>(&self, writer: W) -> Result<usize>;

    /// Deserializes the data structure from the reader.
    ///
    /// # Arguments
    ///
    /// - `reader`: [`Read`] variable.
    fn deserialize_from<R: Read>(reader: R) -> Result<Self>;

    /// Returns the number of bytes to serialize the data structure.
    fn size_in_bytes(&self) -> usize;

    /// Returns the size of a primitive type in bytes (if the type is so).
    fn size_of() -> Option<usize> {
        None
    }
}

impl<S> Serializable for Option<S>
where
    S: Serializable,
{
    fn serialize_into<W: Write>(&self, mut writer: W) -> Result<usize> {
        let mut mem = 0;
        if let Some(x) = self {
            mem += true.serialize_into(&mut writer)?;
            mem += x.serialize_into(&mut writer)?;
        } else {
            mem += false.serialize_into(&mut writer)?;
        }
        Ok(mem)
    }

    fn deserialize_from<R: Read>(mut reader: R) -> Result<Self> {
        let x = if bool::deserialize_from(&mut reader)? {
            Some(S::deserialize_from(&mut reader)?)
        } else {
            None
        };
        Ok(x)
    }

    fn size_in_bytes(&self) -> usize {
        self.as_ref().map_or(0, |x| x.size_in_bytes()) + std::mem::size_of::<u8>()
    }
}

impl<S> Serializable for Vec<S>
where
    S: Serializable,
{
    fn serialize_into<W: Write>(&self, mut writer: W) -> Result<usize> {
        let mut mem = self.len().serialize_into(&mut writer)?;
        for x in self {
            mem += x.serialize_into(&mut writer)?;
        }
        Ok(mem)
    }

    fn deserialize_from<R: Read>(mut reader: R) -> Result<Self> {
        let len = usize::deserialize_from(&mut reader)?;
        let mut vec = Self::with_capacity(len);
        for _ in 0..len {
            vec.push(S::deserialize_from(&mut reader)?);
        }
        Ok(vec)
    }

    fn size_in_bytes(&self) -> usize {
        let header = std::mem::size_of::<usize>();
        S::size_of().map_or_else(
            || header + self.iter().fold(0, |acc, x| acc + x.size_in_bytes()),
            |m| header + m * self.len(),
        )
    }
}

/// Upper bound on the capacity reserved from an untrusted length prefix.
pub(crate) const MAX_PREALLOC: usize = 1 << 20;

/// Writes `bytes` in the layout of `Vec<u8>`: a `usize` length, then the bytes in one
/// write.
pub fn serialize_bytes<W: Write>(bytes: &[u8], mut writer: W) -> Result<usize> {
    let mem = bytes.len().serialize_into(&mut writer)?;
    writer.write_all(bytes)?;
    Ok(mem + bytes.len())
}

/// Reads a buffer written by [`serialize_bytes()`] or by `Vec<u8>`.
///
/// # Errors
///
/// An error is returned if the reader ends before the announced length.
pub fn deserialize_bytes<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let len = usize::deserialize_from(&mut reader)?;
    let mut buf = Vec::with_capacity(len.min(MAX_PREALLOC));
    let read = reader.take(len as u64).read_to_end(&mut buf)?;
    if read != len {
        return Err(anyhow::anyhow!(
            "len must be available in the reader, but got {read} of {len} bytes."
        ));
    }
    Ok(buf)
}

/// Returns the number of bytes [`serialize_bytes()`] writes for `len` bytes.
pub const fn bytes_size(len: usize) -> usize {
    std::mem::size_of::<usize>() + len
}
