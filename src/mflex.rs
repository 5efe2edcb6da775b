//! Packed list that may be held compressed.
//!
//! # Introduction
//!
//! [`Mflex`] wraps a [`Flex`] that is either stored as-is or as a zstd payload. Callers
//! mutate it through an open/close protocol:
//!
//! 1. [`Mflex::open()`] yields an owned [`Flex`], decompressing into the scratch buffer of
//!    an [`MflexState`] when needed.
//! 2. The caller mutates the [`Flex`].
//! 3. [`Mflex::close_grow()`], [`Mflex::close_shrink()`] or [`Mflex::close_no_compress()`]
//!    hands it back, deciding whether to compress.
//!
//! Lists below [`MIN_COMPRESS_BYTES`] are never compressed, and a payload is kept only if
//! it is smaller than the raw bytes.
//!
//! # Examples
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use datakit::{Databox, Endpoint, Mflex, MflexState};
//!
//! let mut state = MflexState::new();
//! let mut m = Mflex::new();
//!
//! let mut f = m.open(&mut state)?;
//! for _ in 0..100 {
//!     f.push(&Databox::from("repetitive"), Endpoint::Tail);
//! }
//! m.close_grow(&mut state, f);
//!
//! assert!(m.is_compressed());
//! assert_eq!(m.count(), 100);
//! assert!(m.bytes_actual() < m.bytes_uncompressed());
//!
//! let view = m.open_read_only(&mut state)?;
//! assert_eq!(view.get_index(-1), Some(Databox::from("repetitive")));
//! # Ok(())
//! # }
//! ```
pub mod state;

use std::fmt;
use std::io::{Read, Write};

use anyhow::anyhow;
use tracing::trace;

use crate::databox::Databox;
use crate::error::{Error, Result};
use crate::flex::{Endpoint, Flex};
use crate::growth::jebuf;
use crate::serial::{self, Serializable};

pub use state::MflexState;

/// Lists smaller than this many bytes are stored raw.
pub const MIN_COMPRESS_BYTES: usize = 48;

#[derive(Clone, PartialEq, Eq)]
enum Inner {
    Raw(Flex),
    Compressed {
        len: usize,
        count: usize,
        payload: Box<[u8]>,
    },
}

/// Packed list stored raw or zstd-compressed.
#[derive(Clone, PartialEq, Eq)]
pub struct Mflex {
    inner: Inner,
    never_compress: bool,
}

impl Mflex {
    /// Creates a new empty list that may be compressed on close.
    pub fn new() -> Self {
        Self::from_flex_no_compress(Flex::new()).with_auto()
    }

    /// Creates a new empty list that is never compressed.
    pub fn new_no_compress() -> Self {
        Self::from_flex_no_compress(Flex::new())
    }

    fn with_auto(mut self) -> Self {
        self.never_compress = false;
        self
    }

    /// Wraps `f`, compressing it if worthwhile.
    pub fn from_flex(f: Flex, state: &mut MflexState) -> Self {
        let mut m = Self::new();
        m.close_grow(state, f);
        m
    }

    /// Wraps `f` and pins it raw.
    pub fn from_flex_no_compress(f: Flex) -> Self {
        Self {
            inner: Inner::Raw(f),
            never_compress: true,
        }
    }

    /// Replaces the contents with an empty list that may be compressed.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Gets the number of entries.
    ///
    /// An opened raw list reports zero until it is closed.
    pub fn count(&self) -> usize {
        match &self.inner {
            Inner::Raw(f) => f.len(),
            Inner::Compressed { count, .. } => *count,
        }
    }

    /// Checks if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Gets the size of the raw list in bytes.
    pub fn bytes_uncompressed(&self) -> usize {
        match &self.inner {
            Inner::Raw(f) => f.bytes(),
            Inner::Compressed { len, .. } => *len,
        }
    }

    /// Gets the size of the compressed payload in bytes, or 0 if stored raw.
    pub fn bytes_compressed(&self) -> usize {
        match &self.inner {
            Inner::Raw(_) => 0,
            Inner::Compressed { payload, .. } => payload.len(),
        }
    }

    /// Gets the number of bytes actually held.
    pub fn bytes_actual(&self) -> usize {
        match &self.inner {
            Inner::Raw(f) => f.bytes(),
            Inner::Compressed { payload, .. } => payload.len(),
        }
    }

    /// Checks if the list is held compressed.
    pub fn is_compressed(&self) -> bool {
        matches!(self.inner, Inner::Compressed { .. })
    }

    /// Checks if the list is pinned raw.
    pub const fn is_compress_never(&self) -> bool {
        self.never_compress
    }

    /// Decompresses the list if needed and pins it raw.
    ///
    /// # Errors
    ///
    /// An error is returned if the payload cannot be decompressed.
    pub fn set_compress_never(&mut self, state: &mut MflexState) -> Result<()> {
        if self.is_compressed() {
            let f = self.open(state)?;
            self.inner = Inner::Raw(f);
        }
        self.never_compress = true;
        Ok(())
    }

    /// Unpins the list and compresses it if worthwhile.
    pub fn set_compress_auto(&mut self, state: &mut MflexState) {
        self.never_compress = false;
        if let Inner::Raw(f) = &mut self.inner {
            let f = std::mem::take(f);
            self.close_grow(state, f);
        }
    }

    fn decompress(payload: &[u8], len: usize, state: &mut MflexState) -> Result<Vec<u8>> {
        let mut buf = state.take_scratch();
        buf.resize(len, 0);
        let n = zstd::bulk::decompress_to_buffer(payload, &mut buf[..]).map_err(|e| {
            Error::InvalidEncoding(format!("compressed list cannot be decompressed: {e}."))
        })?;
        if n != len {
            return Err(Error::InvalidEncoding(format!(
                "compressed list holds {n} bytes, but {len} were recorded."
            )));
        }
        Ok(buf)
    }

    #[cfg(test)]
    pub(crate) fn garble_payload(&mut self) {
        if let Inner::Compressed { payload, .. } = &mut self.inner {
            payload.iter_mut().for_each(|b| *b = !*b);
        }
    }

    /// Decompresses an untrusted payload, reading at most one byte past `len`, so a
    /// forged length never allocates more than the payload expands to.
    fn decompress_bounded(payload: &[u8], len: usize) -> anyhow::Result<Vec<u8>> {
        let decoder = zstd::stream::read::Decoder::new(payload)?;
        let mut buf = Vec::with_capacity(len.min(serial::MAX_PREALLOC));
        decoder.take((len as u64).saturating_add(1)).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(anyhow!(
                "len must match the decompressed payload, but got {len} for {} bytes.",
                buf.len()
            ));
        }
        Ok(buf)
    }

    /// Takes the list out for mutation.
    ///
    /// A compressed list is decompressed into a buffer taken from `state`; a raw list is
    /// moved out, leaving an empty placeholder. Either way the list must be handed back
    /// through one of the close operations.
    ///
    /// # Errors
    ///
    /// An error is returned if the payload cannot be decompressed.
    pub fn open(&mut self, state: &mut MflexState) -> Result<Flex> {
        match &mut self.inner {
            Inner::Raw(f) => Ok(std::mem::take(f)),
            Inner::Compressed { len, payload, .. } => {
                let buf = Self::decompress(payload, *len, state)?;
                Ok(Flex::from_trusted_bytes(buf))
            }
        }
    }

    /// Returns a view of the list without taking it out.
    ///
    /// A compressed list is decompressed into `state`, which stays borrowed while the
    /// view is alive.
    ///
    /// # Errors
    ///
    /// An error is returned if the payload cannot be decompressed.
    pub fn open_read_only<'a>(&'a self, state: &'a mut MflexState) -> Result<&'a Flex> {
        match &self.inner {
            Inner::Raw(f) => Ok(f),
            Inner::Compressed { len, payload, .. } => {
                let buf = Self::decompress(payload, *len, state)?;
                let old = std::mem::replace(&mut state.view, Flex::from_trusted_bytes(buf));
                state.recycle(old.into_bytes());
                Ok(&state.view)
            }
        }
    }

    /// Returns an owned copy of the raw list.
    ///
    /// # Errors
    ///
    /// An error is returned if the payload cannot be decompressed.
    pub fn to_flex(&self, state: &mut MflexState) -> Result<Flex> {
        self.open_read_only(state).cloned()
    }

    /// Stores `f` compressed when `keep(raw, compressed)` accepts the payload size.
    fn close_with(&mut self, state: &mut MflexState, f: Flex, keep: fn(usize, usize) -> bool) {
        let raw = f.bytes();
        if self.never_compress || raw < MIN_COMPRESS_BYTES {
            self.inner = Inner::Raw(f);
            return;
        }
        match zstd::bulk::compress(f.as_bytes(), state.level()) {
            Ok(payload) if payload.len() < raw && keep(raw, payload.len()) => {
                trace!(raw, compressed = payload.len(), "compressed list");
                self.inner = Inner::Compressed {
                    len: raw,
                    count: f.len(),
                    payload: payload.into_boxed_slice(),
                };
                state.recycle(f.into_bytes());
            }
            Ok(payload) => {
                trace!(raw, compressed = payload.len(), "kept list raw");
                self.inner = Inner::Raw(f);
            }
            Err(e) => {
                trace!(raw, error = %e, "compression failed, kept list raw");
                self.inner = Inner::Raw(f);
            }
        }
    }

    /// Hands back `f` after growth, compressing it if the payload is smaller.
    pub fn close_grow(&mut self, state: &mut MflexState, f: Flex) {
        self.close_with(state, f, |_, _| true);
    }

    /// Hands back `f` after shrinkage, compressing it only if the payload lands in a
    /// smaller allocation class than the raw bytes.
    pub fn close_shrink(&mut self, state: &mut MflexState, f: Flex) {
        self.close_with(state, f, jebuf::use_new_allocation);
    }

    /// Hands back `f` and stores it raw for now.
    ///
    /// The next [`Mflex::close_grow()`] or [`Mflex::close_shrink()`] may compress it again
    /// unless the list is pinned by [`Mflex::set_compress_never()`].
    pub fn close_no_compress(&mut self, f: Flex) {
        self.inner = Inner::Raw(f);
    }

    /// Pushes `val` at `endpoint`.
    ///
    /// # Errors
    ///
    /// An error is returned if the payload cannot be decompressed.
    pub fn push(
        &mut self,
        state: &mut MflexState,
        val: &Databox<'_>,
        endpoint: Endpoint,
    ) -> Result<()> {
        let mut f = self.open(state)?;
        f.push(val, endpoint);
        self.close_grow(state, f);
        Ok(())
    }

    /// Deletes `count` entries starting at `offset`, counting from the tail if negative.
    ///
    /// # Errors
    ///
    /// An error is returned if the payload cannot be decompressed or `offset` is out of
    /// range.
    pub fn delete_offset_count(
        &mut self,
        state: &mut MflexState,
        offset: isize,
        count: usize,
    ) -> Result<()> {
        let mut f = self.open(state)?;
        let deleted = f.delete_offset_count(offset, count);
        self.close_shrink(state, f);
        deleted
    }
}

impl Default for Mflex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mflex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mflex")
            .field("count", &self.count())
            .field("bytes_uncompressed", &self.bytes_uncompressed())
            .field("bytes_actual", &self.bytes_actual())
            .field("is_compressed", &self.is_compressed())
            .field("never_compress", &self.never_compress)
            .finish()
    }
}

impl Serializable for Mflex {
    fn serialize_into<W: Write>(&self, mut writer: W) -> anyhow::Result<usize> {
        let mut mem = self.never_compress.serialize_into(&mut writer)?;
        match &self.inner {
            Inner::Raw(f) => {
                mem += false.serialize_into(&mut writer)?;
                mem += f.serialize_into(&mut writer)?;
            }
            Inner::Compressed {
                len,
                count,
                payload,
            } => {
                mem += true.serialize_into(&mut writer)?;
                mem += len.serialize_into(&mut writer)?;
                mem += count.serialize_into(&mut writer)?;
                mem += serial::serialize_bytes(payload, &mut writer)?;
            }
        }
        Ok(mem)
    }

    fn deserialize_from<R: Read>(mut reader: R) -> anyhow::Result<Self> {
        let never_compress = bool::deserialize_from(&mut reader)?;
        let inner = if bool::deserialize_from(&mut reader)? {
            let len = usize::deserialize_from(&mut reader)?;
            let count = usize::deserialize_from(&mut reader)?;
            let payload = serial::deserialize_bytes(&mut reader)?;
            if never_compress {
                return Err(anyhow!("a list pinned raw cannot hold a compressed payload."));
            }
            let f = Flex::from_bytes(Self::decompress_bounded(&payload, len)?)?;
            if f.len() != count {
                return Err(anyhow!(
                    "count must match the payload, but got {count} for {} values.",
                    f.len()
                ));
            }
            Inner::Compressed {
                len,
                count,
                payload: payload.into_boxed_slice(),
            }
        } else {
            Inner::Raw(Flex::deserialize_from(&mut reader)?)
        };
        Ok(Self {
            inner,
            never_compress,
        })
    }

    fn size_in_bytes(&self) -> usize {
        let flags = 2 * bool::size_of().unwrap_or(1);
        flags
            + match &self.inner {
                Inner::Raw(f) => f.size_in_bytes(),
                Inner::Compressed { payload, .. } => {
                    2 * std::mem::size_of::<usize>() + serial::bytes_size(payload.len())
                }
            }
    }
}
