//! Scratch arena shared by the compressed chunks of one container.
use std::fmt;

use crate::config::MflexConfig;
use crate::flex::Flex;
use crate::growth::jebuf;

/// Reusable buffers for opening compressed chunks.
///
/// A state is used strictly serially: open, use, close. A view returned by
/// [`Mflex::open_read_only()`](crate::Mflex::open_read_only) borrows the state until it
/// is dropped, so a second open cannot overlap it.
///
/// # Examples
///
/// ```
/// use datakit::MflexState;
///
/// let mut state = MflexState::new();
/// assert_eq!(state.preferred_len(), 65536);
/// state.set_preferred_len(1000);
/// assert_eq!(state.preferred_len(), 1024);
/// ```
#[derive(Clone)]
pub struct MflexState {
    pub(crate) scratch: Vec<u8>,
    pub(crate) view: Flex,
    preferred_len: usize,
    level: i32,
}

impl MflexState {
    /// Creates a state with the default [`MflexConfig`].
    pub fn new() -> Self {
        Self::with_config(&MflexConfig::default())
    }

    /// Creates a state from `config`.
    pub fn with_config(config: &MflexConfig) -> Self {
        let preferred_len = jebuf::size_allocation(config.preferred_len);
        Self {
            scratch: Vec::with_capacity(preferred_len),
            view: Flex::new(),
            preferred_len,
            level: config.level,
        }
    }

    /// Gets the preferred size of the decompression buffer.
    pub const fn preferred_len(&self) -> usize {
        self.preferred_len
    }

    /// Sets the preferred size, rounded up to an allocator size class.
    ///
    /// The scratch buffer follows on the next [`MflexState::reset()`].
    pub fn set_preferred_len(&mut self, len: usize) {
        self.preferred_len = jebuf::size_allocation(len);
    }

    /// Gets the zstd compression level.
    pub const fn level(&self) -> i32 {
        self.level
    }

    /// Reallocates the scratch buffer if it is smaller than the preferred size or more
    /// than twice as large.
    pub fn reset(&mut self) {
        let capa = self.scratch.capacity();
        if capa < self.preferred_len || capa > 2 * self.preferred_len {
            self.scratch = Vec::with_capacity(self.preferred_len);
        }
        self.scratch.clear();
        self.view = Flex::new();
    }

    /// Takes the scratch buffer out for decompression.
    pub(crate) fn take_scratch(&mut self) -> Vec<u8> {
        let mut buf = std::mem::take(&mut self.scratch);
        buf.clear();
        buf
    }

    /// Returns `buf` to the arena if it is a better fit than the current scratch.
    pub(crate) fn recycle(&mut self, mut buf: Vec<u8>) {
        let capa = buf.capacity();
        if capa > self.scratch.capacity() && capa <= 2 * self.preferred_len {
            buf.clear();
            self.scratch = buf;
        }
    }

    /// Gets the current capacity of the scratch buffer.
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }
}

impl Default for MflexState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MflexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MflexState")
            .field("preferred_len", &self.preferred_len)
            .field("level", &self.level)
            .field("scratch_capacity", &self.scratch.capacity())
            .finish()
    }
}
