//! Chunked list of values that grows through three tiers.
//!
//! # Introduction
//!
//! A [`Multilist`] is a deque-like list of [`Databox`] values stored in packed
//! [`Flex`] chunks. It starts small and upgrades itself after a write that outgrows the
//! current tier:
//!
//! - *Small*: one chunk, until it exceeds the fill budget.
//! - *Medium*: a head and a tail chunk, until together they exceed `full_factor` times
//!   the budget (3 by default, see [`MultilistConfig`](crate::config::MultilistConfig)).
//! - *Full*: a [`Multiarray`](crate::Multiarray) of [`Mflex`](crate::Mflex) chunks,
//!   each kept within the budget by splitting and merging.
//!
//! The fill budget is a step of [`FILL_LIMITS`](crate::flex::capacity::FILL_LIMITS)
//! selected by an index. In the Full tier, chunks further than `depth` chunks from both
//! ends may be held compressed; a depth of 0 keeps every chunk raw. Both parameters
//! survive every upgrade.
//!
//! Operations that may open a compressed chunk take a caller-held [`MflexState`].
//!
//! # Examples
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use datakit::multilist::Tier;
//! use datakit::{Databox, MflexState, Multilist};
//!
//! let mut state = MflexState::new();
//! let mut ml = Multilist::new(2, 1);
//! for i in 0..1000u64 {
//!     ml.push_tail(&mut state, &Databox::from(i))?;
//! }
//! assert_eq!(ml.tier(), Tier::Full);
//! assert_eq!(ml.len(), 1000);
//! assert_eq!(ml.get(&mut state, 500)?, Some(Databox::from(500u64)));
//!
//! ml.rotate(&mut state)?;
//! assert_eq!(ml.pop_head(&mut state)?, Some(Databox::from(999u64)));
//!
//! assert!(ml.del_range(&mut state, 10, 100)?);
//! assert_eq!(ml.len(), 899);
//! # Ok(())
//! # }
//! ```
mod full;
mod iter;
mod medium;
mod small;

use std::fmt;

use tracing::debug;

use crate::config::{Config, MultiarrayConfig, MultilistConfig};
use crate::databox::Databox;
use crate::error::Result;
use crate::flex::{capacity, Endpoint, Flex};
use crate::mflex::MflexState;
use full::Full;
use medium::Medium;
use small::Small;

pub use iter::{Cursor, Iter};

/// Storage tier of a [`Multilist`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// One chunk.
    Small,
    /// Head and tail chunks.
    Medium,
    /// Many chunks, optionally compressed.
    Full,
}

/// Position of a value: a chunk and the offset inside it.
///
/// Entries are stale after any mutation except [`Multilist::del_entry()`] through the
/// cursor that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Entry {
    chunk: usize,
    offset: usize,
}

impl Entry {
    pub(crate) const fn new(chunk: usize, offset: usize) -> Self {
        Self { chunk, offset }
    }

    /// Gets the chunk index.
    pub const fn chunk(&self) -> usize {
        self.chunk
    }

    /// Gets the offset inside the chunk.
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

/// Inserts `val` before or after the value at `offset`, or at the tail if there is none.
pub(crate) fn insert_in_flex(f: &mut Flex, offset: usize, val: &Databox<'_>, after: bool) {
    match f.index(offset as isize) {
        Some(e) if after => {
            f.insert_after(e, val);
        }
        Some(e) => {
            f.insert(e, val);
        }
        None => {
            f.push(val, Endpoint::Tail);
        }
    }
}

/// Converts `index` (from the tail if negative) to a position in `0..len`.
fn resolve(index: isize, len: usize) -> Option<usize> {
    let idx = if index < 0 {
        len.checked_sub(index.unsigned_abs())?
    } else {
        index as usize
    };
    (idx < len).then_some(idx)
}

#[derive(Clone)]
enum Inner {
    Small(Small),
    Medium(Medium),
    Full(Full),
}

/// Tiered list of values.
#[derive(Clone)]
pub struct Multilist {
    inner: Inner,
    fill: u8,
    depth: u16,
    full_factor: usize,
    row_max: usize,
}

impl Multilist {
    /// Creates a new empty list.
    ///
    /// # Arguments
    ///
    ///  - `fill`: Index into [`FILL_LIMITS`](crate::flex::capacity::FILL_LIMITS),
    ///    clamped to [`MAX_FILL`](crate::flex::capacity::MAX_FILL).
    ///  - `depth`: Chunks kept raw at each end in the Full tier; 0 disables compression.
    pub fn new(fill: u8, depth: u16) -> Self {
        Self::from_flex(fill, depth, Flex::new())
    }

    /// Creates a new empty list from the `multilist` and `multiarray` sections of
    /// `config`.
    pub fn with_config(config: &Config) -> Self {
        let mut ml = Self::new(config.multilist.fill, config.multilist.depth);
        ml.full_factor = config.multilist.full_factor.max(2);
        ml.row_max = config.multiarray.row_max;
        ml
    }

    /// Creates a Small list holding `f`.
    ///
    /// An oversized `f` is upgraded on the next write.
    pub fn from_flex(fill: u8, depth: u16, f: Flex) -> Self {
        Self {
            inner: Inner::Small(Small::new(f)),
            fill: fill.min(capacity::MAX_FILL),
            depth,
            full_factor: MultilistConfig::default().full_factor,
            row_max: MultiarrayConfig::default().row_max,
        }
    }

    /// Gets the fill index.
    pub const fn fill(&self) -> u8 {
        self.fill
    }

    /// Gets the compression depth.
    pub const fn depth(&self) -> u16 {
        self.depth
    }

    /// Gets the current tier.
    pub const fn tier(&self) -> Tier {
        match self.inner {
            Inner::Small(_) => Tier::Small,
            Inner::Medium(_) => Tier::Medium,
            Inner::Full(_) => Tier::Full,
        }
    }

    /// Gets the number of values.
    pub fn len(&self) -> usize {
        match &self.inner {
            Inner::Small(s) => s.len(),
            Inner::Medium(m) => m.len(),
            Inner::Full(f) => f.len(),
        }
    }

    /// Checks if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the total size of the chunks in bytes, counting compressed chunks at their
    /// raw size.
    pub fn bytes(&self) -> usize {
        match &self.inner {
            Inner::Small(s) => s.bytes(),
            Inner::Medium(m) => m.bytes(),
            Inner::Full(f) => f.bytes(),
        }
    }

    /// Gets the number of bytes the chunks actually hold.
    pub fn bytes_actual(&self) -> usize {
        match &self.inner {
            Inner::Full(f) => f.bytes_actual(),
            _ => self.bytes(),
        }
    }

    /// Gets the number of chunks.
    pub fn chunk_count(&self) -> usize {
        match &self.inner {
            Inner::Small(_) => 1,
            Inner::Medium(_) => 2,
            Inner::Full(f) => f.chunk_count(),
        }
    }

    fn upgrade_if_needed(&mut self, state: &mut MflexState) -> Result<()> {
        let limit = capacity::limit(self.fill);
        let upgrade = match &self.inner {
            Inner::Small(s) => s.bytes() > limit,
            Inner::Medium(m) => m.bytes() > self.full_factor * limit,
            Inner::Full(_) => false,
        };
        if !upgrade {
            return Ok(());
        }
        let inner = std::mem::replace(&mut self.inner, Inner::Small(Small::new(Flex::new())));
        self.inner = match inner {
            Inner::Small(s) => {
                debug!(bytes = s.bytes(), limit, "multilist upgraded to medium");
                Inner::Medium(Medium::from_flex(s.f))
            }
            Inner::Medium(m) => {
                let [f0, f1] = m.f;
                Inner::Full(Full::from_flexes(
                    vec![f0, f1],
                    self.fill,
                    self.depth,
                    self.row_max,
                    state,
                )?)
            }
            full => full,
        };
        Ok(())
    }

    fn push(
        &mut self,
        state: &mut MflexState,
        val: &Databox<'_>,
        endpoint: Endpoint,
    ) -> Result<()> {
        match &mut self.inner {
            Inner::Small(s) => s.push(val, endpoint),
            Inner::Medium(m) => m.push(val, endpoint),
            Inner::Full(f) => f.push(val, endpoint, self.fill, self.depth, state)?,
        }
        self.upgrade_if_needed(state)
    }

    /// Inserts `val` before the head.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn push_head(&mut self, state: &mut MflexState, val: &Databox<'_>) -> Result<()> {
        self.push(state, val, Endpoint::Head)
    }

    /// Inserts `val` after the tail.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn push_tail(&mut self, state: &mut MflexState, val: &Databox<'_>) -> Result<()> {
        self.push(state, val, Endpoint::Tail)
    }

    /// Returns the entry at `index`, counting from the tail if negative, or [`None`] if
    /// out of range.
    ///
    /// # Complexity
    ///
    /// Linear in the number of chunks
    pub fn index(&self, index: isize) -> Option<Entry> {
        let idx = resolve(index, self.len())?;
        match &self.inner {
            Inner::Small(s) => Some(s.index(idx)),
            Inner::Medium(m) => Some(m.index(idx)),
            Inner::Full(f) => f.index(idx),
        }
    }

    /// Returns a copy of the chunk `chunk` as a raw list.
    pub(crate) fn chunk_flex(&self, chunk: usize, state: &mut MflexState) -> Result<Flex> {
        match &self.inner {
            Inner::Small(s) => Ok(s.f.clone()),
            Inner::Medium(m) => Ok(m.f.get(chunk).cloned().unwrap_or_default()),
            Inner::Full(f) => f.chunk_flex(chunk, state),
        }
    }

    /// Returns the value at `entry`.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn get_entry(
        &self,
        state: &mut MflexState,
        entry: Entry,
    ) -> Result<Option<Databox<'static>>> {
        match &self.inner {
            Inner::Small(s) => Ok(s.get(entry)),
            Inner::Medium(m) => Ok(m.get(entry)),
            Inner::Full(f) => f.get(entry, state),
        }
    }

    /// Returns the value at `index`, counting from the tail if negative.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn get(&self, state: &mut MflexState, index: isize) -> Result<Option<Databox<'static>>> {
        match self.index(index) {
            Some(entry) => self.get_entry(state, entry),
            None => Ok(None),
        }
    }

    fn insert(
        &mut self,
        state: &mut MflexState,
        entry: Entry,
        val: &Databox<'_>,
        after: bool,
    ) -> Result<()> {
        match &mut self.inner {
            Inner::Small(s) => s.insert(entry, val, after),
            Inner::Medium(m) => m.insert(entry, val, after),
            Inner::Full(f) => f.insert(entry, val, after, self.fill, self.depth, state)?,
        }
        self.upgrade_if_needed(state)
    }

    /// Inserts `val` before `entry`.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn insert_before(
        &mut self,
        state: &mut MflexState,
        entry: Entry,
        val: &Databox<'_>,
    ) -> Result<()> {
        self.insert(state, entry, val, false)
    }

    /// Inserts `val` after `entry`.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn insert_after(
        &mut self,
        state: &mut MflexState,
        entry: Entry,
        val: &Databox<'_>,
    ) -> Result<()> {
        self.insert(state, entry, val, true)
    }

    /// Replaces the value at `index`, returning `false` if it is out of range.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn replace_at_index(
        &mut self,
        state: &mut MflexState,
        index: isize,
        val: &Databox<'_>,
    ) -> Result<bool> {
        let Some(entry) = self.index(index) else {
            return Ok(false);
        };
        let replaced = match &mut self.inner {
            Inner::Small(s) => s.replace(entry, val),
            Inner::Medium(m) => m.replace(entry, val),
            Inner::Full(f) => f.replace(entry, val, self.fill, self.depth, state)?,
        };
        self.upgrade_if_needed(state)?;
        Ok(replaced)
    }

    /// Deletes up to `count` values from `start`, counting from the tail if negative.
    ///
    /// The range is truncated at the tail. Returns `false` if nothing was deleted.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn del_range(&mut self, state: &mut MflexState, start: isize, count: usize) -> Result<bool> {
        let len = self.len();
        if count == 0 {
            return Ok(false);
        }
        let Some(first) = resolve(start, len) else {
            return Ok(false);
        };
        let extent = if start < 0 {
            count.min(start.unsigned_abs())
        } else {
            count.min(len - first)
        };
        match &mut self.inner {
            Inner::Small(s) => s.del_range(first, extent),
            Inner::Medium(m) => m.del_range(first, extent),
            Inner::Full(f) => f.del_range(first, extent, self.fill, self.depth, state)?,
        }
        Ok(true)
    }

    /// Deletes `entry`, which `cursor` just returned, and repositions the cursor on the
    /// value that follows in its direction.
    ///
    /// Returns `false` without deleting if the cursor is read-only.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn del_entry(
        &mut self,
        cursor: &mut Cursor,
        entry: Entry,
        state: &mut MflexState,
    ) -> Result<bool> {
        debug_assert!(!cursor.is_read_only(), "deletion through a read-only cursor");
        if cursor.is_read_only() {
            return Ok(false);
        }
        match &mut self.inner {
            Inner::Small(s) => s.delete(entry),
            Inner::Medium(m) => m.delete(entry),
            Inner::Full(f) => f.delete(entry, self.depth, state)?,
        }
        cursor.after_delete();
        Ok(true)
    }

    fn pop(&mut self, state: &mut MflexState, endpoint: Endpoint) -> Result<Option<Databox<'static>>> {
        match &mut self.inner {
            Inner::Small(s) => Ok(s.pop(endpoint)),
            Inner::Medium(m) => Ok(m.pop(endpoint)),
            Inner::Full(f) => f.pop(endpoint, self.depth, state),
        }
    }

    /// Removes and returns the head value, or [`None`] if empty.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn pop_head(&mut self, state: &mut MflexState) -> Result<Option<Databox<'static>>> {
        self.pop(state, Endpoint::Head)
    }

    /// Removes and returns the tail value, or [`None`] if empty.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn pop_tail(&mut self, state: &mut MflexState) -> Result<Option<Databox<'static>>> {
        self.pop(state, Endpoint::Tail)
    }

    /// Moves the tail value to the head.
    ///
    /// # Errors
    ///
    /// An error is returned if a compressed chunk cannot be decompressed.
    pub fn rotate(&mut self, state: &mut MflexState) -> Result<()> {
        match &mut self.inner {
            Inner::Small(s) => s.rotate(),
            Inner::Medium(m) => m.rotate(),
            Inner::Full(f) => f.rotate(self.fill, self.depth, state)?,
        }
        self.upgrade_if_needed(state)
    }

    /// Creates a cursor from the head (`forward`) or the tail that may delete entries.
    pub fn cursor(&self, forward: bool) -> Cursor {
        let start = if forward { Some(0) } else { self.len().checked_sub(1) };
        Cursor::new(start, forward, false)
    }

    /// Creates a cursor starting at `index`, or [`None`] if out of range.
    pub fn cursor_at(&self, index: isize, forward: bool) -> Option<Cursor> {
        let idx = resolve(index, self.len())?;
        Some(Cursor::new(Some(idx), forward, false))
    }

    /// Creates an iterator over the values from head to tail.
    pub fn iter<'a>(&'a self, state: &'a mut MflexState) -> Iter<'a> {
        Iter::new(self, state, Cursor::new(Some(0), true, true))
    }

    /// Creates an iterator over the values from tail to head.
    pub fn iter_rev<'a>(&'a self, state: &'a mut MflexState) -> Iter<'a> {
        let start = self.len().checked_sub(1);
        Iter::new(self, state, Cursor::new(start, false, true))
    }

    /// Creates an iterator starting at `index` in either direction, or [`None`] if out of
    /// range.
    pub fn iter_at<'a>(
        &'a self,
        state: &'a mut MflexState,
        index: isize,
        forward: bool,
    ) -> Option<Iter<'a>> {
        let idx = resolve(index, self.len())?;
        Some(Iter::new(self, state, Cursor::new(Some(idx), forward, true)))
    }
}

impl fmt::Debug for Multilist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multilist")
            .field("tier", &self.tier())
            .field("fill", &self.fill)
            .field("depth", &self.depth)
            .field("len", &self.len())
            .field("chunks", &self.chunk_count())
            .field("bytes", &self.bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    use crate::mflex::MIN_COMPRESS_BYTES;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    fn collect(ml: &Multilist, state: &mut MflexState) -> Vec<Databox<'static>> {
        ml.iter(state).collect::<Result<Vec<_>>>().unwrap()
    }

    fn word(i: usize) -> Databox<'static> {
        Databox::from(format!("value-{}", i % 37))
    }

    fn compression_map(ml: &Multilist) -> Vec<bool> {
        match &ml.inner {
            Inner::Full(f) => f.chunks.iter().map(|m| m.is_compressed()).collect(),
            _ => vec![],
        }
    }

    fn assert_chunks_within_budget(ml: &Multilist) {
        let limit = capacity::limit(ml.fill);
        if let Inner::Full(f) = &ml.inner {
            for (i, m) in f.chunks.iter().enumerate() {
                assert!(
                    m.count() == 1 || m.bytes_uncompressed() <= limit,
                    "chunk {i} holds {} values in {} bytes over a limit of {limit}",
                    m.count(),
                    m.bytes_uncompressed()
                );
            }
        }
    }

    fn assert_interior_compressed(ml: &Multilist) {
        let Inner::Full(f) = &ml.inner else {
            return;
        };
        let n = f.chunks.len();
        let d = ml.depth as usize;
        for (i, m) in f.chunks.iter().enumerate() {
            let interior = d > 0 && i >= d && i + d < n;
            if interior && m.bytes_uncompressed() >= MIN_COMPRESS_BYTES {
                assert!(m.is_compressed(), "chunk {i} of {n} is interior but raw");
            }
            if !interior {
                assert!(!m.is_compressed(), "chunk {i} of {n} is within depth {d}");
            }
        }
    }

    #[test]
    fn test_tier_transitions() {
        let mut state = MflexState::new();
        let mut ml = Multilist::new(1, 0);
        ml.push_tail(&mut state, &Databox::from(1u64)).unwrap();
        assert_eq!(ml.tier(), Tier::Small);
        for i in 0..10 {
            ml.push_tail(&mut state, &word(i)).unwrap();
        }
        assert_eq!(ml.tier(), Tier::Medium);
        for i in 0..30 {
            ml.push_head(&mut state, &word(i)).unwrap();
        }
        assert_eq!(ml.tier(), Tier::Full);
        assert_eq!(ml.len(), 41);
        assert_eq!(ml.get(&mut state, 30).unwrap(), Some(Databox::from(1u64)));
        assert_eq!(ml.fill(), 1);
        assert_eq!(ml.depth(), 0);
    }

    #[test]
    fn test_zero_fill_one_value_per_chunk() {
        let mut state = MflexState::new();
        let mut ml = Multilist::new(0, 0);
        for i in 0..33u64 {
            ml.push_tail(&mut state, &Databox::from(i)).unwrap();
        }
        assert_eq!(ml.tier(), Tier::Full);
        assert_eq!(ml.chunk_count(), 33);

        assert!(ml.del_range(&mut state, 5, 16).unwrap());
        assert_eq!(ml.len(), 17);
        assert_eq!(ml.get(&mut state, 5).unwrap(), Some(Databox::from(21u64)));
        assert_eq!(ml.get(&mut state, -1).unwrap(), Some(Databox::from(32u64)));
        assert_eq!(ml.get(&mut state, 4).unwrap(), Some(Databox::from(4u64)));
    }

    #[test]
    fn test_del_range_negative_and_truncated() {
        let mut state = MflexState::new();
        for fill in [0, 1, 4] {
            let mut ml = Multilist::new(fill, 0);
            let mut model: Vec<_> = (0..200u64).map(Databox::from).collect();
            for v in &model {
                ml.push_tail(&mut state, v).unwrap();
            }
            assert!(ml.del_range(&mut state, -10, 100).unwrap());
            model.truncate(190);
            assert!(ml.del_range(&mut state, 150, 1000).unwrap());
            model.truncate(150);
            assert!(!ml.del_range(&mut state, 150, 1).unwrap());
            assert!(!ml.del_range(&mut state, 0, 0).unwrap());
            assert!(ml.del_range(&mut state, 20, 30).unwrap());
            model.drain(20..50);
            assert_eq!(collect(&ml, &mut state), model);
        }
    }

    #[test]
    fn test_rotate_against_model() {
        let mut state = MflexState::new();
        for fill in [0, 1, 3, 11] {
            let mut ml = Multilist::new(fill, 2);
            let mut model = VecDeque::new();
            for i in 0..504u64 {
                ml.push_tail(&mut state, &Databox::from(i)).unwrap();
                model.push_back(Databox::from(i));
            }
            for _ in 0..5000 {
                ml.rotate(&mut state).unwrap();
                model.rotate_right(1);
            }
            assert_eq!(ml.len(), 504);
            assert_eq!(ml.get(&mut state, 0).unwrap().as_ref(), model.front());
            assert_eq!(ml.get(&mut state, -1).unwrap().as_ref(), model.back());
            assert_eq!(collect(&ml, &mut state), Vec::from(model));
        }
    }

    #[test]
    fn test_chunks_within_budget() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        let mut state = MflexState::new();
        for fill in [0u8, 1, 2] {
            let mut ml = Multilist::new(fill, 0);
            for i in 0..600 {
                ml.push_head(&mut state, &word(i)).unwrap();
                assert_chunks_within_budget(&ml);
            }
            assert_eq!(ml.tier(), Tier::Full);
            for i in 0..300 {
                let at = rng.gen_range(0..ml.len()) as isize;
                let entry = ml.index(at).unwrap();
                let val = Databox::from(format!("{:y<40}", i));
                match i % 3 {
                    0 => ml.insert_after(&mut state, entry, &val).unwrap(),
                    1 => ml.insert_before(&mut state, entry, &val).unwrap(),
                    _ => assert!(ml.replace_at_index(&mut state, at, &val).unwrap()),
                }
                assert_chunks_within_budget(&ml);
            }
            assert_eq!(ml.len(), 800);
        }
    }

    #[test]
    fn test_rotate_padded_strings() {
        let mut state = MflexState::new();
        let mut ml = Multilist::new(1, 1);
        let mut model = VecDeque::new();
        let seeds = ["900", "7000", "-1200", "42"].map(Databox::from);
        let padded = (0..500).map(|i| Databox::from(format!("{:.<64}", format!("hello{i}"))));
        for val in seeds.into_iter().chain(padded) {
            ml.push_tail(&mut state, &val).unwrap();
            model.push_back(val);
            assert_interior_compressed(&ml);
        }
        assert_eq!(ml.len(), 504);
        assert!(compression_map(&ml).iter().filter(|&&c| c).count() >= 400);
        for _ in 0..5000 {
            ml.rotate(&mut state).unwrap();
            model.rotate_right(1);
            assert_eq!(ml.len(), 504);
            assert_interior_compressed(&ml);
            assert_chunks_within_budget(&ml);
        }
        assert_eq!(ml.get(&mut state, 0).unwrap().as_ref(), model.front());
        assert_eq!(ml.get(&mut state, -1).unwrap().as_ref(), model.back());
        assert_eq!(collect(&ml, &mut state), Vec::from(model));
        assert!(ml.bytes_actual() < ml.bytes());
    }

    #[test]
    fn test_random_against_model() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        let mut state = MflexState::new();
        for (fill, depth) in [(0, 0), (1, 1), (2, 3), (5, 0)] {
            let mut ml = Multilist::new(fill, depth);
            let mut model: VecDeque<Databox<'static>> = VecDeque::new();
            for step in 0..3000usize {
                let val = word(step);
                match rng.gen_range(0..10) {
                    0..=2 => {
                        ml.push_head(&mut state, &val).unwrap();
                        model.push_front(val);
                    }
                    3..=5 => {
                        ml.push_tail(&mut state, &val).unwrap();
                        model.push_back(val);
                    }
                    6 if !model.is_empty() => {
                        let i = rng.gen_range(0..model.len());
                        let entry = ml.index(i as isize).unwrap();
                        if rng.gen() {
                            ml.insert_after(&mut state, entry, &val).unwrap();
                            model.insert(i + 1, val);
                        } else {
                            ml.insert_before(&mut state, entry, &val).unwrap();
                            model.insert(i, val);
                        }
                    }
                    7 => {
                        assert_eq!(ml.pop_head(&mut state).unwrap(), model.pop_front());
                    }
                    8 => {
                        assert_eq!(ml.pop_tail(&mut state).unwrap(), model.pop_back());
                    }
                    _ if !model.is_empty() => {
                        let i = rng.gen_range(0..model.len());
                        let replaced = Databox::from(step as u64);
                        assert!(ml.replace_at_index(&mut state, i as isize, &replaced).unwrap());
                        model[i] = replaced;
                    }
                    _ => {}
                }
                assert_eq!(ml.len(), model.len());
            }
            assert_eq!(collect(&ml, &mut state), Vec::from(model.clone()));
            let rev: Vec<_> = ml.iter_rev(&mut state).collect::<Result<_>>().unwrap();
            assert_eq!(rev, model.iter().rev().cloned().collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_compression_depth() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        let mut state = MflexState::new();
        for depth in [1u16, 2, 5] {
            let mut ml = Multilist::new(2, depth);
            for step in 0..4000usize {
                let val = word(step);
                match rng.gen_range(0..4) {
                    0 => ml.push_head(&mut state, &val).unwrap(),
                    1 | 2 => ml.push_tail(&mut state, &val).unwrap(),
                    _ => {
                        let len = ml.len() as isize;
                        if len > 0 {
                            let start = rng.gen_range(0..len);
                            ml.del_range(&mut state, start, 3).unwrap();
                        }
                    }
                }
                let map = compression_map(&ml);
                let n = map.len();
                let d = depth as usize;
                for (i, &compressed) in map.iter().enumerate() {
                    if i < d || i + d >= n {
                        assert!(!compressed, "chunk {i} of {n} is within depth {d}");
                    }
                }
            }
            let map = compression_map(&ml);
            assert!(map.iter().any(|&c| c));
            assert!(ml.bytes_actual() < ml.bytes());
        }
    }

    #[test]
    fn test_cursor_delete_reverse() {
        let mut state = MflexState::new();
        let mut ml = Multilist::new(1, 1);
        for i in 0..300u64 {
            ml.push_tail(&mut state, &Databox::from(i)).unwrap();
        }
        let mut cursor = ml.cursor(false);
        let mut seen = 0;
        while let Some((entry, val)) = cursor.next(&ml, &mut state).unwrap() {
            seen += 1;
            if val.as_u64().map_or(false, |v| v % 3 == 0) {
                assert!(ml.del_entry(&mut cursor, entry, &mut state).unwrap());
            }
        }
        assert_eq!(seen, 300);
        assert_eq!(ml.len(), 200);
        let vals = collect(&ml, &mut state);
        assert!(vals.iter().all(|v| v.as_u64().map_or(false, |x| x % 3 != 0)));
    }

    #[test]
    fn test_iter_at_and_clone() {
        let mut state = MflexState::new();
        let mut ml = Multilist::new(1, 0);
        for i in 0..100u64 {
            ml.push_tail(&mut state, &Databox::from(i)).unwrap();
        }
        let dup = ml.clone();
        ml.pop_tail(&mut state).unwrap();
        assert_eq!(dup.len(), 100);

        let from: Vec<_> = dup
            .iter_at(&mut state, -3, true)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(from, vec![Databox::from(97u64), Databox::from(98u64), Databox::from(99u64)]);
        let back: Vec<_> = dup
            .iter_at(&mut state, 2, false)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(back.len(), 3);
        assert!(dup.iter_at(&mut state, 100, true).is_none());
        assert_eq!(dup.index(-101), None);
    }

    #[test]
    fn test_with_config() {
        let config =
            Config::from_toml_str("[multilist]\nfill = 3\ndepth = 2\nfull_factor = 5\n").unwrap();
        let ml = Multilist::with_config(&config);
        assert_eq!((ml.fill(), ml.depth()), (3, 2));
        assert_eq!(ml.full_factor, 5);
        assert_eq!(ml.row_max, 512);
        assert!(ml.is_empty());
    }

    #[test]
    fn test_from_flex_upgrades_on_write() {
        let mut state = MflexState::new();
        let mut f = Flex::new();
        for i in 0..100u64 {
            f.push(&Databox::from(i), Endpoint::Tail);
        }
        let mut ml = Multilist::from_flex(1, 0, f);
        assert_eq!(ml.tier(), Tier::Small);
        ml.push_tail(&mut state, &Databox::from(100u64)).unwrap();
        assert_eq!(ml.tier(), Tier::Medium);
        ml.push_tail(&mut state, &Databox::from(101u64)).unwrap();
        assert_eq!(ml.tier(), Tier::Full);
        let vals = collect(&ml, &mut state);
        assert_eq!(vals, (0..102u64).map(Databox::from).collect::<Vec<_>>());
    }
}
