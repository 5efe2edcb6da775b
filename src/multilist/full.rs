//! Many-chunk tier with optional compression of interior chunks.
//!
//! Chunk `i` of `n` is eligible for compression iff `depth > 0` and
//! `depth <= i < n - depth`; every other chunk is pinned raw. After each change to the
//! chunk sequence only the chunks next to the two boundaries and the changed position
//! can be misplaced, so only those are renormalized.
use tracing::debug;

use super::{insert_in_flex, Entry};
use crate::databox::Databox;
use crate::error::Result;
use crate::flex::{capacity, Endpoint, Flex};
use crate::mflex::{Mflex, MflexState};
use crate::multiarray::Multiarray;

/// Chunks of at most `fill` bytes each, as compressible lists.
///
/// At least one chunk always exists, possibly empty.
#[derive(Clone)]
pub(crate) struct Full {
    pub(crate) chunks: Multiarray<Mflex>,
    len: usize,
}

impl Full {
    /// Builds chunks from `flexes`, cutting a new chunk whenever the next value would
    /// push the current one past the budget of `fill`.
    pub(crate) fn from_flexes(
        flexes: Vec<Flex>,
        fill: u8,
        depth: u16,
        row_max: usize,
        state: &mut MflexState,
    ) -> Result<Self> {
        let mut chunks = Multiarray::new(row_max);
        let mut len = 0;
        let mut cur = Flex::new();
        for f in flexes {
            len += f.len();
            for val in f.iter() {
                if !capacity::allow_insert(cur.bytes(), fill, Flex::stored_size(&val)) {
                    let done = std::mem::replace(&mut cur, Flex::new());
                    chunks.push_tail(Mflex::from_flex_no_compress(done));
                }
                cur.push(&val, Endpoint::Tail);
            }
        }
        if !cur.is_empty() || chunks.is_empty() {
            chunks.push_tail(Mflex::from_flex_no_compress(cur));
        }
        let mut full = Self { chunks, len };
        for i in 0..full.chunks.len() {
            full.normalize(i, depth, state)?;
        }
        debug!(len, chunks = full.chunks.len(), "multilist upgraded to full");
        Ok(full)
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn bytes(&self) -> usize {
        self.chunks.iter().map(Mflex::bytes_uncompressed).sum()
    }

    pub(crate) fn bytes_actual(&self) -> usize {
        self.chunks.iter().map(Mflex::bytes_actual).sum()
    }

    #[inline(always)]
    pub(crate) fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn chunk(&mut self, i: usize) -> &mut Mflex {
        self.chunks
            .get_mut(i)
            .unwrap_or_else(|| unreachable!("chunk {i} out of range"))
    }

    #[inline(always)]
    fn wants_compression(i: usize, n: usize, depth: u16) -> bool {
        let depth = depth as usize;
        depth > 0 && i >= depth && i + depth < n
    }

    /// Brings chunk `i` in line with its position.
    fn normalize(&mut self, i: usize, depth: u16, state: &mut MflexState) -> Result<()> {
        let n = self.chunks.len();
        if depth == 0 || i >= n {
            return Ok(());
        }
        let wants = Self::wants_compression(i, n, depth);
        let m = self.chunk(i);
        if wants && m.is_compress_never() {
            m.set_compress_auto(state);
        } else if !wants && !m.is_compress_never() {
            m.set_compress_never(state)?;
        }
        Ok(())
    }

    /// Renormalizes the chunks that a one-chunk change at `idx` may have misplaced.
    fn renormalize(&mut self, idx: usize, depth: u16, state: &mut MflexState) -> Result<()> {
        if depth == 0 {
            return Ok(());
        }
        let n = self.chunks.len();
        let d = depth as usize;
        let candidates = [
            Some(idx),
            d.checked_sub(1),
            Some(d),
            n.checked_sub(d + 1),
            n.checked_sub(d),
        ];
        for i in candidates.into_iter().flatten() {
            self.normalize(i, depth, state)?;
        }
        Ok(())
    }

    fn insert_chunk(
        &mut self,
        at: usize,
        m: Mflex,
        depth: u16,
        state: &mut MflexState,
    ) -> Result<()> {
        self.chunks.insert(at, m);
        self.renormalize(at, depth, state)
    }

    /// Drops chunk `at`, or empties it if it is the only one.
    fn remove_chunk(&mut self, at: usize, depth: u16, state: &mut MflexState) -> Result<()> {
        if self.chunks.len() == 1 {
            *self.chunk(0) = Mflex::new_no_compress();
            return self.renormalize(0, depth, state);
        }
        self.chunks.delete(at);
        self.renormalize(at.min(self.chunks.len() - 1), depth, state)
    }

    fn allow_insert(&self, i: usize, fill: u8, requested: usize) -> bool {
        self.chunks
            .get(i)
            .map_or(false, |m| {
                capacity::allow_insert(m.bytes_uncompressed(), fill, requested)
            })
    }

    fn is_mergeable(&self, a: usize, b: usize, fill: u8) -> bool {
        match (self.chunks.get(a), self.chunks.get(b)) {
            (Some(x), Some(y)) => {
                capacity::is_mergeable(x.bytes_uncompressed(), y.bytes_uncompressed(), fill)
            }
            _ => false,
        }
    }

    pub(crate) fn push(
        &mut self,
        val: &Databox<'_>,
        endpoint: Endpoint,
        fill: u8,
        depth: u16,
        state: &mut MflexState,
    ) -> Result<()> {
        let size = Flex::stored_size(val);
        let mut i = match endpoint {
            Endpoint::Head => 0,
            Endpoint::Tail => self.chunks.len() - 1,
        };
        if !self.allow_insert(i, fill, size) {
            if endpoint == Endpoint::Tail {
                i += 1;
            }
            self.insert_chunk(i, Mflex::new_no_compress(), depth, state)?;
        }
        self.chunk(i).push(state, val, endpoint)?;
        self.len += 1;
        Ok(())
    }

    pub(crate) fn index(&self, idx: usize) -> Option<Entry> {
        let mut rem = idx;
        for (i, m) in self.chunks.iter().enumerate() {
            if rem < m.count() {
                return Some(Entry::new(i, rem));
            }
            rem -= m.count();
        }
        None
    }

    pub(crate) fn chunk_flex(&self, chunk: usize, state: &mut MflexState) -> Result<Flex> {
        match self.chunks.get(chunk) {
            Some(m) => m.to_flex(state),
            None => Ok(Flex::new()),
        }
    }

    pub(crate) fn get(
        &self,
        entry: Entry,
        state: &mut MflexState,
    ) -> Result<Option<Databox<'static>>> {
        let Some(m) = self.chunks.get(entry.chunk) else {
            return Ok(None);
        };
        let f = m.open_read_only(state)?;
        Ok(f.get_index(entry.offset as isize).map(Databox::into_owned))
    }

    pub(crate) fn insert(
        &mut self,
        entry: Entry,
        val: &Databox<'_>,
        after: bool,
        fill: u8,
        depth: u16,
        state: &mut MflexState,
    ) -> Result<()> {
        let c = entry.chunk;
        let size = Flex::stored_size(val);
        if self.allow_insert(c, fill, size) {
            let m = self.chunk(c);
            let mut f = m.open(state)?;
            insert_in_flex(&mut f, entry.offset, val, after);
            m.close_grow(state, f);
            self.len += 1;
            return Ok(());
        }

        let m = self.chunk(c);
        let mut f = m.open(state)?;
        let (mut split, at) = if after {
            let rest = f.len().saturating_sub(entry.offset + 1);
            (f.split_range(entry.offset as isize + 1, rest), c + 1)
        } else {
            (f.split_range(0, entry.offset), c)
        };
        m.close_shrink(state, f);
        let endpoint = if after { Endpoint::Head } else { Endpoint::Tail };
        if capacity::allow_insert(split.bytes(), fill, size) {
            split.push(val, endpoint);
            self.insert_chunk(at, Mflex::from_flex_no_compress(split), depth, state)?;
        } else {
            // The value goes alone between the two halves.
            let mut single = Flex::new();
            single.push(val, Endpoint::Tail);
            let (first, second) = if after { (single, split) } else { (split, single) };
            self.insert_chunk(at, Mflex::from_flex_no_compress(first), depth, state)?;
            self.insert_chunk(at + 1, Mflex::from_flex_no_compress(second), depth, state)?;
        }
        self.len += 1;
        self.merge_around(c, fill, depth, state)
    }

    /// Appends chunk `a + 1` to chunk `a`. Both chunks are left intact on error.
    fn merge_pair(&mut self, a: usize, depth: u16, state: &mut MflexState) -> Result<()> {
        let second = self.chunk(a + 1).to_flex(state)?;
        let m = self.chunk(a);
        let mut first = m.open(state)?;
        first.append_flex(&second);
        m.close_grow(state, first);
        state.recycle(second.into_bytes());
        self.remove_chunk(a + 1, depth, state)
    }

    /// Merges the neighbours of `center` that fit the budget together: the two chunks
    /// before it, the two chunks after it, then `center` with each side.
    fn merge_around(
        &mut self,
        center: usize,
        fill: u8,
        depth: u16,
        state: &mut MflexState,
    ) -> Result<()> {
        let n = self.chunks.len();
        if n < 2 {
            return Ok(());
        }
        let tail = n - 1;
        let mut center = center.min(tail);
        let prev = center.saturating_sub(1);
        let prev_prev = center.saturating_sub(2);
        let mut next = (center + 1).min(tail);
        let mut next_next = (center + 2).min(tail);

        if prev_prev != prev && self.is_mergeable(prev_prev, prev, fill) {
            self.merge_pair(prev_prev, depth, state)?;
            next -= 1;
            next_next -= 1;
            center -= 1;
        }
        if next != next_next && self.is_mergeable(next, next_next, fill) {
            self.merge_pair(next, depth, state)?;
        }
        if prev != center && self.is_mergeable(prev, center, fill) {
            self.merge_pair(prev, depth, state)?;
            next -= 1;
            center -= 1;
        }
        if center != next && self.is_mergeable(center, next, fill) {
            self.merge_pair(center, depth, state)?;
        }
        Ok(())
    }

    /// Replaces the value at `entry`. A chunk pushed past the budget of `fill` is cut
    /// around the new value.
    pub(crate) fn replace(
        &mut self,
        entry: Entry,
        val: &Databox<'_>,
        fill: u8,
        depth: u16,
        state: &mut MflexState,
    ) -> Result<bool> {
        let c = entry.chunk;
        let Some(m) = self.chunks.get_mut(c) else {
            return Ok(false);
        };
        let mut f = m.open(state)?;
        let Some(e) = f.index(entry.offset as isize) else {
            m.close_grow(state, f);
            return Ok(false);
        };
        f.replace(e, val);
        if f.len() == 1 || capacity::meets_limit(f.bytes(), fill) {
            m.close_grow(state, f);
            return Ok(true);
        }
        let rest = f.split_range(entry.offset as isize + 1, f.len() - entry.offset - 1);
        let single = f.split_range(entry.offset as isize, 1);
        let mut at = c;
        if f.is_empty() {
            m.close_grow(state, single);
        } else {
            m.close_shrink(state, f);
            at += 1;
            self.insert_chunk(at, Mflex::from_flex_no_compress(single), depth, state)?;
        }
        if !rest.is_empty() {
            self.insert_chunk(at + 1, Mflex::from_flex_no_compress(rest), depth, state)?;
        }
        self.merge_around(at, fill, depth, state)?;
        Ok(true)
    }

    pub(crate) fn delete(
        &mut self,
        entry: Entry,
        depth: u16,
        state: &mut MflexState,
    ) -> Result<()> {
        let c = entry.chunk;
        let m = self.chunk(c);
        let mut f = m.open(state)?;
        let deleted = f.delete_range(entry.offset as isize, 1);
        let emptied = f.is_empty();
        m.close_shrink(state, f);
        self.len -= deleted;
        if emptied && self.chunks.len() > 1 {
            self.remove_chunk(c, depth, state)?;
        }
        Ok(())
    }

    /// Deletes `extent` values from `start`, both already clamped to the list.
    pub(crate) fn del_range(
        &mut self,
        start: usize,
        extent: usize,
        fill: u8,
        depth: u16,
        state: &mut MflexState,
    ) -> Result<()> {
        let Some(first) = self.index(start) else {
            return Ok(());
        };
        let mut c = first.chunk;
        let mut offset = first.offset;
        let mut extent = extent;
        while extent > 0 && c < self.chunks.len() {
            let count = self.chunk(c).count();
            let del = if offset == 0 && extent >= count {
                count
            } else if offset + extent >= count {
                count - offset
            } else {
                extent
            };
            if del == count {
                self.remove_chunk(c, depth, state)?;
            } else {
                self.chunk(c)
                    .delete_offset_count(state, offset as isize, del)?;
                c += 1;
            }
            self.len -= del;
            extent -= del;
            offset = 0;
        }
        self.merge_around(first.chunk, fill, depth, state)
    }

    pub(crate) fn pop(
        &mut self,
        endpoint: Endpoint,
        depth: u16,
        state: &mut MflexState,
    ) -> Result<Option<Databox<'static>>> {
        if self.len == 0 {
            return Ok(None);
        }
        let c = match endpoint {
            Endpoint::Head => 0,
            Endpoint::Tail => self.chunks.len() - 1,
        };
        let m = self.chunk(c);
        let mut f = m.open(state)?;
        let val = f.pop(endpoint);
        let emptied = f.is_empty();
        m.close_shrink(state, f);
        if val.is_some() {
            self.len -= 1;
        }
        if emptied && self.chunks.len() > 1 {
            self.remove_chunk(c, depth, state)?;
        }
        Ok(val)
    }

    pub(crate) fn rotate(&mut self, fill: u8, depth: u16, state: &mut MflexState) -> Result<()> {
        if self.len <= 1 {
            return Ok(());
        }
        if let Some(val) = self.pop(Endpoint::Tail, depth, state)? {
            self.push(&val, Endpoint::Head, fill, depth, state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_pair_keeps_chunks_on_error() {
        let mut state = MflexState::new();
        let mut first = Flex::new();
        for i in 0..200u64 {
            first.push(&Databox::from(format!("{i:x<32}")), Endpoint::Tail);
        }
        let mut broken = Mflex::from_flex(first, &mut state);
        assert!(broken.is_compressed());
        broken.garble_payload();
        let mut second = Flex::new();
        second.push(&Databox::from(7u64), Endpoint::Tail);

        let mut chunks = Multiarray::new(16);
        chunks.push_tail(broken);
        chunks.push_tail(Mflex::from_flex_no_compress(second.clone()));
        let mut full = Full { chunks, len: 201 };

        assert!(full.merge_pair(0, 1, &mut state).is_err());
        assert_eq!(full.chunk_count(), 2);
        assert_eq!(full.chunks.get(0).map(Mflex::count), Some(200));
        assert_eq!(full.chunk_flex(1, &mut state).unwrap(), second);
    }
}
