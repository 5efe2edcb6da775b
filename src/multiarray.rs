//! Tiered array of records with cheap middle insertion.
//!
//! # Introduction
//!
//! A [`Multiarray`] holds its records in one of three tiers, upgrading as it grows:
//!
//! - *Small*: a single vector, until it holds `row_max` records.
//! - *Medium*: a vector of rows of at most `row_max` records, until there are `row_max`
//!   rows.
//! - *Full*: rows in a xor-linked list, so that adding a row never moves the others.
//!
//! Inserting into a full row splits it, placing the new row on the side that moves fewer
//! records. Tiers never downgrade.
//!
//! # Examples
//!
//! ```
//! use datakit::multiarray::{Multiarray, Tier};
//!
//! let mut ma = Multiarray::new(4);
//! for i in 0..20 {
//!     ma.insert(0, i);
//! }
//! assert_eq!(ma.tier(), Tier::Medium);
//! assert_eq!(ma.len(), 20);
//! assert_eq!(ma.get(0), Some(&19));
//! assert_eq!(ma.get_tail(), Some(&0));
//!
//! assert_eq!(ma.delete(19), Some(0));
//! assert_eq!(ma.iter().copied().take(3).collect::<Vec<_>>(), vec![19, 18, 17]);
//! ```
mod full;
mod medium;
mod small;

use std::fmt;

use tracing::debug;

use crate::config::MultiarrayConfig;
use full::Full;
use medium::Medium;
use small::Small;

/// Storage tier of a [`Multiarray`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// One vector.
    Small,
    /// A vector of rows.
    Medium,
    /// A xor-linked list of rows.
    Full,
}

/// Placement of a row split off from a full row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Side {
    Before,
    After,
}

/// Inserts `val` at `offset` of `row`, splitting the row if it already holds `row_max`
/// records.
///
/// On a split the returned row must be linked on the returned side of `row`.
pub(crate) fn insert_into_row<T>(
    row: &mut Vec<T>,
    offset: usize,
    val: T,
    row_max: usize,
) -> Option<(Vec<T>, Side)> {
    let len = row.len();
    if len < row_max {
        row.insert(offset, val);
        return None;
    }
    if offset == 0 {
        return Some((vec![val], Side::Before));
    }
    if offset == len {
        return Some((vec![val], Side::After));
    }
    let remaining = len - offset;
    if remaining < offset {
        let mut tail = Vec::with_capacity(remaining + 1);
        tail.push(val);
        tail.extend(row.drain(offset..));
        Some((tail, Side::After))
    } else {
        let rest = row.split_off(offset);
        let mut head = std::mem::replace(row, rest);
        head.push(val);
        Some((head, Side::Before))
    }
}

#[derive(Clone)]
enum Inner<T> {
    Small(Small<T>),
    Medium(Medium<T>),
    Full(Full<T>),
}

/// Tiered array of records.
#[derive(Clone)]
pub struct Multiarray<T> {
    inner: Inner<T>,
    row_max: usize,
    len: usize,
}

impl<T> Multiarray<T> {
    /// Creates a new empty array.
    ///
    /// # Arguments
    ///
    ///  - `row_max`: Records per row and rows per tier before upgrading, at least 2.
    pub fn new(row_max: usize) -> Self {
        Self {
            inner: Inner::Small(Small::new()),
            row_max: row_max.max(2),
            len: 0,
        }
    }

    /// Creates a new empty array from `config`.
    pub fn with_config(config: &MultiarrayConfig) -> Self {
        Self::new(config.row_max)
    }

    /// Gets the number of records.
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if the array is empty.
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Gets the row budget.
    #[inline(always)]
    pub const fn row_max(&self) -> usize {
        self.row_max
    }

    /// Gets the current tier.
    pub const fn tier(&self) -> Tier {
        match self.inner {
            Inner::Small(_) => Tier::Small,
            Inner::Medium(_) => Tier::Medium,
            Inner::Full(_) => Tier::Full,
        }
    }

    /// Gets the number of rows.
    pub fn row_count(&self) -> usize {
        match &self.inner {
            Inner::Small(_) => 1,
            Inner::Medium(m) => m.row_count(),
            Inner::Full(f) => f.row_count(),
        }
    }

    fn upgrade_if_needed(&mut self) {
        let row_max = self.row_max;
        let inner = std::mem::replace(&mut self.inner, Inner::Small(Small::new()));
        self.inner = match inner {
            Inner::Small(s) if s.len() >= row_max => {
                debug!(len = self.len, row_max, "multiarray upgraded to medium");
                Inner::Medium(Medium::from_row(s.data))
            }
            Inner::Medium(m) if m.row_count() >= row_max => {
                debug!(len = self.len, rows = m.row_count(), "multiarray upgraded to full");
                Inner::Full(Full::from_rows(m.rows))
            }
            inner => inner,
        };
    }

    /// Inserts `val` at `idx`, shifting later records up.
    ///
    /// Returns `false`, dropping `val`, if `idx > len`. Debug builds assert instead.
    ///
    /// # Arguments
    ///
    ///  - `idx`: Position in `0..=len`.
    pub fn insert(&mut self, idx: usize, val: T) -> bool {
        debug_assert!(idx <= self.len, "idx must be in 0..={}, but got {idx}.", self.len);
        if idx > self.len {
            return false;
        }
        self.upgrade_if_needed();
        let row_max = self.row_max;
        match &mut self.inner {
            Inner::Small(s) => s.insert(idx, val),
            Inner::Medium(m) => m.insert(idx, val, row_max),
            Inner::Full(f) => f.insert(idx, val, row_max),
        }
        self.len += 1;
        true
    }

    /// Appends `val` after the last record.
    pub fn push_tail(&mut self, val: T) {
        self.insert(self.len, val);
    }

    /// Removes and returns the record at `idx`, or [`None`] if out of range.
    pub fn delete(&mut self, idx: usize) -> Option<T> {
        debug_assert!(idx < self.len, "idx must be in 0..{}, but got {idx}.", self.len);
        if idx >= self.len {
            return None;
        }
        let val = match &mut self.inner {
            Inner::Small(s) => s.delete(idx),
            Inner::Medium(m) => m.delete(idx),
            Inner::Full(f) => f.delete(idx),
        };
        self.len -= 1;
        Some(val)
    }

    /// Returns a reference to the record at `idx`, or [`None`] if out of range.
    ///
    /// # Complexity
    ///
    /// Linear in the number of rows
    pub fn get(&self, idx: usize) -> Option<&T> {
        if idx >= self.len {
            return None;
        }
        match &self.inner {
            Inner::Small(s) => s.get(idx),
            Inner::Medium(m) => m.get(idx),
            Inner::Full(f) => f.get(idx),
        }
    }

    /// Returns a mutable reference to the record at `idx`, or [`None`] if out of range.
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        if idx >= self.len {
            return None;
        }
        match &mut self.inner {
            Inner::Small(s) => s.get_mut(idx),
            Inner::Medium(m) => m.get_mut(idx),
            Inner::Full(f) => f.get_mut(idx),
        }
    }

    /// Returns the first record.
    pub fn get_head(&self) -> Option<&T> {
        match &self.inner {
            Inner::Small(s) => s.data.first(),
            Inner::Medium(m) => m.rows.first().and_then(|r| r.first()),
            Inner::Full(f) => f.head_row().first(),
        }
    }

    /// Returns the last record.
    pub fn get_tail(&self) -> Option<&T> {
        match &self.inner {
            Inner::Small(s) => s.data.last(),
            Inner::Medium(m) => m.rows.last().and_then(|r| r.last()),
            Inner::Full(f) => f.tail_row().last(),
        }
    }

    /// Returns a mutable reference to the last record.
    pub fn get_tail_mut(&mut self) -> Option<&mut T> {
        match &mut self.inner {
            Inner::Small(s) => s.data.last_mut(),
            Inner::Medium(m) => m.rows.last_mut().and_then(|r| r.last_mut()),
            Inner::Full(f) => f.tail_row_mut().last_mut(),
        }
    }

    /// Creates an iterator over the records from head to tail.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Checks the xor links of the Full tier from both ends; other tiers trivially pass.
    pub fn verify_links(&self) -> bool {
        match &self.inner {
            Inner::Full(f) => f.verify_links(),
            _ => true,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Multiarray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Multiarray")
            .field("vals", &self.iter().collect::<Vec<_>>())
            .field("tier", &self.tier())
            .field("row_max", &self.row_max)
            .field("len", &self.len)
            .finish()
    }
}

enum Rows<'a, T> {
    Single(Option<&'a [T]>),
    Medium(std::slice::Iter<'a, Vec<T>>),
    Full(full::Rows<'a, T>),
}

impl<'a, T> Iterator for Rows<'a, T> {
    type Item = &'a [T];

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Single(row) => row.take(),
            Self::Medium(it) => it.next().map(Vec::as_slice),
            Self::Full(it) => it.next(),
        }
    }
}

/// Iterator over the records of a [`Multiarray`], created by [`Multiarray::iter()`].
pub struct Iter<'a, T> {
    rows: Rows<'a, T>,
    cur: std::slice::Iter<'a, T>,
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    /// Creates a new iterator.
    pub fn new(ma: &'a Multiarray<T>) -> Self {
        let rows = match &ma.inner {
            Inner::Small(s) => Rows::Single(Some(s.data.as_slice())),
            Inner::Medium(m) => Rows::Medium(m.rows.iter()),
            Inner::Full(f) => Rows::Full(f.rows()),
        };
        Self {
            rows,
            cur: [].iter(),
            remaining: ma.len,
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(x) = self.cur.next() {
                self.remaining -= 1;
                return Some(x);
            }
            self.cur = self.rows.next()?.iter();
        }
    }

    #[inline(always)]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    #[test]
    fn test_split_rules() {
        let mut row = vec![1, 2, 3, 4];
        assert_eq!(insert_into_row(&mut row, 0, 0, 4), Some((vec![0], Side::Before)));
        assert_eq!(insert_into_row(&mut row, 4, 5, 4), Some((vec![5], Side::After)));
        assert_eq!(insert_into_row(&mut row, 3, 9, 4), Some((vec![9, 4], Side::After)));
        assert_eq!(row, vec![1, 2, 3]);

        let mut row = vec![1, 2, 3, 4];
        assert_eq!(insert_into_row(&mut row, 1, 9, 4), Some((vec![1, 9], Side::Before)));
        assert_eq!(row, vec![2, 3, 4]);
        assert_eq!(insert_into_row(&mut row, 1, 7, 4), None);
        assert_eq!(row, vec![2, 7, 3, 4]);
    }

    #[test]
    fn test_tier_upgrades() {
        let mut ma = Multiarray::new(3);
        for i in 0..3 {
            ma.push_tail(i);
        }
        assert_eq!(ma.tier(), Tier::Small);
        ma.push_tail(3);
        assert_eq!(ma.tier(), Tier::Medium);
        for i in 4..20 {
            ma.push_tail(i);
        }
        assert_eq!(ma.tier(), Tier::Full);
        assert!(ma.verify_links());
        assert_eq!(ma.iter().copied().collect::<Vec<_>>(), (0..20).collect::<Vec<_>>());
        assert_eq!(ma.get_head(), Some(&0));
        assert_eq!(ma.get_tail(), Some(&19));
    }

    #[test]
    fn test_random_against_vec() {
        let mut rng = ChaChaRng::seed_from_u64(13);
        for row_max in [2, 3, 8] {
            let mut ma = Multiarray::new(row_max);
            let mut model = vec![];
            for step in 0..3000 {
                if model.is_empty() || rng.gen_range(0..3) > 0 {
                    let idx = rng.gen_range(0..=model.len());
                    ma.insert(idx, step);
                    model.insert(idx, step);
                } else {
                    let idx = rng.gen_range(0..model.len());
                    assert_eq!(ma.delete(idx), Some(model.remove(idx)));
                }
                assert!(ma.verify_links());
            }
            assert_eq!(ma.tier(), Tier::Full);
            assert_eq!(ma.len(), model.len());
            assert_eq!(ma.iter().copied().collect::<Vec<_>>(), model);
            for (i, x) in model.iter().enumerate() {
                assert_eq!(ma.get(i), Some(x));
            }
            assert_eq!(ma.get(model.len()), None);
        }
    }

    #[test]
    fn test_drain_keeps_one_row() {
        let mut ma = Multiarray::new(2);
        for i in 0..10 {
            ma.push_tail(i);
        }
        assert_eq!(ma.tier(), Tier::Full);
        while !ma.is_empty() {
            ma.delete(0);
            assert!(ma.verify_links());
        }
        assert!(ma.is_empty());
        assert_eq!(ma.row_count(), 1);
        assert_eq!(ma.get_head(), None);
        ma.push_tail(42);
        assert_eq!(ma.get_tail(), Some(&42));
    }

    #[test]
    fn test_get_mut() {
        let mut ma = Multiarray::new(4);
        for i in 0..50 {
            ma.push_tail(i);
        }
        *ma.get_mut(33).unwrap() += 100;
        *ma.get_tail_mut().unwrap() = -1;
        assert_eq!(ma.get(33), Some(&133));
        assert_eq!(ma.get_tail(), Some(&-1));
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_out_of_range_is_rejected() {
        let mut ma = Multiarray::new(4);
        for i in 0..10 {
            assert!(ma.insert(i, i));
        }
        assert!(!ma.insert(11, 99));
        assert_eq!(ma.delete(10), None);
        assert_eq!(ma.len(), 10);
        assert_eq!(ma.iter().copied().collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "idx must be in 0..=10, but got 11.")]
    fn test_out_of_range_insert_asserts() {
        let mut ma = Multiarray::new(4);
        for i in 0..10 {
            assert!(ma.insert(i, i));
        }
        ma.insert(11, 99);
    }
}
