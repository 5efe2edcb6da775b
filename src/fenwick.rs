//! Fenwick tree (binary indexed tree) that promotes itself from a compact tier.
//!
//! # Introduction
//!
//! [`Fenwick`] maintains prefix sums over a growable sequence of values, all starting at
//! zero. Both point updates and prefix queries take $`O(\log n)`$ time.
//!
//! The tree starts in a *Small* tier sized for up to 128 KiB of values, and moves to a
//! *Full* tier whose doubling is checked against a per-instance capacity limit. The
//! promotion happens before an update when the Small tier is already over budget, or
//! when the update would leave a large gap of zero values.
//!
//! # Examples
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use datakit::Fenwick;
//!
//! let mut fw = Fenwick::<i64>::new();
//! for i in 0..1000 {
//!     fw.update(i, i as i64)?;
//! }
//! assert_eq!(fw.query(999), 499500);
//! assert_eq!(fw.range_query(100, 200), 15150);
//! assert_eq!(fw.lower_bound(5050), Some(100));
//!
//! fw.set(10, 0)?;
//! assert_eq!(fw.get(10), 0);
//! assert_eq!(fw.query(999), 499490);
//! # Ok(())
//! # }
//! ```
mod bit;
mod full;
mod small;
pub mod value;

use std::fmt;

use tracing::debug;

use crate::error::Result;
use crate::utils::MatrixView;
use full::Full;
use small::{Small, SMALL_MAX_BYTES};

pub use value::FenwickValue;

/// An update at least this far past the count promotes the Small tier.
const SMALL_MAX_GAP: usize = 1000;

/// Storage tier of a [`Fenwick`] tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// One contiguous vector within 128 KiB.
    Small,
    /// Unbounded vector limited by [`Fenwick::max_capacity()`].
    Full,
}

#[derive(Clone, PartialEq)]
enum Inner<V> {
    Small(Small<V>),
    Full(Full<V>),
}

/// Tiered Fenwick tree over values of type `V`.
#[derive(Clone, PartialEq)]
pub struct Fenwick<V> {
    inner: Inner<V>,
    max_capacity: usize,
}

impl<V: FenwickValue> Fenwick<V> {
    /// Creates an empty tree.
    pub const fn new() -> Self {
        Self {
            inner: Inner::Small(Small::new()),
            max_capacity: usize::MAX,
        }
    }

    /// Creates a tree holding `values`, in the tier their count fits.
    ///
    /// # Complexity
    ///
    /// $`O(n \log n)`$
    ///
    /// # Examples
    ///
    /// ```
    /// use datakit::Fenwick;
    ///
    /// let fw = Fenwick::from_slice(&[1.5f64, 2.0, 0.0, 4.0]);
    /// assert_eq!(fw.len(), 4);
    /// assert_eq!(fw.query(2), 3.5);
    /// assert_eq!(fw.get(3), 4.0);
    /// ```
    pub fn from_slice(values: &[V]) -> Self {
        let inner = if values.len() <= Small::<V>::MAX_COUNT {
            Inner::Small(Small::from_slice(values))
        } else {
            Inner::Full(Full::from_slice(values))
        };
        Self {
            inner,
            max_capacity: usize::MAX,
        }
    }

    /// Gets the largest capacity the Full tier may double to.
    pub const fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Limits the capacity the Full tier may double to.
    ///
    /// The Small tier is promoted as usual; the limit applies from then on.
    pub fn set_max_capacity(&mut self, max_capacity: usize) {
        self.max_capacity = max_capacity;
    }

    /// Gets the current tier.
    pub const fn tier(&self) -> Tier {
        match self.inner {
            Inner::Small(_) => Tier::Small,
            Inner::Full(_) => Tier::Full,
        }
    }

    /// Gets the number of values, one past the highest index ever updated.
    pub fn len(&self) -> usize {
        match &self.inner {
            Inner::Small(s) => s.count,
            Inner::Full(f) => f.count,
        }
    }

    /// Checks if no value has been updated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the number of bytes held by the tree.
    pub fn bytes(&self) -> usize {
        match &self.inner {
            Inner::Small(s) => s.bytes(),
            Inner::Full(f) => f.bytes(),
        }
    }

    fn tree(&self) -> &[V] {
        match &self.inner {
            Inner::Small(s) => &s.tree,
            Inner::Full(f) => &f.tree,
        }
    }

    fn should_promote(small: &Small<V>, idx: usize) -> bool {
        small.should_upgrade()
            || idx >= small.count + SMALL_MAX_GAP
            || idx.saturating_mul(std::mem::size_of::<V>()) > SMALL_MAX_BYTES
    }

    /// Adds `delta` to the value at `idx`, extending the sequence with zeros if needed.
    ///
    /// # Errors
    ///
    /// An error is returned if the Full tier would have to grow past
    /// [`Fenwick::max_capacity()`]; the tree is left unchanged.
    ///
    /// # Complexity
    ///
    /// $`O(\log n)`$ amortized
    pub fn update(&mut self, idx: usize, delta: V) -> Result<()> {
        if let Inner::Small(small) = &mut self.inner {
            if Self::should_promote(small, idx) {
                let small = std::mem::replace(small, Small::new());
                debug!(count = small.count, idx, "fenwick upgraded to full");
                self.inner = Inner::Full(Full::from_small(small));
            }
        }
        match &mut self.inner {
            Inner::Small(s) => {
                s.update(idx, delta);
                Ok(())
            }
            Inner::Full(f) => f.update(idx, delta, self.max_capacity),
        }
    }

    /// Replaces the value at `idx` with `value`.
    ///
    /// # Errors
    ///
    /// An error is returned under the conditions of [`Fenwick::update()`].
    pub fn set(&mut self, idx: usize, value: V) -> Result<()> {
        let current = self.get(idx);
        self.update(idx, value.difference(current))
    }

    /// Returns the sum of the values in `0..=idx`, or zero if `idx` is out of range.
    ///
    /// # Complexity
    ///
    /// $`O(\log n)`$
    pub fn query(&self, idx: usize) -> V {
        if idx >= self.len() {
            return V::zero();
        }
        bit::prefix(self.tree(), idx)
    }

    /// Returns the value at `idx`, or zero if `idx` is out of range.
    pub fn get(&self, idx: usize) -> V {
        if idx >= self.len() {
            return V::zero();
        }
        let current = self.query(idx);
        match idx {
            0 => current,
            _ => current.difference(self.query(idx - 1)),
        }
    }

    /// Returns the sum of the values in `left..=right`, or zero if the range is empty or
    /// out of range.
    pub fn range_query(&self, left: usize, right: usize) -> V {
        if left > right || right >= self.len() {
            return V::zero();
        }
        let sum = self.query(right);
        match left {
            0 => sum,
            _ => sum.difference(self.query(left - 1)),
        }
    }

    /// Returns the smallest index whose prefix sum is at least `target`, or [`None`] if
    /// there is none.
    ///
    /// Meaningful when every value is non-negative, so that prefix sums never decrease.
    ///
    /// # Complexity
    ///
    /// $`O(\log n)`$
    pub fn lower_bound(&self, target: V) -> Option<usize> {
        bit::lower_bound(self.tree(), self.len(), target)
    }

    /// Resets every value to zero, keeping the length and the tier.
    pub fn clear(&mut self) {
        let tree = match &mut self.inner {
            Inner::Small(s) => &mut s.tree,
            Inner::Full(f) => &mut f.tree,
        };
        tree.fill(V::zero());
    }
}

impl<V: FenwickValue> Default for Fenwick<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: FenwickValue> fmt::Debug for Fenwick<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fenwick")
            .field("tier", &self.tier())
            .field("len", &self.len())
            .field("capacity", &self.tree().len())
            .field("bytes", &self.bytes())
            .field("tree", &MatrixView::new(self.tree(), 8))
            .finish()
    }
}
