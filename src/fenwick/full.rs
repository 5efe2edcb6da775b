//! Separately allocated tree with overflow-checked doubling.
use super::{bit, FenwickValue, Small};
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Full<V> {
    pub(crate) tree: Vec<V>,
    pub(crate) count: usize,
}

impl<V: FenwickValue> Full<V> {
    pub(crate) fn from_slice(values: &[V]) -> Self {
        Self {
            tree: bit::build(values),
            count: values.len(),
        }
    }

    /// Takes over the tree of `small`, whose layout is identical.
    pub(crate) fn from_small(small: Small<V>) -> Self {
        Self {
            tree: small.tree,
            count: small.count,
        }
    }

    pub(crate) fn bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.tree.len() * std::mem::size_of::<V>()
    }

    /// Adds `delta` at `idx`, doubling the capacity as needed.
    ///
    /// # Errors
    ///
    /// An error is returned if the capacity would exceed `max_capacity` or cannot be
    /// allocated; the tree is left unchanged.
    pub(crate) fn update(&mut self, idx: usize, delta: V, max_capacity: usize) -> Result<()> {
        if idx >= self.tree.len() {
            let limit = max_capacity.min(isize::MAX as usize / std::mem::size_of::<V>().max(1));
            // saturates for the last two indices, which no capacity can hold
            let needed = idx.saturating_add(2);
            let mut capacity = self.tree.len().max(1);
            while capacity < needed {
                if capacity > limit / 2 {
                    return Err(Error::CapacityExceeded(format!(
                        "capacity must be at most {limit}, but index {idx} needs {}.",
                        capacity.saturating_mul(2)
                    )));
                }
                capacity <<= 1;
            }
            self.tree
                .try_reserve_exact(capacity - self.tree.len())
                .map_err(|e| {
                    Error::CapacityExceeded(format!(
                        "capacity {capacity} cannot be allocated: {e}."
                    ))
                })?;
            bit::grow(&mut self.tree, capacity);
            self.count = idx + 1;
        } else if idx >= self.count {
            self.count = idx + 1;
        }
        bit::add(&mut self.tree, idx, delta);
        Ok(())
    }
}
