//! Contiguous tree for short sequences.
use super::{bit, FenwickValue};

/// Byte budget of the Small tier.
pub(crate) const SMALL_MAX_BYTES: usize = 128 * 1024;

/// Tree with capacity of the next power of two above its count.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Small<V> {
    pub(crate) tree: Vec<V>,
    pub(crate) count: usize,
}

impl<V: FenwickValue> Small<V> {
    /// Largest count the Small tier holds before it is promoted.
    pub(crate) const MAX_COUNT: usize = SMALL_MAX_BYTES / std::mem::size_of::<V>();

    pub(crate) const fn new() -> Self {
        Self {
            tree: Vec::new(),
            count: 0,
        }
    }

    pub(crate) fn from_slice(values: &[V]) -> Self {
        Self {
            tree: bit::build(values),
            count: values.len(),
        }
    }

    pub(crate) fn bytes(&self) -> usize {
        std::mem::size_of::<Self>() + self.tree.len() * std::mem::size_of::<V>()
    }

    /// Checks if the tree has outgrown the tier.
    pub(crate) fn should_upgrade(&self) -> bool {
        self.count > Self::MAX_COUNT || self.bytes() > SMALL_MAX_BYTES
    }

    pub(crate) fn update(&mut self, idx: usize, delta: V) {
        if idx >= self.tree.len() {
            let capacity = (idx + 2).next_power_of_two();
            bit::grow(&mut self.tree, capacity);
            self.count = idx + 1;
        } else if idx >= self.count {
            self.count = idx + 1;
        }
        bit::add(&mut self.tree, idx, delta);
    }
}
