//! Binary indexed tree primitives over a slice whose length is a power of two.
//!
//! Node `i` (1-based) holds the sum of the `lsb(i)` elements ending at `i`; every update
//! propagates up to the full length of the slice.
use super::FenwickValue;

#[inline(always)]
const fn lsb(i: usize) -> usize {
    i & i.wrapping_neg()
}

/// Builds a tree over `values` with capacity of the next power of two above their count.
pub(crate) fn build<V: FenwickValue>(values: &[V]) -> Vec<V> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut tree = vec![V::zero(); (values.len() + 1).next_power_of_two()];
    for (i, &v) in values.iter().enumerate() {
        if !v.is_zero() {
            add(&mut tree, i, v);
        }
    }
    tree
}

/// Adds `delta` to the element at 0-based `idx`.
#[inline]
pub(crate) fn add<V: FenwickValue>(tree: &mut [V], idx: usize, delta: V) {
    let mut i = idx + 1;
    while i <= tree.len() {
        tree[i - 1] = tree[i - 1].accumulate(delta);
        i += lsb(i);
    }
}

/// Returns the sum of the elements in `0..=idx`.
#[inline]
pub(crate) fn prefix<V: FenwickValue>(tree: &[V], idx: usize) -> V {
    let mut sum = V::zero();
    let mut i = (idx + 1).min(tree.len());
    while i > 0 {
        sum = sum.accumulate(tree[i - 1]);
        i -= lsb(i);
    }
    sum
}

/// Extends `tree` to `capacity`, a larger power of two.
///
/// Every old element has the old root among its ancestors, so the new ancestors above it
/// receive exactly the old total.
pub(crate) fn grow<V: FenwickValue>(tree: &mut Vec<V>, capacity: usize) {
    debug_assert!(capacity.is_power_of_two() && capacity > tree.len());
    let old = tree.len();
    let total = tree.last().copied().unwrap_or_else(V::zero);
    tree.resize(capacity, V::zero());
    if old == 0 || total.is_zero() {
        return;
    }
    let mut i = old * 2;
    while i <= capacity {
        tree[i - 1] = tree[i - 1].accumulate(total);
        i *= 2;
    }
}

/// Returns the smallest index in `0..count` whose prefix sum is at least `target`.
///
/// # Complexity
///
/// $`O(\log n)`$ by binary lifting
pub(crate) fn lower_bound<V: FenwickValue>(tree: &[V], count: usize, target: V) -> Option<usize> {
    if count == 0 {
        return None;
    }
    let mut pos = 0;
    let mut sum = V::zero();
    let mut mask = 1 << (usize::BITS - 1 - count.leading_zeros());
    while mask > 0 {
        let next = pos + mask;
        if next <= count {
            let candidate = sum.accumulate(tree[next - 1]);
            if candidate < target {
                pos = next;
                sum = candidate;
            }
        }
        mask >>= 1;
    }
    (pos < count).then_some(pos)
}
