//! Buffer growth policy shared by byte-buffer containers.
//!
//! # Introduction
//!
//! Containers backed by a single growable byte buffer (e.g., [`Flex`](crate::flex::Flex)
//! and [`Dks`](crate::dks::Dks)) must avoid quadratic reallocation under repeated appends.
//! The policy is a composition of two steps:
//!
//! 1. [`fibbuf::next_size`] picks the next step of a Fibonacci-shaped staircase, and
//! 2. [`jebuf::size_allocation`] rounds the step up to the size class that a
//!    jemalloc-style allocator would hand back anyway.
//!
//! The composition is provided as [`next_size_allocation`].
//!
//! # Examples
//!
//! ```
//! use datakit::growth;
//!
//! assert_eq!(growth::fibbuf::next_size(40), 55);
//! assert_eq!(growth::jebuf::size_allocation(55), 64);
//! assert_eq!(growth::next_size_allocation(40), 64);
//! ```
pub mod fibbuf;
pub mod jebuf;

/// Returns the allocation size for a buffer that must hold at least `requested` bytes.
///
/// # Arguments
///
///  - `requested`: Minimum number of bytes needed.
///
/// # Examples
///
/// ```
/// use datakit::growth::next_size_allocation;
///
/// assert_eq!(next_size_allocation(0), 48);
/// assert_eq!(next_size_allocation(300), 384);
/// ```
pub fn next_size_allocation(requested: usize) -> usize {
    jebuf::size_allocation(fibbuf::next_size(requested))
}

/// Reserves room in `buf` for `additional` more bytes following the growth policy.
///
/// Nothing happens if the current capacity already suffices.
pub(crate) fn reserve(buf: &mut Vec<u8>, additional: usize) {
    let needed = buf.len() + additional;
    if needed > buf.capacity() {
        let target = next_size_allocation(needed);
        buf.reserve_exact(target - buf.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_follows_policy() {
        let mut buf = vec![];
        reserve(&mut buf, 1);
        assert!(buf.capacity() >= 48);
        buf.extend_from_slice(&[0; 40]);
        let capa = buf.capacity();
        reserve(&mut buf, 1);
        assert_eq!(buf.capacity(), capa);
        reserve(&mut buf, 300);
        assert!(buf.capacity() >= 384);
    }

    #[test]
    fn test_next_size_allocation_monotone() {
        let mut prev = 0;
        for n in (0..100_000).step_by(97) {
            let s = next_size_allocation(n);
            assert!(s >= n);
            assert!(s >= prev);
            prev = s;
        }
    }
}
