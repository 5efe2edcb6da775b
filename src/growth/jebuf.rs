//! Rounding to jemalloc-style allocator size classes.
//!
//! Small requests round to 8 or 16 bytes, requests up to 128 bytes round to multiples
//! of 16, and larger requests use four classes per power of two.

/// Returns the number of bytes the allocator would hand back for `requested` bytes.
///
/// # Arguments
///
///  - `requested`: Number of bytes asked for.
///
/// # Examples
///
/// ```
/// use datakit::growth::jebuf::size_allocation;
///
/// assert_eq!(size_allocation(1), 8);
/// assert_eq!(size_allocation(9), 16);
/// assert_eq!(size_allocation(17), 32);
/// assert_eq!(size_allocation(129), 160);
/// assert_eq!(size_allocation(257), 320);
/// ```
pub fn size_allocation(requested: usize) -> usize {
    if requested <= 8 {
        return 8;
    }
    if requested <= 16 {
        return 16;
    }
    if requested <= 128 {
        return (requested + 15) & !15;
    }
    // NOTE: four classes per doubling, i.e., a step of 2^(lg - 2).
    let lg = usize::BITS - 1 - (requested - 1).leading_zeros();
    let step = 1usize << (lg - 2);
    match requested.checked_add(step - 1) {
        Some(x) => x & !(step - 1),
        None => requested,
    }
}

/// Checks if resizing an allocation of `original` bytes to `new` bytes would release
/// memory, i.e., if `new` falls into a smaller size class.
///
/// # Examples
///
/// ```
/// use datakit::growth::jebuf::use_new_allocation;
///
/// assert!(!use_new_allocation(100, 99));
/// assert!(use_new_allocation(200, 100));
/// ```
pub fn use_new_allocation(original: usize, new: usize) -> bool {
    size_allocation(new) < size_allocation(original)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_classes() {
        let expected = [
            (0, 8),
            (8, 8),
            (16, 16),
            (24, 32),
            (48, 48),
            (100, 112),
            (128, 128),
            (160, 160),
            (161, 192),
            (224, 224),
            (256, 256),
            (300, 320),
            (448, 448),
            (513, 640),
            (4097, 5120),
        ];
        for (req, class) in expected {
            assert_eq!(size_allocation(req), class, "requested={req}");
        }
    }

    #[test]
    fn test_monotone() {
        let mut prev = 0;
        for req in 0..70_000 {
            let c = size_allocation(req);
            assert!(c >= req);
            assert!(c >= prev);
            prev = c;
        }
    }

    #[test]
    fn test_huge() {
        assert_eq!(size_allocation(usize::MAX), usize::MAX);
    }
}
