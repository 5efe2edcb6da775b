//! Fill-budget policy deciding when a packed-list chunk is full.
//!
//! A fill index selects one step of [`FILL_LIMITS`]; chunks of a chunked list are kept at
//! or under that many bytes, except that an empty chunk always accepts one element.

/// Per-chunk byte budgets selectable by a fill index.
pub const FILL_LIMITS: [usize; 12] = [
    0, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536,
];

/// Largest valid fill index.
pub const MAX_FILL: u8 = (FILL_LIMITS.len() - 1) as u8;

/// Size of an empty packed list.
pub const EMPTY_BYTES: usize = 2;

/// Requests up to this many bytes are assumed to need a single byte of encoding overhead.
const SMALL_REQUEST: usize = 64;

/// Returns the byte budget of `fill`, clamped to the last step.
#[inline(always)]
pub fn limit(fill: u8) -> usize {
    FILL_LIMITS[fill.min(MAX_FILL) as usize]
}

/// Checks if `bytes` is within the budget of `fill`.
#[inline(always)]
pub fn meets_limit(bytes: usize, fill: u8) -> bool {
    bytes <= limit(fill)
}

/// Checks if a list of `bytes` bytes may take `requested` more bytes under `fill`.
///
/// An empty list always accepts. Otherwise the overhead of the new entry is estimated as
/// one byte each for prefix and trailer when `requested <= 64`, and two bytes each beyond.
///
/// # Examples
///
/// ```
/// use datakit::flex::capacity;
///
/// assert!(capacity::allow_insert(2, 1, 1000));
/// assert!(capacity::allow_insert(50, 1, 12));
/// assert!(!capacity::allow_insert(50, 1, 13));
/// ```
pub fn allow_insert(bytes: usize, fill: u8, requested: usize) -> bool {
    if bytes == EMPTY_BYTES {
        return true;
    }
    let overhead = 2 * if requested <= SMALL_REQUEST { 1 } else { 2 };
    meets_limit(bytes + requested + overhead, fill)
}

/// Checks if lists of `a` and `b` bytes can be merged under `fill`.
///
/// Merging drops one header and may widen the other by at most two bytes, so the
/// merged list never exceeds `a + b`.
///
/// # Examples
///
/// ```
/// use datakit::flex::capacity;
///
/// assert!(capacity::is_mergeable(30, 34, 1));
/// assert!(!capacity::is_mergeable(30, 35, 1));
/// ```
pub fn is_mergeable(a: usize, b: usize, fill: u8) -> bool {
    meets_limit(a.saturating_add(b), fill)
}
