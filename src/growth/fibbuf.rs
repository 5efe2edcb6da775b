//! Fibonacci-shaped staircase of buffer sizes.

/// Steps of the staircase, ending at a 1.54 TB buffer.
const STEPS: [u64; 52] = [
    34,
    55,
    89,
    144,
    233,
    377,
    610,
    987,
    1597,
    2584,
    4181,
    6765,
    10946,
    17711,
    28657,
    46368,
    75025,
    121393,
    196418,
    317811,
    514229,
    832040,
    1346269,
    2178309,
    3524578,
    5702887,
    9227465,
    14930352,
    24157817,
    39088169,
    63245986,
    102334155,
    165580141,
    267914296,
    433494437,
    701408733,
    1134903170,
    1836311903,
    2971215073,
    4807526976,
    7778742049,
    12586269025,
    20365011074,
    32951280099,
    53316291173,
    86267571272,
    139583862445,
    225851433717,
    365435296162,
    591286729879,
    956722026041,
    1548008755920,
];

/// Returns the smallest staircase step no less than `requested`.
///
/// Past the last step, sizes grow by a factor of 1.2 (saturating at [`usize::MAX`]).
///
/// # Arguments
///
///  - `requested`: Minimum number of bytes needed.
///
/// # Complexity
///
/// Logarithmic in the number of steps.
///
/// # Examples
///
/// ```
/// use datakit::growth::fibbuf::next_size;
///
/// assert_eq!(next_size(0), 34);
/// assert_eq!(next_size(34), 34);
/// assert_eq!(next_size(35), 55);
/// assert_eq!(next_size(5000), 6765);
/// ```
pub fn next_size(requested: usize) -> usize {
    let req = requested as u64;
    match STEPS.binary_search(&req) {
        Ok(i) | Err(i) if i < STEPS.len() => STEPS[i] as usize,
        _ => requested.saturating_add(requested / 5),
    }
}
