//! Error types shared by every container in the crate.
use thiserror::Error;

/// Convenient alias for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds reported by codecs and containers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Malformed varint bytes, a corrupt flex trailer, or an inconsistent compressed length.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// An index past the logical length of a container.
    #[error("index must be in -{len}..{len}, but got {index}.")]
    OutOfRange {
        /// Requested index.
        index: i64,
        /// Number of elements at the time of the request.
        len: usize,
    },

    /// A growth request that cannot be satisfied.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A numeric read against an entry of another type.
    #[error("type mismatch: expected {expected}, but got {found}.")]
    TypeMismatch {
        /// Type the operation required.
        expected: &'static str,
        /// Type actually stored.
        found: &'static str,
    },

    /// An atom reference without a table, or with a key missing from the table.
    #[error("atom {0} cannot be resolved.")]
    AtomUnresolved(u64),

    /// A value that does not fit in the declared number of bits.
    #[error("val must fit in width={width} bits, but got {value}.")]
    ValueTooLarge {
        /// Rejected value.
        value: u64,
        /// Declared width in bits.
        width: usize,
    },

    /// A width that is inconsistent with the value or its context.
    #[error("width mismatch: {0}")]
    WidthMismatch(String),
}
