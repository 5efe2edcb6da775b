//! # `datakit`: Memory-efficient containers over packed byte buffers
//!
//! `datakit` stores heterogeneous values in contiguous byte buffers with variable-length
//! encodings, and wraps those buffers in containers that change their internal layout as
//! they grow.
//!
//! ## Data structures
//!
//! - [`varint`]
//!   - Four integer codecs: sortable tagged, wire-compatible chained, fixed-width
//!     external and bit-packed bitstream.
//! - [`Databox`]
//!   - Tagged value through which every element is read and written.
//! - [`Flex`]
//!   - Packed list of heterogeneous values, traversable in both directions.
//! - [`Mflex`]
//!   - [`Flex`] that may be held zstd-compressed, decompressed through a reusable
//!     [`MflexState`].
//! - [`Multilist`]
//!   - Deque of values over chunked flexes, compressing interior chunks.
//! - [`Multiarray`]
//!   - Ordered array of fixed-size records, grown from one row to a row directory.
//! - [`Fenwick`]
//!   - Binary indexed tree over integers or floats.
//! - [`Dks`]
//!   - Byte string with a variable-width length header.
//!
//! Containers with tiers (`Multilist`, `Multiarray`, `Fenwick`) choose the most compact
//! representation for their size and upgrade themselves in place. Buffer growth follows
//! the policy in [`growth`].
//!
//! ## Limitation
//!
//! This library is designed to run on 64-bit machines.
#![deny(missing_docs)]

#[cfg(not(target_pointer_width = "64"))]
compile_error!("`target_pointer_width` must be 64");

pub mod config;
pub mod databox;
pub mod dks;
pub mod error;
pub mod fenwick;
pub mod flex;
pub mod growth;
pub mod mflex;
pub mod multiarray;
pub mod multilist;
pub mod serial;
mod utils;
pub mod varint;

pub use config::Config;
pub use databox::Databox;
pub use dks::Dks;
pub use error::{Error, Result};
pub use fenwick::{Fenwick, FenwickValue};
pub use flex::{Endpoint, Flex};
pub use mflex::{Mflex, MflexState};
pub use multiarray::Multiarray;
pub use multilist::Multilist;
pub use serial::Serializable;
