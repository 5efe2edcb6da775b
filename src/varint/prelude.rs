//! The prelude for varint codecs.
//!
//! The purpose of this module is to alleviate imports of traits for codecs:
//!
//! ```
//! # #![allow(unused_imports)]
//! use datakit::varint::prelude::*;
//! ```
pub use crate::varint::VarintCodec;
