//! Tunable parameters of the tiered containers, loadable from TOML.
//!
//! # Examples
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use datakit::Config;
//!
//! let config = Config::from_toml_str(
//!     r#"
//!     [multilist]
//!     fill = 3
//!     depth = 2
//!
//!     [mflex]
//!     level = 5
//!     "#,
//! )?;
//! assert_eq!(config.multilist.fill, 3);
//! assert_eq!(config.multilist.depth, 2);
//! assert_eq!(config.multiarray.row_max, 512);
//! assert_eq!(config.mflex.level, 5);
//! assert_eq!(config.mflex.preferred_len, 65536);
//! # Ok(())
//! # }
//! ```
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::flex::capacity::MAX_FILL;

/// Largest compression depth a chunked list accepts.
pub const MAX_DEPTH: u16 = (1 << 15) - 1;

/// Configuration of every tiered container.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Chunked list parameters.
    pub multilist: MultilistConfig,
    /// Tiered array parameters.
    pub multiarray: MultiarrayConfig,
    /// Compressed chunk parameters.
    pub mflex: MflexConfig,
}

/// Parameters of [`Multilist`](crate::Multilist).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultilistConfig {
    /// Index into [`FILL_LIMITS`](crate::flex::capacity::FILL_LIMITS).
    pub fill: u8,
    /// Number of chunks at each end kept uncompressed; 0 disables compression.
    pub depth: u16,
    /// Multiple of the fill limit at which the two-chunk tier splits into many chunks.
    pub full_factor: usize,
}

impl Default for MultilistConfig {
    fn default() -> Self {
        Self {
            fill: 1,
            depth: 0,
            full_factor: 3,
        }
    }
}

/// Parameters of [`Multiarray`](crate::Multiarray).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiarrayConfig {
    /// Row budget triggering tier upgrades and node splits.
    pub row_max: usize,
}

impl Default for MultiarrayConfig {
    fn default() -> Self {
        Self { row_max: 512 }
    }
}

/// Parameters of [`MflexState`](crate::MflexState).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MflexConfig {
    /// Preferred size of the decompression buffer in bytes.
    pub preferred_len: usize,
    /// zstd compression level.
    pub level: i32,
}

impl Default for MflexConfig {
    fn default() -> Self {
        Self {
            preferred_len: 65536,
            level: 1,
        }
    }
}

impl Config {
    /// Parses a configuration from TOML, filling absent keys with defaults.
    ///
    /// # Errors
    ///
    /// An error is returned if the text is not valid TOML for [`Config`] or a value is
    /// out of range.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// An error is returned if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Checks that every value is in range.
    ///
    /// # Errors
    ///
    /// An error is returned naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        let fill = self.multilist.fill;
        if fill > MAX_FILL {
            return Err(anyhow!("fill must be in 0..={MAX_FILL}, but got {fill}."));
        }
        let depth = self.multilist.depth;
        if depth > MAX_DEPTH {
            return Err(anyhow!("depth must be in 0..={MAX_DEPTH}, but got {depth}."));
        }
        let factor = self.multilist.full_factor;
        if factor < 2 {
            return Err(anyhow!("full_factor must be at least 2, but got {factor}."));
        }
        let row_max = self.multiarray.row_max;
        if row_max < 2 {
            return Err(anyhow!("row_max must be at least 2, but got {row_max}."));
        }
        Ok(())
    }
}
