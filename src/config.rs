//! Pool construction options.

use serde::{Deserialize, Serialize};

use crate::error::PoolError;

/// Options used to set up or attach a [`MemPool`](crate::MemPool).
///
/// The backing buffer is passed separately; `size` is only consulted when the
/// pool allocates its own buffer.
///
/// Options can also be loaded from TOML, missing keys take their defaults:
///
/// ```rust
/// use rmempool::PoolConfig;
///
/// let config = PoolConfig::from_toml_str("align = 16\nmin_split = 32").unwrap();
/// assert_eq!(config.align, 16);
/// assert_eq!(config.size, 0x1000);
/// assert!(config.compact);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
  /// Byte size of a pool created without a buffer.
  pub size: usize,
  /// Byte offset of the pool header. Sessions sharing a buffer must agree on it.
  pub start: u32,
  /// Exclusive end of the managed region, clamped to the buffer length.
  pub end: Option<u32>,
  /// Block alignment, a power of two >= 8.
  pub align: u32,
  /// Merge address-adjacent free blocks after every free.
  pub compact: bool,
  /// Split reused blocks that are larger than requested.
  pub split: bool,
  /// Minimum excess bytes for a split to happen, must exceed 8.
  pub min_split: u32,
  /// Read the header already present in the buffer instead of writing it.
  pub skip_initialization: bool,
}

impl Default for PoolConfig {
  fn default() -> Self {
    Self {
      size: 0x1000,
      start: 0,
      end: None,
      align: 8,
      compact: true,
      split: true,
      min_split: 16,
      skip_initialization: false,
    }
  }
}

impl PoolConfig {
  pub fn from_toml_str(source: &str) -> Result<Self, PoolError> {
    Ok(toml::from_str(source)?)
  }

  pub fn with_size(
    mut self,
    size: usize,
  ) -> Self {
    self.size = size;
    self
  }

  pub fn with_start(
    mut self,
    start: u32,
  ) -> Self {
    self.start = start;
    self
  }

  pub fn with_end(
    mut self,
    end: u32,
  ) -> Self {
    self.end = Some(end);
    self
  }

  pub fn with_align(
    mut self,
    align: u32,
  ) -> Self {
    self.align = align;
    self
  }

  pub fn with_compact(
    mut self,
    compact: bool,
  ) -> Self {
    self.compact = compact;
    self
  }

  pub fn with_split(
    mut self,
    split: bool,
  ) -> Self {
    self.split = split;
    self
  }

  pub fn with_min_split(
    mut self,
    min_split: u32,
  ) -> Self {
    self.min_split = min_split;
    self
  }

  pub fn with_skip_initialization(
    mut self,
    skip: bool,
  ) -> Self {
    self.skip_initialization = skip;
    self
  }
}
