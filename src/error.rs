//! Construction-time errors.
//!
//! Per-call failures (out of memory, unknown address, zero-sized requests) are
//! not errors: they surface as `None` / `false` return values so the hot path
//! never builds an error value.

use thiserror::Error;

/// Errors raised while configuring or attaching a [`MemPool`](crate::MemPool).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  /// Alignment is not a power of two, or is below 8.
  #[error("invalid alignment {0}: must be a power of two and >= 8")]
  InvalidAlignment(u32),

  /// Split threshold does not exceed the block header size.
  #[error("illegal min split threshold: {0}, require at least 9")]
  InvalidMinSplit(u32),

  /// Header anchor is not word aligned.
  #[error("invalid start offset {0}: must be a multiple of 4")]
  InvalidStart(u32),

  /// Header plus heap start does not fit below `end`.
  #[error("insufficient address range ({start:#x} - {end:#x})")]
  InsufficientRange {
    /// Header anchor.
    start: u32,
    /// Resolved end of the managed region.
    end: u32,
  },

  /// Backing buffer cannot be addressed with 32-bit offsets.
  #[error("buffer of {0} bytes exceeds the 32-bit address space")]
  BufferTooLarge(usize),

  /// Configuration could not be parsed.
  #[error("invalid configuration: {0}")]
  Config(String),
}

impl From<toml::de::Error> for PoolError {
  fn from(err: toml::de::Error) -> Self {
    PoolError::Config(err.to_string())
  }
}
