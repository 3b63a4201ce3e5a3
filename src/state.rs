//! Pool header: the allocator state stored inside the managed buffer.
//!
//! ```text
//!   start
//!   ▼
//!   ┌──────┬──────┬──────┬──────┬───────┬───────┬───────────┐
//!   │ free │ used │ top  │ end  │ align │ flags │ min_split │   7 x u32
//!   └──────┴──────┴──────┴──────┴───────┴───────┴───────────┘
//!   flags: bit 0 = compact, bit 1 = split
//! ```
//!
//! Every session attached to the same buffer reads and writes these words, so
//! the layout is fixed.

use bytemuck::{Pod, Zeroable};

use crate::block::{read_word, write_word};

/// Size in bytes of the pool header.
pub const STATE_SIZE: u32 = size_of::<PoolState>() as u32;

pub const FLAG_COMPACT: u32 = 1;
pub const FLAG_SPLIT: u32 = 2;

/// Word slots of the pool header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Field {
  Free = 0,
  Used = 1,
  Top = 2,
  End = 3,
  Align = 4,
  Flags = 5,
  MinSplit = 6,
}

impl Field {
  #[inline]
  const fn offset(self) -> u32 {
    self as u32 * 4
  }
}

/// Snapshot of the pool header.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PoolState {
  /// First block of the free list, `0` if empty.
  pub free: u32,
  /// First block of the used list, `0` if empty.
  pub used: u32,
  /// Bump frontier.
  pub top: u32,
  /// Exclusive end of the heap.
  pub end: u32,
  pub align: u32,
  pub flags: u32,
  pub min_split: u32,
}

impl PoolState {
  pub fn load(
    buf: &[u8],
    start: u32,
  ) -> Self {
    let at = start as usize;
    bytemuck::pod_read_unaligned(&buf[at..at + STATE_SIZE as usize])
  }

  pub fn store(
    &self,
    buf: &mut [u8],
    start: u32,
  ) {
    let at = start as usize;
    buf[at..at + STATE_SIZE as usize].copy_from_slice(bytemuck::bytes_of(self));
  }

  #[inline]
  pub fn compact(&self) -> bool {
    self.flags & FLAG_COMPACT != 0
  }

  #[inline]
  pub fn split(&self) -> bool {
    self.flags & FLAG_SPLIT != 0
  }

  pub fn set_compact(
    &mut self,
    on: bool,
  ) {
    self.set_flag(FLAG_COMPACT, on);
  }

  pub fn set_split(
    &mut self,
    on: bool,
  ) {
    self.set_flag(FLAG_SPLIT, on);
  }

  fn set_flag(
    &mut self,
    mask: u32,
    on: bool,
  ) {
    if on {
      self.flags |= mask;
    } else {
      self.flags &= !mask;
    }
  }
}

/// Reads one header word of the pool anchored at `start`.
#[inline]
pub(crate) fn get(
  buf: &[u8],
  start: u32,
  field: Field,
) -> u32 {
  read_word(buf, start + field.offset())
}

#[inline]
pub(crate) fn set(
  buf: &mut [u8],
  start: u32,
  field: Field,
  value: u32,
) {
  write_word(buf, start + field.offset(), value);
}
