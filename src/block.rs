use bytemuck::{Pod, Zeroable};

/// Size in bytes of a block header.
pub const HEADER_SIZE: u32 = size_of::<BlockHeader>() as u32;

/// Header stored in front of every free or used block.
///
/// ```text
///   ┌──────────────┬──────────────┬─────────────────────────────┐
///   │ size: u32    │ next: u32    │ data (size - 8 bytes)       │
///   └──────────────┴──────────────┴─────────────────────────────┘
///   ▲                             ▲
///   block address                 data address handed out
/// ```
///
/// `size` includes the header itself. `next` links the block into the free
/// or used list, `0` terminates the list.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct BlockHeader {
  pub size: u32,
  pub next: u32,
}

impl BlockHeader {
  pub fn new(
    size: u32,
    next: u32,
  ) -> Self {
    Self { size, next }
  }

  pub fn read(
    buf: &[u8],
    block: u32,
  ) -> Self {
    let at = block as usize;
    bytemuck::pod_read_unaligned(&buf[at..at + HEADER_SIZE as usize])
  }

  pub fn write(
    self,
    buf: &mut [u8],
    block: u32,
  ) {
    let at = block as usize;
    buf[at..at + HEADER_SIZE as usize].copy_from_slice(bytemuck::bytes_of(&self));
  }
}

#[inline]
pub const fn data_address(block: u32) -> u32 {
  block + HEADER_SIZE
}

/// Inverse of [`data_address`]; `None` for addresses that cannot carry a header.
#[inline]
pub const fn block_address(data: u32) -> Option<u32> {
  data.checked_sub(HEADER_SIZE)
}

#[inline]
pub(crate) fn read_word(
  buf: &[u8],
  at: u32,
) -> u32 {
  let at = at as usize;
  bytemuck::pod_read_unaligned(&buf[at..at + 4])
}

#[inline]
pub(crate) fn write_word(
  buf: &mut [u8],
  at: u32,
  value: u32,
) {
  let at = at as usize;
  buf[at..at + 4].copy_from_slice(&value.to_ne_bytes());
}

#[inline]
pub(crate) fn block_size(
  buf: &[u8],
  block: u32,
) -> u32 {
  read_word(buf, block)
}

#[inline]
pub(crate) fn set_block_size(
  buf: &mut [u8],
  block: u32,
  size: u32,
) {
  write_word(buf, block, size);
}

#[inline]
pub(crate) fn block_next(
  buf: &[u8],
  block: u32,
) -> u32 {
  read_word(buf, block + 4)
}

#[inline]
pub(crate) fn set_block_next(
  buf: &mut [u8],
  block: u32,
  next: u32,
) {
  write_word(buf, block + 4, next);
}
