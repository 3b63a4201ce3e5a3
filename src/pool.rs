use std::fmt;

use bytemuck::Pod;
use tracing::{debug, trace, warn};

use crate::{
  align::Align,
  block::{self, BlockHeader, HEADER_SIZE, block_address, data_address},
  config::PoolConfig,
  error::PoolError,
  state::{self, Field, PoolState, STATE_SIZE},
  stats::{ListStats, PoolStats},
};

/// Address value reserved as "no block".
pub const NULL: u32 = 0;

/// Validated placement of header and heap inside a buffer.
#[derive(Clone, Copy, Debug)]
struct Bounds {
  align: Align,
  heap_start: u32,
  end: u32,
}

impl Bounds {
  fn resolve(
    len: usize,
    config: &PoolConfig,
  ) -> Result<Self, PoolError> {
    let align = Align::new(config.align)?;
    if config.start % 4 != 0 {
      return Err(PoolError::InvalidStart(config.start));
    }
    if config.min_split <= HEADER_SIZE {
      return Err(PoolError::InvalidMinSplit(config.min_split));
    }
    let len = u32::try_from(len).map_err(|_| PoolError::BufferTooLarge(len))?;
    let end = config.end.map_or(len, |end| end.min(len));

    let mask = u64::from(align.get()) - 1;
    let heap_start = (u64::from(config.start) + u64::from(STATE_SIZE) + mask) & !mask;
    if heap_start >= u64::from(end) {
      return Err(PoolError::InsufficientRange {
        start: config.start,
        end,
      });
    }

    Ok(Self {
      align,
      heap_start: heap_start as u32,
      end,
    })
  }
}

/// A memory pool over a single byte buffer.
///
/// All bookkeeping (free list, used list, bump frontier, options) lives in a
/// 28 byte header at `start` inside the buffer, so any number of sessions can
/// operate on the same memory as long as they use the same `start` and never
/// run concurrently.
///
/// ```text
///   start          heap_start                       top               end
///   ▼              ▼                                ▼                 ▼
///   ┌────────┬─────┬────────┬────────┬──────┬───────┬─────────────────┬───────┐
///   │ header │ pad │ used A │ free B │ used C │ ... │   untouched     │ (n/a) │
///   └────────┴─────┴────────┴────────┴──────┴───────┴─────────────────┴───────┘
/// ```
///
/// Addresses handed out are byte offsets into the buffer. `0` is never a valid
/// address, so failures are reported as `None`.
///
/// # Thread Safety
///
/// The pool performs no synchronization. Sessions sharing a buffer must be
/// serialized by the caller, e.g. behind a mutex.
pub struct MemPool<B = Vec<u8>> {
  buf: B,
  start: u32,
  align: Align,
  heap_start: u32,
  config: PoolConfig,
}

impl MemPool<Vec<u8>> {
  /// Creates a pool over a fresh zeroed buffer of `config.size` bytes.
  pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
    let buf = vec![0u8; config.size];
    Self::with_buffer(buf, config)
  }
}

impl<B: AsRef<[u8]>> MemPool<B> {
  /// Attaches to a buffer whose header was written by another session.
  ///
  /// The buffer is only read here. `start` and `align` must match the values
  /// the buffer was initialized with.
  pub fn attach(
    buf: B,
    config: PoolConfig,
  ) -> Result<Self, PoolError> {
    let len = buf.as_ref().len();
    let bounds = Bounds::resolve(len, &config)?;
    let state = PoolState::load(buf.as_ref(), config.start);

    if state.align != bounds.align.get() {
      return Err(PoolError::Config(format!(
        "buffer header at {:#x} has alignment {}, expected {}",
        config.start,
        state.align,
        bounds.align.get()
      )));
    }
    if state.end as usize > len || state.top < bounds.heap_start || state.top > state.end {
      return Err(PoolError::Config(format!(
        "buffer header at {:#x} is not initialized (top {:#x}, end {:#x})",
        config.start, state.top, state.end
      )));
    }

    debug!(
      start = config.start,
      top = state.top,
      end = state.end,
      "attached to existing pool"
    );

    Ok(Self {
      buf,
      start: config.start,
      align: bounds.align,
      heap_start: bounds.heap_start,
      config: PoolConfig {
        skip_initialization: true,
        ..config
      },
    })
  }

  /// Options this session was created with.
  pub fn config(&self) -> &PoolConfig {
    &self.config
  }

  pub fn buffer(&self) -> &B {
    &self.buf
  }

  pub fn into_inner(self) -> B {
    self.buf
  }

  /// Address of the first block, which is also `top` right after initialization.
  #[inline]
  pub fn heap_start(&self) -> u32 {
    self.heap_start
  }

  #[inline]
  pub fn initial_top(&self) -> u32 {
    self.heap_start
  }

  #[inline]
  pub fn align(&self) -> Align {
    self.align
  }

  #[inline]
  pub fn top(&self) -> u32 {
    self.get(Field::Top)
  }

  #[inline]
  pub fn end(&self) -> u32 {
    self.get(Field::End)
  }

  /// Current header contents.
  pub fn state(&self) -> PoolState {
    PoolState::load(self.buf.as_ref(), self.start)
  }

  /// Iterates `(block address, block size)` over the free list, in address order.
  pub fn free_blocks(&self) -> BlockIter<'_> {
    BlockIter {
      buf: self.buf.as_ref(),
      block: self.get(Field::Free),
    }
  }

  /// Iterates `(block address, block size)` over the used list, most recent first.
  pub fn used_blocks(&self) -> BlockIter<'_> {
    BlockIter {
      buf: self.buf.as_ref(),
      block: self.get(Field::Used),
    }
  }

  /// Total size, header included, of the live block behind a data address.
  pub fn block_size(
    &self,
    addr: u32,
  ) -> Option<u32> {
    let target = block_address(addr)?;
    self
      .used_blocks()
      .find(|&(block, _)| block == target)
      .map(|(_, size)| size)
  }

  /// Walks both lists. Never mutates the pool.
  pub fn stats(&self) -> PoolStats {
    let free = self.free_blocks().totals();
    let used = self.used_blocks().totals();
    let top = self.top();

    PoolStats {
      free,
      used,
      top,
      available: self.end() - top + free.size,
      total: self.buf.as_ref().len(),
    }
  }

  /// Borrows `len` bytes at `addr`, or `None` if the range leaves the heap.
  pub fn bytes(
    &self,
    addr: u32,
    len: usize,
  ) -> Option<&[u8]> {
    let range = self.heap_range(addr, len)?;
    self.buf.as_ref().get(range)
  }

  /// Reads a `T` stored at `addr`. The address need not be aligned for `T`.
  pub fn read<T: Pod>(
    &self,
    addr: u32,
  ) -> Option<T> {
    self
      .bytes(addr, size_of::<T>())
      .map(bytemuck::pod_read_unaligned)
  }

  fn heap_range(
    &self,
    addr: u32,
    len: usize,
  ) -> Option<std::ops::Range<usize>> {
    let from = addr as usize;
    let to = from.checked_add(len)?;
    (addr >= self.heap_start && to <= self.end() as usize).then_some(from..to)
  }

  fn padded_size(
    &self,
    bytes: usize,
  ) -> Option<u32> {
    let mask = u64::from(self.get(Field::Align)) - 1;
    let total = u64::try_from(bytes).ok()?.checked_add(u64::from(HEADER_SIZE) + mask)?;
    u32::try_from(total & !mask).ok()
  }

  #[inline]
  fn get(
    &self,
    field: Field,
  ) -> u32 {
    state::get(self.buf.as_ref(), self.start, field)
  }

  #[inline]
  fn size_at(
    &self,
    block: u32,
  ) -> u32 {
    block::block_size(self.buf.as_ref(), block)
  }

  #[inline]
  fn next_at(
    &self,
    block: u32,
  ) -> u32 {
    block::block_next(self.buf.as_ref(), block)
  }

  /// Finds `target` in the used list, returning it with its predecessor.
  fn find_used(
    &self,
    target: u32,
  ) -> Option<(u32, u32)> {
    let mut block = self.get(Field::Used);
    let mut prev = NULL;
    while block != NULL {
      if block == target {
        return Some((prev, block));
      }
      prev = block;
      block = self.next_at(block);
    }
    None
  }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> MemPool<B> {
  /// Creates a pool over `buf`, writing a fresh header at `config.start`
  /// unless `config.skip_initialization` is set.
  pub fn with_buffer(
    mut buf: B,
    config: PoolConfig,
  ) -> Result<Self, PoolError> {
    if config.skip_initialization {
      return Self::attach(buf, config);
    }

    let bounds = Bounds::resolve(buf.as_ref().len(), &config)?;

    let mut state = PoolState {
      free: NULL,
      used: NULL,
      top: bounds.heap_start,
      end: bounds.end,
      align: bounds.align.get(),
      flags: 0,
      min_split: config.min_split,
    };
    state.set_compact(config.compact);
    state.set_split(config.split);
    state.store(buf.as_mut(), config.start);

    debug!(
      start = config.start,
      top = bounds.heap_start,
      end = bounds.end,
      align = bounds.align.get(),
      "initialized pool"
    );

    Ok(Self {
      buf,
      start: config.start,
      align: bounds.align,
      heap_start: bounds.heap_start,
      config,
    })
  }

  pub fn buffer_mut(&mut self) -> &mut B {
    &mut self.buf
  }

  pub fn bytes_mut(
    &mut self,
    addr: u32,
    len: usize,
  ) -> Option<&mut [u8]> {
    let range = self.heap_range(addr, len)?;
    self.buf.as_mut().get_mut(range)
  }

  /// Stores `value` at `addr`. Returns false if it would leave the heap.
  pub fn write<T: Pod>(
    &mut self,
    addr: u32,
    value: T,
  ) -> bool {
    match self.bytes_mut(addr, size_of::<T>()) {
      Some(dst) => {
        dst.copy_from_slice(bytemuck::bytes_of(&value));
        true
      }
      None => false,
    }
  }

  /// Allocates `bytes` bytes and returns the data address.
  ///
  /// Returns `None` for zero-sized requests and when the pool is exhausted.
  /// The free list is searched first-fit, in address order.
  pub fn malloc(
    &mut self,
    bytes: usize,
  ) -> Option<u32> {
    if bytes == 0 {
      return None;
    }
    let Some(padded) = self.padded_size(bytes) else {
      warn!(bytes, "allocation size exceeds address space");
      return None;
    };

    match self.claim(padded) {
      Some((block, excess)) => {
        self.split_excess(block, padded, excess);
        trace!(bytes, block, size = padded, "malloc");
        Some(data_address(block))
      }
      None => {
        warn!(bytes, top = self.top(), end = self.end(), "pool out of memory");
        None
      }
    }
  }

  /// Like [`malloc`](Self::malloc), zero-filling the requested bytes.
  pub fn calloc(
    &mut self,
    bytes: usize,
  ) -> Option<u32> {
    self.calloc_with(bytes, 0)
  }

  pub fn calloc_with(
    &mut self,
    bytes: usize,
    fill: u8,
  ) -> Option<u32> {
    let addr = self.malloc(bytes)?;
    if let Some(dst) = self.bytes_mut(addr, bytes) {
      dst.fill(fill);
    }
    Some(addr)
  }

  /// Resizes the block at `addr` to hold `bytes` bytes.
  ///
  /// Shrinking and growing the topmost block happen in place. Otherwise the
  /// block is freed, a new one allocated and the old contents copied over.
  ///
  /// If that new allocation fails the old block is already gone: a `None`
  /// from a growing resize means `addr` must no longer be used.
  pub fn realloc(
    &mut self,
    addr: u32,
    bytes: usize,
  ) -> Option<u32> {
    if bytes == 0 {
      return None;
    }
    let Some((prev, old)) = block_address(addr).and_then(|target| self.find_used(target)) else {
      warn!(addr, "realloc of unknown address");
      return None;
    };
    let padded = self.padded_size(bytes)?;

    let size = self.size_at(old);
    let is_top = old + size >= self.top();

    if padded <= size {
      if !self.split_excess(old, padded, size - padded) && is_top {
        self.set_size(old, padded);
        self.set(Field::Top, old + padded);
      }
      trace!(addr, from = size, to = padded, "realloc shrink");
      return Some(addr);
    }

    if is_top && u64::from(old) + u64::from(padded) < u64::from(self.end()) {
      self.set_size(old, padded);
      self.set(Field::Top, old + padded);
      trace!(addr, from = size, to = padded, "realloc grow in place");
      return Some(addr);
    }

    self.release(prev, old);
    let Some((block, excess)) = self.claim(padded) else {
      warn!(addr, bytes, "realloc failed, original block released");
      return None;
    };
    if block != old {
      let from = data_address(old) as usize..(old + size) as usize;
      self.buf.as_mut().copy_within(from, data_address(block) as usize);
    }
    self.split_excess(block, padded, excess);

    trace!(addr, new = data_address(block), size = padded, "realloc move");
    Some(data_address(block))
  }

  /// Releases the block at `addr`.
  ///
  /// Returns false, without touching the pool, if `addr` is not a live
  /// allocation. Freeing twice is therefore harmless.
  pub fn free(
    &mut self,
    addr: u32,
  ) -> bool {
    match block_address(addr).and_then(|target| self.find_used(target)) {
      Some((prev, block)) => {
        trace!(addr, block, size = self.size_at(block), "free");
        self.release(prev, block);
        true
      }
      None => {
        warn!(addr, "free of unknown address");
        false
      }
    }
  }

  /// Drops every block at once and rewinds `top` to the heap start.
  pub fn free_all(&mut self) {
    self.set(Field::Free, NULL);
    self.set(Field::Used, NULL);
    self.set(Field::Top, self.heap_start);
    debug!(top = self.heap_start, "freed all blocks");
  }

  /// Allocates room for `count` values of `T`.
  pub fn malloc_array<T: Pod>(
    &mut self,
    count: usize,
  ) -> Option<u32> {
    self.malloc(count.checked_mul(size_of::<T>())?)
  }

  pub fn calloc_array<T: Pod>(
    &mut self,
    count: usize,
  ) -> Option<u32> {
    self.calloc(count.checked_mul(size_of::<T>())?)
  }

  pub fn realloc_array<T: Pod>(
    &mut self,
    addr: u32,
    count: usize,
  ) -> Option<u32> {
    self.realloc(addr, count.checked_mul(size_of::<T>())?)
  }

  #[inline]
  fn set(
    &mut self,
    field: Field,
    value: u32,
  ) {
    state::set(self.buf.as_mut(), self.start, field, value);
  }

  #[inline]
  fn set_size(
    &mut self,
    block: u32,
    size: u32,
  ) {
    block::set_block_size(self.buf.as_mut(), block, size);
  }

  #[inline]
  fn set_next(
    &mut self,
    block: u32,
    next: u32,
  ) {
    block::set_block_next(self.buf.as_mut(), block, next);
  }

  /// Removes `block` from the list headed by `head`, given its predecessor.
  fn unlink(
    &mut self,
    head: Field,
    prev: u32,
    block: u32,
  ) {
    let next = self.next_at(block);
    if prev != NULL {
      self.set_next(prev, next);
    } else {
      self.set(head, next);
    }
  }

  fn push_used(
    &mut self,
    block: u32,
  ) {
    let used = self.get(Field::Used);
    self.set_next(block, used);
    self.set(Field::Used, block);
  }

  /// Takes a block of `padded` bytes off the free list or from the top.
  ///
  /// Returns the block, now on the used list, and the excess bytes a split
  /// could carve off it. The split itself is left to the caller.
  fn claim(
    &mut self,
    padded: u32,
  ) -> Option<(u32, u32)> {
    let end = u64::from(self.end());
    let top = self.top();

    let mut block = self.get(Field::Free);
    let mut prev = NULL;
    while block != NULL {
      let size = self.size_at(block);
      let is_top = block + size >= top;

      if is_top || size >= padded {
        // A top-adjacent block must grow into untouched space; nothing else can.
        if is_top && u64::from(block) + u64::from(padded) > end {
          return None;
        }
        self.unlink(Field::Free, prev, block);
        self.push_used(block);

        if is_top {
          self.set_size(block, padded);
          self.set(Field::Top, block + padded);
          return Some((block, 0));
        }
        return Some((block, size - padded));
      }

      prev = block;
      block = self.next_at(block);
    }

    if u64::from(top) + u64::from(padded) > end {
      return None;
    }
    let used = self.get(Field::Used);
    BlockHeader::new(padded, used).write(self.buf.as_mut(), top);
    self.set(Field::Used, top);
    self.set(Field::Top, top + padded);
    Some((top, 0))
  }

  /// Shrinks `block` to `padded` and frees the remainder when splitting is
  /// enabled and `excess` reaches the threshold. Returns true if it split.
  fn split_excess(
    &mut self,
    block: u32,
    padded: u32,
    excess: u32,
  ) -> bool {
    let state = self.state();
    if !state.split() || excess < state.min_split {
      return false;
    }

    self.set_size(block, padded);
    let rest = block + padded;
    BlockHeader::new(excess, NULL).write(self.buf.as_mut(), rest);
    trace!(block, rest, excess, "split");

    self.insert_free(rest);
    if state.compact() {
      self.compact();
    }
    true
  }

  /// Moves a used block onto the free list.
  fn release(
    &mut self,
    prev: u32,
    block: u32,
  ) {
    self.unlink(Field::Used, prev, block);
    self.insert_free(block);
    if self.state().compact() {
      self.compact();
    }
  }

  /// Inserts `block` into the free list, keeping it sorted by address.
  fn insert_free(
    &mut self,
    block: u32,
  ) {
    let mut ptr = self.get(Field::Free);
    let mut prev = NULL;
    while ptr != NULL && block > ptr {
      prev = ptr;
      ptr = self.next_at(ptr);
    }
    if prev != NULL {
      self.set_next(prev, block);
    } else {
      self.set(Field::Free, block);
    }
    self.set_next(block, ptr);
  }

  /// Merges runs of address-adjacent free blocks and hands a free block that
  /// reaches `top` back to the untouched region.
  fn compact(&mut self) {
    let mut block = self.get(Field::Free);
    let mut prev = NULL;

    while block != NULL {
      let mut last = block;
      let mut scan = self.next_at(block);
      while scan != NULL && last + self.size_at(last) == scan {
        last = scan;
        scan = self.next_at(scan);
      }

      if last != block {
        let merged = last - block + self.size_at(last);
        self.set_size(block, merged);

        let mut absorbed = self.next_at(block);
        while absorbed != NULL && absorbed != scan {
          let next = self.next_at(absorbed);
          self.set_next(absorbed, NULL);
          absorbed = next;
        }
        self.set_next(block, scan);
        trace!(block, size = merged, "merged free blocks");
      }

      let next = self.next_at(block);
      if block + self.size_at(block) >= self.top() {
        self.unlink(Field::Free, prev, block);
        self.set(Field::Top, block);
        trace!(top = block, "retracted top");
      } else {
        prev = block;
      }
      block = next;
    }
  }
}

impl<B: AsRef<[u8]>> fmt::Debug for MemPool<B> {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("MemPool")
      .field("start", &self.start)
      .field("heap_start", &self.heap_start)
      .field("state", &self.state())
      .finish_non_exhaustive()
  }
}

/// Iterator over one of the pool's block lists.
pub struct BlockIter<'a> {
  buf: &'a [u8],
  block: u32,
}

impl BlockIter<'_> {
  fn totals(self) -> ListStats {
    self.fold(ListStats::default(), |acc, (_, size)| ListStats {
      count: acc.count + 1,
      size: acc.size + size,
    })
  }
}

impl Iterator for BlockIter<'_> {
  type Item = (u32, u32);

  fn next(&mut self) -> Option<Self::Item> {
    if self.block == NULL {
      return None;
    }
    let current = self.block;
    let header = BlockHeader::read(self.buf, current);
    self.block = header.next;
    Some((current, header.size))
  }
}
