use rmempool::{MemPool, PoolConfig, PoolError};

/// Prints the pool's list totals and bump frontier.
fn print_stats(
  label: &str,
  pool: &MemPool,
) {
  let stats = pool.stats();
  println!(
    "[{}] used = {} blocks / {} bytes, free = {} blocks / {} bytes, top = {:#x}, available = {}",
    label, stats.used.count, stats.used.size, stats.free.count, stats.free.size, stats.top, stats.available,
  );
}

fn print_alloc(
  pool: &MemPool,
  bytes: usize,
  addr: u32,
) {
  println!(
    "Allocated {} bytes, address = {:#x}, block size = {:?}, top = {:#x}",
    bytes,
    addr,
    pool.block_size(addr),
    pool.top(),
  );
}

fn main() -> Result<(), PoolError> {
  // 4 KiB pool, 8 byte alignment, compaction and splitting on.
  let mut pool = MemPool::new(PoolConfig::default())?;
  println!("heap starts at {:#x}, ends at {:#x}", pool.heap_start(), pool.end());
  print_stats("start", &pool);

  // --------------------------------------------------------------------
  // 1) Allocate a u32 and write to it.
  // --------------------------------------------------------------------
  let first = pool.malloc(4).unwrap_or_default();
  println!("\n[1] Allocate u32");
  print_alloc(&pool, 4, first);
  pool.write(first, 0xDEAD_BEEFu32);
  println!("[1] Value read back = {:#X}", pool.read::<u32>(first).unwrap_or_default());

  // --------------------------------------------------------------------
  // 2) Allocate 12 bytes: sizes are padded to the alignment.
  // --------------------------------------------------------------------
  let second = pool.calloc_with(12, 0xAB).unwrap_or_default();
  println!("\n[2] Allocate [u8; 12] filled with 0xAB");
  print_alloc(&pool, 12, second);

  // --------------------------------------------------------------------
  // 3) Allocate an array of u16.
  // --------------------------------------------------------------------
  let third = pool.malloc_array::<u16>(16).unwrap_or_default();
  println!("\n[3] Allocate [u16; 16]");
  print_alloc(&pool, 32, third);
  for i in 0..16u16 {
    pool.write(third + u32::from(i) * 2, i);
  }
  print_stats("after 3 allocations", &pool);

  // --------------------------------------------------------------------
  // 4) Free the first block: it moves onto the free list.
  // --------------------------------------------------------------------
  println!("\n[4] free({:#x}) = {}", first, pool.free(first));
  println!("[4] free({:#x}) again = {}", first, pool.free(first));
  print_stats("after free", &pool);

  // --------------------------------------------------------------------
  // 5) A small request reuses the freed block.
  // --------------------------------------------------------------------
  let fourth = pool.malloc(2).unwrap_or_default();
  println!("\n[5] Allocate [u8; 2]");
  print_alloc(&pool, 2, fourth);
  println!(
    "[5] fourth == first? {}",
    if fourth == first {
      "Yes, it reused the freed block"
    } else {
      "No, it allocated somewhere else"
    }
  );

  // --------------------------------------------------------------------
  // 6) Grow the topmost block in place, then a buried one.
  // --------------------------------------------------------------------
  let grown = pool.realloc_array::<u16>(third, 64).unwrap_or_default();
  println!("\n[6] realloc top block {:#x} -> {:#x}", third, grown);
  let moved = pool.realloc(second, 256).unwrap_or_default();
  println!("[6] realloc buried block {:#x} -> {:#x}", second, moved);
  println!(
    "[6] first byte after move = {:#X}",
    pool.read::<u8>(moved).unwrap_or_default()
  );
  print_stats("after realloc", &pool);

  // --------------------------------------------------------------------
  // 7) Exhaust the pool.
  // --------------------------------------------------------------------
  let big = pool.malloc(64 * 1024);
  println!("\n[7] Allocate 64 KiB from a 4 KiB pool: {:?}", big);

  // --------------------------------------------------------------------
  // 8) Reset.
  // --------------------------------------------------------------------
  pool.free_all();
  print_stats("after free_all", &pool);

  Ok(())
}
