//! # Pool Invariant Tests
//!
//! Exercises the pool through its public API and checks the invariants that
//! must hold after every operation:
//! - no two blocks overlap
//! - every heap byte is used, free, or above `top`
//! - the free list stays address ordered
//! - data written to a live block survives other pool traffic

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rmempool::{MemPool, PoolConfig, block::HEADER_SIZE};

fn scenario_pool() -> MemPool {
  MemPool::new(
    PoolConfig::default()
      .with_size(4096)
      .with_align(8)
      .with_start(0)
      .with_compact(true)
      .with_split(true)
      .with_min_split(16),
  )
  .unwrap()
}

/// Checks overlap, ordering, and byte conservation.
fn assert_consistent(pool: &MemPool) {
  let used: Vec<(u32, u32)> = pool.used_blocks().collect();
  let free: Vec<(u32, u32)> = pool.free_blocks().collect();
  let top = pool.top();
  let end = pool.end();

  assert!(top <= end, "top {top} past end {end}");
  assert!(
    free.windows(2).all(|w| w[0].0 < w[1].0),
    "free list not address ordered: {free:?}"
  );

  let mut all: Vec<(u32, u32)> = used.iter().chain(free.iter()).copied().collect();
  all.sort_unstable();
  for (block, size) in &all {
    assert!(*block >= pool.heap_start());
    assert!(block + size <= top, "block {block}+{size} above top {top}");
    assert_eq!(size % pool.align().get(), 0);
  }
  for pair in all.windows(2) {
    let (a, a_size) = pair[0];
    let (b, _) = pair[1];
    assert!(a + a_size <= b, "blocks {a} and {b} overlap");
  }

  let used_bytes: u32 = used.iter().map(|(_, size)| size).sum();
  let free_bytes: u32 = free.iter().map(|(_, size)| size).sum();
  assert_eq!(used_bytes + free_bytes + (end - top), end - pool.heap_start());

  let stats = pool.stats();
  assert_eq!(stats.used.count as usize, used.len());
  assert_eq!(stats.free.count as usize, free.len());
  assert_eq!(stats.available, end - top + free_bytes);
}

#[test]
fn test_first_fit_split_scenario() {
  let mut pool = scenario_pool();

  let a1 = pool.malloc(64).unwrap();
  let a2 = pool.malloc(128).unwrap();
  assert!(a2 > a1);
  assert!(a1 + 64 <= a2);
  assert_eq!(pool.block_size(a1), Some(72));

  assert!(pool.free(a1));
  assert_eq!(pool.stats().free.count, 1);

  let a3 = pool.malloc(32).unwrap();
  assert_eq!(a3, a1);
  assert_eq!(pool.block_size(a3), Some(40));
  assert_eq!(
    pool.free_blocks().collect::<Vec<_>>(),
    vec![(a1 - HEADER_SIZE + 40, 32)]
  );

  let stats = pool.stats();
  assert_eq!(stats.used.count, 2);
  assert_eq!(stats.free.count, 1);
  assert_consistent(&pool);
}

#[test]
fn test_zero_sized_requests() {
  let mut pool = scenario_pool();
  pool.malloc(24).unwrap();
  let before = pool.stats();

  assert_eq!(pool.malloc(0), None);
  assert_eq!(pool.calloc(0), None);
  assert_eq!(pool.stats(), before);
}

#[test]
fn test_realloc_scenarios() {
  let mut pool = scenario_pool();

  // shrink with split: the excess becomes a free block
  let a = pool.malloc(128).unwrap();
  let b = pool.malloc(16).unwrap();
  assert_eq!(pool.realloc(a, 16), Some(a));
  assert_eq!(pool.block_size(a), Some(24));
  assert_eq!(pool.stats().free.count, 1);
  assert_consistent(&pool);

  // grow the topmost block in place
  let top_before = pool.top();
  assert_eq!(pool.realloc(b, 200), Some(b));
  assert_eq!(pool.top(), top_before + 208 - 24);
  assert_consistent(&pool);

  // grow a block that is boxed in: it moves, keeping its prefix
  pool.bytes_mut(a, 16).unwrap().copy_from_slice(b"0123456789abcdef");
  let moved = pool.realloc(a, 300).unwrap();
  assert_ne!(moved, a);
  assert_eq!(pool.bytes(moved, 16).unwrap(), b"0123456789abcdef");
  assert_eq!(pool.block_size(a), None);
  assert!(pool.used_blocks().all(|(block, _)| block + HEADER_SIZE != a));
  assert!(!pool.free(a));
  assert_consistent(&pool);
}

#[test]
fn test_double_free_is_harmless() {
  let mut pool = scenario_pool();
  let a = pool.malloc(40).unwrap();
  let _b = pool.malloc(40).unwrap();

  assert!(pool.free(a));
  let after = pool.stats();
  assert!(!pool.free(a));
  assert_eq!(pool.stats(), after);
}

#[test]
fn test_data_addresses_are_aligned() {
  for align in [8u32, 16, 32, 64] {
    for start in [0u32, 4, 12, 100] {
      let mut pool = MemPool::new(
        PoolConfig::default()
          .with_size(8192)
          .with_align(align)
          .with_start(start),
      )
      .unwrap();

      assert_ne!(pool.heap_start(), 0);
      for n in [1usize, 7, 8, 9, 31, 100, 257] {
        let addr = pool.malloc(n).unwrap();
        assert_eq!((addr - HEADER_SIZE) % align, 0, "align {align} start {start} n {n}");
      }
      assert_consistent(&pool);
    }
  }
}

#[test]
fn test_free_all_resets() {
  let mut pool = scenario_pool();
  let initial = pool.stats();

  let blocks: Vec<u32> = (1..20).filter_map(|n| pool.malloc(n * 10)).collect();
  for addr in blocks.iter().step_by(3) {
    pool.free(*addr);
  }
  pool.free_all();

  let stats = pool.stats();
  assert_eq!(stats.used.count, 0);
  assert_eq!(stats.free.count, 0);
  assert_eq!(stats.top, pool.initial_top());
  assert_eq!(stats, initial);
}

#[test]
fn test_exhaustion_leaves_pool_valid() {
  let mut pool = MemPool::new(PoolConfig::default().with_size(1024)).unwrap();

  let mut live = Vec::new();
  while let Some(addr) = pool.malloc(40) {
    live.push(addr);
  }
  assert!(!live.is_empty());
  let before = pool.stats();
  assert_eq!(pool.malloc(40), None);
  assert_eq!(pool.stats(), before);
  assert_consistent(&pool);

  for addr in live {
    assert!(pool.free(addr));
  }
  assert_eq!(pool.top(), pool.initial_top());
  assert_eq!(pool.stats().free.count, 0);
}

#[test]
fn test_shared_buffer_sessions() {
  let config = PoolConfig::default().with_start(64).with_align(16);
  let mut buf = vec![0u8; 2048];

  let a = {
    let mut first = MemPool::with_buffer(&mut buf[..], config.clone()).unwrap();
    let a = first.malloc(100).unwrap();
    first.bytes_mut(a, 4).unwrap().copy_from_slice(&[1, 2, 3, 4]);
    a
  };

  let b = {
    let mut second =
      MemPool::with_buffer(&mut buf[..], config.clone().with_skip_initialization(true)).unwrap();
    assert_eq!(second.bytes(a, 4).unwrap(), &[1, 2, 3, 4]);
    let b = second.malloc(100).unwrap();
    assert!(b > a);
    assert!(second.free(a));
    b
  };

  let reader = MemPool::attach(&buf[..], config).unwrap();
  let stats = reader.stats();
  assert_eq!(stats.used.count, 1);
  assert_eq!(reader.block_size(b), Some(112));
}

#[test]
fn test_config_from_toml() {
  let config = PoolConfig::from_toml_str(
    r#"
      size = 2048
      align = 32
      split = false
    "#,
  )
  .unwrap();
  let mut pool = MemPool::new(config).unwrap();

  assert_eq!(pool.stats().total, 2048);
  assert_eq!(pool.heap_start(), 32);
  let a = pool.malloc(100).unwrap();
  assert_eq!(pool.block_size(a), Some(128));
}

#[test]
fn test_random_churn_keeps_invariants() {
  for (seed, compact, split) in [(1u64, true, true), (2, false, true), (3, true, false), (4, false, false)] {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut pool = MemPool::new(
      PoolConfig::default()
        .with_size(16 * 1024)
        .with_compact(compact)
        .with_split(split),
    )
    .unwrap();
    let mut live: HashMap<u32, (usize, u8)> = HashMap::new();

    for step in 0..2000u32 {
      let roll = rng.gen_range(0..10);
      if roll < 5 || live.is_empty() {
        let n = rng.gen_range(1..400);
        if let Some(addr) = pool.malloc(n) {
          let tag = (step % 251) as u8;
          pool.bytes_mut(addr, n).unwrap().fill(tag);
          assert!(live.insert(addr, (n, tag)).is_none());
        }
      } else if roll < 8 {
        let addr = *live.keys().nth(rng.gen_range(0..live.len())).unwrap();
        assert!(pool.free(addr));
        live.remove(&addr);
      } else {
        let addr = *live.keys().nth(rng.gen_range(0..live.len())).unwrap();
        let (old_n, tag) = live.remove(&addr).unwrap();
        let n = rng.gen_range(1..600);
        if let Some(new_addr) = pool.realloc(addr, n) {
          let kept = old_n.min(n);
          assert!(pool.bytes(new_addr, kept).unwrap().iter().all(|&x| x == tag));
          pool.bytes_mut(new_addr, n).unwrap().fill(tag);
          live.insert(new_addr, (n, tag));
        }
      }

      assert_consistent(&pool);
      for (&addr, &(n, tag)) in &live {
        assert!(
          pool.bytes(addr, n).unwrap().iter().all(|&x| x == tag),
          "seed {seed} step {step}: block {addr} corrupted"
        );
      }
    }
  }
}
