//! Two workers allocating from one buffer.
//!
//! The buffer sits behind a mutex; each worker attaches a short-lived session
//! while holding the lock. Only the first session writes the header.

use std::{sync::Arc, thread};

use parking_lot::Mutex;
use rmempool::{MemPool, PoolConfig, PoolError};

const WORKERS: u32 = 2;
const ROUNDS: u32 = 50;

fn main() -> Result<(), PoolError> {
  let config = PoolConfig::default().with_start(16).with_align(16);

  let mut buf = vec![0u8; 64 * 1024];
  MemPool::with_buffer(&mut buf[..], config.clone())?;
  let shared = Arc::new(Mutex::new(buf));

  let handles: Vec<_> = (0..WORKERS)
    .map(|worker| {
      let shared = Arc::clone(&shared);
      let config = config.clone().with_skip_initialization(true);

      thread::spawn(move || -> Result<Vec<u32>, PoolError> {
        let mut kept = Vec::new();
        for round in 0..ROUNDS {
          let mut guard = shared.lock();
          let mut pool = MemPool::attach(&mut guard[..], config.clone())?;

          if let Some(addr) = pool.malloc(24 + (round as usize % 5) * 16) {
            pool.write(addr, worker * 1000 + round);
            if round % 3 == 0 {
              pool.free(addr);
            } else {
              kept.push(addr);
            }
          }
        }
        Ok(kept)
      })
    })
    .collect();

  let mut kept = Vec::new();
  for handle in handles {
    match handle.join() {
      Ok(result) => kept.extend(result?),
      Err(_) => eprintln!("worker panicked"),
    }
  }

  let guard = shared.lock();
  let pool = MemPool::attach(&guard[..], config)?;
  let stats = pool.stats();
  println!(
    "kept {} blocks, pool reports used = {} / {} bytes, free = {} / {} bytes, top = {:#x}",
    kept.len(),
    stats.used.count,
    stats.used.size,
    stats.free.count,
    stats.free.size,
    stats.top,
  );
  for addr in kept.iter().take(5) {
    println!("  {:#x} -> {:?}", addr, pool.read::<u32>(*addr));
  }

  Ok(())
}
