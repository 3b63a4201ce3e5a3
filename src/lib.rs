//! # rmempool - A Self-Describing Memory Pool
//!
//! This crate provides a **free-list memory pool** that manages one fixed byte
//! buffer. All of the allocator's bookkeeping is stored *inside* that buffer,
//! so the buffer can be handed to another consumer which attaches to it and
//! keeps allocating where the first one left off.
//!
//! ## Overview
//!
//! ```text
//!   Pool Layout:
//!
//!   ┌─────────────────────────────────────────────────────────────────────────┐
//!   │                              BUFFER                                     │
//!   │                                                                         │
//!   │  start      heap_start                         top             end      │
//!   │    ▼          ▼                                 ▼               ▼       │
//!   │    ┌────────┬─┬───────┬───────┬───────┬────────┬───────────────┐        │
//!   │    │ header │ │ used  │ free  │ used  │  free  │   untouched   │ ...    │
//!   │    └────────┴─┴───────┴───────┴───────┴────────┴───────────────┘        │
//!   │     28 bytes                                                            │
//!   └─────────────────────────────────────────────────────────────────────────┘
//!
//!   Every heap byte is in exactly one of: a used block, a free block, or the
//!   untouched region above `top`.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rmempool
//!   ├── align      - align_up! macro and the validated Align type
//!   ├── block      - Block header encoding
//!   ├── state      - Pool header encoding
//!   ├── config     - PoolConfig (builder + TOML)
//!   ├── error      - PoolError
//!   ├── stats      - PoolStats / ListStats
//!   └── pool       - MemPool implementation
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rmempool::{MemPool, PoolConfig};
//!
//! let mut pool = MemPool::new(PoolConfig::default()).unwrap();
//!
//! let addr = pool.malloc(64).unwrap();
//! pool.bytes_mut(addr, 5).unwrap().copy_from_slice(b"hello");
//! assert_eq!(pool.bytes(addr, 5).unwrap(), b"hello");
//!
//! assert!(pool.free(addr));
//! assert!(!pool.free(addr));
//! ```
//!
//! ## How It Works
//!
//! Each block starts with an 8 byte header:
//!
//! ```text
//!   Single Block:
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │         User Data              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size: N + 8     │  │  ┌──────────────────────────┐  │
//!   │  │ next: addr / 0  │  │  │                          │  │
//!   │  └─────────────────┘  │  │     N bytes usable       │  │
//!   │       8 bytes         │  └──────────────────────────┘  │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Address returned to user
//! ```
//!
//! `next` threads the block into either the **used list** (most recent first)
//! or the **free list** (sorted by address). Allocation walks the free list
//! first-fit; a free block touching `top` may grow into untouched space. When
//! nothing fits, a new block is bumped off `top`.
//!
//! Freeing moves a block to the free list. With compaction on, adjacent free
//! blocks are merged and a free block that reaches `top` is given back to the
//! untouched region:
//!
//! ```text
//!   Before free(B):    ┌──────┬──────┬──────┬──────────────┐
//!                      │ A(f) │ B(u) │ C(f) │  untouched   │
//!                      └──────┴──────┴──────┴──────────────┘
//!                                           ▲ top
//!
//!   After free(B):     ┌──────────────────────────────────┐
//!                      │            untouched             │
//!                      └──────────────────────────────────┘
//!                      ▲ top
//! ```
//!
//! ## Limitations
//!
//! - **No internal locking**: sessions sharing a buffer must be serialized
//! - **Fixed extent**: the pool never grows past `end`
//! - **Linear scans**: free, realloc and allocation walk the lists
//! - **Lossy failed grow**: a `realloc` that has to move and then runs out of
//!   memory has already released the original block

pub mod align;
pub mod block;
mod config;
mod error;
mod pool;
pub mod state;
mod stats;

pub use align::Align;
pub use config::PoolConfig;
pub use error::PoolError;
pub use pool::{BlockIter, MemPool, NULL};
pub use state::PoolState;
pub use stats::{ListStats, PoolStats};
