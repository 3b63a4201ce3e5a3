use serde::Serialize;

/// Block count and total byte size (headers included) of one list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ListStats {
  pub count: u32,
  pub size: u32,
}

/// Read-only snapshot of a pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
  pub free: ListStats,
  pub used: ListStats,
  /// Current bump frontier.
  pub top: u32,
  /// Untouched space above `top` plus all free blocks.
  pub available: u32,
  /// Byte length of the backing buffer.
  pub total: usize,
}
