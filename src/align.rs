use crate::error::PoolError;

/// Rounds `value` up to the next multiple of `align`, which must be a power of two.
///
/// # Examples
///
/// ```rust
/// use rmempool::align_up;
///
/// assert_eq!(align_up!(13u32, 8u32), 16);
/// assert_eq!(align_up!(32u32, 16u32), 32);
/// assert_eq!(align_up!(33u32, 16u32), 48);
/// ```
#[macro_export]
macro_rules! align_up {
  ($value:expr, $align:expr) => {
    ($value + ($align - 1)) & !($align - 1)
  };
}

/// Block alignment of a pool: a power of two, at least 8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Align(u32);

impl Align {
  /// Smallest accepted alignment.
  pub const MIN: Align = Align(8);

  pub fn new(value: u32) -> Result<Self, PoolError> {
    if value < 8 || value % 8 != 0 || !value.is_power_of_two() {
      return Err(PoolError::InvalidAlignment(value));
    }
    Ok(Self(value))
  }

  #[inline]
  pub const fn get(self) -> u32 {
    self.0
  }

  /// Rounds `value` up to this alignment.
  #[inline]
  pub const fn align(
    self,
    value: u32,
  ) -> u32 {
    align_up!(value, self.0)
  }

  #[inline]
  pub const fn is_aligned(
    self,
    value: u32,
  ) -> bool {
    value & (self.0 - 1) == 0
  }
}

impl Default for Align {
  fn default() -> Self {
    Self::MIN
  }
}

impl TryFrom<u32> for Align {
  type Error = PoolError;

  fn try_from(value: u32) -> Result<Self, Self::Error> {
    Self::new(value)
  }
}

impl From<Align> for u32 {
  fn from(align: Align) -> Self {
    align.0
  }
}
