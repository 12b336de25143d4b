#![forbid(unsafe_code)]

//! Just has shorthands for various int parsing things you'd want to do.
//!
//! Each function reads from the front of the slice, and panics if the slice
//! is too short, so callers pass in slices that came from fixed size reads.

use alloc::vec::Vec;

use crate::error::ImageResult;

#[inline]
#[must_use]
pub fn u16_le(bytes: &[u8]) -> u16 {
  u16::from_le_bytes([bytes[0], bytes[1]])
}

#[inline]
#[must_use]
pub fn u32_le(bytes: &[u8]) -> u32 {
  u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[inline]
#[must_use]
pub fn u32_be(bytes: &[u8]) -> u32 {
  u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Rounds `bits` up to whole bytes.
#[inline]
#[must_use]
pub const fn bits_to_bytes(bits: usize) -> usize {
  (bits / 8) + (bits % 8 != 0) as usize
}

/// Rounds `bytes` up to the next multiple of 4.
#[inline]
#[must_use]
pub const fn pad_to_4(bytes: usize) -> usize {
  ((bytes / 4) + (bytes % 4 != 0) as usize) * 4
}

/// Allocates a zeroed buffer, failing instead of aborting if the size is
/// unreasonable.
#[inline]
pub fn try_zeroed_vec(len: usize) -> ImageResult<Vec<u8>> {
  let mut v = Vec::new();
  v.try_reserve_exact(len)?;
  v.resize(len, 0);
  Ok(v)
}

#[test]
fn test_rounding_helpers() {
  assert_eq!(bits_to_bytes(0), 0);
  assert_eq!(bits_to_bytes(1), 1);
  assert_eq!(bits_to_bytes(8), 1);
  assert_eq!(bits_to_bytes(9), 2);
  assert_eq!(pad_to_4(0), 0);
  assert_eq!(pad_to_4(1), 4);
  assert_eq!(pad_to_4(4), 4);
  assert_eq!(pad_to_4(5), 8);
}
