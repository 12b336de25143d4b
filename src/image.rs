#![forbid(unsafe_code)]

//! The output side of decoding: where pixels and palette colors go.
//!
//! Decoders never pick a concrete image type. Instead the caller hands in
//! factories ([`BitmapFactory`], [`PaletteFactory`]) and the decoder asks them
//! for storage once the header says how big the image is. Any
//! `FnMut(width, height, color_capacity) -> ImageResult<B>` works as a bitmap
//! factory, and any `FnMut(color_count) -> P` works as a palette factory.
//!
//! Making a bitmap can fail, since the size comes straight from the file
//! header. Palettes never hold more than 256 colors.
//!
//! [`VecBitmap`] and [`VecPalette`] are heap-allocated defaults for when the
//! caller doesn't have an image type of their own.

use alloc::{vec, vec::Vec};

use crate::{
  error::{ImageError, ImageResult},
  pixel_formats::{ColorConverter, RGB888},
};

/// Converts an `(x,y)` position within a given `width` 2D space into a linear
/// index.
///
/// This is how every [`BitmapSink`] is addressed: row-major, with `x` varying
/// fastest.
#[inline]
#[must_use]
pub const fn xy_width_to_index(x: u32, y: u32, width: u32) -> usize {
  (y as usize) * (width as usize) + (x as usize)
}

/// Somewhere to write pixel values.
pub trait BitmapSink {
  fn width(&self) -> u32;
  fn height(&self) -> u32;

  /// Writes the value at a linear (row-major) offset.
  fn set_offset(&mut self, offset: usize, value: u32);

  /// Writes the value at an `(x,y)` position.
  #[inline]
  fn set_xy(&mut self, x: u32, y: u32, value: u32) {
    let i = xy_width_to_index(x, y, self.width());
    self.set_offset(i, value)
  }
}

/// Somewhere to write palette colors.
pub trait PaletteSink {
  /// The number of slots, fixed when the palette was made.
  fn color_count(&self) -> usize;

  fn set_color(&mut self, index: usize, color: RGB888);

  /// Marks the slot as fully transparent.
  fn make_transparent(&mut self, index: usize);
}

/// Makes bitmaps once a decoder knows the image size.
pub trait BitmapFactory {
  type Bitmap: BitmapSink;

  /// * `color_capacity` is the number of distinct values the bitmap must be
  ///   able to hold (or the largest direct color value, for 16-bit color).
  ///
  /// Errors are passed back out of the decoder unchanged.
  fn make_bitmap(&mut self, width: u32, height: u32, color_capacity: u32) -> ImageResult<Self::Bitmap>;
}
impl<F, B> BitmapFactory for F
where
  F: FnMut(u32, u32, u32) -> ImageResult<B>,
  B: BitmapSink,
{
  type Bitmap = B;
  #[inline]
  fn make_bitmap(&mut self, width: u32, height: u32, color_capacity: u32) -> ImageResult<B> {
    self(width, height, color_capacity)
  }
}

/// Makes palettes once a decoder knows how many colors there are.
pub trait PaletteFactory {
  type Palette: PaletteSink;

  fn make_palette(&mut self, color_count: usize) -> Self::Palette;
}
impl<F, P> PaletteFactory for F
where
  F: FnMut(usize) -> P,
  P: PaletteSink,
{
  type Palette = P;
  #[inline]
  fn make_palette(&mut self, color_count: usize) -> P {
    self(color_count)
  }
}

/// How the values in a decoded bitmap should be turned into colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Colors<P> {
  /// The bitmap holds indexes into this palette.
  Palette(P),
  /// The bitmap holds direct colors, in the converter's input colorspace.
  Converter(ColorConverter),
}
impl<P> Colors<P> {
  #[inline]
  #[must_use]
  pub fn palette(&self) -> Option<&P> {
    match self {
      Self::Palette(p) => Some(p),
      Self::Converter(_) => None,
    }
  }

  #[inline]
  #[must_use]
  pub fn converter(&self) -> Option<&ColorConverter> {
    match self {
      Self::Palette(_) => None,
      Self::Converter(c) => Some(c),
    }
  }
}

/// The output of a decode: the bitmap (if one was requested) and the colors
/// (if the format has any).
pub type Decoded<B, P> = (Option<B>, Option<Colors<P>>);

/// A heap-allocated bitmap.
///
/// It also tracks which cells were written, so that the caller can check that
/// a decode filled in the entire image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VecBitmap {
  width: u32,
  height: u32,
  color_capacity: u32,
  values: Vec<u32>,
  written: Vec<bool>,
}
impl VecBitmap {
  /// Makes a zeroed bitmap. Has the right signature to be a [`BitmapFactory`].
  ///
  /// ## Failure
  /// * `Alloc` if the storage can't be reserved.
  #[inline]
  pub fn new(width: u32, height: u32, color_capacity: u32) -> ImageResult<Self> {
    let count = (width as usize).checked_mul(height as usize).ok_or(ImageError::Alloc)?;
    let mut values = Vec::new();
    values.try_reserve_exact(count)?;
    values.resize(count, 0);
    let mut written = Vec::new();
    written.try_reserve_exact(count)?;
    written.resize(count, false);
    Ok(Self { width, height, color_capacity, values, written })
  }

  #[inline]
  #[must_use]
  pub const fn color_capacity(&self) -> u32 {
    self.color_capacity
  }

  /// All values, row-major.
  #[inline]
  #[must_use]
  pub fn values(&self) -> &[u32] {
    &self.values
  }

  /// Gets the value at the position, or `None` if the position is out of
  /// bounds.
  #[inline]
  #[must_use]
  pub fn get(&self, x: u32, y: u32) -> Option<u32> {
    if x < self.width && y < self.height {
      Some(self.values[xy_width_to_index(x, y, self.width)])
    } else {
      None
    }
  }

  /// If every cell has been written at least once.
  #[inline]
  #[must_use]
  pub fn is_fully_written(&self) -> bool {
    self.written.iter().all(|w| *w)
  }
}
impl BitmapSink for VecBitmap {
  #[inline]
  fn width(&self) -> u32 {
    self.width
  }
  #[inline]
  fn height(&self) -> u32 {
    self.height
  }
  #[inline]
  fn set_offset(&mut self, offset: usize, value: u32) {
    if let Some(v) = self.values.get_mut(offset) {
      *v = value;
      self.written[offset] = true;
    } else {
      // attempted out of bounds write, which the decoders already guard
      // against, so it's just dropped.
    }
  }
}

/// One slot of a [`VecPalette`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PaletteEntry {
  pub color: RGB888,
  pub transparent: bool,
}

/// A heap-allocated palette.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VecPalette {
  entries: Vec<PaletteEntry>,
}
impl VecPalette {
  /// Makes a palette of opaque black. Has the right signature to be a
  /// [`PaletteFactory`].
  #[inline]
  #[must_use]
  pub fn new(color_count: usize) -> Self {
    Self { entries: vec![PaletteEntry::default(); color_count] }
  }

  #[inline]
  #[must_use]
  pub fn entries(&self) -> &[PaletteEntry] {
    &self.entries
  }

  #[inline]
  #[must_use]
  pub fn get(&self, index: usize) -> Option<RGB888> {
    self.entries.get(index).map(|e| e.color)
  }
}
impl PaletteSink for VecPalette {
  #[inline]
  fn color_count(&self) -> usize {
    self.entries.len()
  }
  #[inline]
  fn set_color(&mut self, index: usize, color: RGB888) {
    if let Some(e) = self.entries.get_mut(index) {
      e.color = color;
    }
  }
  #[inline]
  fn make_transparent(&mut self, index: usize) {
    if let Some(e) = self.entries.get_mut(index) {
      e.transparent = true;
    }
  }
}

#[test]
fn test_vec_bitmap_tracks_writes() {
  let mut b = VecBitmap::new(2, 2, 4).unwrap();
  assert!(!b.is_fully_written());
  b.set_xy(0, 0, 1);
  b.set_xy(1, 0, 2);
  b.set_offset(2, 3);
  assert!(!b.is_fully_written());
  b.set_xy(1, 1, 0);
  assert!(b.is_fully_written());
  assert_eq!(b.values(), &[1, 2, 3, 0]);
  assert_eq!(b.get(0, 1), Some(3));
  assert_eq!(b.get(2, 0), None);
  // out of bounds writes are dropped
  b.set_offset(4, 9);
  assert_eq!(b.values().len(), 4);
}

#[test]
fn test_vec_bitmap_too_big_to_allocate() {
  assert_eq!(VecBitmap::new(u32::MAX, u32::MAX, 2), Err(ImageError::Alloc));
  assert_eq!(VecBitmap::new(0, u32::MAX, 2).unwrap().values().len(), 0);
}
