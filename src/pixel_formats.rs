//! Module for pixel formats and color conversion.
//!
//! Decoders produce one of two things for each pixel:
//! * **An index** into a palette of [`RGB888`] colors, for formats that carry
//!   a color table (or that have one built for them, like Netpbm).
//! * **A direct color**, packed into 16 bits as RGB565. The source data might
//!   be any of the [`Colorspace`] layouts, and a [`ColorConverter`] packs it
//!   down to the 16 bit form.
//!
//! ## Packing RGB565
//! To *reduce* the bit depth of a channel, just keep the top bits. When a 5
//! bit channel must become a 6 bit channel (the green of RGB555 going into
//! RGB565), the bit pattern is replicated downward so that full intensity stays
//! full intensity.

use bitfrob::u8_replicate_bits;
use bytemuck::{Pod, Zeroable};

/// An RGB value, 8-bits per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(C)]
pub struct RGB888 {
  pub r: u8,
  pub g: u8,
  pub b: u8,
}
impl RGB888 {
  /// Makes a gray value, with the same intensity in all three channels.
  #[inline]
  #[must_use]
  pub const fn gray(y: u8) -> Self {
    Self { r: y, g: y, b: y }
  }

  /// Packs the color as `0xRRGGBB`.
  #[inline]
  #[must_use]
  pub const fn to_u32(self) -> u32 {
    (self.r as u32) << 16 | (self.g as u32) << 8 | (self.b as u32)
  }
}
impl From<[u8; 3]> for RGB888 {
  #[inline]
  #[must_use]
  fn from([r, g, b]: [u8; 3]) -> Self {
    Self { r, g, b }
  }
}
impl From<RGB888> for [u8; 3] {
  #[inline]
  #[must_use]
  fn from(c: RGB888) -> Self {
    [c.r, c.g, c.b]
  }
}

/// A BMP color table entry, as stored on disk.
///
/// The channel order is blue first. The fourth byte is *usually* zero, and is
/// ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(C)]
pub struct BGRX8888 {
  pub b: u8,
  pub g: u8,
  pub r: u8,
  pub x: u8,
}
impl From<BGRX8888> for RGB888 {
  #[inline]
  #[must_use]
  fn from(BGRX8888 { b, g, r, x: _ }: BGRX8888) -> Self {
    Self { r, g, b }
  }
}

unsafe impl Zeroable for RGB888 {}
unsafe impl Zeroable for BGRX8888 {}
//
unsafe impl Pod for RGB888 {}
unsafe impl Pod for BGRX8888 {}

/// The layout of a raw direct-color sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(non_camel_case_types)]
pub enum Colorspace {
  /// `0xRRGGBB`
  RGB888,
  /// `0bRRRRR_GGGGGG_BBBBB`
  RGB565,
  /// RGB565 with the two bytes exchanged.
  RGB565_SWAPPED,
  /// `0b0_RRRRR_GGGGG_BBBBB`
  RGB555,
}

/// A stateless mapping from raw samples to packed RGB565.
///
/// The tag says what the *input* samples look like. The output is always
/// RGB565, the form direct-color bitmaps are stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColorConverter {
  input: Colorspace,
}
impl ColorConverter {
  #[inline]
  #[must_use]
  pub const fn new(input: Colorspace) -> Self {
    Self { input }
  }

  /// The colorspace that [`convert`](Self::convert) expects.
  #[inline]
  #[must_use]
  pub const fn input_colorspace(&self) -> Colorspace {
    self.input
  }

  /// Converts a raw sample into RGB565.
  ///
  /// Bits above the width of the input colorspace are ignored.
  #[inline]
  #[must_use]
  pub fn convert(&self, raw: u32) -> u16 {
    match self.input {
      Colorspace::RGB888 => {
        let r = (raw >> 16) as u8;
        let g = (raw >> 8) as u8;
        let b = raw as u8;
        pack_565(r >> 3, g >> 2, b >> 3)
      }
      Colorspace::RGB565 => raw as u16,
      Colorspace::RGB565_SWAPPED => (raw as u16).swap_bytes(),
      Colorspace::RGB555 => {
        let r5 = ((raw >> 10) & 0b11111) as u8;
        let g5 = ((raw >> 5) & 0b11111) as u8;
        let b5 = (raw & 0b11111) as u8;
        pack_565(r5, u8_replicate_bits(5, g5) >> 2, b5)
      }
    }
  }
}

#[inline]
#[must_use]
const fn pack_565(r5: u8, g6: u8, b5: u8) -> u16 {
  (r5 as u16) << 11 | (g6 as u16) << 5 | (b5 as u16)
}

#[test]
fn test_color_converter() {
  let rgb888 = ColorConverter::new(Colorspace::RGB888);
  assert_eq!(rgb888.convert(0xFFFFFF), 0xFFFF);
  assert_eq!(rgb888.convert(0x000000), 0x0000);
  assert_eq!(rgb888.convert(0xFF0000), 0xF800);
  assert_eq!(rgb888.convert(0x00FF00), 0x07E0);
  assert_eq!(rgb888.convert(0x0000FF), 0x001F);
  // the top byte of a 32-bit sample is ignored
  assert_eq!(rgb888.convert(0xAB_0000FF), 0x001F);

  let rgb565 = ColorConverter::new(Colorspace::RGB565);
  assert_eq!(rgb565.convert(0xF81F), 0xF81F);

  let swapped = ColorConverter::new(Colorspace::RGB565_SWAPPED);
  assert_eq!(swapped.convert(0x1FF8), 0xF81F);

  let rgb555 = ColorConverter::new(Colorspace::RGB555);
  assert_eq!(rgb555.convert(0x7FFF), 0xFFFF);
  assert_eq!(rgb555.convert(0x7C00), 0xF800);
  assert_eq!(rgb555.convert(0x03E0), 0x07E0);
  assert_eq!(rgb555.convert(0x001F), 0x001F);
  assert_eq!(rgb555.convert(0x0000), 0x0000);
}
