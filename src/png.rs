#![forbid(unsafe_code)]

//! Module for Portable Network Graphics (PNG) images.
//!
//! * [PNG Spec](https://www.w3.org/TR/png/)
//!
//! ## Parsing The Chunks
//! A PNG file is an 8 byte signature followed by a series of chunks. Each chunk
//! is a big-endian `u32` length, a 4 byte ASCII tag, that many bytes of data,
//! and then a 4 byte CRC. The CRC is skipped, never checked.
//!
//! Only a handful of chunk types affect decoding:
//! * `IHDR` gives the size and pixel format.
//! * `PLTE` gives the palette of an indexed image.
//! * `tRNS` marks palette entries as transparent.
//! * `IDAT` holds the zlib compressed image data. There can be more than one,
//!   in which case they're concatenated in order.
//! * `IEND` ends the image.
//!
//! Everything else is skipped.
//!
//! ## Getting The Pixels
//! Once all the `IDAT` data is collected it's decompressed with
//! [`miniz_oxide`]. The decompressed data is one "filterline" per image row:
//! a filter type byte, then the filtered bytes of that row. Each row is
//! unfiltered against the row above it, then unpacked.
//!
//! * **Indexed** images (color type 3) at 1, 2, 4, or 8 bits per pixel become a
//!   bitmap of palette indexes.
//! * **Direct color** images (grayscale, RGB, and their alpha versions) must be
//!   8 bits per channel. Every pixel is packed into RGB565 and the bitmap holds
//!   those values directly. Alpha is ignored.

use alloc::vec::Vec;
use core::fmt::{Debug, Write};

use miniz_oxide::inflate::TINFLStatus;

use crate::{
  error::{Capability, ImageError, ImageResult, Malformed, Unsupported},
  image::{BitmapFactory, BitmapSink, Colors, Decoded, PaletteFactory, PaletteSink},
  parser_helpers::{bits_to_bytes, try_zeroed_vec, u32_be},
  pixel_formats::{ColorConverter, Colorspace, RGB888},
  source::ByteSource,
};

/// The bytes every PNG starts with.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Checks if the PNG's initial 8 bytes are correct.
///
/// * If this is the case, the rest of the bytes are very likely PNG data.
/// * If this is *not* the case, the rest of the bytes are very likely *not* PNG
///   data.
#[inline]
#[must_use]
pub const fn is_png_header_correct(bytes: &[u8]) -> bool {
  matches!(bytes, [137, 80, 78, 71, 13, 10, 26, 10, ..])
}

/// The types of color that PNG supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PngColorType {
  /// Greyscale
  Y = 0,
  /// Red, Green, Blue
  RGB = 2,
  /// Index into a palette.
  ///
  /// The palette will have RGB8 data. There may optionally be a transparency
  /// chunk.
  Index = 3,
  /// Greyscale + Alpha
  YA = 4,
  /// Red, Green, Blue, Alpha
  RGBA = 6,
}
impl PngColorType {
  /// The number of channels in this type of color.
  #[inline]
  #[must_use]
  pub const fn channel_count(self) -> usize {
    match self {
      Self::Y => 1,
      Self::RGB => 3,
      Self::Index => 1,
      Self::YA => 2,
      Self::RGBA => 4,
    }
  }
}
impl TryFrom<u8> for PngColorType {
  type Error = Unsupported;
  #[inline]
  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Ok(match value {
      0 => PngColorType::Y,
      2 => PngColorType::RGB,
      3 => PngColorType::Index,
      4 => PngColorType::YA,
      6 => PngColorType::RGBA,
      _ => return Err(Unsupported::ColorType(value)),
    })
  }
}

/// Image Header
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IHDR {
  /// width in pixels
  pub width: u32,
  /// height in pixels
  pub height: u32,
  /// bits per channel
  pub bit_depth: u8,
  /// pixel color type
  pub color_type: PngColorType,
  /// if the image data is stored interlaced.
  pub is_interlaced: bool,
}
impl IHDR {
  /// Bits for one whole pixel.
  #[inline]
  #[must_use]
  pub const fn bits_per_pixel(&self) -> usize {
    (self.bit_depth as usize) * self.color_type.channel_count()
  }

  /// Bytes of pixel data in one row, not counting the filter type byte.
  #[inline]
  #[must_use]
  pub const fn bytes_per_scanline(&self) -> usize {
    bits_to_bytes(self.bits_per_pixel().saturating_mul(self.width as usize))
  }

  /// The distance back to the "left" byte when unfiltering.
  ///
  /// Pixels smaller than a byte are filtered per byte.
  #[inline]
  #[must_use]
  pub const fn filter_unit(&self) -> usize {
    let bytes = self.bits_per_pixel() / 8;
    if bytes == 0 {
      1
    } else {
      bytes
    }
  }

  /// Gets the buffer size required to hold the decompressed image data.
  #[inline]
  #[must_use]
  pub const fn zlib_decompression_requirement(&self) -> usize {
    self.bytes_per_scanline().saturating_add(1).saturating_mul(self.height as usize)
  }
}
impl TryFrom<&[u8]> for IHDR {
  type Error = ImageError;
  fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
    match value {
      [w0, w1, w2, w3, h0, h1, h2, h3, bit_depth, color_type, compression_method, filter_method, interlace_method] =>
      {
        // Only compression method 0 and filter method 0 have ever been defined.
        if *compression_method != 0 || *filter_method != 0 {
          return Err(Malformed::InvalidHeader.into());
        }
        Ok(Self {
          width: u32::from_be_bytes([*w0, *w1, *w2, *w3]),
          height: u32::from_be_bytes([*h0, *h1, *h2, *h3]),
          bit_depth: *bit_depth,
          color_type: PngColorType::try_from(*color_type)?,
          is_interlaced: match interlace_method {
            0 => false,
            1 => true,
            _ => return Err(Malformed::InvalidHeader.into()),
          },
        })
      }
      _ => Err(Malformed::InvalidHeader.into()),
    }
  }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct PngChunkTag([u8; 4]);
#[allow(nonstandard_style)]
impl PngChunkTag {
  const IHDR: Self = Self(*b"IHDR");
  const PLTE: Self = Self(*b"PLTE");
  const IDAT: Self = Self(*b"IDAT");
  const IEND: Self = Self(*b"IEND");
  const tRNS: Self = Self(*b"tRNS");
}
impl Debug for PngChunkTag {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    for b in self.0 {
      f.write_char(b as char)?;
    }
    Ok(())
  }
}

/// Decodes a PNG.
///
/// * Indexed images give a bitmap of palette indexes, and the palette if a
///   palette factory was given.
/// * Direct color images give a bitmap of RGB565 values and an RGB565
///   [`ColorConverter`].
///
/// ## Failure
/// * `NotAPng` if the signature is wrong.
/// * `MissingCapability(BitmapFactory)` without a bitmap factory.
/// * `UnsupportedFeature` for interlaced images, a `PLTE` in a non-indexed
///   image, or a bit depth other than 8 for direct color.
/// * `MalformedStream` for bad headers, bad filter types, a `tRNS` that's
///   bigger than the palette, or zlib data that won't decompress.
pub fn png_decode<BF, PF>(
  src: &mut dyn ByteSource, bitmap: Option<BF>, palette: Option<PF>,
) -> ImageResult<Decoded<BF::Bitmap, PF::Palette>>
where
  BF: BitmapFactory,
  PF: PaletteFactory,
{
  let mut signature = [0_u8; 8];
  match src.read_exact(&mut signature) {
    Err(ImageError::MalformedStream(Malformed::Truncated)) => return Err(ImageError::NotAPng),
    other => other?,
  }
  if !is_png_header_correct(&signature) {
    return Err(ImageError::NotAPng);
  }
  let mut bitmap_factory = bitmap.ok_or(Capability::BitmapFactory)?;
  let mut palette_factory = palette;

  let mut ihdr: Option<IHDR> = None;
  let mut palette_obj: Option<PF::Palette> = None;
  let mut idat: Vec<u8> = Vec::new();
  loop {
    let mut chunk_head = [0_u8; 8];
    src.read_exact(&mut chunk_head)?;
    let len = u32_be(&chunk_head[0..]);
    let tag = PngChunkTag([chunk_head[4], chunk_head[5], chunk_head[6], chunk_head[7]]);
    match tag {
      PngChunkTag::IHDR => {
        let mut data = [0_u8; 13];
        if len as usize != data.len() {
          return Err(Malformed::InvalidHeader.into());
        }
        src.read_exact(&mut data)?;
        let header = IHDR::try_from(&data[..])?;
        log::debug!("png {header:?}");
        if header.is_interlaced {
          return Err(Unsupported::Interlacing.into());
        }
        ihdr = Some(header);
      }
      PngChunkTag::PLTE => match palette_factory.as_mut() {
        None => src.skip(u64::from(len))?,
        Some(pf) => {
          if ihdr.map(|h| h.color_type) != Some(PngColorType::Index) {
            return Err(Unsupported::PaletteOnNonIndexed.into());
          }
          let count = len as usize / 3;
          if count > 256 {
            return Err(Malformed::InvalidHeader.into());
          }
          let mut p = pf.make_palette(count);
          for i in 0..count {
            let mut rgb = [0_u8; 3];
            src.read_exact(&mut rgb)?;
            p.set_color(i, RGB888::from(rgb));
          }
          src.skip(u64::from(len % 3))?;
          palette_obj = Some(p);
        }
      },
      PngChunkTag::tRNS => match palette_obj.as_mut() {
        None => src.skip(u64::from(len))?,
        Some(p) => {
          if len as usize > p.color_count() {
            return Err(Malformed::TransparencyLargerThanPalette.into());
          }
          for i in 0..(len as usize) {
            if src.read_u8()? == 0 {
              p.make_transparent(i);
            }
          }
        }
      },
      PngChunkTag::IDAT => append_chunk_data(src, &mut idat, len)?,
      PngChunkTag::IEND => break,
      other => {
        log::debug!("skipping png chunk {other:?} ({len} bytes)");
        src.skip(u64::from(len))?;
      }
    }
    // CRC
    src.skip(4)?;
  }

  let ihdr = ihdr.ok_or(Malformed::InvalidHeader)?;
  let mut data = try_zeroed_vec(ihdr.zlib_decompression_requirement())?;
  match miniz_oxide::inflate::decompress_slice_iter_to_slice(
    &mut data,
    core::iter::once(&idat[..]),
    true,
    true,
  ) {
    Ok(count) if count < data.len() => return Err(Malformed::Truncated.into()),
    Ok(_) | Err(TINFLStatus::HasMoreOutput) => (),
    Err(_) => return Err(Malformed::Inflate.into()),
  }

  if ihdr.color_type == PngColorType::Index {
    if ![1, 2, 4, 8].contains(&ihdr.bit_depth) {
      return Err(Unsupported::BitDepth(u16::from(ihdr.bit_depth)).into());
    }
    let mut bitmap_obj = bitmap_factory.make_bitmap(ihdr.width, ihdr.height, 1 << ihdr.bit_depth)?;
    let depth = usize::from(ihdr.bit_depth);
    let mask = ((1_u16 << depth) - 1) as u8;
    for_each_unfiltered_line(&ihdr, &data, |y, line| {
      for x in 0..ihdr.width {
        let bit = (x as usize) * depth;
        let shift = 8 - depth - (bit % 8);
        let index = (line[bit / 8] >> shift) & mask;
        bitmap_obj.set_xy(x, y, u32::from(index));
      }
    })?;
    Ok((Some(bitmap_obj), palette_obj.map(Colors::Palette)))
  } else {
    if ihdr.bit_depth != 8 {
      return Err(Unsupported::BitDepth(u16::from(ihdr.bit_depth)).into());
    }
    let mut bitmap_obj = bitmap_factory.make_bitmap(ihdr.width, ihdr.height, 65536)?;
    let unit = ihdr.color_type.channel_count();
    let converter = ColorConverter::new(Colorspace::RGB888);
    for_each_unfiltered_line(&ihdr, &data, |y, line| {
      for (x, pixel) in line.chunks_exact(unit).enumerate() {
        let rgb = match *pixel {
          [v] | [v, _] => RGB888::gray(v),
          [r, g, b] | [r, g, b, _] => RGB888 { r, g, b },
          _ => RGB888::default(),
        };
        bitmap_obj.set_xy(x as u32, y, u32::from(converter.convert(rgb.to_u32())));
      }
    })?;
    Ok((Some(bitmap_obj), Some(Colors::Converter(ColorConverter::new(Colorspace::RGB565)))))
  }
}

/// Appends `len` bytes of chunk data, reading in pieces so that a bogus length
/// can't force a huge allocation up front.
fn append_chunk_data(src: &mut dyn ByteSource, buf: &mut Vec<u8>, len: u32) -> ImageResult<()> {
  let mut remaining = len as usize;
  let mut piece = [0_u8; 1024];
  while remaining > 0 {
    let n = remaining.min(piece.len());
    src.read_exact(&mut piece[..n])?;
    buf.try_reserve(n)?;
    buf.extend_from_slice(&piece[..n]);
    remaining -= n;
  }
  Ok(())
}

/// Unfilters each row in turn and passes it to `op` along with its `y`.
fn for_each_unfiltered_line(
  ihdr: &IHDR, data: &[u8], mut op: impl FnMut(u32, &[u8]),
) -> ImageResult<()> {
  let scanline = ihdr.bytes_per_scanline();
  let unit = ihdr.filter_unit();
  let mut prev = try_zeroed_vec(scanline)?;
  let mut line = try_zeroed_vec(scanline)?;
  for (y, filterline) in data.chunks_exact(scanline + 1).take(ihdr.height as usize).enumerate() {
    let (filter_type, residual) = filterline.split_at(1);
    line.copy_from_slice(residual);
    unfilter_line(filter_type[0], unit, &prev, &mut line)?;
    op(y as u32, &line);
    core::mem::swap(&mut prev, &mut line);
  }
  Ok(())
}

/// Reverses a scanline filter, in place.
///
/// * `unit` is the byte distance to the corresponding byte of the previous
///   pixel.
/// * `prev` is the previous *unfiltered* line, all zeroes for the first line.
/// * `line` holds the filtered bytes, and is replaced with the unfiltered bytes.
pub fn unfilter_line(filter_type: u8, unit: usize, prev: &[u8], line: &mut [u8]) -> ImageResult<()> {
  debug_assert_eq!(prev.len(), line.len());
  match filter_type {
    0 => (),
    1 => {
      for i in unit..line.len() {
        line[i] = line[i].wrapping_add(line[i - unit]);
      }
    }
    2 => {
      for (x, b) in line.iter_mut().zip(prev.iter()) {
        *x = x.wrapping_add(*b);
      }
    }
    3 => {
      for i in 0..line.len() {
        let a = if i >= unit { u16::from(line[i - unit]) } else { 0 };
        let b = u16::from(prev[i]);
        line[i] = line[i].wrapping_add(((a + b) / 2) as u8);
      }
    }
    4 => {
      for i in 0..line.len() {
        let (a, c) = if i >= unit { (line[i - unit], prev[i - unit]) } else { (0, 0) };
        line[i] = line[i].wrapping_add(paeth_predict(a, prev[i], c));
      }
    }
    other => return Err(Malformed::InvalidFilterType(other).into()),
  }
  Ok(())
}

/// The Paeth predictor: whichever of left (`a`), up (`b`), or up-left (`c`)
/// is closest to `a + b - c`.
#[inline]
#[must_use]
pub const fn paeth_predict(a: u8, b: u8, c: u8) -> u8 {
  let a_ = a as i32;
  let b_ = b as i32;
  let c_ = c as i32;
  let p: i32 = a_ + b_ - c_;
  let pa = (p - a_).abs();
  let pb = (p - b_).abs();
  let pc = (p - c_).abs();
  // The order of these tests decides ties, and must not change.
  if pa <= pb && pa <= pc {
    a
  } else if pb <= pc {
    b
  } else {
    c
  }
}
