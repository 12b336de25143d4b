#![forbid(unsafe_code)]

//! This module gives support for the
//! [Netpbm](https://en.wikipedia.org/wiki/Netpbm) formats `P1` through `P6`.
//!
//! They're all extremely simple formats with absolutely no compression. The
//! header is the magic number, then ASCII decimal numbers separated by
//! whitespace: width and height, plus a maximum sample value for everything
//! except the 1-bit formats. A `#` starts a comment that runs to the end of the
//! line. Exactly one whitespace byte separates the header from the pixel data.
//!
//! | Tag  | Kind      | Data                                   |
//! |------|-----------|----------------------------------------|
//! | `P1` | bitmap    | ASCII `0` and `1`                      |
//! | `P2` | grayscale | ASCII numbers                          |
//! | `P3` | color     | ASCII numbers, red green blue          |
//! | `P4` | bitmap    | 8 pixels per byte, rows start on bytes |
//! | `P5` | grayscale | 1 byte per pixel                       |
//! | `P6` | color     | 3 bytes per pixel                      |
//!
//! None of these formats have a palette, so for grayscale and color images
//! one is built from the distinct values that actually appear, in order of
//! first appearance. That takes two passes over the pixel data: the first to
//! find the colors, the second (after seeking back) to write each pixel's
//! palette index.
//!
//! The 1-bit formats give a 1 entry palette holding white.

use alloc::{collections::BTreeMap, vec::Vec};
use core::str::from_utf8;

use crate::{
  error::{Capability, ImageError, ImageResult, Malformed, Unsupported},
  image::{BitmapFactory, BitmapSink, Colors, Decoded, PaletteFactory, PaletteSink},
  pixel_formats::RGB888,
  source::ByteSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetpbmHeader {
  /// The tag sets the format of the bytes after the header:
  /// * 1: ascii 1-bit
  /// * 2: ascii grayscale
  /// * 3: ascii rgb
  /// * 4: binary 1-bit
  /// * 5: binary grayscale
  /// * 6: binary rgb
  pub tag: u8,
  pub width: u32,
  pub height: u32,
  /// Max value per channel entry. Always 1 for the 1-bit formats.
  pub max: u32,
}
impl NetpbmHeader {
  #[inline]
  #[must_use]
  pub const fn is_bitmap(&self) -> bool {
    matches!(self.tag, 1 | 4)
  }
}

/// Skips the rest of a comment, up to and including the newline. Returns
/// `false` if the data ends first.
fn netpbm_skip_comment(src: &mut dyn ByteSource) -> ImageResult<bool> {
  loop {
    match src.read_u8_opt()? {
      None => return Ok(false),
      Some(b'\n') => return Ok(true),
      Some(_) => continue,
    }
  }
}

/// Skips whitespace and comments, returning the first other byte, or `None`
/// at the end of the data.
fn netpbm_trim(src: &mut dyn ByteSource) -> ImageResult<Option<u8>> {
  loop {
    match src.read_u8_opt()? {
      Some(u) if u.is_ascii_whitespace() => continue,
      Some(b'#') => {
        if !netpbm_skip_comment(src)? {
          return Ok(None);
        }
      }
      other => return Ok(other),
    }
  }
}

/// Reads the next ASCII decimal number.
///
/// The byte that ends the number is consumed. If that byte starts a comment,
/// the whole comment is. Returns `None` if the data ends before a number
/// starts.
fn netpbm_pull_ascii_u32(src: &mut dyn ByteSource) -> ImageResult<Option<u32>> {
  let first = match netpbm_trim(src)? {
    Some(u) if u.is_ascii_digit() => u,
    Some(_) => return Err(Malformed::BadNumber.into()),
    None => return Ok(None),
  };
  let mut digits = [0_u8; 10];
  digits[0] = first;
  let mut len = 1;
  while let Some(u) = src.read_u8_opt()? {
    if u == b'#' {
      netpbm_skip_comment(src)?;
      break;
    } else if !u.is_ascii_digit() {
      break;
    }
    *digits.get_mut(len).ok_or(Malformed::BadNumber)? = u;
    len += 1;
  }
  Ok(Some(from_utf8(&digits[..len])?.parse::<u32>()?))
}

/// Reads the magic number and header values.
///
/// The source is left at the start of the pixel data.
///
/// ## Failure
/// * `UnsupportedFeature(NetpbmTag)` for tags other than `P1` through `P6`.
/// * `UnsupportedFeature(SixteenBitSamples)` for a max value above 255.
pub fn netpbm_read_header(src: &mut dyn ByteSource) -> ImageResult<NetpbmHeader> {
  let mut magic = [0_u8; 2];
  src.read_exact(&mut magic)?;
  let tag = match magic {
    [b'P', t @ b'1'..=b'6'] => t - b'0',
    [b'P', t] => return Err(Unsupported::NetpbmTag(t).into()),
    _ => return Err(ImageError::UnsupportedFormat),
  };
  let mut pull = || -> ImageResult<u32> {
    netpbm_pull_ascii_u32(src)?.ok_or_else(|| Malformed::Truncated.into())
  };
  let width = pull()?;
  let height = pull()?;
  let max = if matches!(tag, 1 | 4) { 1 } else { pull()? };
  let header = NetpbmHeader { tag, width, height, max };
  log::debug!("netpbm {header:?}");
  if max > 255 {
    return Err(Unsupported::SixteenBitSamples.into());
  }
  Ok(header)
}

/// Decodes any of the Netpbm formats.
///
/// ## Failure
/// * `MissingCapability(BitmapFactory)` for the 1-bit formats without a bitmap
///   factory. The other formats can give a palette only.
/// * Anything from [`netpbm_read_header`].
/// * `MalformedStream` for bad ASCII numbers or running out of data.
pub fn netpbm_decode<BF, PF>(
  src: &mut dyn ByteSource, bitmap: Option<BF>, palette: Option<PF>,
) -> ImageResult<Decoded<BF::Bitmap, PF::Palette>>
where
  BF: BitmapFactory,
  PF: PaletteFactory,
{
  let header = netpbm_read_header(src)?;
  if header.is_bitmap() {
    read_pbm(src, &header, bitmap, palette)
  } else {
    read_palettized(src, &header, bitmap, palette)
  }
}

fn read_pbm<BF, PF>(
  src: &mut dyn ByteSource, header: &NetpbmHeader, bitmap: Option<BF>, palette: Option<PF>,
) -> ImageResult<Decoded<BF::Bitmap, PF::Palette>>
where
  BF: BitmapFactory,
  PF: PaletteFactory,
{
  let mut bitmap_factory = bitmap.ok_or(Capability::BitmapFactory)?;
  let mut b = bitmap_factory.make_bitmap(header.width, header.height, 2)?;
  let palette_obj = palette.map(|mut factory| {
    let mut p = factory.make_palette(1);
    p.set_color(0, RGB888::gray(0xFF));
    Colors::Palette(p)
  });
  for y in 0..header.height {
    let mut byte = 0_u8;
    for x in 0..header.width {
      let bit = if header.tag == 1 {
        match netpbm_trim(src)? {
          Some(b'0') => 0,
          Some(b'1') => 1,
          Some(_) => return Err(Malformed::BadNumber.into()),
          None => return Err(Malformed::Truncated.into()),
        }
      } else {
        if x % 8 == 0 {
          byte = src.read_u8()?;
        }
        (byte >> (7 - (x % 8))) & 1
      };
      b.set_xy(x, y, u32::from(bit));
    }
  }
  Ok((Some(b), palette_obj))
}

fn pull_ascii_channel(src: &mut dyn ByteSource) -> ImageResult<u8> {
  let v = netpbm_pull_ascii_u32(src)?.ok_or(Malformed::Truncated)?;
  Ok(u8::try_from(v)?)
}

/// Reads one sample as a packed `0xRRGGBB` value, gray already replicated.
fn read_sample(src: &mut dyn ByteSource, tag: u8) -> ImageResult<u32> {
  let rgb = match tag {
    2 => RGB888::gray(pull_ascii_channel(src)?),
    3 => {
      let r = pull_ascii_channel(src)?;
      let g = pull_ascii_channel(src)?;
      let b = pull_ascii_channel(src)?;
      RGB888 { r, g, b }
    }
    5 => RGB888::gray(src.read_u8()?),
    _ => {
      let mut px = [0_u8; 3];
      src.read_exact(&mut px)?;
      RGB888::from(px)
    }
  };
  Ok(rgb.to_u32())
}

fn read_palettized<BF, PF>(
  src: &mut dyn ByteSource, header: &NetpbmHeader, bitmap: Option<BF>, palette: Option<PF>,
) -> ImageResult<Decoded<BF::Bitmap, PF::Palette>>
where
  BF: BitmapFactory,
  PF: PaletteFactory,
{
  let data_start = src.position();
  let pixel_count = u64::from(header.width) * u64::from(header.height);

  // first pass: the distinct colors, in order of first appearance.
  let mut indexes: BTreeMap<u32, u32> = BTreeMap::new();
  let mut colors: Vec<u32> = Vec::new();
  for _ in 0..pixel_count {
    let color = read_sample(src, header.tag)?;
    if let alloc::collections::btree_map::Entry::Vacant(e) = indexes.entry(color) {
      e.insert(colors.len() as u32);
      colors.push(color);
    }
  }

  let palette_obj = palette.map(|mut factory| {
    let mut p = factory.make_palette(colors.len());
    for (i, &c) in colors.iter().enumerate() {
      let [_, r, g, b] = c.to_be_bytes();
      p.set_color(i, RGB888 { r, g, b });
    }
    Colors::Palette(p)
  });

  // second pass: the index of every pixel.
  let bitmap_obj = match bitmap {
    Some(mut factory) => {
      let mut b = factory.make_bitmap(header.width, header.height, colors.len() as u32)?;
      src.seek_to(data_start)?;
      for y in 0..header.height {
        for x in 0..header.width {
          let color = read_sample(src, header.tag)?;
          let index = indexes.get(&color).copied().ok_or(Malformed::IndexOutOfRange)?;
          b.set_xy(x, y, index);
        }
      }
      Some(b)
    }
    None => None,
  };

  Ok((bitmap_obj, palette_obj))
}
