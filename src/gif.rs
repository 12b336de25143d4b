#![forbid(unsafe_code)]

//! Module for Graphics Interchange Format (GIF) images.
//!
//! Only the first frame's worth of data is meaningful, but every frame in the
//! file is drawn into the one bitmap, in order, so a later frame overwrites an
//! earlier one wherever their rectangles overlap. Animation timing and disposal
//! are ignored.
//!
//! The file is read strictly in order:
//! 1. A 6 byte signature, either `GIF87a` or `GIF89a`.
//! 2. The logical screen descriptor: the full image size, and flags saying if
//!    there's a global color table.
//! 3. The global color table, if any.
//! 4. Blocks, until the trailer: image frames (`0x2C`) or extensions (`0x21`).
//!
//! The returned palette is always the global color table. A frame's local
//! color table is read past and thrown away, so images that only have local
//! tables come out with no palette.

use crate::{
  error::{Capability, ImageError, ImageResult, Malformed, Unsupported},
  image::{BitmapFactory, BitmapSink, Colors, Decoded, PaletteFactory, PaletteSink},
  lzw::LzwDecoder,
  parser_helpers::u16_le,
  pixel_formats::RGB888,
  source::ByteSource,
};

const GIF87A: &[u8; 6] = b"GIF87a";
const GIF89A: &[u8; 6] = b"GIF89a";

const IMAGE_DESCRIPTOR: u8 = 0x2C;
const EXTENSION: u8 = 0x21;
const TRAILER: u8 = 0x3B;

const HAS_COLOR_TABLE: u8 = 0x80;
const INTERLACED: u8 = 0x40;

/// The number of entries a color table has, from the low 3 bits of the flags.
#[inline]
#[must_use]
const fn color_table_len(flags: u8) -> usize {
  1 << ((flags & 0b111) + 1)
}

/// Checks for either GIF signature.
#[inline]
#[must_use]
pub fn is_gif_header_correct(bytes: &[u8]) -> bool {
  bytes.starts_with(GIF87A) || bytes.starts_with(GIF89A)
}

/// Decodes a GIF into a bitmap of palette indexes, plus the global palette.
///
/// ## Failure
/// * `NotAGif` if the signature is wrong.
/// * `MissingCapability` if there's no bitmap factory, or if there's a global
///   color table and no palette factory.
/// * `UnsupportedFeature(Interlacing)` for interlaced frames.
/// * `MalformedStream` for an unknown block type, bad LZW data, or running out
///   of data.
pub fn gif_decode<BF, PF>(
  src: &mut dyn ByteSource, bitmap: Option<BF>, palette: Option<PF>,
) -> ImageResult<Decoded<BF::Bitmap, PF::Palette>>
where
  BF: BitmapFactory,
  PF: PaletteFactory,
{
  let mut signature = [0_u8; 6];
  match src.read_exact(&mut signature) {
    Err(ImageError::MalformedStream(Malformed::Truncated)) => return Err(ImageError::NotAGif),
    other => other?,
  }
  if !is_gif_header_correct(&signature) {
    return Err(ImageError::NotAGif);
  }
  let mut bitmap_factory = bitmap.ok_or(Capability::BitmapFactory)?;

  let mut screen = [0_u8; 7];
  src.read_exact(&mut screen)?;
  let width = u32::from(u16_le(&screen[0..]));
  let height = u32::from(u16_le(&screen[2..]));
  let flags = screen[4];
  log::debug!("gif {width}x{height}, flags 0b{flags:08b}");

  let palette_obj = if flags & HAS_COLOR_TABLE != 0 {
    let mut palette_factory = palette.ok_or(Capability::PaletteFactory)?;
    let count = color_table_len(flags);
    let mut p = palette_factory.make_palette(count);
    for i in 0..count {
      let mut rgb = [0_u8; 3];
      src.read_exact(&mut rgb)?;
      p.set_color(i, RGB888::from(rgb));
    }
    Some(p)
  } else {
    None
  };

  let color_bits = ((flags & 0x70) >> 4) + 1;
  let mut bitmap_obj = bitmap_factory.make_bitmap(width, height, (1 << color_bits) - 1)?;

  loop {
    match src.read_u8()? {
      IMAGE_DESCRIPTOR => read_frame(src, &mut bitmap_obj)?,
      EXTENSION => {
        let label = src.read_u8()?;
        log::debug!("skipping gif extension 0x{label:02X}");
        SubBlocks::new(src).finish()?;
      }
      TRAILER => break,
      other => return Err(Malformed::BadBlockType(other).into()),
    }
  }

  Ok((Some(bitmap_obj), palette_obj.map(Colors::Palette)))
}

/// Reads one image frame and draws it into the bitmap.
fn read_frame<B: BitmapSink>(src: &mut dyn ByteSource, bitmap: &mut B) -> ImageResult<()> {
  let mut descriptor = [0_u8; 9];
  src.read_exact(&mut descriptor)?;
  let left = u32::from(u16_le(&descriptor[0..]));
  let top = u32::from(u16_le(&descriptor[2..]));
  let frame_width = u32::from(u16_le(&descriptor[4..]));
  let flags = descriptor[8];
  if flags & INTERLACED != 0 {
    return Err(Unsupported::Interlacing.into());
  }
  if flags & HAS_COLOR_TABLE != 0 {
    let count = color_table_len(flags);
    log::debug!("discarding a local color table of {count} entries");
    src.skip(count as u64 * 3)?;
  }

  let min_code_size = src.read_u8()?;
  let (bitmap_width, bitmap_height) = (bitmap.width(), bitmap.height());
  let mut lzw = LzwDecoder::new(SubBlocks::new(src), min_code_size)?;
  let mut x = 0_u32;
  let mut y = 0_u32;
  while let Some(run) = lzw.next_run()? {
    for &index in run {
      let (px, py) = (left + x, top.saturating_add(y));
      if px < bitmap_width && py < bitmap_height {
        bitmap.set_xy(px, py, u32::from(index));
      }
      x += 1;
      if x >= frame_width {
        x = 0;
        y = y.saturating_add(1);
      }
    }
  }
  lzw.into_inner().finish()
}

/// Iterates the bytes of a GIF sub-block stream.
///
/// Each sub-block is a length byte followed by that many bytes, and a length
/// of 0 ends the stream. An error stops the iteration and is held until
/// [`finish`](Self::finish) is called.
struct SubBlocks<'s> {
  src: &'s mut dyn ByteSource,
  remaining: u8,
  done: bool,
  error: Option<ImageError>,
}
impl<'s> SubBlocks<'s> {
  fn new(src: &'s mut dyn ByteSource) -> Self {
    Self { src, remaining: 0, done: false, error: None }
  }

  fn pull(&mut self) -> ImageResult<Option<u8>> {
    while self.remaining == 0 {
      let size = self.src.read_u8()?;
      if size == 0 {
        return Ok(None);
      }
      self.remaining = size;
    }
    self.remaining -= 1;
    self.src.read_u8().map(Some)
  }

  /// Skips whatever is left, so the source is positioned after the
  /// terminating empty sub-block, then reports any error seen along the way.
  fn finish(mut self) -> ImageResult<()> {
    self.by_ref().for_each(drop);
    match self.error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}
impl Iterator for SubBlocks<'_> {
  type Item = u8;
  fn next(&mut self) -> Option<u8> {
    if self.done {
      return None;
    }
    match self.pull() {
      Ok(Some(byte)) => Some(byte),
      Ok(None) => {
        self.done = true;
        None
      }
      Err(e) => {
        self.done = true;
        self.error = Some(e);
        None
      }
    }
  }
}

#[test]
fn test_sub_blocks() {
  use crate::source::SliceSource;
  use alloc::vec::Vec;

  let mut src = SliceSource::new(&[2, 10, 11, 1, 12, 0, 0x3B]);
  let bytes: Vec<u8> = SubBlocks::new(&mut src).collect();
  assert_eq!(bytes, [10, 11, 12]);
  assert_eq!(src.read_u8().unwrap(), 0x3B);

  let mut src = SliceSource::new(&[3, 1, 2, 3, 0, 0x3B]);
  SubBlocks::new(&mut src).finish().unwrap();
  assert_eq!(src.read_u8().unwrap(), 0x3B);

  // missing the terminator
  let mut src = SliceSource::new(&[3, 1, 2]);
  assert_eq!(
    SubBlocks::new(&mut src).finish(),
    Err(ImageError::MalformedStream(Malformed::Truncated))
  );
}
