#![forbid(unsafe_code)]

//! Module for Windows Bitmap (BMP) images.
//!
//! * [Wikipedia Article](https://en.wikipedia.org/wiki/BMP_file_format)
//!
//! ## File Layout
//! * A 14 byte file header, starting with `BM`, that gives the offset of the
//!   pixel data.
//! * An info header, which is at least the 40 byte `BITMAPINFOHEADER`. Larger
//!   versions start the same way, so only the first 40 bytes are parsed.
//! * When the compression is "bitfields" and the info header is big enough,
//!   the red, green, and blue masks are at file offsets `0x36`, `0x3A`, and
//!   `0x3E`.
//! * The color table (if any) sits just before the pixel data, 4 bytes per
//!   entry, in blue-green-red-unused order.
//! * The pixel data. Each row is padded to a multiple of 4 bytes. Rows are
//!   stored bottom to top unless the height is negative.
//!
//! ## Decoding Paths
//! * **Indexed**: 1, 2, 4, or 8 bits per pixel. The bitmap gets palette
//!   indexes and the color table becomes the palette.
//! * **True color**: 16, 24, or 32 bits per pixel with no color table. Every
//!   pixel is packed into RGB565 and the result carries a [`ColorConverter`]
//!   for RGB565.
//!
//! Run length encoded images, and every compression type after bitfields, are
//! not supported.

use bytemuck::{Pod, Zeroable};
use pack1::{I32LE, U16LE, U32LE};

use crate::{
  error::{ImageResult, Malformed, Unsupported},
  image::{BitmapFactory, BitmapSink, Colors, Decoded, PaletteFactory, PaletteSink},
  parser_helpers::{bits_to_bytes, pad_to_4, u16_le, u32_be, u32_le},
  pixel_formats::{ColorConverter, Colorspace, BGRX8888, RGB888},
  source::ByteSource,
};

const BI_BITFIELDS: u32 = 3;

/// The file header plus the `BITMAPINFOHEADER` fields, exactly as on disk.
#[derive(Debug, Clone, Copy, Zeroable, Pod)]
#[repr(C)]
struct BmpHeader {
  tag: [u8; 2],
  file_size: U32LE,
  reserved: [u8; 4],
  data_start: U32LE,
  header_size: U32LE,
  width: I32LE,
  height: I32LE,
  planes: U16LE,
  bits_per_pixel: U16LE,
  compression: U32LE,
  image_size: U32LE,
  pixels_per_meter_x: I32LE,
  pixels_per_meter_y: I32LE,
  colors_used: U32LE,
  important_colors: U32LE,
}

/// The bitfield masks of a `BI_BITFIELDS` image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitfieldMasks {
  pub red: u32,
  pub green: u32,
  pub blue: u32,
}
impl BitfieldMasks {
  /// The colorspace these masks describe, if it's one that can be converted.
  #[must_use]
  pub const fn colorspace(&self) -> Option<Colorspace> {
    match (self.red, self.green, self.blue) {
      (0x7C00, 0x03E0, 0x001F) => Some(Colorspace::RGB555),
      (0xF800, 0x07E0, 0x001F) => Some(Colorspace::RGB565),
      // 24 or 32 bit, with any alpha ignored
      (0x0000_FF00, 0x00FF_0000, 0xFF00_0000) => Some(Colorspace::RGB888),
      _ => None,
    }
  }

  #[inline]
  #[must_use]
  pub const fn combined(&self) -> u32 {
    self.red | self.green | self.blue
  }
}

/// The parts of a BMP header that decoding depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BmpInfo {
  pub width: u32,
  /// Negative when rows are stored top to bottom.
  pub height: i32,
  pub bits_per_pixel: u16,
  pub compression: u32,
  /// The color count, with a declared count of 0 already filled in for indexed
  /// images. Always 0 for true color images.
  pub colors: u32,
  pub data_start: u32,
  pub masks: Option<BitfieldMasks>,
}
impl BmpInfo {
  #[inline]
  #[must_use]
  pub const fn is_truecolor(&self) -> bool {
    self.colors == 0
  }

  #[inline]
  #[must_use]
  pub const fn is_top_down(&self) -> bool {
    self.height < 0
  }

  /// Bytes per row on disk, including the padding.
  #[inline]
  #[must_use]
  pub const fn bytes_per_row(&self) -> usize {
    pad_to_4(bits_to_bytes((self.width as usize).saturating_mul(self.bits_per_pixel as usize)))
  }
}

/// Reads the header fields and the bitfield masks.
///
/// ## Failure
/// * `UnsupportedFeature(BmpCompression)` for any compression after
///   bitfields.
pub fn bmp_read_info(src: &mut dyn ByteSource) -> ImageResult<BmpInfo> {
  let mut raw = [0_u8; core::mem::size_of::<BmpHeader>()];
  src.read_exact(&mut raw)?;
  let header: BmpHeader = bytemuck::cast(raw);
  let width = u32::try_from(header.width.get()).map_err(|_| Malformed::InvalidHeader)?;
  let bits_per_pixel = header.bits_per_pixel.get();
  let compression = header.compression.get();

  let masks = if compression == BI_BITFIELDS && header.header_size.get() >= 56 {
    src.seek_to(0x36)?;
    let mut m = [0_u8; 12];
    src.read_exact(&mut m)?;
    let read = if bits_per_pixel == 16 { u32_le } else { u32_be };
    Some(BitfieldMasks { red: read(&m[0..]), green: read(&m[4..]), blue: read(&m[8..]) })
  } else {
    None
  };
  if compression > BI_BITFIELDS {
    return Err(Unsupported::BmpCompression(compression).into());
  }

  let mut colors = header.colors_used.get();
  if colors == 0 && bits_per_pixel < 16 {
    colors = 1_u32.checked_shl(u32::from(bits_per_pixel)).ok_or(Malformed::InvalidHeader)?;
  }
  let info = BmpInfo {
    width,
    height: header.height.get(),
    bits_per_pixel,
    compression,
    colors,
    data_start: header.data_start.get(),
    masks,
  };
  log::debug!("bmp {info:?}");
  Ok(info)
}

/// Decodes a BMP.
///
/// Either factory can be left out, and that part of the image just isn't
/// decoded. Without a bitmap factory, a true color image still gives the
/// RGB565 converter.
///
/// ## Failure
/// * `UnsupportedFeature` for compression after bitfields, unknown bitfield
///   masks, or an unsupported bit depth.
/// * `MalformedStream` for nonsense header fields, pixels that index past the
///   end of the palette, or running out of data.
pub fn bmp_decode<BF, PF>(
  src: &mut dyn ByteSource, bitmap: Option<BF>, palette: Option<PF>,
) -> ImageResult<Decoded<BF::Bitmap, PF::Palette>>
where
  BF: BitmapFactory,
  PF: PaletteFactory,
{
  let info = bmp_read_info(src)?;
  if info.is_truecolor() {
    let bitmap_obj = match bitmap {
      Some(factory) => Some(read_truecolor(src, &info, factory)?),
      None => None,
    };
    Ok((bitmap_obj, Some(Colors::Converter(ColorConverter::new(Colorspace::RGB565)))))
  } else {
    read_indexed(src, &info, bitmap, palette)
  }
}

/// Reads the rows in file order, handing each one's `y` to `op`, then skips
/// the padding on the end of the row.
fn for_each_row(
  src: &mut dyn ByteSource, info: &BmpInfo,
  mut op: impl FnMut(&mut dyn ByteSource, u32) -> ImageResult<usize>,
) -> ImageResult<()> {
  let height = info.height.unsigned_abs();
  let bytes_per_row = info.bytes_per_row();
  src.seek_to(u64::from(info.data_start))?;
  for i in 0..height {
    let y = if info.is_top_down() { i } else { height - 1 - i };
    let used = op(src, y)?;
    src.skip(bytes_per_row.saturating_sub(used) as u64)?;
  }
  Ok(())
}

fn read_indexed<BF, PF>(
  src: &mut dyn ByteSource, info: &BmpInfo, bitmap: Option<BF>, palette: Option<PF>,
) -> ImageResult<Decoded<BF::Bitmap, PF::Palette>>
where
  BF: BitmapFactory,
  PF: PaletteFactory,
{
  let depth = info.bits_per_pixel;
  if ![1, 2, 4, 8].contains(&depth) {
    return Err(Unsupported::BitDepth(depth).into());
  }
  if info.colors > 1 << depth {
    return Err(Malformed::InvalidHeader.into());
  }
  let colors = info.colors as usize;

  let palette_obj = match palette {
    Some(mut factory) => {
      let table_start = u64::from(info.data_start)
        .checked_sub(colors as u64 * 4)
        .ok_or(Malformed::InvalidHeader)?;
      src.seek_to(table_start)?;
      let mut p = factory.make_palette(colors);
      for i in 0..colors {
        let mut entry = [0_u8; 4];
        src.read_exact(&mut entry)?;
        let bgrx: BGRX8888 = bytemuck::cast(entry);
        p.set_color(i, RGB888::from(bgrx));
      }
      Some(Colors::Palette(p))
    }
    None => None,
  };

  let bitmap_obj = match bitmap {
    Some(mut factory) => {
      let mut b = factory.make_bitmap(info.width, info.height.unsigned_abs(), info.colors)?;
      let width = info.width;
      let depth = usize::from(depth);
      let mask = ((1_u16 << depth) - 1) as u8;
      for_each_row(src, info, |src, y| {
        let mut byte = 0_u8;
        for x in 0..width {
          let bit = (x as usize) * depth;
          if bit % 8 == 0 {
            byte = src.read_u8()?;
          }
          let index = (byte >> (8 - depth - (bit % 8))) & mask;
          if usize::from(index) >= colors {
            return Err(Malformed::IndexOutOfRange.into());
          }
          b.set_xy(x, y, u32::from(index));
        }
        Ok(bits_to_bytes((width as usize) * depth))
      })?;
      Some(b)
    }
    None => None,
  };

  Ok((bitmap_obj, palette_obj))
}

fn read_truecolor<BF: BitmapFactory>(
  src: &mut dyn ByteSource, info: &BmpInfo, mut factory: BF,
) -> ImageResult<BF::Bitmap> {
  let depth = info.bits_per_pixel;
  if ![16, 24, 32].contains(&depth) {
    return Err(Unsupported::BitDepth(depth).into());
  }
  let bytes_per_pixel = usize::from(depth / 8);
  let input = match info.masks {
    Some(masks) => masks.colorspace().ok_or(Unsupported::BitfieldMask)?,
    None if depth == 16 => Colorspace::RGB555,
    None => Colorspace::RGB888,
  };
  let converter = ColorConverter::new(input);
  let pixel_mask = info.masks.map(|m| if depth == 16 { m.combined() } else { m.combined() >> 8 });

  let mut b = factory.make_bitmap(info.width, info.height.unsigned_abs(), 65535)?;
  let width = info.width;
  for_each_row(src, info, |src, y| {
    let mut px = [0_u8; 4];
    for x in 0..width {
      src.read_exact(&mut px[..bytes_per_pixel])?;
      let raw = match (pixel_mask, bytes_per_pixel) {
        (Some(mask), _) => u32_le(&px) & mask,
        (None, 2) => u32::from(u16_le(&px)),
        (None, _) => u32::from(px[2]) << 16 | u32::from(px[1]) << 8 | u32::from(px[0]),
      };
      b.set_xy(x, y, u32::from(converter.convert(raw)));
    }
    Ok((width as usize) * bytes_per_pixel)
  })?;
  Ok(b)
}
