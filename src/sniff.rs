//! Picking a decoder from the first few bytes of a stream.
//!
//! | First bytes   | Format |
//! |---------------|--------|
//! | `BM`          | BMP    |
//! | `P` and digit | Netpbm |
//! | `GIF`         | GIF    |
//! | `\x89PN`      | PNG    |
//! | `\xFF\xD8`    | JPEG   |
//!
//! The table is fixed. A format that's recognized but compiled out (because
//! its Cargo feature is off) is reported the same as an unknown format.

use crate::{
  error::{ImageError, ImageResult},
  image::{BitmapFactory, Decoded, PaletteFactory, VecBitmap, VecPalette},
  jpeg::{jpeg_decode, JpegDecoder},
  source::ByteSource,
};

/// The image formats that [`sniff_format`] can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImageFormat {
  Bmp,
  Netpbm,
  Gif,
  Png,
  Jpeg,
}

/// Classifies a stream by its first bytes.
///
/// Only the first 3 bytes matter, fewer is fine.
#[must_use]
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
  match bytes {
    [b'B', b'M', ..] => Some(ImageFormat::Bmp),
    [b'P', d, ..] if d.is_ascii_digit() => Some(ImageFormat::Netpbm),
    [b'G', b'I', b'F', ..] => Some(ImageFormat::Gif),
    [0x89, b'P', b'N', ..] => Some(ImageFormat::Png),
    [0xFF, 0xD8, ..] => Some(ImageFormat::Jpeg),
    _ => None,
  }
}

/// Reads up to 3 bytes from the start of the source and then seeks back to
/// the start, whatever the outcome.
fn read_sniff_bytes(src: &mut dyn ByteSource) -> ImageResult<([u8; 3], usize)> {
  let mut buf = [0_u8; 3];
  let mut len = 0;
  while len < buf.len() {
    let count = src.read(&mut buf[len..])?;
    if count == 0 {
      break;
    }
    len += count;
  }
  src.seek_to(0)?;
  Ok((buf, len))
}

/// Decodes an image of any supported format.
///
/// The factories are passed unchanged to the chosen decoder, and its output is
/// returned unchanged. GIF and PNG need a bitmap factory. BMP and Netpbm can
/// decode just the palette when no bitmap factory is given.
///
/// JPEG streams fail with `MissingCapability(JpegDecoder)`, use
/// [`load_with_jpeg`] to supply one.
///
/// ## Failure
/// * `UnsupportedFormat` if the first bytes aren't recognized.
/// * Anything the chosen decoder reports.
pub fn load<BF, PF>(
  src: &mut dyn ByteSource, bitmap: Option<BF>, palette: Option<PF>,
) -> ImageResult<Decoded<BF::Bitmap, PF::Palette>>
where
  BF: BitmapFactory,
  PF: PaletteFactory,
{
  load_with_jpeg(src, bitmap, palette, None)
}

/// As [`load`], with a decoder for JPEG streams.
pub fn load_with_jpeg<BF, PF>(
  src: &mut dyn ByteSource, bitmap: Option<BF>, palette: Option<PF>,
  jpeg: Option<&mut dyn JpegDecoder>,
) -> ImageResult<Decoded<BF::Bitmap, PF::Palette>>
where
  BF: BitmapFactory,
  PF: PaletteFactory,
{
  let (buf, len) = read_sniff_bytes(src)?;
  let format = sniff_format(&buf[..len]).ok_or(ImageError::UnsupportedFormat)?;
  log::debug!("decoding as {format:?}");
  match format {
    #[cfg(feature = "bmp")]
    ImageFormat::Bmp => crate::bmp::bmp_decode(src, bitmap, palette),
    #[cfg(feature = "netpbm")]
    ImageFormat::Netpbm => crate::netpbm::netpbm_decode(src, bitmap, palette),
    #[cfg(feature = "gif")]
    ImageFormat::Gif => crate::gif::gif_decode(src, bitmap, palette),
    #[cfg(feature = "png")]
    ImageFormat::Png => crate::png::png_decode(src, bitmap, palette),
    ImageFormat::Jpeg => jpeg_decode(src, bitmap, palette, jpeg),
    #[allow(unreachable_patterns)]
    _ => Err(ImageError::UnsupportedFormat),
  }
}

/// As [`load`], using [`VecBitmap`] and [`VecPalette`] for the output.
pub fn load_default(
  src: &mut dyn ByteSource,
) -> ImageResult<Decoded<VecBitmap, VecPalette>> {
  load(src, Some(VecBitmap::new), Some(VecPalette::new))
}

#[test]
fn test_sniff_format() {
  assert_eq!(sniff_format(b"BM\x00"), Some(ImageFormat::Bmp));
  assert_eq!(sniff_format(b"BM"), Some(ImageFormat::Bmp));
  assert_eq!(sniff_format(b"P6\n"), Some(ImageFormat::Netpbm));
  assert_eq!(sniff_format(b"P9\n"), Some(ImageFormat::Netpbm));
  assert_eq!(sniff_format(b"Px\n"), None);
  assert_eq!(sniff_format(b"GIF"), Some(ImageFormat::Gif));
  assert_eq!(sniff_format(b"GI"), None);
  assert_eq!(sniff_format(b"\x89PN"), Some(ImageFormat::Png));
  assert_eq!(sniff_format(b"\xFF\xD8\xFF"), Some(ImageFormat::Jpeg));
  assert_eq!(sniff_format(b"\x00\x00\x00"), None);
  assert_eq!(sniff_format(b""), None);
}
