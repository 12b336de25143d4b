//! JPEG support, by way of a decoder that the caller supplies.
//!
//! This crate doesn't decode JPEG itself. A [`JpegDecoder`] is handed the
//! stream, reports the image size, and then fills in a bitmap that's been
//! allocated for 16-bit color. The decoder is expected to produce byte-swapped
//! RGB565, which is what embedded JPEG decoders usually output, so the result
//! carries an `RGB565_SWAPPED` [`ColorConverter`].

use crate::{
  error::{Capability, ImageResult},
  image::{BitmapFactory, BitmapSink, Colors, Decoded, PaletteFactory},
  pixel_formats::{ColorConverter, Colorspace},
  source::ByteSource,
};

/// A baseline JPEG decoder.
pub trait JpegDecoder {
  /// Reads enough of the stream to know the image size, `(width, height)`.
  fn open(&mut self, src: &mut dyn ByteSource) -> ImageResult<(u32, u32)>;

  /// Decodes the image that was just opened, filling every pixel of `bitmap`
  /// with an `RGB565_SWAPPED` value.
  fn decode(&mut self, bitmap: &mut dyn BitmapSink) -> ImageResult<()>;
}

/// Decodes a JPEG with the given decoder.
///
/// ## Failure
/// * `MissingCapability` without a decoder or without a bitmap factory.
/// * Anything the decoder reports.
pub fn jpeg_decode<BF, PF>(
  src: &mut dyn ByteSource, bitmap: Option<BF>, _palette: Option<PF>,
  decoder: Option<&mut dyn JpegDecoder>,
) -> ImageResult<Decoded<BF::Bitmap, PF::Palette>>
where
  BF: BitmapFactory,
  PF: PaletteFactory,
{
  let decoder = decoder.ok_or(Capability::JpegDecoder)?;
  let mut bitmap_factory = bitmap.ok_or(Capability::BitmapFactory)?;
  let (width, height) = decoder.open(src)?;
  log::debug!("jpeg {width}x{height}");
  let mut b = bitmap_factory.make_bitmap(width, height, 65535)?;
  decoder.decode(&mut b)?;
  Ok((Some(b), Some(Colors::Converter(ColorConverter::new(Colorspace::RGB565_SWAPPED)))))
}
