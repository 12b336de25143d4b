use imageload::{
  load, load_default, load_with_jpeg, BitmapSink, ByteSource, Capability, ColorConverter, Colors,
  Colorspace, ImageError, ImageResult, JpegDecoder, SliceSource, VecBitmap, VecPalette,
};

use super::{NoBitmap, NoPalette};

#[test]
fn test_bm_goes_to_bmp() {
  let mut bytes = crate::bmp::one_bit_bmp();
  // trailing junk doesn't matter
  bytes.extend_from_slice(b"GIF89a\x89PNG");
  let (bitmap, colors) = load_default(&mut SliceSource::new(&bytes)).unwrap();
  assert_eq!(bitmap.unwrap().values(), &[1, 0, 1, 0, 1, 1]);
  assert_eq!(colors.unwrap().palette().unwrap().entries().len(), 2);
}

#[test]
fn test_unknown_format() {
  let mut src = SliceSource::new(&[0_u8, 0, 0, 1, 2, 3]);
  assert_eq!(load_default(&mut src), Err(ImageError::UnsupportedFormat));
  // the sniffed bytes aren't consumed
  assert_eq!(src.position(), 0);

  let mut src = SliceSource::new(b"B");
  assert_eq!(load_default(&mut src), Err(ImageError::UnsupportedFormat));
  assert_eq!(src.position(), 0);
  assert_eq!(load_default(&mut SliceSource::new(b"")), Err(ImageError::UnsupportedFormat));
}

#[test]
fn test_every_format_routes() {
  let (bitmap, _) = load_default(&mut SliceSource::new(&crate::gif::simple_gif())).unwrap();
  assert_eq!(bitmap.unwrap().values(), &[0, 1, 2, 3, 3, 2, 1, 0]);

  let (bitmap, _) = load_default(&mut SliceSource::new(&crate::png::one_pixel_png())).unwrap();
  assert_eq!(bitmap.unwrap().values(), &[1]);

  let (bitmap, _) = load_default(&mut SliceSource::new(b"P2 3 1 255 0 128 255")).unwrap();
  assert_eq!(bitmap.unwrap().values(), &[0, 1, 2]);
}

#[test]
fn test_factories_are_required_where_needed() {
  assert_eq!(
    load(&mut SliceSource::new(&crate::gif::simple_gif()), None::<NoBitmap>, Some(VecPalette::new)),
    Err(ImageError::MissingCapability(Capability::BitmapFactory))
  );
  assert_eq!(
    load(&mut SliceSource::new(&crate::png::one_pixel_png()), None::<NoBitmap>, None::<NoPalette>),
    Err(ImageError::MissingCapability(Capability::BitmapFactory))
  );
  // bmp decodes just the palette
  let (bitmap, colors) =
    load(&mut SliceSource::new(&crate::bmp::one_bit_bmp()), None::<NoBitmap>, Some(VecPalette::new))
      .unwrap();
  assert!(bitmap.is_none());
  assert!(colors.is_some());
}

#[test]
fn test_decoding_twice_is_identical() {
  for bytes in [
    crate::bmp::one_bit_bmp(),
    crate::gif::simple_gif(),
    crate::png::one_pixel_png(),
    b"P3 2 1 255 1 2 3 4 5 6".to_vec(),
  ] {
    let first = load_default(&mut SliceSource::new(&bytes)).unwrap();
    let second = load_default(&mut SliceSource::new(&bytes)).unwrap();
    assert_eq!(first, second);
  }
}

#[test]
#[cfg(feature = "std")]
fn test_io_source() {
  let cursor = std::io::Cursor::new(crate::gif::simple_gif());
  let mut src = imageload::IoSource::new(cursor).unwrap();
  let (bitmap, _) = load_default(&mut src).unwrap();
  assert_eq!(bitmap.unwrap().values(), &[0, 1, 2, 3, 3, 2, 1, 0]);
}

/// Pretends to decode a JPEG: the size is in the two bytes after the `SOI`
/// marker, and every pixel comes out the same.
struct FakeJpeg {
  size: (u32, u32),
}
impl JpegDecoder for FakeJpeg {
  fn open(&mut self, src: &mut dyn ByteSource) -> ImageResult<(u32, u32)> {
    let mut soi = [0_u8; 2];
    src.read_exact(&mut soi)?;
    let width = u32::from(src.read_u8()?);
    let height = u32::from(src.read_u8()?);
    self.size = (width, height);
    Ok(self.size)
  }
  fn decode(&mut self, bitmap: &mut dyn BitmapSink) -> ImageResult<()> {
    for y in 0..self.size.1 {
      for x in 0..self.size.0 {
        bitmap.set_xy(x, y, 0x1234);
      }
    }
    Ok(())
  }
}

#[test]
fn test_jpeg_is_delegated() {
  let bytes = [0xFF_u8, 0xD8, 2, 1];
  assert_eq!(
    load_default(&mut SliceSource::new(&bytes)),
    Err(ImageError::MissingCapability(Capability::JpegDecoder))
  );

  let mut jpeg = FakeJpeg { size: (0, 0) };
  let (bitmap, colors) = load_with_jpeg(
    &mut SliceSource::new(&bytes),
    Some(VecBitmap::new),
    Some(VecPalette::new),
    Some(&mut jpeg),
  )
  .unwrap();
  let bitmap = bitmap.unwrap();
  assert_eq!(bitmap.values(), &[0x1234, 0x1234]);
  assert_eq!(bitmap.color_capacity(), 65535);
  assert_eq!(colors, Some(Colors::Converter(ColorConverter::new(Colorspace::RGB565_SWAPPED))));
}
