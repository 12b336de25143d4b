use imageload::{
  png::{is_png_header_correct, png_decode, PNG_SIGNATURE},
  Capability, ColorConverter, Colors, Colorspace, ImageError, Malformed, SliceSource, Unsupported,
  VecBitmap, VecPalette, RGB888,
};

use super::{NoBitmap, NoPalette};

fn adler32(data: &[u8]) -> u32 {
  let mut a = 1_u32;
  let mut b = 0_u32;
  for &byte in data {
    a = (a + u32::from(byte)) % 65521;
    b = (b + a) % 65521;
  }
  (b << 16) | a
}

/// Wraps the data in a zlib stream of uncompressed blocks.
pub fn zlib_stored(data: &[u8]) -> Vec<u8> {
  let mut v = vec![0x78, 0x01];
  let mut chunks = data.chunks(0xFFFF).peekable();
  if chunks.peek().is_none() {
    v.extend_from_slice(&[1, 0, 0, 0xFF, 0xFF]);
  }
  while let Some(chunk) = chunks.next() {
    let is_final = chunks.peek().is_none();
    v.push(u8::from(is_final));
    let len = chunk.len() as u16;
    v.extend_from_slice(&len.to_le_bytes());
    v.extend_from_slice(&(!len).to_le_bytes());
    v.extend_from_slice(chunk);
  }
  v.extend_from_slice(&adler32(data).to_be_bytes());
  v
}

/// One chunk, with a CRC field of zeroes (it isn't checked).
pub fn chunk(tag: &[u8; 4], data: &[u8]) -> Vec<u8> {
  let mut v = Vec::new();
  v.extend_from_slice(&(data.len() as u32).to_be_bytes());
  v.extend_from_slice(tag);
  v.extend_from_slice(data);
  v.extend_from_slice(&[0; 4]);
  v
}

pub fn ihdr(width: u32, height: u32, bit_depth: u8, color_type: u8, interlace: u8) -> Vec<u8> {
  let mut data = Vec::new();
  data.extend_from_slice(&width.to_be_bytes());
  data.extend_from_slice(&height.to_be_bytes());
  data.extend_from_slice(&[bit_depth, color_type, 0, 0, interlace]);
  chunk(b"IHDR", &data)
}

/// A whole PNG, from the chunks between the signature and `IEND`.
pub fn png_bytes(chunks: &[Vec<u8>]) -> Vec<u8> {
  let mut v = PNG_SIGNATURE.to_vec();
  for c in chunks {
    v.extend_from_slice(c);
  }
  v.extend(chunk(b"IEND", &[]));
  v
}

/// A 1x1, 1-bit indexed image, with the pixel set to index 1.
pub fn one_pixel_png() -> Vec<u8> {
  png_bytes(&[
    ihdr(1, 1, 1, 3, 0),
    chunk(b"PLTE", &[0, 0, 0, 255, 255, 255]),
    chunk(b"IDAT", &zlib_stored(&[0, 0x80])),
  ])
}

fn decode(bytes: &[u8]) -> (VecBitmap, Option<Colors<VecPalette>>) {
  let (bitmap, colors) =
    png_decode(&mut SliceSource::new(bytes), Some(VecBitmap::new), Some(VecPalette::new)).unwrap();
  (bitmap.unwrap(), colors)
}

#[test]
fn test_signature() {
  assert!(is_png_header_correct(&one_pixel_png()));
  assert!(!is_png_header_correct(b"\x89PNG"));
}

#[test]
fn test_one_bit_pixel() {
  let (bitmap, colors) = decode(&one_pixel_png());
  assert_eq!(bitmap.values(), &[1]);
  assert_eq!(bitmap.color_capacity(), 2);
  let colors = colors.unwrap();
  let palette = colors.palette().unwrap();
  assert_eq!(palette.get(1), Some(RGB888 { r: 255, g: 255, b: 255 }));
  assert!(!palette.entries()[0].transparent);
}

#[test]
fn test_indexed_with_filters() {
  // 8-bit: the second row uses the Up filter.
  let bytes = png_bytes(&[
    ihdr(3, 2, 8, 3, 0),
    chunk(b"PLTE", &[0; 12]),
    chunk(b"IDAT", &zlib_stored(&[0, 0, 1, 2, 2, 1, 1, 1])),
  ]);
  let (bitmap, _) = decode(&bytes);
  assert_eq!(bitmap.values(), &[0, 1, 2, 1, 2, 3]);

  // 2-bit: one byte per row, the second row uses Sub which does nothing when
  // there's only one byte.
  let bytes = png_bytes(&[
    ihdr(4, 2, 2, 3, 0),
    chunk(b"PLTE", &[0; 12]),
    chunk(b"IDAT", &zlib_stored(&[0, 0b00_01_10_11, 1, 0b11_10_01_00])),
  ]);
  let (bitmap, _) = decode(&bytes);
  assert_eq!(bitmap.values(), &[0, 1, 2, 3, 3, 2, 1, 0]);
  assert_eq!(bitmap.color_capacity(), 4);
}

#[test]
fn test_idat_can_be_split() {
  let zlib = zlib_stored(&[0, 0, 1, 2, 0, 2, 1, 0]);
  let (a, b) = zlib.split_at(5);
  let bytes = png_bytes(&[
    ihdr(3, 2, 8, 3, 0),
    chunk(b"PLTE", &[0; 9]),
    chunk(b"tEXt", b"Comment\0unknown chunks are skipped"),
    chunk(b"IDAT", a),
    chunk(b"IDAT", b),
  ]);
  let (bitmap, _) = decode(&bytes);
  assert_eq!(bitmap.values(), &[0, 1, 2, 2, 1, 0]);
}

#[test]
fn test_transparency() {
  let bytes = png_bytes(&[
    ihdr(1, 1, 1, 3, 0),
    chunk(b"PLTE", &[0, 0, 0, 255, 255, 255]),
    chunk(b"tRNS", &[0, 255]),
    chunk(b"IDAT", &zlib_stored(&[0, 0x80])),
  ]);
  let (_, colors) = decode(&bytes);
  let colors = colors.unwrap();
  let entries = colors.palette().unwrap().entries();
  assert!(entries[0].transparent);
  assert!(!entries[1].transparent);

  let bytes = png_bytes(&[
    ihdr(1, 1, 1, 3, 0),
    chunk(b"PLTE", &[0, 0, 0, 255, 255, 255]),
    chunk(b"tRNS", &[0, 0, 0]),
    chunk(b"IDAT", &zlib_stored(&[0, 0x80])),
  ]);
  assert_eq!(
    png_decode(&mut SliceSource::new(&bytes), Some(VecBitmap::new), Some(VecPalette::new)),
    Err(ImageError::MalformedStream(Malformed::TransparencyLargerThanPalette))
  );
}

#[test]
fn test_direct_color() {
  let bytes = png_bytes(&[
    ihdr(2, 1, 8, 2, 0),
    chunk(b"IDAT", &zlib_stored(&[0, 255, 0, 0, 0, 0, 255])),
  ]);
  let (bitmap, colors) = decode(&bytes);
  assert_eq!(bitmap.values(), &[0xF800, 0x001F]);
  assert_eq!(bitmap.color_capacity(), 65536);
  assert_eq!(colors, Some(Colors::Converter(ColorConverter::new(Colorspace::RGB565))));

  // RGBA, alpha is dropped
  let bytes = png_bytes(&[
    ihdr(1, 1, 8, 6, 0),
    chunk(b"IDAT", &zlib_stored(&[0, 0, 255, 0, 7])),
  ]);
  assert_eq!(decode(&bytes).0.values(), &[0x07E0]);

  // grayscale, and grayscale with alpha
  let bytes = png_bytes(&[ihdr(2, 1, 8, 0, 0), chunk(b"IDAT", &zlib_stored(&[0, 255, 0]))]);
  assert_eq!(decode(&bytes).0.values(), &[0xFFFF, 0x0000]);
  let bytes = png_bytes(&[ihdr(1, 1, 8, 4, 0), chunk(b"IDAT", &zlib_stored(&[0, 255, 0]))]);
  assert_eq!(decode(&bytes).0.values(), &[0xFFFF]);
}

#[test]
fn test_png_failures() {
  let bytes = one_pixel_png();
  assert_eq!(
    png_decode(&mut SliceSource::new(&bytes), None::<NoBitmap>, Some(VecPalette::new)),
    Err(ImageError::MissingCapability(Capability::BitmapFactory))
  );
  assert_eq!(
    png_decode(&mut SliceSource::new(&bytes[1..]), Some(VecBitmap::new), None::<NoPalette>),
    Err(ImageError::NotAPng)
  );

  let bytes = png_bytes(&[ihdr(1, 1, 8, 2, 1)]);
  assert_eq!(
    png_decode(&mut SliceSource::new(&bytes), Some(VecBitmap::new), None::<NoPalette>),
    Err(ImageError::UnsupportedFeature(Unsupported::Interlacing))
  );

  let bytes = png_bytes(&[ihdr(1, 1, 16, 2, 0), chunk(b"IDAT", &zlib_stored(&[0; 7]))]);
  assert_eq!(
    png_decode(&mut SliceSource::new(&bytes), Some(VecBitmap::new), None::<NoPalette>),
    Err(ImageError::UnsupportedFeature(Unsupported::BitDepth(16)))
  );

  let bytes = png_bytes(&[ihdr(1, 1, 8, 2, 0), chunk(b"PLTE", &[0, 0, 0])]);
  assert_eq!(
    png_decode(&mut SliceSource::new(&bytes), Some(VecBitmap::new), Some(VecPalette::new)),
    Err(ImageError::UnsupportedFeature(Unsupported::PaletteOnNonIndexed))
  );

  let bytes = png_bytes(&[ihdr(1, 1, 8, 0, 0), chunk(b"IDAT", &zlib_stored(&[5, 0]))]);
  assert_eq!(
    png_decode(&mut SliceSource::new(&bytes), Some(VecBitmap::new), None::<NoPalette>),
    Err(ImageError::MalformedStream(Malformed::InvalidFilterType(5)))
  );

  // the zlib data holds less than the image needs
  let bytes = png_bytes(&[ihdr(2, 2, 8, 0, 0), chunk(b"IDAT", &zlib_stored(&[0, 0, 0]))]);
  assert_eq!(
    png_decode(&mut SliceSource::new(&bytes), Some(VecBitmap::new), None::<NoPalette>),
    Err(ImageError::MalformedStream(Malformed::Truncated))
  );

  let bytes = png_bytes(&[ihdr(1, 1, 8, 0, 0), chunk(b"IDAT", &[0x78, 0x01, 0xFF, 0xFF])]);
  assert_eq!(
    png_decode(&mut SliceSource::new(&bytes), Some(VecBitmap::new), None::<NoPalette>),
    Err(ImageError::MalformedStream(Malformed::Inflate))
  );

  // no IEND
  let mut bytes = one_pixel_png();
  bytes.truncate(bytes.len() - 12);
  assert_eq!(
    png_decode(&mut SliceSource::new(&bytes), Some(VecBitmap::new), None::<NoPalette>),
    Err(ImageError::MalformedStream(Malformed::Truncated))
  );
}
