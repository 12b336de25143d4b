use imageload::{
  bmp::{bmp_decode, bmp_read_info},
  BitmapSink, ColorConverter, Colors, Colorspace, ImageError, Malformed, SliceSource, Unsupported, VecBitmap,
  VecPalette, RGB888,
};

use super::{NoBitmap, NoPalette};

/// Builds a BMP file in memory.
pub struct BmpBuilder {
  pub width: i32,
  pub height: i32,
  pub bits_per_pixel: u16,
  /// Blue, green, red, unused.
  pub palette: Vec<[u8; 4]>,
  /// Bitfield masks, written as stored on disk.
  pub masks: Option<[u8; 12]>,
  /// All rows, with their padding, in file order.
  pub pixels: Vec<u8>,
}
impl BmpBuilder {
  pub fn build(&self) -> Vec<u8> {
    let header_size: u32 = if self.masks.is_some() { 56 } else { 40 };
    let data_start = 14 + header_size + (self.palette.len() as u32) * 4;
    let file_size = data_start + self.pixels.len() as u32;
    let compression: u32 = if self.masks.is_some() { 3 } else { 0 };
    let mut v = Vec::new();
    v.extend_from_slice(b"BM");
    v.extend_from_slice(&file_size.to_le_bytes());
    v.extend_from_slice(&[0; 4]);
    v.extend_from_slice(&data_start.to_le_bytes());
    v.extend_from_slice(&header_size.to_le_bytes());
    v.extend_from_slice(&self.width.to_le_bytes());
    v.extend_from_slice(&self.height.to_le_bytes());
    v.extend_from_slice(&1_u16.to_le_bytes());
    v.extend_from_slice(&self.bits_per_pixel.to_le_bytes());
    v.extend_from_slice(&compression.to_le_bytes());
    v.extend_from_slice(&(self.pixels.len() as u32).to_le_bytes());
    v.extend_from_slice(&2835_i32.to_le_bytes());
    v.extend_from_slice(&2835_i32.to_le_bytes());
    v.extend_from_slice(&(self.palette.len() as u32).to_le_bytes());
    v.extend_from_slice(&0_u32.to_le_bytes());
    if let Some(masks) = self.masks {
      v.extend_from_slice(&masks);
      // alpha mask
      v.extend_from_slice(&[0; 4]);
    }
    for entry in &self.palette {
      v.extend_from_slice(entry);
    }
    v.extend_from_slice(&self.pixels);
    assert_eq!(v.len(), file_size as usize);
    v
  }
}

/// A 3x2, 1-bit, bottom-up image.
///
/// ```txt
/// 1 0 1
/// 0 1 1
/// ```
pub fn one_bit_bmp() -> Vec<u8> {
  BmpBuilder {
    width: 3,
    height: 2,
    bits_per_pixel: 1,
    palette: vec![[0x10, 0x20, 0x30, 0], [0xFF, 0x80, 0x00, 0]],
    masks: None,
    pixels: vec![0b0110_0000, 0, 0, 0, 0b1010_0000, 0, 0, 0],
  }
  .build()
}

fn decode(bytes: &[u8]) -> (VecBitmap, Colors<VecPalette>) {
  let (bitmap, colors) =
    bmp_decode(&mut SliceSource::new(bytes), Some(VecBitmap::new), Some(VecPalette::new)).unwrap();
  (bitmap.unwrap(), colors.unwrap())
}

#[test]
fn test_one_bit_bottom_up() {
  let (bitmap, colors) = decode(&one_bit_bmp());
  assert_eq!(bitmap.values(), &[1, 0, 1, 0, 1, 1]);
  assert_eq!(bitmap.color_capacity(), 2);
  assert!(bitmap.is_fully_written());
  let palette = colors.palette().unwrap();
  // stored blue first, returned red first
  assert_eq!(palette.get(0), Some(RGB888 { r: 0x30, g: 0x20, b: 0x10 }));
  assert_eq!(palette.get(1), Some(RGB888 { r: 0x00, g: 0x80, b: 0xFF }));
  assert_eq!(palette.entries().len(), 2);
}

#[test]
fn test_four_bit_top_down() {
  let bytes = BmpBuilder {
    width: 3,
    height: -2,
    bits_per_pixel: 4,
    palette: vec![[0, 0, 0, 0], [1, 1, 1, 0], [2, 2, 2, 0]],
    masks: None,
    pixels: vec![0x01, 0x20, 0, 0, 0x22, 0x10, 0, 0],
  }
  .build();
  let (bitmap, colors) = decode(&bytes);
  assert_eq!(bitmap.values(), &[0, 1, 2, 2, 2, 1]);
  assert_eq!(bitmap.height(), 2);
  assert_eq!(colors.palette().unwrap().entries().len(), 3);
}

#[test]
fn test_two_and_eight_bit() {
  let bytes = BmpBuilder {
    width: 5,
    height: 1,
    bits_per_pixel: 2,
    palette: vec![[0; 4]; 4],
    masks: None,
    pixels: vec![0b11_10_01_00, 0b11_00_00_00, 0, 0],
  }
  .build();
  let (bitmap, _) = decode(&bytes);
  assert_eq!(bitmap.values(), &[3, 2, 1, 0, 3]);

  let bytes = BmpBuilder {
    width: 2,
    height: 2,
    bits_per_pixel: 8,
    palette: vec![[0; 4]; 3],
    masks: None,
    pixels: vec![2, 0, 0, 0, 1, 2, 0, 0],
  }
  .build();
  let (bitmap, _) = decode(&bytes);
  assert_eq!(bitmap.values(), &[1, 2, 2, 0]);
  assert_eq!(bitmap.color_capacity(), 3);
}

#[test]
fn test_index_past_the_palette() {
  let bytes = BmpBuilder {
    width: 1,
    height: 1,
    bits_per_pixel: 1,
    palette: vec![[0; 4]],
    masks: None,
    pixels: vec![0b1000_0000, 0, 0, 0],
  }
  .build();
  assert_eq!(
    bmp_decode(&mut SliceSource::new(&bytes), Some(VecBitmap::new), None::<NoPalette>),
    Err(ImageError::MalformedStream(Malformed::IndexOutOfRange))
  );
}

#[test]
fn test_palette_only() {
  let bytes = one_bit_bmp();
  let (bitmap, colors) =
    bmp_decode(&mut SliceSource::new(&bytes), None::<NoBitmap>, Some(VecPalette::new)).unwrap();
  assert!(bitmap.is_none());
  assert_eq!(colors.unwrap().palette().unwrap().get(0), Some(RGB888 { r: 0x30, g: 0x20, b: 0x10 }));
}

#[test]
fn test_24_bit() {
  // bottom-up, so the file holds the second row first
  let bytes = BmpBuilder {
    width: 2,
    height: 2,
    bits_per_pixel: 24,
    palette: vec![],
    masks: None,
    pixels: vec![
      0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0, 0, //
      0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0, 0,
    ],
  }
  .build();
  let (bitmap, colors) = decode(&bytes);
  assert_eq!(bitmap.values(), &[0xF800, 0x001F, 0x0000, 0xFFFF]);
  assert_eq!(bitmap.color_capacity(), 65535);
  assert_eq!(colors, Colors::Converter(ColorConverter::new(Colorspace::RGB565)));
}

#[test]
fn test_16_bit_defaults_to_555() {
  let bytes = BmpBuilder {
    width: 2,
    height: 1,
    bits_per_pixel: 16,
    palette: vec![],
    masks: None,
    pixels: 0x7C00_u16.to_le_bytes().into_iter().chain(0x03E0_u16.to_le_bytes()).collect(),
  }
  .build();
  let (bitmap, _) = decode(&bytes);
  assert_eq!(bitmap.values(), &[0xF800, 0x07E0]);
}

#[test]
fn test_bitfields() {
  let mut masks = [0_u8; 12];
  masks[0..4].copy_from_slice(&0xF800_u32.to_le_bytes());
  masks[4..8].copy_from_slice(&0x07E0_u32.to_le_bytes());
  masks[8..12].copy_from_slice(&0x001F_u32.to_le_bytes());
  let bytes = BmpBuilder {
    width: 2,
    height: 1,
    bits_per_pixel: 16,
    palette: vec![],
    masks: Some(masks),
    pixels: 0x07E0_u16.to_le_bytes().into_iter().chain(0xF81F_u16.to_le_bytes()).collect(),
  }
  .build();
  let info = bmp_read_info(&mut SliceSource::new(&bytes)).unwrap();
  assert_eq!(info.masks.unwrap().colorspace(), Some(Colorspace::RGB565));
  let (bitmap, _) = decode(&bytes);
  assert_eq!(bitmap.values(), &[0x07E0, 0xF81F]);

  // 32-bit masks are read big-endian, which turns the usual on-disk BGRA
  // masks into this pattern.
  let mut masks = [0_u8; 12];
  masks[0..4].copy_from_slice(&0x00FF_0000_u32.to_le_bytes());
  masks[4..8].copy_from_slice(&0x0000_FF00_u32.to_le_bytes());
  masks[8..12].copy_from_slice(&0x0000_00FF_u32.to_le_bytes());
  let bytes = BmpBuilder {
    width: 2,
    height: 1,
    bits_per_pixel: 32,
    palette: vec![],
    masks: Some(masks),
    pixels: vec![0xFF, 0x00, 0x00, 0x80, 0x00, 0xFF, 0x00, 0x80],
  }
  .build();
  let (bitmap, _) = decode(&bytes);
  assert_eq!(bitmap.values(), &[0x001F, 0x07E0]);
}

#[test]
fn test_unknown_bitfields() {
  let mut masks = [0_u8; 12];
  masks[0..4].copy_from_slice(&0x000F_u32.to_le_bytes());
  masks[4..8].copy_from_slice(&0x00F0_u32.to_le_bytes());
  masks[8..12].copy_from_slice(&0x0F00_u32.to_le_bytes());
  let bytes = BmpBuilder {
    width: 1,
    height: 1,
    bits_per_pixel: 16,
    palette: vec![],
    masks: Some(masks),
    pixels: vec![0; 4],
  }
  .build();
  assert_eq!(
    bmp_decode(&mut SliceSource::new(&bytes), Some(VecBitmap::new), None::<NoPalette>),
    Err(ImageError::UnsupportedFeature(Unsupported::BitfieldMask))
  );
}

#[test]
fn test_truncated_pixels() {
  let mut bytes = one_bit_bmp();
  bytes.truncate(bytes.len() - 4);
  assert_eq!(
    bmp_decode(&mut SliceSource::new(&bytes), Some(VecBitmap::new), None::<NoPalette>),
    Err(ImageError::MalformedStream(Malformed::Truncated))
  );
}

#[test]
fn test_bit_depth_is_reported_in_full() {
  let bytes = BmpBuilder {
    width: 1,
    height: 1,
    bits_per_pixel: 256,
    palette: vec![],
    masks: None,
    pixels: vec![0; 32],
  }
  .build();
  assert_eq!(
    bmp_decode(&mut SliceSource::new(&bytes), Some(VecBitmap::new), None::<NoPalette>),
    Err(ImageError::UnsupportedFeature(Unsupported::BitDepth(256)))
  );
}
