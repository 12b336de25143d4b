use alloc::collections::TryReserveError;
use core::{
  fmt,
  num::{ParseIntError, TryFromIntError},
  str::Utf8Error,
};

/// Result alias used by every decoder in this crate.
pub type ImageResult<T> = Result<T, ImageError>;

/// An error from the `imageload` crate.
///
/// Every failure aborts the decode call that produced it. There's no partial
/// image handed back alongside an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ImageError {
  /// The first bytes of the stream didn't match any known image format.
  UnsupportedFormat,

  /// A GIF decode was requested but the signature isn't `GIF87a` or `GIF89a`.
  NotAGif,

  /// A PNG decode was requested but the 8 byte PNG signature is wrong.
  NotAPng,

  /// The image is valid (probably), but uses a feature this crate can't decode
  /// losslessly.
  UnsupportedFeature(Unsupported),

  /// A factory or collaborator that this format needs wasn't supplied.
  MissingCapability(Capability),

  /// The data is truncated or otherwise inconsistent.
  MalformedStream(Malformed),

  /// The allocator couldn't give us enough space for a working buffer.
  Alloc,

  /// An I/O error other than running out of data.
  #[cfg(feature = "std")]
  Io(std::io::ErrorKind),
}

/// Broad classification of an [`ImageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
  UnsupportedFormat,
  SignatureMismatch,
  UnsupportedFeature,
  MissingCapability,
  MalformedStream,
  Alloc,
  Io,
}

/// Features that are recognized but not decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Unsupported {
  /// Interlaced GIF frames or Adam7 PNG images.
  Interlacing,
  /// BMP bitfield masks that don't match RGB555, RGB565, or RGB888.
  BitfieldMask,
  /// BMP compression codes above 3 (RLE24, JPEG, PNG, alpha bitfields, CMYK).
  BmpCompression(u32),
  /// A bit depth the decoder can't represent for this color layout.
  BitDepth(u16),
  /// Netpbm files with a maximum sample value above 255.
  SixteenBitSamples,
  /// A PNG `PLTE` chunk in an image that isn't indexed color.
  PaletteOnNonIndexed,
  /// A PNG color type outside of the five defined ones.
  ColorType(u8),
  /// A Netpbm magic number other than `P1` through `P6`. Holds the ASCII byte
  /// after the `P`.
  NetpbmTag(u8),
}

/// The caller-supplied capabilities a decoder might need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
  BitmapFactory,
  PaletteFactory,
  JpegDecoder,
}

/// Ways that an image stream can be malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Malformed {
  /// Fewer bytes were available than the format requires.
  Truncated,
  /// A GIF block introducer other than image, extension, or trailer.
  BadBlockType(u8),
  /// A PNG scanline filter byte outside of `0..=4`.
  InvalidFilterType(u8),
  /// A PNG `tRNS` chunk with more entries than the palette.
  TransparencyLargerThanPalette,
  /// Header fields that contradict the format's fixed rules.
  InvalidHeader,
  /// An LZW code that refers past the end of the dictionary.
  BadLzwCode,
  /// The zlib stream inside the PNG `IDAT` chunks didn't inflate.
  Inflate,
  /// A pixel referenced a palette entry past the end of the palette.
  IndexOutOfRange,
  /// A textual number couldn't be parsed or doesn't fit.
  BadNumber,
}

impl ImageError {
  /// The broad category of this error.
  #[inline]
  #[must_use]
  pub const fn kind(&self) -> ErrorKind {
    match self {
      Self::UnsupportedFormat => ErrorKind::UnsupportedFormat,
      Self::NotAGif | Self::NotAPng => ErrorKind::SignatureMismatch,
      Self::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
      Self::MissingCapability(_) => ErrorKind::MissingCapability,
      Self::MalformedStream(_) => ErrorKind::MalformedStream,
      Self::Alloc => ErrorKind::Alloc,
      #[cfg(feature = "std")]
      Self::Io(_) => ErrorKind::Io,
    }
  }
}

impl From<Unsupported> for ImageError {
  #[inline]
  fn from(u: Unsupported) -> Self {
    Self::UnsupportedFeature(u)
  }
}
impl From<Capability> for ImageError {
  #[inline]
  fn from(c: Capability) -> Self {
    Self::MissingCapability(c)
  }
}
impl From<Malformed> for ImageError {
  #[inline]
  fn from(m: Malformed) -> Self {
    Self::MalformedStream(m)
  }
}
impl From<TryReserveError> for ImageError {
  #[inline]
  fn from(_: TryReserveError) -> Self {
    Self::Alloc
  }
}
impl From<Utf8Error> for ImageError {
  #[inline]
  fn from(_: Utf8Error) -> Self {
    Self::MalformedStream(Malformed::BadNumber)
  }
}
impl From<ParseIntError> for ImageError {
  #[inline]
  fn from(_: ParseIntError) -> Self {
    Self::MalformedStream(Malformed::BadNumber)
  }
}
impl From<TryFromIntError> for ImageError {
  #[inline]
  fn from(_: TryFromIntError) -> Self {
    Self::MalformedStream(Malformed::BadNumber)
  }
}
#[cfg(feature = "std")]
impl From<std::io::Error> for ImageError {
  #[inline]
  fn from(e: std::io::Error) -> Self {
    match e.kind() {
      std::io::ErrorKind::UnexpectedEof => Self::MalformedStream(Malformed::Truncated),
      other => Self::Io(other),
    }
  }
}

impl fmt::Display for ImageError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::UnsupportedFormat => f.write_str("unsupported image format"),
      Self::NotAGif => f.write_str("not a GIF file"),
      Self::NotAPng => f.write_str("not a PNG file"),
      Self::UnsupportedFeature(u) => write!(f, "unsupported: {u}"),
      Self::MissingCapability(c) => write!(f, "missing capability: {c:?}"),
      Self::MalformedStream(m) => write!(f, "malformed stream: {m}"),
      Self::Alloc => f.write_str("allocation failed"),
      #[cfg(feature = "std")]
      Self::Io(kind) => write!(f, "i/o error: {kind}"),
    }
  }
}

impl fmt::Display for Unsupported {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Interlacing => f.write_str("interlaced images"),
      Self::BitfieldMask => f.write_str("bitfield mask not supported"),
      Self::BmpCompression(c) => write!(f, "bmp compression type {c}"),
      Self::BitDepth(d) => write!(f, "bit depth {d}"),
      Self::SixteenBitSamples => f.write_str("16 bit samples"),
      Self::PaletteOnNonIndexed => f.write_str("palette in non-indexed image"),
      Self::ColorType(t) => write!(f, "png color type {t}"),
      Self::NetpbmTag(t) => write!(f, "netpbm magic number P{}", *t as char),
    }
  }
}

impl fmt::Display for Malformed {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Truncated => f.write_str("ran out of data"),
      Self::BadBlockType(b) => write!(f, "bad block type 0x{b:02X}"),
      Self::InvalidFilterType(t) => write!(f, "invalid filter type {t}"),
      Self::TransparencyLargerThanPalette => f.write_str("tRNS chunk is larger than the palette"),
      Self::InvalidHeader => f.write_str("invalid header"),
      Self::BadLzwCode => f.write_str("lzw code past the end of the dictionary"),
      Self::Inflate => f.write_str("zlib decompression failed"),
      Self::IndexOutOfRange => f.write_str("palette index out of range"),
      Self::BadNumber => f.write_str("bad number"),
    }
  }
}

#[cfg(feature = "std")]
impl std::error::Error for ImageError {}

#[test]
fn test_error_kinds() {
  assert_eq!(ImageError::NotAGif.kind(), ErrorKind::SignatureMismatch);
  assert_eq!(ImageError::NotAPng.kind(), ErrorKind::SignatureMismatch);
  assert_eq!(ImageError::from(Unsupported::Interlacing).kind(), ErrorKind::UnsupportedFeature);
  assert_eq!(ImageError::from(Capability::JpegDecoder).kind(), ErrorKind::MissingCapability);
  assert_eq!(ImageError::from(Malformed::Truncated).kind(), ErrorKind::MalformedStream);
  assert_eq!(ImageError::from("x".parse::<u32>().unwrap_err()), ImageError::MalformedStream(Malformed::BadNumber));
  assert_eq!(ImageError::from(u8::try_from(300_u32).unwrap_err()), ImageError::MalformedStream(Malformed::BadNumber));
}
