//! Byte sources that decoders pull from.
//!
//! Every decoder reads through a `&mut dyn ByteSource`. Reads are sequential,
//! but several formats seek backward (the BMP palette lives before the pixel
//! data, Netpbm scans its pixels twice), so a source must also support absolute
//! seeks.

use crate::error::{ImageResult, Malformed};

/// A seekable stream of bytes.
pub trait ByteSource {
  /// Reads up to `buf.len()` bytes, returning how many were read.
  ///
  /// Returning 0 for a non-empty `buf` means the end of the data.
  fn read(&mut self, buf: &mut [u8]) -> ImageResult<usize>;

  /// The absolute position of the next byte to be read.
  fn position(&self) -> u64;

  /// Moves to an absolute position.
  ///
  /// Seeking past the end is allowed, the next read just returns 0.
  fn seek_to(&mut self, pos: u64) -> ImageResult<()>;

  /// Fills all of `buf`.
  ///
  /// ## Failure
  /// * `Truncated` if the data runs out first.
  fn read_exact(&mut self, mut buf: &mut [u8]) -> ImageResult<()> {
    while !buf.is_empty() {
      let count = self.read(buf)?;
      if count == 0 {
        return Err(Malformed::Truncated.into());
      }
      buf = &mut buf[count..];
    }
    Ok(())
  }

  /// Reads exactly one byte.
  #[inline]
  fn read_u8(&mut self) -> ImageResult<u8> {
    let mut b = [0_u8; 1];
    self.read_exact(&mut b)?;
    Ok(b[0])
  }

  /// Reads one byte, or `None` at the end of the data.
  #[inline]
  fn read_u8_opt(&mut self) -> ImageResult<Option<u8>> {
    let mut b = [0_u8; 1];
    Ok(if self.read(&mut b)? == 0 { None } else { Some(b[0]) })
  }

  /// Moves forward by `count` bytes.
  #[inline]
  fn skip(&mut self, count: u64) -> ImageResult<()> {
    let pos = self.position().saturating_add(count);
    self.seek_to(pos)
  }
}

/// A cursor over an in-memory byte slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SliceSource<'b> {
  bytes: &'b [u8],
  pos: usize,
}
impl<'b> SliceSource<'b> {
  #[inline]
  #[must_use]
  pub const fn new(bytes: &'b [u8]) -> Self {
    Self { bytes, pos: 0 }
  }

  /// The bytes that haven't been read yet.
  #[inline]
  #[must_use]
  pub fn remaining(&self) -> &'b [u8] {
    self.bytes.get(self.pos..).unwrap_or(&[])
  }
}
impl ByteSource for SliceSource<'_> {
  #[inline]
  fn read(&mut self, buf: &mut [u8]) -> ImageResult<usize> {
    let rest = self.remaining();
    let count = buf.len().min(rest.len());
    buf[..count].copy_from_slice(&rest[..count]);
    self.pos += count;
    Ok(count)
  }
  #[inline]
  fn position(&self) -> u64 {
    self.pos as u64
  }
  #[inline]
  fn seek_to(&mut self, pos: u64) -> ImageResult<()> {
    self.pos = usize::try_from(pos).unwrap_or(usize::MAX);
    Ok(())
  }
}

/// Adapts any `std::io` reader that can seek.
#[cfg(feature = "std")]
#[cfg_attr(docs_rs, doc(cfg(feature = "std")))]
#[derive(Debug)]
pub struct IoSource<R> {
  inner: R,
  pos: u64,
}
#[cfg(feature = "std")]
impl<R: std::io::Read + std::io::Seek> IoSource<R> {
  /// Wraps the reader, starting from wherever its cursor currently is.
  ///
  /// Positions reported by this source are absolute positions in the reader.
  pub fn new(mut inner: R) -> ImageResult<Self> {
    let pos = inner.stream_position()?;
    Ok(Self { inner, pos })
  }

  #[inline]
  pub fn into_inner(self) -> R {
    self.inner
  }
}
#[cfg(feature = "std")]
impl<R: std::io::Read + std::io::Seek> ByteSource for IoSource<R> {
  fn read(&mut self, buf: &mut [u8]) -> ImageResult<usize> {
    loop {
      match self.inner.read(buf) {
        Ok(count) => {
          self.pos += count as u64;
          return Ok(count);
        }
        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
        Err(e) => return Err(e.into()),
      }
    }
  }
  #[inline]
  fn position(&self) -> u64 {
    self.pos
  }
  fn seek_to(&mut self, pos: u64) -> ImageResult<()> {
    self.pos = self.inner.seek(std::io::SeekFrom::Start(pos))?;
    Ok(())
  }
}

#[test]
fn test_slice_source() {
  let mut s = SliceSource::new(&[1, 2, 3, 4, 5]);
  assert_eq!(s.read_u8().unwrap(), 1);
  let mut buf = [0_u8; 2];
  s.read_exact(&mut buf).unwrap();
  assert_eq!(buf, [2, 3]);
  assert_eq!(s.position(), 3);
  s.skip(1).unwrap();
  assert_eq!(s.read_u8_opt().unwrap(), Some(5));
  assert_eq!(s.read_u8_opt().unwrap(), None);
  assert_eq!(
    s.read_u8(),
    Err(crate::error::ImageError::MalformedStream(Malformed::Truncated))
  );
  // seeking past the end is fine, reads just come up empty.
  s.seek_to(100).unwrap();
  assert_eq!(s.read(&mut buf).unwrap(), 0);
  s.seek_to(0).unwrap();
  let mut big = [0_u8; 8];
  assert_eq!(s.read(&mut big).unwrap(), 5);
}
