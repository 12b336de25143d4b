#![forbid(unsafe_code)]

//! The variable code width LZW used by GIF.
//!
//! This is *not* the LZ77 + Huffman "deflate" used by PNG. Codes are packed
//! least significant bit first, start at `min_code_size + 1` bits, and grow by
//! one bit each time the dictionary fills the current width, up to 12 bits.
//!
//! Two codes are reserved: the clear code (`1 << min_code_size`) throws out
//! everything learned so far, and the code after it ends the stream.

use alloc::vec::Vec;

use crate::error::{ImageResult, Malformed};

/// Codes are at most 12 bits.
const MAX_CODE_LEN: u32 = 12;
const MAX_CODES: usize = 1 << MAX_CODE_LEN;

/// Pulls decoded runs of bytes out of a stream of LZW codes.
///
/// Each decoder owns a fresh dictionary and bit cursor, so decoding a second
/// stream means making a second decoder.
///
/// Strings are stored as `(prefix code, suffix byte)` pairs, so the dictionary
/// is a fixed size no matter how long the strings get.
#[derive(Debug, Clone)]
pub struct LzwDecoder<I> {
  bytes: I,
  min_code_size: u32,
  clear_code: u16,
  end_code: u16,
  code_len: u32,
  next_code: u16,
  last: Option<u16>,
  prefix: Vec<u16>,
  suffix: Vec<u8>,
  first: Vec<u8>,
  lens: Vec<u16>,
  bit_buf: u32,
  bit_count: u32,
  out: Vec<u8>,
  done: bool,
}

impl<I: Iterator<Item = u8>> LzwDecoder<I> {
  /// Makes a decoder over already de-blocked bytes.
  ///
  /// ## Failure
  /// * `InvalidHeader` if the minimum code size would leave no room for any
  ///   dictionary entries (above 11).
  pub fn new(bytes: I, min_code_size: u8) -> ImageResult<Self> {
    let min_code_size = u32::from(min_code_size);
    if min_code_size >= MAX_CODE_LEN {
      return Err(Malformed::InvalidHeader.into());
    }
    let clear_code = 1_u16 << min_code_size;
    let mut prefix = Vec::with_capacity(MAX_CODES);
    let mut suffix = Vec::with_capacity(MAX_CODES);
    let mut first = Vec::with_capacity(MAX_CODES);
    let mut lens = Vec::with_capacity(MAX_CODES);
    // The literal codes never change, so they're filled in once. The reserved
    // codes get placeholder entries that are never looked up.
    for code in 0..(clear_code + 2) {
      prefix.push(u16::MAX);
      suffix.push(code as u8);
      first.push(code as u8);
      lens.push(1);
    }
    let mut out = Self {
      bytes,
      min_code_size,
      clear_code,
      end_code: clear_code + 1,
      code_len: 0,
      next_code: 0,
      last: None,
      prefix,
      suffix,
      first,
      lens,
      bit_buf: 0,
      bit_count: 0,
      out: Vec::new(),
      done: false,
    };
    out.reset();
    Ok(out)
  }

  /// Gives back the byte iterator, positioned wherever decoding stopped.
  #[inline]
  pub fn into_inner(self) -> I {
    self.bytes
  }

  fn reset(&mut self) {
    self.code_len = self.min_code_size + 1;
    self.next_code = self.end_code + 1;
    self.last = None;
    let literal_count = usize::from(self.next_code);
    self.prefix.truncate(literal_count);
    self.suffix.truncate(literal_count);
    self.first.truncate(literal_count);
    self.lens.truncate(literal_count);
  }

  /// Gets the next code, or `None` if the input runs out partway.
  fn read_code(&mut self) -> Option<u16> {
    while self.bit_count < self.code_len {
      let byte = self.bytes.next()?;
      self.bit_buf |= u32::from(byte) << self.bit_count;
      self.bit_count += 8;
    }
    let code = self.bit_buf & ((1 << self.code_len) - 1);
    self.bit_buf >>= self.code_len;
    self.bit_count -= self.code_len;
    Some(code as u16)
  }

  /// Writes the string for a code that's already in the dictionary.
  fn emit(&mut self, code: u16) {
    let len = usize::from(self.lens[usize::from(code)]);
    self.out.clear();
    self.out.resize(len, 0);
    let mut c = code;
    for slot in self.out.iter_mut().rev() {
      *slot = self.suffix[usize::from(c)];
      c = self.prefix[usize::from(c)];
    }
  }

  /// Decodes the next run of bytes.
  ///
  /// Clear codes are handled internally and never show up as an empty run.
  /// Returns `Ok(None)` once the end code is reached (the rest of the input is
  /// drained) or the input runs out.
  ///
  /// ## Failure
  /// * `BadLzwCode` for a code that's past the next free dictionary slot, or
  ///   that refers to the previous string when there isn't one.
  pub fn next_run(&mut self) -> ImageResult<Option<&[u8]>> {
    loop {
      if self.done {
        return Ok(None);
      }
      let code = match self.read_code() {
        Some(code) => code,
        None => {
          self.done = true;
          return Ok(None);
        }
      };
      if code == self.clear_code {
        log::trace!("lzw clear code, dictionary had {} entries", self.next_code);
        self.reset();
        continue;
      }
      if code == self.end_code {
        self.done = true;
        self.bytes.by_ref().for_each(drop);
        return Ok(None);
      }

      if code < self.next_code {
        self.emit(code);
      } else if code == self.next_code {
        let last = self.last.ok_or(Malformed::BadLzwCode)?;
        self.emit(last);
        let head = self.first[usize::from(last)];
        self.out.push(head);
      } else {
        return Err(Malformed::BadLzwCode.into());
      }

      if let Some(last) = self.last {
        if usize::from(self.next_code) < MAX_CODES {
          let l = usize::from(last);
          self.prefix.push(last);
          self.suffix.push(self.out[0]);
          self.first.push(self.first[l]);
          self.lens.push(self.lens[l] + 1);
          self.next_code += 1;
        }
      }
      if u32::from(self.next_code) >= (1 << self.code_len) && self.code_len < MAX_CODE_LEN {
        self.code_len += 1;
      }
      self.last = Some(code);
      return Ok(Some(&self.out));
    }
  }
}

/// Decodes an entire LZW stream into a `Vec`.
pub fn lzw_decode_to_vec<I>(bytes: I, min_code_size: u8) -> ImageResult<Vec<u8>>
where
  I: IntoIterator<Item = u8>,
{
  let mut decoder = LzwDecoder::new(bytes.into_iter(), min_code_size)?;
  let mut v = Vec::new();
  while let Some(run) = decoder.next_run()? {
    v.extend_from_slice(run);
  }
  Ok(v)
}
