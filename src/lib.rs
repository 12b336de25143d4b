#![no_std]
#![cfg_attr(docs_rs, feature(doc_cfg))]
#![warn(missing_debug_implementations)]

//! A crate for decoding images into bitmaps and palettes that the caller
//! provides.
//!
//! Supported formats:
//! * BMP: 1, 2, 4, and 8 bit indexed color, and 16, 24, or 32 bit direct color.
//! * GIF: non-interlaced, with the global color table.
//! * PNG: non-interlaced, indexed color at any depth, or 8-bit direct color.
//! * Netpbm: `P1` through `P6`.
//! * JPEG: only through a [`JpegDecoder`] that you supply.
//!
//! Start with [`load`], or [`load_default`] if you don't have image types of
//! your own. Each format module can also be used directly.
//!
//! ## Output
//! A decode gives back an optional bitmap and optional [`Colors`]. Indexed
//! formats give a palette, and every bitmap value is an index into it. Direct
//! color formats give a [`ColorConverter`] instead, describing how to read the
//! bitmap values.
//!
//! ## Logging
//! Decoders emit `debug` and `trace` records through the [`log`] facade. Errors
//! are always returned, never only logged.

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

#[cfg(target_pointer_width = "16")]
compile_error!("this crate assumes 32-bit or bigger pointers!");

mod error;
pub use error::*;

pub mod image;
pub use image::*;

pub mod pixel_formats;
pub use pixel_formats::*;

pub mod source;
pub use source::*;

mod parser_helpers;

pub mod jpeg;
pub use jpeg::JpegDecoder;

mod sniff;
pub use sniff::*;

#[cfg(feature = "bmp")]
#[cfg_attr(docs_rs, doc(cfg(feature = "bmp")))]
pub mod bmp;

#[cfg(feature = "gif")]
#[cfg_attr(docs_rs, doc(cfg(feature = "gif")))]
pub mod gif;

#[cfg(feature = "gif")]
#[cfg_attr(docs_rs, doc(cfg(feature = "gif")))]
pub mod lzw;

#[cfg(feature = "png")]
#[cfg_attr(docs_rs, doc(cfg(feature = "png")))]
pub mod png;

#[cfg(feature = "netpbm")]
#[cfg_attr(docs_rs, doc(cfg(feature = "netpbm")))]
pub mod netpbm;
