//! Baseline TIFF encoder
//!
//! Serializes raster images into TIFF 6.0 byte streams, including the
//! Technical Note 2 JPEG-in-TIFF profile and Deflate payloads, readable
//! by any conformant TIFF reader.
//!
//! # Features
//!
//! - Bilevel, grayscale, palette, RGB, CMYK, YCbCr and CIE L*a*b* images
//! - 1-, 4-, 8-, 16- and 32-bit sample depths, integer and float
//! - Strip and tile layouts, big and little endian output
//! - PackBits, Deflate, CCITT T.4/T.6 and JPEG (TTN2) compression
//! - Multi-page files with per-page parameters
//!
//! Plain writers work everywhere: compressed payloads spill to a
//! temporary file (or memory) so the IFD can still precede them. Seekable
//! writers skip the spill; the encoder seeks back and patches the IFD in
//! place. The CCITT fax and JPEG bytestream encoders are external
//! collaborators installed through [`compression::FaxEncoder`] and
//! [`compression::JpegTileEncoder`].
//!
//! # Example
//!
//! ```
//! use tiff_baseline::{EncodeParams, MemoryImage, TiffEncoder};
//!
//! let image = MemoryImage::gray8(2, 2, &[0, 64, 128, 255]);
//! let mut out = Vec::new();
//! let mut encoder = TiffEncoder::new(EncodeParams::new().packbits());
//! encoder.encode(&mut out, &image).unwrap();
//! assert_eq!(&out[..2], b"MM");
//! ```

pub mod classify;
pub mod compression;
pub mod encoder;
pub mod error;
pub mod ifd;
pub mod layout;
pub mod packer;
pub mod sink;
pub mod source;
pub mod tags;
pub mod types;

pub use classify::{ImageClass, ImageKind};
pub use compression::{Compression, Deflater, FaxEncoder, JpegColor, JpegParams, JpegTileEncoder};
pub use encoder::{EncodeParams, Page, TiffEncoder};
pub use error::{Result, TiffError};
pub use ifd::{Field, FieldTable, FieldValue};
pub use sink::{ByteSink, Endian};
pub use source::{
    ColorModel, ColorSpaceKind, ImageSource, MemoryImage, Raster, RasterData, Region,
    SampleLayout, SampleModel, SampleType,
};
pub use types::{ExtraSampleKind, PhotometricInterpretation, SampleFormat};

/// TIFF magic number - little endian "II"
pub const TIFF_MAGIC_LE: [u8; 2] = [0x49, 0x49];

/// TIFF magic number - big endian "MM"
pub const TIFF_MAGIC_BE: [u8; 2] = [0x4D, 0x4D];

/// TIFF version (42)
pub const TIFF_VERSION: u16 = 42;
