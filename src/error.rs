//! TIFF encoder error types

use crate::classify::ImageKind;
use crate::compression::Compression;
use crate::source::SampleType;
use thiserror::Error;

/// Result type for TIFF operations
pub type Result<T> = std::result::Result<T, TiffError>;

/// TIFF encoder error types
#[derive(Error, Debug)]
pub enum TiffError {
    /// Bands of the sample model disagree on sample depth
    #[error("all bands must have the same sample bit depth")]
    HeterogeneousBitDepth,

    /// Sub-byte depths are limited to a single band
    #[error("{bits}-bit samples require a single band, got {bands}")]
    SubByteMultiband { bits: u16, bands: u16 },

    /// Sample depth does not match the sample data type
    #[error("sample depth {bits} is invalid for {sample_type:?} data")]
    DataTypeDepthMismatch { sample_type: SampleType, bits: u16 },

    /// Palette images must be byte based
    #[error("palette images require byte samples")]
    PaletteOnlyByte,

    /// No conforming photometric interpretation for the image
    #[error("image cannot be expressed as a baseline TIFF type")]
    UnsupportedImageKind,

    /// Invalid image dimensions
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// JPEG compression cannot encode palette images
    #[error("JPEG compression cannot encode palette images")]
    JpegPalette,

    /// JPEG compression is limited to 8-bit gray, RGB and YCbCr
    #[error("JPEG compression requires 8-bit grayscale, RGB or YCbCr samples")]
    JpegUnsupportedKind,

    /// Compression method cannot encode this kind of image
    #[error("compression {compression:?} cannot encode {kind:?} images")]
    IncompatibleCompression {
        compression: Compression,
        kind: ImageKind,
    },

    /// A required external codec was not installed on the encoder
    #[error("no {0} codec installed")]
    CodecUnavailable(&'static str),

    /// An offset no longer fits the 32-bit TIFF offset space
    #[error("file exceeds the 4 GiB TIFF offset limit")]
    OffsetOverflow,

    /// Compression error
    #[error("compression error: {0}")]
    CompressionError(String),

    /// Nothing to encode
    #[error("at least one page is required")]
    NoPages,

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
