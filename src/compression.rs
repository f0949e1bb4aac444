//! Compression methods and codec contracts
//!
//! The byte-oriented codecs live here: the PackBits encoder, the Deflate
//! wrapper around `flate2`, and the contracts for the external CCITT fax
//! and JPEG encoders. Per-tile dispatch happens in the page writer.

use std::io::Write;

use flate2::{Compress, FlushCompress, Status};
use parking_lot::Mutex;

use crate::error::{Result, TiffError};
use crate::source::Raster;

/// Compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// No compression
    #[default]
    None,
    /// CCITT T.4 one-dimensional (modified Huffman RLE)
    Group3OneD,
    /// CCITT T.4 two-dimensional
    Group3TwoD,
    /// CCITT T.6
    Group4,
    /// JPEG-in-TIFF per Technical Note 2
    Jpeg,
    /// PackBits RLE
    PackBits,
    /// Deflate (zlib)
    Deflate,
}

impl Compression {
    /// Create from TIFF compression tag value
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            2 => Some(Compression::Group3OneD),
            3 => Some(Compression::Group3TwoD),
            4 => Some(Compression::Group4),
            7 => Some(Compression::Jpeg),
            32773 => Some(Compression::PackBits),
            32946 => Some(Compression::Deflate),
            _ => None,
        }
    }

    /// Convert to TIFF compression tag value
    pub fn to_u16(self) -> u16 {
        match self {
            Compression::None => 1,
            Compression::Group3OneD => 2,
            Compression::Group3TwoD => 3,
            Compression::Group4 => 4,
            Compression::Jpeg => 7,
            Compression::PackBits => 32773,
            Compression::Deflate => 32946,
        }
    }

    /// Whether this is one of the CCITT fax methods
    pub fn is_fax(self) -> bool {
        matches!(
            self,
            Compression::Group3OneD | Compression::Group3TwoD | Compression::Group4
        )
    }
}

/// PackBits-compress a tile row by row, returning the output length.
///
/// `out` must hold at least [`packbits_worst_case`] bytes.
pub fn compress_packbits(data: &[u8], rows: usize, bytes_per_row: usize, out: &mut [u8]) -> usize {
    let mut out_offset = 0;
    for row in 0..rows {
        let input = &data[row * bytes_per_row..(row + 1) * bytes_per_row];
        out_offset = pack_bits_row(input, out, out_offset);
    }
    out_offset
}

/// Worst-case PackBits output size for a tile
pub fn packbits_worst_case(bytes_per_row: usize, rows: usize) -> usize {
    rows * bytes_per_row + bytes_per_row.div_ceil(128) * rows
}

/// PackBits-encode a single row into `out` at `out_offset`, returning the
/// offset after the encoded row.
///
/// Replicate runs cap at 127 bytes and literal segments at 128; a final
/// row byte extends an open literal when possible and otherwise becomes a
/// one-byte literal.
fn pack_bits_row(input: &[u8], out: &mut [u8], mut out_offset: usize) -> usize {
    let in_max = input.len() as isize - 1;
    let in_max_minus1 = in_max - 1;
    let mut in_offset: isize = 0;

    while in_offset <= in_max {
        let mut run = 1usize;
        let replicate = input[in_offset as usize];
        while run < 127
            && in_offset < in_max
            && input[in_offset as usize] == input[(in_offset + 1) as usize]
        {
            run += 1;
            in_offset += 1;
        }
        if run > 1 {
            in_offset += 1;
            out[out_offset] = (1 - run as i32) as u8;
            out[out_offset + 1] = replicate;
            out_offset += 2;
        }

        run = 0;
        let header = out_offset;
        while run < 128
            && ((in_offset < in_max
                && input[in_offset as usize] != input[(in_offset + 1) as usize])
                || (in_offset < in_max_minus1
                    && input[in_offset as usize] != input[(in_offset + 2) as usize]))
        {
            run += 1;
            out_offset += 1;
            out[out_offset] = input[in_offset as usize];
            in_offset += 1;
        }
        if run > 0 {
            out[header] = (run - 1) as u8;
            out_offset += 1;
        }

        if in_offset == in_max {
            if run > 0 && run < 128 {
                out[header] += 1;
                out[out_offset] = input[in_offset as usize];
                out_offset += 1;
                in_offset += 1;
            } else {
                out[out_offset] = 0;
                out[out_offset + 1] = input[in_offset as usize];
                out_offset += 2;
                in_offset += 1;
            }
        }
    }

    out_offset
}

/// Deflate compressor with finish-and-reset semantics per tile
pub struct Deflater {
    compress: Compress,
}

impl Deflater {
    /// Create a zlib-wrapped deflater at the given level (0-9)
    pub fn new(level: u32) -> Self {
        Deflater {
            compress: Compress::new(flate2::Compression::new(level), true),
        }
    }

    /// Compress one tile's packed bytes into `out`, returning the
    /// compressed length. The stream is finished and the compressor reset,
    /// so every tile yields an independent zlib stream.
    pub fn deflate(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<usize> {
        out.clear();
        out.reserve(input.len() / 2 + 64);
        let mut consumed = 0usize;
        loop {
            let before = self.compress.total_in();
            let status = self
                .compress
                .compress_vec(&input[consumed..], out, FlushCompress::Finish)
                .map_err(|e| TiffError::CompressionError(e.to_string()))?;
            consumed += (self.compress.total_in() - before) as usize;
            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    out.reserve((input.len() / 2).max(4096));
                }
            }
        }
        self.compress.reset();
        Ok(out.len())
    }
}

/// CCITT T.4 / T.6 fax encoder contract.
///
/// Implementations are constructed by the caller; an encoder configured
/// for reversed fill order must be installed together with the
/// `reverse_fill_order` parameter so the payload matches the written
/// `FillOrder` tag. Input rows are MSB-first bit-packed bilevel data.
pub trait FaxEncoder {
    /// Encode one row with the T.4 one-dimensional (modified Huffman)
    /// scheme, returning the number of bytes placed in `out`.
    fn encode_rle(&mut self, row: &[u8], bit_offset: u32, width: u32, out: &mut [u8]) -> usize;

    /// Encode a tile with T.4, one- or two-dimensional, returning the
    /// number of bytes placed in `out`.
    #[allow(clippy::too_many_arguments)]
    fn encode_t4(
        &mut self,
        one_dimensional: bool,
        pad_eols: bool,
        tile: &[u8],
        row_bytes: usize,
        bit_offset: u32,
        width: u32,
        height: u32,
        out: &mut [u8],
    ) -> usize;

    /// Encode a tile with T.6, returning the number of bytes placed in
    /// `out`.
    fn encode_t6(
        &mut self,
        tile: &[u8],
        row_bytes: usize,
        bit_offset: u32,
        width: u32,
        height: u32,
        out: &mut [u8],
    ) -> usize;
}

/// Color handling requested from the external JPEG encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegColor {
    Grayscale,
    Rgb,
    /// YCbCr output; when `convert_from_rgb` is set the raster holds RGB
    /// samples and the encoder performs the color conversion
    YCbCr { convert_from_rgb: bool },
}

impl JpegColor {
    /// Color mode for a classified image kind, if JPEG supports it
    pub(crate) fn for_kind(
        kind: crate::classify::ImageKind,
        convert_from_rgb: bool,
    ) -> Option<Self> {
        use crate::classify::ImageKind;
        match kind {
            ImageKind::Gray => Some(JpegColor::Grayscale),
            ImageKind::Rgb => Some(JpegColor::Rgb),
            ImageKind::YCbCr => Some(JpegColor::YCbCr { convert_from_rgb }),
            _ => None,
        }
    }
}

/// JPEG encoding parameters passed through to the external encoder
#[derive(Debug, Clone)]
pub struct JpegParams {
    /// Per-band horizontal subsampling factors; missing bands read as 1
    pub horizontal_subsampling: Vec<u32>,
    /// Per-band vertical subsampling factors; missing bands read as 1
    pub vertical_subsampling: Vec<u32>,
    /// Write abbreviated image streams and a single tables-only stream
    /// into the `JPEGTables` field
    pub write_image_only: bool,
    /// Quality in 0.0..=1.0, passed through to the external encoder
    pub quality: f32,
}

impl Default for JpegParams {
    fn default() -> Self {
        JpegParams {
            horizontal_subsampling: Vec::new(),
            vertical_subsampling: Vec::new(),
            write_image_only: false,
            quality: 0.75,
        }
    }
}

impl JpegParams {
    pub fn horizontal_subsampling(&self, band: usize) -> u32 {
        self.horizontal_subsampling.get(band).copied().unwrap_or(1)
    }

    pub fn vertical_subsampling(&self, band: usize) -> u32 {
        self.vertical_subsampling.get(band).copied().unwrap_or(1)
    }

    /// Maximum horizontal subsampling across the first `bands` bands
    pub fn max_horizontal_subsampling(&self, bands: u16) -> u32 {
        (0..bands as usize)
            .map(|b| self.horizontal_subsampling(b))
            .max()
            .unwrap_or(1)
    }

    /// Maximum vertical subsampling across the first `bands` bands
    pub fn max_vertical_subsampling(&self, bands: u16) -> u32 {
        (0..bands as usize)
            .map(|b| self.vertical_subsampling(b))
            .max()
            .unwrap_or(1)
    }
}

/// Baseline JPEG bytestream encoder contract (Technical Note 2 profile).
///
/// `encode_tile` writes the entire interchange or abbreviated stream for
/// one tile directly to `sink` and returns the number of bytes written;
/// the page writer additionally verifies the count against the sink
/// position. Implementations need not be re-entrant: the page writer
/// serializes all calls behind a process-wide lock.
pub trait JpegTileEncoder {
    /// Produce a tables-only abbreviated stream for the `JPEGTables` field
    fn tables(&mut self, params: &JpegParams) -> Result<Vec<u8>>;

    /// Encode one tile, writing the stream to `sink`
    fn encode_tile(
        &mut self,
        sink: &mut dyn Write,
        raster: &Raster,
        color: JpegColor,
        params: &JpegParams,
    ) -> Result<usize>;
}

/// Serializes calls into the external JPEG encoder across all encoders in
/// the process.
pub(crate) static JPEG_ENCODE_LOCK: Mutex<()> = Mutex::new(());

/// Worst-case output buffer size for the slice-based codecs.
///
/// The fax row bound assumes the densest code-word expansion of an
/// alternating bit pattern; the two-dimensional bound adds per-row EOLs
/// plus the six-EOL return-to-control sequence. Deflate and JPEG write
/// through growable or external buffers and need none.
pub fn compress_buffer_size(
    compression: Compression,
    tile_height: u32,
    tile_width: u32,
    bytes_per_row: u64,
    bytes_per_tile: u64,
) -> usize {
    match compression {
        Compression::Group3OneD => fax_row_buffer(tile_width),
        Compression::Group3TwoD | Compression::Group4 => {
            tile_height as usize * (fax_row_buffer(tile_width) + 2) + 12
        }
        Compression::PackBits => {
            (bytes_per_tile + bytes_per_row.div_ceil(128) * tile_height as u64) as usize
        }
        _ => 0,
    }
}

fn fax_row_buffer(width: u32) -> usize {
    (((width as usize + 1) / 2) * 9 + 2).div_ceil(8)
}
