//! TIFF encoder
//!
//! Orchestrates one page at a time: classify the image, plan the payload
//! geometry, build the field table, then write the IFD and payload. The
//! IFD precedes its payload in the file but references payload offsets,
//! so compressed pages use one of two deferred-offset strategies: seek
//! back and patch on seekable sinks, or spill the payload to a temporary
//! file (degrading to memory) and stream it out after the corrected IFD.
//! Multiple pages chain through their next-IFD offsets; only the final
//! page writes zero.

use std::fs::File;
use std::io::{self, Cursor, Seek, SeekFrom, Write};

use log::{debug, warn};

use crate::classify::{classify, ImageClass, ImageKind};
use crate::compression::{
    compress_buffer_size, compress_packbits, Compression, Deflater, FaxEncoder, JpegColor,
    JpegParams, JpegTileEncoder, JPEG_ENCODE_LOCK,
};
use crate::error::{Result, TiffError};
use crate::ifd::{Field, FieldTable};
use crate::layout::{plan_geometry, TileGeometry};
use crate::packer::pack_tile;
use crate::sink::{ByteSink, Endian};
use crate::source::{ColorSpaceKind, ImageSource, Region, SampleType};
use crate::tags::tag;
use crate::types::SampleFormat;

/// Offset of the first IFD, directly after the 8-byte header
const FIRST_IFD_OFFSET: u32 = 8;

/// Encoding parameters
#[derive(Debug, Clone)]
pub struct EncodeParams {
    /// Byte order of the file
    pub byte_order: Endian,
    /// Payload compression
    pub compression: Compression,
    /// Emit tile tags instead of strip tags
    pub write_tiled: bool,
    /// Tile width override; zero or below inherits the source tile grid
    pub tile_width: i32,
    /// Tile height override, or rows per strip when not tiling; zero or
    /// below inherits the source tile grid or the default strip height
    pub tile_height: i32,
    /// Write `FillOrder` 2 for fax payloads
    pub reverse_fill_order: bool,
    /// T.4 two-dimensional coding
    pub t4_encode_2d: bool,
    /// Pad T.4 EOL codes to byte boundaries
    pub t4_pad_eols: bool,
    /// Deflate level, 0-9
    pub deflate_level: u32,
    /// Parameters for the external JPEG encoder
    pub jpeg: JpegParams,
    /// Hand RGB sources to the JPEG encoder for YCbCr conversion
    pub jpeg_compress_rgb_to_ycbcr: bool,
    /// Fields merged into each page's IFD when their tag is not already
    /// present
    pub extra_fields: Vec<Field>,
}

impl Default for EncodeParams {
    fn default() -> Self {
        EncodeParams {
            byte_order: Endian::Big,
            compression: Compression::None,
            write_tiled: false,
            tile_width: 0,
            tile_height: 0,
            reverse_fill_order: false,
            t4_encode_2d: false,
            t4_pad_eols: false,
            deflate_level: 6,
            jpeg: JpegParams::default(),
            jpeg_compress_rgb_to_ycbcr: false,
            extra_fields: Vec::new(),
        }
    }
}

impl EncodeParams {
    pub fn new() -> Self {
        EncodeParams::default()
    }

    /// Set the file byte order
    pub fn byte_order(mut self, order: Endian) -> Self {
        self.byte_order = order;
        self
    }

    /// Write a little-endian file
    pub fn little_endian(self) -> Self {
        self.byte_order(Endian::Little)
    }

    /// Set the compression method
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Enable PackBits compression
    pub fn packbits(self) -> Self {
        self.compression(Compression::PackBits)
    }

    /// Enable Deflate compression at the given level
    pub fn deflate(mut self, level: u32) -> Self {
        self.compression = Compression::Deflate;
        self.deflate_level = level;
        self
    }

    /// Emit a tiled layout with the given tile dimensions
    pub fn tiled(mut self, width: i32, height: i32) -> Self {
        self.write_tiled = true;
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    /// Set the strip height
    pub fn rows_per_strip(mut self, rows: i32) -> Self {
        self.tile_height = rows;
        self
    }

    /// Append a field to merge into each page's IFD
    pub fn extra_field(mut self, field: Field) -> Self {
        self.extra_fields.push(field);
        self
    }
}

/// One image of a multi-page file, with optional parameter overrides.
///
/// The file byte order always comes from the encoder's primary
/// parameters; per-page parameters affect everything else.
pub struct Page<'a> {
    pub image: &'a dyn ImageSource,
    pub params: Option<&'a EncodeParams>,
}

impl<'a> Page<'a> {
    pub fn new(image: &'a dyn ImageSource) -> Self {
        Page {
            image,
            params: None,
        }
    }

    pub fn with_params(image: &'a dyn ImageSource, params: &'a EncodeParams) -> Self {
        Page {
            image,
            params: Some(params),
        }
    }
}

/// TIFF encoder
pub struct TiffEncoder {
    /// Parameters applied to every page without an override
    pub params: EncodeParams,
    fax: Option<Box<dyn FaxEncoder>>,
    jpeg: Option<Box<dyn JpegTileEncoder>>,
}

impl Default for TiffEncoder {
    fn default() -> Self {
        TiffEncoder::new(EncodeParams::default())
    }
}

impl TiffEncoder {
    pub fn new(params: EncodeParams) -> Self {
        TiffEncoder {
            params,
            fax: None,
            jpeg: None,
        }
    }

    /// Install the external CCITT fax encoder
    pub fn with_fax_encoder(mut self, fax: Box<dyn FaxEncoder>) -> Self {
        self.fax = Some(fax);
        self
    }

    /// Install the external JPEG encoder
    pub fn with_jpeg_encoder(mut self, jpeg: Box<dyn JpegTileEncoder>) -> Self {
        self.jpeg = Some(jpeg);
        self
    }

    /// Encode a single image to a plain writer.
    ///
    /// Compressed payloads spill to a temporary file, or to memory when
    /// no temporary file can be created, and stream out after the IFD.
    pub fn encode<W: Write>(&mut self, writer: &mut W, image: &dyn ImageSource) -> Result<()> {
        self.encode_pages(writer, &[Page::new(image)])
    }

    /// Encode a multi-page file to a plain writer
    pub fn encode_pages<W: Write>(&mut self, writer: &mut W, pages: &[Page<'_>]) -> Result<()> {
        let TiffEncoder { params, fax, jpeg } = self;
        if pages.is_empty() {
            return Err(TiffError::NoPages);
        }

        let mut sink = ByteSink::new(writer, params.byte_order);
        write_file_header(&mut sink)?;

        let mut ifd_offset = FIRST_IFD_OFFSET;
        for (index, page) in pages.iter().enumerate() {
            let page_params = page.params.unwrap_or(&*params);
            let is_last = index + 1 == pages.len();
            let fax_ref: Option<&mut dyn FaxEncoder> =
                fax.as_mut().map(|b| -> &mut dyn FaxEncoder { &mut **b });
            let jpeg_ref: Option<&mut dyn JpegTileEncoder> = jpeg
                .as_mut()
                .map(|b| -> &mut dyn JpegTileEncoder { &mut **b });
            ifd_offset = encode_page(
                &mut sink,
                page.image,
                page_params,
                fax_ref,
                jpeg_ref,
                ifd_offset,
                is_last,
            )?;
        }
        sink.flush()
    }

    /// Encode a single image to a seekable writer.
    ///
    /// Compressed payloads are written in place; the encoder seeks back
    /// to patch the IFD once the segment sizes are known.
    pub fn encode_seekable<W: Write + Seek>(
        &mut self,
        writer: &mut W,
        image: &dyn ImageSource,
    ) -> Result<()> {
        self.encode_pages_seekable(writer, &[Page::new(image)])
    }

    /// Encode a multi-page file to a seekable writer
    pub fn encode_pages_seekable<W: Write + Seek>(
        &mut self,
        writer: &mut W,
        pages: &[Page<'_>],
    ) -> Result<()> {
        let TiffEncoder { params, fax, jpeg } = self;
        if pages.is_empty() {
            return Err(TiffError::NoPages);
        }

        let mut sink = ByteSink::new(writer, params.byte_order);
        write_file_header(&mut sink)?;

        let mut ifd_offset = FIRST_IFD_OFFSET;
        for (index, page) in pages.iter().enumerate() {
            let page_params = page.params.unwrap_or(&*params);
            let is_last = index + 1 == pages.len();
            let fax_ref: Option<&mut dyn FaxEncoder> =
                fax.as_mut().map(|b| -> &mut dyn FaxEncoder { &mut **b });
            let jpeg_ref: Option<&mut dyn JpegTileEncoder> = jpeg
                .as_mut()
                .map(|b| -> &mut dyn JpegTileEncoder { &mut **b });
            ifd_offset = encode_page_seekable(
                &mut sink,
                page.image,
                page_params,
                fax_ref,
                jpeg_ref,
                ifd_offset,
                is_last,
            )?;
        }
        sink.flush()
    }
}

fn write_file_header<W: Write>(sink: &mut ByteSink<W>) -> Result<()> {
    let marker = sink.endian().marker();
    sink.write_bytes(&marker)?;
    sink.write_u16(crate::TIFF_VERSION)?;
    sink.write_u32(FIRST_IFD_OFFSET)
}

/// Everything known about a page before its bytes are written
struct PagePlan {
    class: ImageClass,
    geom: TileGeometry,
    fields: FieldTable,
    dir_size: u32,
    jpeg_color: Option<JpegColor>,
}

fn plan_page(
    image: &dyn ImageSource,
    params: &EncodeParams,
    fax_available: bool,
    jpeg: Option<&mut dyn JpegTileEncoder>,
) -> Result<PagePlan> {
    let bounds = image.bounds();
    if bounds.width == 0 || bounds.height == 0 {
        return Err(TiffError::InvalidDimensions {
            width: bounds.width,
            height: bounds.height,
        });
    }

    let compression = params.compression;
    let to_ycbcr = compression == Compression::Jpeg && params.jpeg_compress_rgb_to_ycbcr;
    let class = classify(image.sample_model(), image.color_model(), to_ycbcr)?;

    if compression == Compression::Jpeg {
        if class.kind == ImageKind::Palette {
            return Err(TiffError::JpegPalette);
        }
        if class.bit_depth != 8 || JpegColor::for_kind(class.kind, false).is_none() {
            return Err(TiffError::JpegUnsupportedKind);
        }
        if jpeg.is_none() {
            return Err(TiffError::CodecUnavailable("JPEG"));
        }
    }
    if compression.is_fax() {
        if !class.kind.is_bilevel() {
            return Err(TiffError::IncompatibleCompression {
                compression,
                kind: class.kind,
            });
        }
        if !fax_available {
            return Err(TiffError::CodecUnavailable("CCITT fax"));
        }
    }

    let jpeg_factors = (compression == Compression::Jpeg).then(|| {
        (
            params.jpeg.max_horizontal_subsampling(class.bands),
            params.jpeg.max_vertical_subsampling(class.bands),
        )
    });
    let geom = plan_geometry(
        bounds.width,
        bounds.height,
        class.bit_depth,
        class.bands,
        params.write_tiled,
        params.tile_width,
        params.tile_height,
        image.tile_width(),
        image.tile_height(),
        jpeg_factors,
    );
    debug!(
        "page layout: {}x{} segments of {}x{} ({:?}, {:?})",
        geom.tiles_across, geom.tiles_down, geom.tile_width, geom.tile_height, class.kind,
        compression
    );

    // Abbreviated streams put one tables-only stream in the IFD.
    let jpeg_tables = match jpeg {
        Some(encoder) if compression == Compression::Jpeg && params.jpeg.write_image_only => {
            let _serialized = JPEG_ENCODE_LOCK.lock();
            Some(encoder.tables(&params.jpeg)?)
        }
        _ => None,
    };

    let jpeg_color = if compression == Compression::Jpeg {
        let convert_from_rgb = class.kind == ImageKind::YCbCr
            && image
                .color_model()
                .is_some_and(|cm| !cm.is_indexed() && cm.color_space == ColorSpaceKind::Rgb);
        JpegColor::for_kind(class.kind, convert_from_rgb)
    } else {
        None
    };

    let mut fields = build_fields(&class, &geom, params, bounds, jpeg_tables);
    for field in &params.extra_fields {
        fields.insert_if_absent(field.clone());
    }
    let dir_size = fields.size_on_disk();

    Ok(PagePlan {
        class,
        geom,
        fields,
        dir_size,
        jpeg_color,
    })
}

/// Build the page's field table in ascending tag order
fn build_fields(
    class: &ImageClass,
    geom: &TileGeometry,
    params: &EncodeParams,
    bounds: Region,
    jpeg_tables: Option<Vec<u8>>,
) -> FieldTable {
    let compression = params.compression;
    let num_tiles = geom.num_tiles() as usize;
    let mut fields = FieldTable::new();

    fields.insert(Field::long(tag::IMAGE_WIDTH, bounds.width));
    fields.insert(Field::long(tag::IMAGE_LENGTH, bounds.height));
    fields.insert(Field::shorts(
        tag::BITS_PER_SAMPLE,
        vec![class.bit_depth; class.bands as usize],
    ));
    fields.insert(Field::short(tag::COMPRESSION, compression.to_u16()));
    fields.insert(Field::short(
        tag::PHOTOMETRIC_INTERPRETATION,
        class.kind.photometric().to_u16(),
    ));
    fields.insert(Field::short(tag::SAMPLES_PER_PIXEL, class.bands));

    // Segment offsets and byte counts are placeholders here; they are
    // patched to their final values before the directory is written.
    if geom.is_tiled {
        fields.insert(Field::long(tag::TILE_WIDTH, geom.tile_width));
        fields.insert(Field::long(tag::TILE_LENGTH, geom.tile_height));
        fields.insert(Field::longs(tag::TILE_OFFSETS, vec![0; num_tiles]));
        fields.insert(Field::longs(tag::TILE_BYTE_COUNTS, vec![0; num_tiles]));
    } else {
        fields.insert(Field::longs(tag::STRIP_OFFSETS, vec![0; num_tiles]));
        fields.insert(Field::long(tag::ROWS_PER_STRIP, geom.tile_height));
        fields.insert(Field::longs(tag::STRIP_BYTE_COUNTS, vec![0; num_tiles]));
    }

    if compression.is_fax() {
        fields.insert(Field::short(
            tag::FILL_ORDER,
            if params.reverse_fill_order { 2 } else { 1 },
        ));
        if compression == Compression::Group3TwoD {
            let mut t4_options = 0u32;
            if params.t4_encode_2d {
                t4_options |= 0x1;
            }
            if params.t4_pad_eols {
                t4_options |= 0x4;
            }
            fields.insert(Field::long(tag::T4_OPTIONS, t4_options));
        } else if compression == Compression::Group4 {
            fields.insert(Field::long(tag::T6_OPTIONS, 0));
        }
    }

    if let Some(map) = &class.color_map {
        fields.insert(Field::shorts(tag::COLOR_MAP, map.clone()));
    }

    if class.extra_samples > 0 {
        fields.insert(Field::shorts(
            tag::EXTRA_SAMPLES,
            vec![class.extra_sample_kind.to_u16(); class.extra_samples as usize],
        ));
    }

    if class.sample_type != SampleType::Byte {
        let format = match class.sample_type {
            SampleType::Float => SampleFormat::Float,
            SampleType::UShort => SampleFormat::Uint,
            _ => SampleFormat::Int,
        };
        fields.insert(Field::shorts(
            tag::SAMPLE_FORMAT,
            vec![format.to_u16(); class.bands as usize],
        ));
    }

    if let Some(tables) = jpeg_tables {
        fields.insert(Field::undefined(tag::JPEG_TABLES, tables));
    }

    if class.kind == ImageKind::YCbCr {
        let (sub_h, sub_v) = if compression == Compression::Jpeg {
            (
                params.jpeg.max_horizontal_subsampling(class.bands),
                params.jpeg.max_vertical_subsampling(class.bands),
            )
        } else {
            // 2 is the TIFF default, so unsubsampled data must say 1.
            (1, 1)
        };
        fields.insert(Field::shorts(
            tag::YCBCR_SUB_SAMPLING,
            vec![sub_h as u16, sub_v as u16],
        ));
        fields.insert(Field::short(
            tag::YCBCR_POSITIONING,
            if compression == Compression::Jpeg { 1 } else { 2 },
        ));
        let reference = if compression == Compression::Jpeg {
            // Full range.
            vec![(0, 1), (255, 1), (128, 1), (255, 1), (128, 1), (255, 1)]
        } else {
            // CCIR 601.1 headroom and footroom.
            vec![(15, 1), (235, 1), (128, 1), (240, 1), (128, 1), (240, 1)]
        };
        fields.insert(Field::rationals(tag::REFERENCE_BLACK_WHITE, reference));
    }

    fields
}

/// Replace the segment offset and byte-count placeholders with final values
fn patch_segment_fields(plan: &mut PagePlan) -> Result<()> {
    fn to_u32(values: &[u64]) -> Result<Vec<u32>> {
        values
            .iter()
            .map(|&v| u32::try_from(v).map_err(|_| TiffError::OffsetOverflow))
            .collect()
    }

    let offsets = to_u32(&plan.geom.offsets)?;
    let counts = to_u32(&plan.geom.byte_counts)?;
    let (offsets_tag, counts_tag) = if plan.geom.is_tiled {
        (tag::TILE_OFFSETS, tag::TILE_BYTE_COUNTS)
    } else {
        (tag::STRIP_OFFSETS, tag::STRIP_BYTE_COUNTS)
    };
    plan.fields.insert(Field::longs(offsets_tag, offsets));
    plan.fields.insert(Field::longs(counts_tag, counts));
    Ok(())
}

/// Compute final offsets, the next-IFD offset and the trailing pad flag
/// once compressed segment sizes are known
fn finish_compressed_layout(
    plan: &mut PagePlan,
    ifd_offset: u32,
    is_last: bool,
) -> Result<(u32, bool)> {
    plan.geom.propagate_offsets();
    let total = plan.geom.total_payload();

    let mut skip_byte = false;
    let next = if is_last {
        0
    } else {
        let mut next = ifd_offset as u64 + plan.dir_size as u64 + total;
        if next % 2 != 0 {
            next += 1;
            skip_byte = true;
        }
        u32::try_from(next).map_err(|_| TiffError::OffsetOverflow)?
    };
    Ok((next, skip_byte))
}

/// Encode one page to a plain writer
fn encode_page<'fax, 'jpeg, W: Write>(
    sink: &mut ByteSink<W>,
    image: &dyn ImageSource,
    params: &EncodeParams,
    fax: Option<&'fax mut dyn FaxEncoder>,
    mut jpeg: Option<&'jpeg mut dyn JpegTileEncoder>,
    ifd_offset: u32,
    is_last: bool,
) -> Result<u32> {
    let mut plan = plan_page(
        image,
        params,
        fax.is_some(),
        match jpeg.as_mut() {
            Some(j) => Some(&mut **j),
            None => None,
        },
    )?;
    plan.geom.offsets[0] = ifd_offset as u64 + plan.dir_size as u64;

    if params.compression == Compression::None {
        return write_uncompressed_page(sink, image, params, &mut plan, ifd_offset, is_last);
    }

    // The sink cannot seek, so the payload goes to a spill first and the
    // IFD is written once the segment sizes are known.
    let mut spill = ByteSink::new(Spill::create(plan.geom.total_payload()), params.byte_order);
    let codec = SegmentCodec::prepare(params, plan.jpeg_color, fax, jpeg)?;
    write_payload(&mut spill, image, params, &mut plan.geom, codec)?;

    let (next, skip_byte) = finish_compressed_layout(&mut plan, ifd_offset, is_last)?;
    patch_segment_fields(&mut plan)?;
    plan.fields.write_to(sink, ifd_offset, next)?;
    spill.into_inner().replay(sink)?;
    if skip_byte {
        sink.write_u8(0)?;
    }
    Ok(next)
}

/// Encode one page to a seekable writer
fn encode_page_seekable<'fax, 'jpeg, W: Write + Seek>(
    sink: &mut ByteSink<W>,
    image: &dyn ImageSource,
    params: &EncodeParams,
    fax: Option<&'fax mut dyn FaxEncoder>,
    mut jpeg: Option<&'jpeg mut dyn JpegTileEncoder>,
    ifd_offset: u32,
    is_last: bool,
) -> Result<u32> {
    let mut plan = plan_page(
        image,
        params,
        fax.is_some(),
        match jpeg.as_mut() {
            Some(j) => Some(&mut **j),
            None => None,
        },
    )?;
    plan.geom.offsets[0] = ifd_offset as u64 + plan.dir_size as u64;

    if params.compression == Compression::None {
        return write_uncompressed_page(sink, image, params, &mut plan, ifd_offset, is_last);
    }

    // Write the payload in place, then seek back and patch the IFD.
    sink.seek(plan.geom.offsets[0])?;
    let codec = SegmentCodec::prepare(params, plan.jpeg_color, fax, jpeg)?;
    write_payload(sink, image, params, &mut plan.geom, codec)?;

    let (next, skip_byte) = finish_compressed_layout(&mut plan, ifd_offset, is_last)?;
    if skip_byte {
        sink.write_u8(0)?;
    }
    let resume = sink.position();
    sink.seek(ifd_offset as u64)?;
    patch_segment_fields(&mut plan)?;
    plan.fields.write_to(sink, ifd_offset, next)?;
    sink.seek(resume)?;
    Ok(next)
}

/// Uncompressed pages: segment sizes are known up front, so the IFD is
/// written first, then alignment padding, then the payload
fn write_uncompressed_page<W: Write>(
    sink: &mut ByteSink<W>,
    image: &dyn ImageSource,
    params: &EncodeParams,
    plan: &mut PagePlan,
    ifd_offset: u32,
    is_last: bool,
) -> Result<u32> {
    // Align multi-byte samples to their size.
    let mut padding = 0u64;
    if plan.class.bit_depth == 16 && plan.geom.offsets[0] % 2 != 0 {
        padding = 1;
    } else if plan.class.bit_depth == 32 && plan.geom.offsets[0] % 4 != 0 {
        padding = 4 - plan.geom.offsets[0] % 4;
    }
    plan.geom.offsets[0] += padding;
    plan.geom.propagate_offsets();

    let mut next = 0u32;
    let mut skip_byte = false;
    if !is_last {
        let mut n = plan.geom.offsets[0] + plan.geom.total_payload();
        if n % 2 != 0 {
            n += 1;
            skip_byte = true;
        }
        next = u32::try_from(n).map_err(|_| TiffError::OffsetOverflow)?;
    }

    patch_segment_fields(plan)?;
    plan.fields.write_to(sink, ifd_offset, next)?;
    for _ in 0..padding {
        sink.write_u8(0)?;
    }
    write_payload(sink, image, params, &mut plan.geom, SegmentCodec::Store)?;
    if skip_byte {
        sink.write_u8(0)?;
    }
    Ok(next)
}

/// Per-segment codec state for one page
enum SegmentCodec<'fax, 'jpeg> {
    Store,
    PackBits,
    Deflate(Deflater),
    FaxRle(&'fax mut dyn FaxEncoder),
    FaxT4(&'fax mut dyn FaxEncoder),
    FaxT6(&'fax mut dyn FaxEncoder),
    Jpeg {
        encoder: &'jpeg mut dyn JpegTileEncoder,
        color: JpegColor,
    },
}

impl<'fax, 'jpeg> SegmentCodec<'fax, 'jpeg> {
    fn prepare(
        params: &EncodeParams,
        jpeg_color: Option<JpegColor>,
        fax: Option<&'fax mut dyn FaxEncoder>,
        jpeg: Option<&'jpeg mut dyn JpegTileEncoder>,
    ) -> Result<Self> {
        Ok(match params.compression {
            Compression::None => SegmentCodec::Store,
            Compression::PackBits => SegmentCodec::PackBits,
            Compression::Deflate => SegmentCodec::Deflate(Deflater::new(params.deflate_level)),
            Compression::Group3OneD => {
                SegmentCodec::FaxRle(fax.ok_or(TiffError::CodecUnavailable("CCITT fax"))?)
            }
            Compression::Group3TwoD => {
                SegmentCodec::FaxT4(fax.ok_or(TiffError::CodecUnavailable("CCITT fax"))?)
            }
            Compression::Group4 => {
                SegmentCodec::FaxT6(fax.ok_or(TiffError::CodecUnavailable("CCITT fax"))?)
            }
            Compression::Jpeg => SegmentCodec::Jpeg {
                encoder: jpeg.ok_or(TiffError::CodecUnavailable("JPEG"))?,
                color: jpeg_color.ok_or(TiffError::JpegUnsupportedKind)?,
            },
        })
    }
}

/// Stream every segment of a page through the packer and codec, recording
/// the byte counts as segments complete. Segments are visited top to
/// bottom, left to right.
fn write_payload<W: Write>(
    sink: &mut ByteSink<W>,
    image: &dyn ImageSource,
    params: &EncodeParams,
    geom: &mut TileGeometry,
    mut codec: SegmentCodec<'_, '_>,
) -> Result<()> {
    let bounds = image.bounds();
    let bytes_per_row = geom.bytes_per_row as usize;

    let mut packed = if matches!(codec, SegmentCodec::Jpeg { .. }) {
        Vec::new()
    } else {
        vec![0u8; geom.bytes_per_tile as usize]
    };
    let mut compress_buf = vec![
        0u8;
        compress_buffer_size(
            params.compression,
            geom.tile_height,
            geom.tile_width,
            geom.bytes_per_row,
            geom.bytes_per_tile,
        )
    ];
    let mut deflate_out = Vec::new();

    let last_row = bounds.bottom();
    let last_col = bounds.right();
    let mut segment = 0usize;
    let mut row = bounds.y as i64;
    while row < last_row {
        let rows = if geom.is_tiled {
            geom.tile_height
        } else {
            (last_row - row).min(geom.tile_height as i64) as u32
        };
        let mut col = bounds.x as i64;
        while col < last_col {
            let region = Region::new(col as i32, row as i32, geom.tile_width, rows);
            let raster = image.tile(region);

            let count: u64 = match &mut codec {
                SegmentCodec::Store => {
                    let len = pack_tile(&raster, &mut packed);
                    sink.write_bytes(&packed[..len])?;
                    len as u64
                }
                SegmentCodec::PackBits => {
                    let len = pack_tile(&raster, &mut packed);
                    let n = compress_packbits(
                        &packed[..len],
                        rows as usize,
                        bytes_per_row,
                        &mut compress_buf,
                    );
                    sink.write_bytes(&compress_buf[..n])?;
                    n as u64
                }
                SegmentCodec::Deflate(deflater) => {
                    let len = pack_tile(&raster, &mut packed);
                    let n = deflater.deflate(&packed[..len], &mut deflate_out)?;
                    sink.write_bytes(&deflate_out[..n])?;
                    n as u64
                }
                SegmentCodec::FaxRle(fax) => {
                    pack_tile(&raster, &mut packed);
                    let mut total = 0usize;
                    for r in 0..rows as usize {
                        let row_data = &packed[r * bytes_per_row..(r + 1) * bytes_per_row];
                        let n = fax.encode_rle(row_data, 0, geom.tile_width, &mut compress_buf);
                        sink.write_bytes(&compress_buf[..n])?;
                        total += n;
                    }
                    total as u64
                }
                SegmentCodec::FaxT4(fax) => {
                    let len = pack_tile(&raster, &mut packed);
                    let n = fax.encode_t4(
                        !params.t4_encode_2d,
                        params.t4_pad_eols,
                        &packed[..len],
                        bytes_per_row,
                        0,
                        geom.tile_width,
                        rows,
                        &mut compress_buf,
                    );
                    sink.write_bytes(&compress_buf[..n])?;
                    n as u64
                }
                SegmentCodec::FaxT6(fax) => {
                    let len = pack_tile(&raster, &mut packed);
                    let n = fax.encode_t6(
                        &packed[..len],
                        bytes_per_row,
                        0,
                        geom.tile_width,
                        rows,
                        &mut compress_buf,
                    );
                    sink.write_bytes(&compress_buf[..n])?;
                    n as u64
                }
                SegmentCodec::Jpeg { encoder, color } => {
                    let raster = raster.with_origin(0, 0);
                    let start = sink.position();
                    {
                        let _serialized = JPEG_ENCODE_LOCK.lock();
                        encoder.encode_tile(sink, &raster, *color, &params.jpeg)?;
                    }
                    sink.position() - start
                }
            };

            geom.byte_counts[segment] = count;
            segment += 1;
            col += geom.tile_width as i64;
        }
        row += geom.tile_height as i64;
    }

    debug_assert_eq!(segment, geom.num_tiles() as usize);
    Ok(())
}

/// Payload spill for compressed pages on non-seekable sinks.
///
/// The temporary file is anonymous, so the operating system reclaims it
/// on every exit path. When no temporary file can be created the payload
/// buffers in memory instead.
enum Spill {
    File(File),
    Memory(Cursor<Vec<u8>>),
}

impl Spill {
    fn create(expected_bytes: u64) -> Self {
        match tempfile::tempfile() {
            Ok(file) => Spill::File(file),
            Err(err) => {
                warn!("temp file unavailable, buffering page in memory: {}", err);
                Spill::Memory(Cursor::new(Vec::with_capacity(expected_bytes as usize)))
            }
        }
    }

    /// Stream the spilled payload into the real sink
    fn replay<W: Write>(self, sink: &mut ByteSink<W>) -> Result<()> {
        match self {
            Spill::File(mut file) => {
                file.seek(SeekFrom::Start(0))?;
                io::copy(&mut file, sink)?;
            }
            Spill::Memory(cursor) => sink.write_bytes(cursor.get_ref())?,
        }
        Ok(())
    }
}

impl Write for Spill {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Spill::File(file) => file.write(buf),
            Spill::Memory(cursor) => cursor.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Spill::File(file) => file.flush(),
            Spill::Memory(cursor) => cursor.flush(),
        }
    }
}
