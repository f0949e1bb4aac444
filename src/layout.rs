//! Tile and strip layout planning
//!
//! Computes the payload geometry for one page before anything is written:
//! tile or strip dimensions, counts, per-segment byte counts and the
//! offset array that the page writer fills in. JPEG pages get their
//! dimensions rounded to whole MCU multiples.

use crate::packer;

/// Strip height used when the caller specifies none
pub const DEFAULT_ROWS_PER_STRIP: u32 = 8;

/// Payload geometry for one page.
///
/// Strips are modeled as single-column tiles spanning the image width;
/// only the last strip may cover fewer rows.
#[derive(Debug, Clone)]
pub struct TileGeometry {
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_across: u32,
    pub tiles_down: u32,
    /// Packed bytes per row within one tile
    pub bytes_per_row: u64,
    /// Packed bytes in one full tile
    pub bytes_per_tile: u64,
    /// Per-segment payload sizes; final values for uncompressed data,
    /// placeholders until encoding finishes otherwise
    pub byte_counts: Vec<u64>,
    /// Per-segment file offsets, filled by the page writer
    pub offsets: Vec<u64>,
    pub is_tiled: bool,
}

impl TileGeometry {
    pub fn num_tiles(&self) -> u32 {
        self.tiles_across * self.tiles_down
    }

    /// Sum of all segment byte counts
    pub fn total_payload(&self) -> u64 {
        self.byte_counts.iter().sum()
    }

    /// Derive every offset after the first from the byte counts
    pub fn propagate_offsets(&mut self) {
        for i in 1..self.offsets.len() {
            self.offsets[i] = self.offsets[i - 1] + self.byte_counts[i - 1];
        }
    }
}

/// Plan the payload geometry for one page.
///
/// Requested dimensions of zero or below fall back to the source tile
/// grid when tiling, or to the image width and [`DEFAULT_ROWS_PER_STRIP`]
/// for strips. `jpeg_factors` carries the maximum horizontal and vertical
/// subsampling factors and forces dimensions to multiples of eight times
/// the factor; strip widths stay at the image width.
#[allow(clippy::too_many_arguments)]
pub fn plan_geometry(
    width: u32,
    height: u32,
    bit_depth: u16,
    bands: u16,
    tiled: bool,
    requested_tile_width: i32,
    requested_tile_height: i32,
    source_tile_width: u32,
    source_tile_height: u32,
    jpeg_factors: Option<(u32, u32)>,
) -> TileGeometry {
    let mut tile_width = if tiled {
        if requested_tile_width > 0 {
            requested_tile_width as u32
        } else {
            source_tile_width
        }
    } else {
        width
    };
    let mut tile_height = if requested_tile_height > 0 {
        requested_tile_height as u32
    } else if tiled {
        source_tile_height
    } else {
        DEFAULT_ROWS_PER_STRIP
    };

    if let Some((max_h, max_v)) = jpeg_factors {
        let factor_v = 8 * max_v;
        tile_height = round_to_multiple(tile_height, factor_v);
        if tiled {
            let factor_h = 8 * max_h;
            tile_width = round_to_multiple(tile_width, factor_h);
        }
    }

    let tiles_across = if tiled { width.div_ceil(tile_width) } else { 1 };
    let tiles_down = height.div_ceil(tile_height);
    let num_tiles = (tiles_across * tiles_down) as usize;

    let bytes_per_row = packer::bytes_per_row(bit_depth, tile_width, bands) as u64;
    let bytes_per_tile = bytes_per_row * tile_height as u64;

    let mut byte_counts = vec![bytes_per_tile; num_tiles];
    if !tiled {
        // Last strip may have fewer rows.
        let last_rows = height - tile_height * (tiles_down - 1);
        byte_counts[num_tiles - 1] = last_rows as u64 * bytes_per_row;
    }

    TileGeometry {
        tile_width,
        tile_height,
        tiles_across,
        tiles_down,
        bytes_per_row,
        bytes_per_tile,
        byte_counts,
        offsets: vec![0; num_tiles],
        is_tiled: tiled,
    }
}

/// Round to the nearest multiple of `factor`, at least one `factor`
fn round_to_multiple(value: u32, factor: u32) -> u32 {
    let rounded = ((value as f32 / factor as f32 + 0.5) as u32) * factor;
    rounded.max(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_strip() {
        let geom = plan_geometry(4, 3, 8, 1, false, 0, 0, 4, 3, None);
        assert_eq!(geom.num_tiles(), 1);
        assert_eq!(geom.tile_width, 4);
        assert_eq!(geom.tile_height, DEFAULT_ROWS_PER_STRIP);
        assert_eq!(geom.bytes_per_row, 4);
        assert_eq!(geom.byte_counts, vec![12]);
    }

    #[test]
    fn test_last_strip_truncated() {
        let geom = plan_geometry(16, 20, 8, 1, false, 0, 8, 16, 20, None);
        assert_eq!(geom.num_tiles(), 3);
        assert_eq!(geom.byte_counts, vec![128, 128, 64]);
        assert_eq!(geom.total_payload(), 320);
    }

    #[test]
    fn test_tiled_geometry_keeps_full_edge_tiles() {
        let geom = plan_geometry(100, 50, 8, 3, true, 64, 64, 64, 64, None);
        assert_eq!(geom.tiles_across, 2);
        assert_eq!(geom.tiles_down, 1);
        assert_eq!(geom.bytes_per_row, 192);
        assert_eq!(geom.byte_counts, vec![192 * 64; 2]);
    }

    #[test]
    fn test_offset_propagation() {
        let mut geom = plan_geometry(16, 20, 8, 1, false, 0, 8, 16, 20, None);
        geom.offsets[0] = 1000;
        geom.propagate_offsets();
        assert_eq!(geom.offsets, vec![1000, 1128, 1256]);
    }

    #[test]
    fn test_bilevel_row_rounding() {
        let geom = plan_geometry(10, 4, 1, 1, false, 0, 0, 10, 4, None);
        assert_eq!(geom.bytes_per_row, 2);
    }

    #[test]
    fn test_jpeg_rounding_strips() {
        // Height rounds to a multiple of 8 * max vertical subsampling;
        // strip width stays at the image width.
        let geom = plan_geometry(100, 100, 8, 3, false, 0, 13, 100, 100, Some((2, 2)));
        assert_eq!(geom.tile_width, 100);
        assert_eq!(geom.tile_height, 16);

        let geom = plan_geometry(100, 100, 8, 3, false, 0, 2, 100, 100, Some((1, 1)));
        assert_eq!(geom.tile_height, 8);
    }

    #[test]
    fn test_jpeg_rounding_tiled() {
        let geom = plan_geometry(100, 100, 8, 3, true, 20, 20, 100, 100, Some((2, 1)));
        assert_eq!(geom.tile_width, 16);
        assert_eq!(geom.tile_height, 24);
    }
}
