//! Image classification
//!
//! Derives the TIFF image kind, photometric interpretation, extra-sample
//! semantics and color map from a source's sample model and color model.
//! Classification runs before any bytes are written for a page; every
//! validation failure surfaces here.

use crate::error::{Result, TiffError};
use crate::source::{ColorModel, ColorSpaceKind, SampleModel, SampleType};
use crate::types::{ExtraSampleKind, PhotometricInterpretation};

/// Internal image classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    BilevelWhiteZero,
    BilevelBlackZero,
    Gray,
    Palette,
    Rgb,
    Cmyk,
    YCbCr,
    CieLab,
    Generic,
}

impl ImageKind {
    /// Photometric interpretation written for this kind
    pub fn photometric(self) -> PhotometricInterpretation {
        match self {
            ImageKind::BilevelWhiteZero => PhotometricInterpretation::WhiteIsZero,
            ImageKind::BilevelBlackZero => PhotometricInterpretation::BlackIsZero,
            // Grayscale color spaces are always black-is-zero, and generic
            // data has no better interpretation.
            ImageKind::Gray | ImageKind::Generic => PhotometricInterpretation::BlackIsZero,
            ImageKind::Palette => PhotometricInterpretation::Palette,
            ImageKind::Rgb => PhotometricInterpretation::Rgb,
            ImageKind::Cmyk => PhotometricInterpretation::Cmyk,
            ImageKind::YCbCr => PhotometricInterpretation::YCbCr,
            ImageKind::CieLab => PhotometricInterpretation::CieLab,
        }
    }

    pub fn is_bilevel(self) -> bool {
        matches!(self, ImageKind::BilevelWhiteZero | ImageKind::BilevelBlackZero)
    }
}

/// Classified image properties driving field construction and packing
#[derive(Debug, Clone)]
pub struct ImageClass {
    pub kind: ImageKind,
    pub sample_type: SampleType,
    /// Sample depth in bits, identical across bands
    pub bit_depth: u16,
    pub bands: u16,
    /// Number of samples beyond the photometric components
    pub extra_samples: u16,
    pub extra_sample_kind: ExtraSampleKind,
    /// Widened 16-bit color map in R-plane, G-plane, B-plane order
    pub color_map: Option<Vec<u16>>,
}

/// Classify an image from its sample model and color model.
///
/// `jpeg_rgb_to_ycbcr` marks RGB sources that the JPEG encoder will
/// color-convert, which classifies them as YCbCr.
pub fn classify(
    model: &SampleModel,
    color: Option<&ColorModel>,
    jpeg_rgb_to_ycbcr: bool,
) -> Result<ImageClass> {
    let bits = model.bit_depth();
    let bands = model.bands();

    if model.bits_per_sample.iter().any(|&b| b != bits) {
        return Err(TiffError::HeterogeneousBitDepth);
    }
    if (bits == 1 || bits == 4) && bands != 1 {
        return Err(TiffError::SubByteMultiband { bits, bands });
    }

    let depth_ok = match model.sample_type {
        SampleType::Byte => bits == 1 || bits == 4 || bits == 8,
        SampleType::Short | SampleType::UShort => bits == 16,
        SampleType::Int | SampleType::Float => bits == 32,
    };
    if !depth_ok {
        return Err(TiffError::DataTypeDepthMismatch {
            sample_type: model.sample_type,
            bits,
        });
    }

    if color.is_some_and(|c| c.is_indexed()) && model.sample_type != SampleType::Byte {
        return Err(TiffError::PaletteOnlyByte);
    }

    let mut extra_samples = 0u16;
    let mut extra_sample_kind = ExtraSampleKind::Unspecified;

    let kind = match color {
        Some(cm) if cm.is_indexed() => {
            let palette = cm.palette.as_deref().unwrap_or_default();
            if bits == 1 && bands == 1 {
                if palette == [[0, 0, 0], [255, 255, 255]] {
                    ImageKind::BilevelBlackZero
                } else if palette == [[255, 255, 255], [0, 0, 0]] {
                    ImageKind::BilevelWhiteZero
                } else {
                    ImageKind::Palette
                }
            } else if bands == 1 {
                ImageKind::Palette
            } else {
                return Err(TiffError::UnsupportedImageKind);
            }
        }
        Some(cm) => {
            let kind = match cm.color_space {
                ColorSpaceKind::Cmyk => ImageKind::Cmyk,
                ColorSpaceKind::Gray => ImageKind::Gray,
                ColorSpaceKind::Lab => ImageKind::CieLab,
                ColorSpaceKind::Rgb if jpeg_rgb_to_ycbcr => ImageKind::YCbCr,
                ColorSpaceKind::Rgb => ImageKind::Rgb,
                ColorSpaceKind::YCbCr => ImageKind::YCbCr,
                ColorSpaceKind::Other => ImageKind::Generic,
            };

            if kind == ImageKind::Generic {
                extra_samples = bands.saturating_sub(1);
            } else if bands > 1 {
                extra_samples = bands.saturating_sub(cm.color_space.components());
            }
            if extra_samples == 1 && cm.has_alpha {
                extra_sample_kind = if cm.alpha_premultiplied {
                    ExtraSampleKind::AssociatedAlpha
                } else {
                    ExtraSampleKind::UnassociatedAlpha
                };
            }
            kind
        }
        None => {
            if bits == 1 && bands == 1 {
                ImageKind::BilevelBlackZero
            } else {
                extra_samples = bands.saturating_sub(1);
                ImageKind::Generic
            }
        }
    };

    let color_map = if kind == ImageKind::Palette {
        color
            .and_then(|cm| cm.palette.as_deref())
            .map(widen_color_map)
    } else {
        None
    };

    Ok(ImageClass {
        kind,
        sample_type: model.sample_type,
        bit_depth: bits,
        bands,
        extra_samples,
        extra_sample_kind,
        color_map,
    })
}

/// Widen byte palette entries to the 16-bit color-map representation,
/// stored as the full red plane, then green, then blue.
fn widen_color_map(palette: &[[u8; 3]]) -> Vec<u16> {
    let mut map = Vec::with_capacity(palette.len() * 3);
    for channel in 0..3 {
        for entry in palette {
            map.push((entry[channel] as u16) << 8);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SampleLayout;

    fn model(sample_type: SampleType, bits: u16, bands: u16) -> SampleModel {
        SampleModel {
            sample_type,
            bits_per_sample: vec![bits; bands as usize],
            layout: SampleLayout::PixelArray,
        }
    }

    #[test]
    fn test_gray_classification() {
        let class = classify(
            &model(SampleType::Byte, 8, 1),
            Some(&ColorModel::grayscale()),
            false,
        )
        .unwrap();
        assert_eq!(class.kind, ImageKind::Gray);
        assert_eq!(
            class.kind.photometric(),
            PhotometricInterpretation::BlackIsZero
        );
        assert_eq!(class.extra_samples, 0);
    }

    #[test]
    fn test_rgba_extra_samples() {
        let class = classify(
            &model(SampleType::Byte, 8, 4),
            Some(&ColorModel::rgba(false)),
            false,
        )
        .unwrap();
        assert_eq!(class.kind, ImageKind::Rgb);
        assert_eq!(class.extra_samples, 1);
        assert_eq!(class.extra_sample_kind, ExtraSampleKind::UnassociatedAlpha);

        let class = classify(
            &model(SampleType::Byte, 8, 4),
            Some(&ColorModel::rgba(true)),
            false,
        )
        .unwrap();
        assert_eq!(class.extra_sample_kind, ExtraSampleKind::AssociatedAlpha);
    }

    #[test]
    fn test_bilevel_palettes() {
        let black_zero = ColorModel::indexed(vec![[0, 0, 0], [255, 255, 255]]);
        let class = classify(&model(SampleType::Byte, 1, 1), Some(&black_zero), false).unwrap();
        assert_eq!(class.kind, ImageKind::BilevelBlackZero);

        let white_zero = ColorModel::indexed(vec![[255, 255, 255], [0, 0, 0]]);
        let class = classify(&model(SampleType::Byte, 1, 1), Some(&white_zero), false).unwrap();
        assert_eq!(class.kind, ImageKind::BilevelWhiteZero);

        let gray_pair = ColorModel::indexed(vec![[32, 32, 32], [200, 200, 200]]);
        let class = classify(&model(SampleType::Byte, 1, 1), Some(&gray_pair), false).unwrap();
        assert_eq!(class.kind, ImageKind::Palette);
    }

    #[test]
    fn test_no_color_model() {
        let class = classify(&model(SampleType::Byte, 1, 1), None, false).unwrap();
        assert_eq!(class.kind, ImageKind::BilevelBlackZero);

        let class = classify(&model(SampleType::UShort, 16, 2), None, false).unwrap();
        assert_eq!(class.kind, ImageKind::Generic);
        assert_eq!(class.extra_samples, 1);
        assert_eq!(class.extra_sample_kind, ExtraSampleKind::Unspecified);
    }

    #[test]
    fn test_rgb_to_ycbcr_flag() {
        let class = classify(&model(SampleType::Byte, 8, 3), Some(&ColorModel::rgb()), true)
            .unwrap();
        assert_eq!(class.kind, ImageKind::YCbCr);
    }

    #[test]
    fn test_color_map_widening() {
        let palette = ColorModel::indexed(vec![[1, 2, 3], [255, 0, 128]]);
        let class = classify(&model(SampleType::Byte, 8, 1), Some(&palette), false).unwrap();
        let map = class.color_map.unwrap();
        assert_eq!(map, vec![0x0100, 0xFF00, 0x0200, 0x0000, 0x0300, 0x8000]);
    }

    #[test]
    fn test_validation_errors() {
        let mut bad = model(SampleType::Byte, 8, 2);
        bad.bits_per_sample[1] = 4;
        assert!(matches!(
            classify(&bad, None, false),
            Err(TiffError::HeterogeneousBitDepth)
        ));

        assert!(matches!(
            classify(&model(SampleType::Byte, 4, 3), None, false),
            Err(TiffError::SubByteMultiband { .. })
        ));

        assert!(matches!(
            classify(&model(SampleType::UShort, 8, 1), None, false),
            Err(TiffError::DataTypeDepthMismatch { .. })
        ));

        let indexed = ColorModel::indexed(vec![[0, 0, 0], [255, 255, 255]]);
        assert!(matches!(
            classify(&model(SampleType::UShort, 16, 1), Some(&indexed), false),
            Err(TiffError::PaletteOnlyByte)
        ));
    }
}
