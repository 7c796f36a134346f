//! Applying correction geometry to a raster tile.
//!
//! Deletions are painted first in the provider's background color, then
//! each zoom-active line style strokes the additions on top. Geometry is
//! scaled from the layer's extent to the decoded image's width.

use image::{ImageFormat, RgbaImage};
use tiny_skia::{ColorU8, Pixmap};
use tracing::debug;

use storage::CorrectionSet;
use tile_common::{LayerConfig, TileCoord, LAYER_ADD_NE, LAYER_ADD_OSM, LAYER_DEL_NE, LAYER_DEL_OSM};
use vector_tile::VectorFeature;

use crate::png::encode_png;
use crate::stroke::{stroke_paths, StrokeStyle};
use crate::{RenderError, RenderResult};

/// Edge length widths in the style table are expressed for.
pub const STANDARD_TILE_SIZE: u32 = 256;

const JPEG_QUALITY: u8 = 90;

/// Raster formats a corrected tile can be written back as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    Png,
    Jpeg,
}

impl TileFormat {
    /// Sniff the format from magic bytes.
    pub fn detect(bytes: &[u8]) -> RenderResult<Self> {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Png) => Ok(TileFormat::Png),
            Ok(ImageFormat::Jpeg) => Ok(TileFormat::Jpeg),
            Ok(other) => Err(RenderError::UnsupportedFormat(format!("{:?}", other))),
            Err(e) => Err(RenderError::UnsupportedFormat(e.to_string())),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            TileFormat::Png => "image/png",
            TileFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Add and delete layer names for a zoom: fine layers at or above the
/// config's threshold, coarse layers below it.
pub fn correction_layers(config: &LayerConfig, z: u8) -> (&'static str, &'static str) {
    if config.uses_fine_layers(z) {
        (LAYER_ADD_OSM, LAYER_DEL_OSM)
    } else {
        (LAYER_ADD_NE, LAYER_DEL_NE)
    }
}

/// Draw corrections onto a tile.
///
/// Returns `Ok(None)` when the tile has nothing to add or delete, leaving
/// the original bytes untouched. The result is encoded in the input's
/// format.
pub fn fix_tile(
    image_bytes: &[u8],
    config: &LayerConfig,
    coord: TileCoord,
    corrections: &CorrectionSet,
) -> RenderResult<Option<Vec<u8>>> {
    let (add_layer, del_layer) = correction_layers(config, coord.z);
    let additions = corrections.features(add_layer);
    let deletions = corrections.features(del_layer);

    if additions.is_empty() && deletions.is_empty() {
        return Ok(None);
    }

    let format = TileFormat::detect(image_bytes)?;
    let image = image::load_from_memory(image_bytes)
        .map_err(|e| RenderError::ImageDecode(e.to_string()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    let mut pixmap = to_pixmap(&image)?;

    let pixel_ratio = f64::from(width) / f64::from(STANDARD_TILE_SIZE);
    let base_width = config.line_width(f64::from(coord.z)) * pixel_ratio;

    if !deletions.is_empty() {
        let style = StrokeStyle::new(config.del_color, base_width * config.del_width_factor);
        let scale = width as f32 / corrections.extent(del_layer) as f32;
        stroke_paths(&mut pixmap, feature_paths(deletions), scale, &style);
    }

    if !additions.is_empty() {
        let scale = width as f32 / corrections.extent(add_layer) as f32;
        for line_style in config.line_styles_for_zoom(coord.z) {
            let style = StrokeStyle::new(line_style.color, base_width * line_style.width_fraction);
            stroke_paths(&mut pixmap, feature_paths(additions), scale, &style);
        }
    }

    debug!(
        tile = %coord,
        config = %config.id,
        additions = additions.len(),
        deletions = deletions.len(),
        base_width,
        "Corrections drawn"
    );

    let rgba = from_pixmap(&pixmap);
    let encoded = match format {
        TileFormat::Png => encode_png(&rgba, width, height)?,
        TileFormat::Jpeg => encode_jpeg(&rgba, width, height)?,
    };
    Ok(Some(encoded))
}

fn feature_paths(features: &[VectorFeature]) -> impl Iterator<Item = &[vector_tile::Point]> {
    features.iter().flat_map(|f| f.geometry.paths())
}

fn to_pixmap(image: &RgbaImage) -> RenderResult<Pixmap> {
    let (width, height) = image.dimensions();
    let mut pixmap = Pixmap::new(width, height).ok_or(RenderError::Canvas { width, height })?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Ok(pixmap)
}

fn from_pixmap(pixmap: &Pixmap) -> Vec<u8> {
    pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect()
}

fn encode_jpeg(rgba: &[u8], width: u32, height: u32) -> RenderResult<Vec<u8>> {
    let rgb: Vec<u8> = rgba
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();

    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode(&rgb, width, height, image::ColorType::Rgb8)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tile_common::LayerConfigTable;

    fn config(threshold: u8) -> LayerConfig {
        let json = format!(
            r#"[{{ "id": "t", "zoomThreshold": {}, "tileUrlTemplates": ["https://t.example/{{z}}/{{x}}/{{y}}.png"] }}]"#,
            threshold
        );
        LayerConfigTable::from_json(&json).unwrap().configs()[0].clone()
    }

    #[test]
    fn test_layer_selection_by_threshold() {
        let c = config(5);
        assert_eq!(correction_layers(&c, 4), (LAYER_ADD_NE, LAYER_DEL_NE));
        assert_eq!(correction_layers(&c, 5), (LAYER_ADD_OSM, LAYER_DEL_OSM));
        assert_eq!(correction_layers(&c, 12), (LAYER_ADD_OSM, LAYER_DEL_OSM));
    }

    #[test]
    fn test_empty_corrections_are_none() {
        let result = fix_tile(b"not even an image", &config(5), TileCoord::new(3, 1, 1), &CorrectionSet::empty());
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            TileFormat::detect(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]).unwrap(),
            TileFormat::Png
        );
        assert_eq!(TileFormat::detect(&[0xff, 0xd8, 0xff, 0xe0]).unwrap(), TileFormat::Jpeg);
        assert!(TileFormat::detect(b"GIF89a").is_err());
        assert!(TileFormat::detect(b"??").is_err());
    }

    #[test]
    fn test_pixmap_round_trip_preserves_opaque_pixels() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, image::Rgba([10, 20, 30, 255]));
        image.put_pixel(1, 0, image::Rgba([200, 100, 50, 255]));
        let pixmap = to_pixmap(&image).unwrap();
        assert_eq!(from_pixmap(&pixmap), vec![10, 20, 30, 255, 200, 100, 50, 255]);
    }
}
