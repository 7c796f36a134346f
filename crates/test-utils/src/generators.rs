//! Raster tile generators.
//!
//! Produce small solid-colour PNG and JPEG tiles as an upstream tile server
//! would, plus helpers for comparing decoded pixels in tests.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};

/// A solid opaque PNG tile.
///
/// # Example
///
/// ```
/// use test_utils::solid_png;
///
/// let png = solid_png(256, 256, (240, 240, 240));
/// assert_eq!(&png[1..4], b"PNG");
/// ```
pub fn solid_png(width: u32, height: u32, rgb: (u8, u8, u8)) -> Vec<u8> {
    let pixels: Vec<u8> = (0..width * height)
        .flat_map(|_| [rgb.0, rgb.1, rgb.2, 255])
        .collect();
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(&pixels, width, height, ColorType::Rgba8)
        .expect("encode test png");
    out
}

/// A solid JPEG tile.
pub fn solid_jpeg(width: u32, height: u32, rgb: (u8, u8, u8)) -> Vec<u8> {
    let pixels: Vec<u8> = (0..width * height)
        .flat_map(|_| [rgb.0, rgb.1, rgb.2])
        .collect();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .write_image(&pixels, width, height, ColorType::Rgb8)
        .expect("encode test jpeg");
    out
}

/// Decode any supported raster to RGBA.
pub fn decode_rgba(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes)
        .expect("decode test image")
        .to_rgba8()
}

/// Pixel positions where two equally sized images differ.
pub fn differing_pixels(a: &RgbaImage, b: &RgbaImage) -> Vec<(u32, u32)> {
    assert_eq!(a.dimensions(), b.dimensions(), "image sizes differ");
    a.enumerate_pixels()
        .filter(|(x, y, p)| b.get_pixel(*x, *y) != *p)
        .map(|(x, y, _)| (x, y))
        .collect()
}

/// Distance from point `p` to the segment `a`-`b`.
pub fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / len_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (a.0 + t * dx, a.1 + t * dy);
    ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt()
}
