//! PNG encoding for corrected tiles.
//!
//! Tiles with at most 256 distinct colors are written as indexed PNG
//! (color type 3, with a tRNS chunk when any entry is translucent); all
//! others as 8-bit RGBA (color type 6). Scanlines are unfiltered and
//! zlib-compressed.

use std::collections::HashMap;
use std::io::Write;

use crate::{RenderError, RenderResult};

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];
const MAX_PALETTE_SIZE: usize = 256;

const COLOR_TYPE_RGBA: u8 = 6;
const COLOR_TYPE_INDEXED: u8 = 3;

/// Palette and per-pixel indices of a low-color image.
struct Palette {
    colors: Vec<[u8; 4]>,
    indices: Vec<u8>,
}

impl Palette {
    /// Build a palette, giving up as soon as a 257th color appears.
    fn extract(pixels: &[u8]) -> Option<Self> {
        let mut lookup: HashMap<[u8; 4], u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
        let mut colors = Vec::with_capacity(MAX_PALETTE_SIZE);
        let mut indices = Vec::with_capacity(pixels.len() / 4);

        for px in pixels.chunks_exact(4) {
            let color = [px[0], px[1], px[2], px[3]];
            let index = match lookup.get(&color) {
                Some(&i) => i,
                None => {
                    if colors.len() == MAX_PALETTE_SIZE {
                        return None;
                    }
                    let i = colors.len() as u8;
                    colors.push(color);
                    lookup.insert(color, i);
                    i
                }
            };
            indices.push(index);
        }

        Some(Self { colors, indices })
    }
}

/// Encode RGBA pixels, choosing indexed output when the palette fits.
pub fn encode_png(pixels: &[u8], width: u32, height: u32) -> RenderResult<Vec<u8>> {
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(RenderError::Encode(format!(
            "expected {} RGBA bytes for {}x{}, got {}",
            expected,
            width,
            height,
            pixels.len()
        )));
    }

    match Palette::extract(pixels) {
        Some(palette) => encode_indexed(&palette, width, height),
        None => encode_rgba(pixels, width, height),
    }
}

fn encode_indexed(palette: &Palette, width: u32, height: u32) -> RenderResult<Vec<u8>> {
    let mut png = start_png(width, height, COLOR_TYPE_INDEXED);

    let plte: Vec<u8> = palette.colors.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    if palette.colors.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = palette.colors.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(&palette.indices, width as usize)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Encode as full RGBA regardless of color count.
pub fn encode_rgba(pixels: &[u8], width: u32, height: u32) -> RenderResult<Vec<u8>> {
    let mut png = start_png(width, height, COLOR_TYPE_RGBA);
    let idat = deflate_scanlines(pixels, width as usize * 4)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

fn start_png(width: u32, height: u32, color_type: u8) -> Vec<u8> {
    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    // bit depth, color type, compression, filter, interlace
    ihdr.extend_from_slice(&[8, color_type, 0, 0, 0]);
    write_chunk(&mut png, b"IHDR", &ihdr);
    png
}

/// Prefix each row with filter type 0 and zlib-compress.
fn deflate_scanlines(data: &[u8], row_len: usize) -> RenderResult<Vec<u8>> {
    let rows = if row_len == 0 { 0 } else { data.len() / row_len };
    let mut raw = Vec::with_capacity(rows * (row_len + 1));
    for row in data.chunks_exact(row_len.max(1)).take(rows) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder
        .write_all(&raw)
        .and_then(|_| encoder.finish())
        .map_err(|e| RenderError::Encode(format!("IDAT compression failed: {}", e)))
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_type(png: &[u8]) -> u8 {
        // signature (8) + length (4) + "IHDR" (4) + width (4) + height (4) + depth (1)
        png[25]
    }

    #[test]
    fn test_palette_extraction() {
        let pixels = [255, 0, 0, 255, 0, 255, 0, 255, 255, 0, 0, 255, 0, 0, 0, 0];
        let palette = Palette::extract(&pixels).unwrap();
        assert_eq!(palette.colors.len(), 3);
        assert_eq!(palette.indices, vec![0, 1, 0, 2]);
    }

    #[test]
    fn test_few_colors_use_indexed() {
        let pixels: Vec<u8> = (0..64).flat_map(|i| [i as u8 % 4, 0, 0, 255]).collect();
        let png = encode_png(&pixels, 8, 8).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);
        assert_eq!(color_type(&png), COLOR_TYPE_INDEXED);
    }

    #[test]
    fn test_many_colors_use_rgba() {
        let pixels: Vec<u8> = (0..400u32)
            .flat_map(|i| [(i % 256) as u8, (i / 256) as u8, 7, 255])
            .collect();
        let png = encode_png(&pixels, 20, 20).unwrap();
        assert_eq!(color_type(&png), COLOR_TYPE_RGBA);
    }

    #[test]
    fn test_size_mismatch_is_error() {
        assert!(encode_png(&[0, 0, 0], 1, 1).is_err());
    }
}
