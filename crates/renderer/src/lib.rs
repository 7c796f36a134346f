//! Raster tile correction rendering.
//!
//! Strokes correction geometry onto decoded PNG/JPEG tiles with tiny-skia
//! and re-encodes the result in the tile's original format.

pub mod corrections;
pub mod error;
pub mod png;
pub mod stroke;

pub use corrections::{correction_layers, fix_tile, TileFormat, STANDARD_TILE_SIZE};
pub use error::{RenderError, RenderResult};
pub use png::encode_png;
pub use stroke::{stroke_paths, StrokeStyle, MIN_STROKE_WIDTH};
