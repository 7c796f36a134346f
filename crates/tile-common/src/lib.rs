//! Common types and utilities shared across the boundary tile proxy crates.

pub mod color;
pub mod error;
pub mod layer_config;
pub mod tile;
pub mod url_matcher;

pub use color::Rgba;
pub use error::{CorrectorError, CorrectorResult};
pub use layer_config::{LayerConfig, LayerConfigTable, LineStyle, WidthStop};
pub use tile::TileCoord;
pub use url_matcher::UrlTemplate;

/// Correction layer holding lines to add at finer zooms.
pub const LAYER_ADD_OSM: &str = "to-add-osm";
/// Correction layer holding lines to remove at finer zooms.
pub const LAYER_DEL_OSM: &str = "to-del-osm";
/// Correction layer holding lines to add at coarser zooms.
pub const LAYER_ADD_NE: &str = "to-add-ne";
/// Correction layer holding lines to remove at coarser zooms.
pub const LAYER_DEL_NE: &str = "to-del-ne";

/// All correction layer names read from the archive.
pub const CORRECTION_LAYERS: [&str; 4] = [LAYER_ADD_OSM, LAYER_DEL_OSM, LAYER_ADD_NE, LAYER_DEL_NE];
