//! Mapbox vector tile (MVT) decoding.
//!
//! Layers are decoded independently: a malformed layer is skipped and
//! reported in [`DecodedTile::errors`] while the remaining layers are kept.

pub mod decoder;
pub mod error;
pub mod geometry;
pub mod proto;

pub use decoder::{decode, DecodedTile, PropertyValue, VectorFeature, VectorLayer, DEFAULT_EXTENT};
pub use error::{DecodeError, DecodeResult};
pub use geometry::{Geometry, GeometryType, Point};
