//! Vector tile encoding for tests.

use flate2::write::GzEncoder;
use prost::Message;
use std::io::Write;

use vector_tile::proto::{Feature, GeomType, Layer, Tile};

use crate::fixtures::TEST_EXTENT;

fn zigzag(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

fn command(id: u32, count: usize) -> u32 {
    ((count as u32) << 3) | id
}

/// Encode one path as MoveTo + LineTo (+ ClosePath when `close`).
pub fn encode_path(points: &[(i32, i32)], close: bool, cursor: &mut (i32, i32)) -> Vec<u32> {
    let mut out = Vec::new();
    let Some((first, rest)) = points.split_first() else {
        return out;
    };

    out.push(command(1, 1));
    out.push(zigzag(first.0 - cursor.0));
    out.push(zigzag(first.1 - cursor.1));
    *cursor = *first;

    if !rest.is_empty() {
        out.push(command(2, rest.len()));
        for p in rest {
            out.push(zigzag(p.0 - cursor.0));
            out.push(zigzag(p.1 - cursor.1));
            *cursor = *p;
        }
    }
    if close {
        out.push(command(7, 1));
    }
    out
}

/// A LineString (or MultiLineString when several parts are given) feature.
pub fn line_feature(parts: &[&[(i32, i32)]]) -> Feature {
    let mut cursor = (0, 0);
    Feature {
        id: None,
        tags: Vec::new(),
        geometry_type: Some(GeomType::LineString as i32),
        geometry: parts
            .iter()
            .flat_map(|part| encode_path(part, false, &mut cursor))
            .collect(),
    }
}

/// A single-ring polygon feature. `ring` must not repeat its first point.
pub fn polygon_feature(ring: &[(i32, i32)]) -> Feature {
    let mut cursor = (0, 0);
    Feature {
        id: None,
        tags: Vec::new(),
        geometry_type: Some(GeomType::Polygon as i32),
        geometry: encode_path(ring, true, &mut cursor),
    }
}

/// A point feature.
pub fn point_feature(point: (i32, i32)) -> Feature {
    let mut cursor = (0, 0);
    Feature {
        id: None,
        tags: Vec::new(),
        geometry_type: Some(GeomType::Point as i32),
        geometry: encode_path(&[point], false, &mut cursor),
    }
}

/// Builder for multi-layer vector tiles.
#[derive(Debug, Clone, Default)]
pub struct VectorTileBuilder {
    layers: Vec<Layer>,
}

impl VectorTileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer with the default test extent.
    pub fn layer(self, name: &str, features: Vec<Feature>) -> Self {
        self.layer_with_extent(name, TEST_EXTENT, features)
    }

    pub fn layer_with_extent(mut self, name: &str, extent: u32, features: Vec<Feature>) -> Self {
        self.layers.push(Layer {
            name: name.to_string(),
            features,
            keys: Vec::new(),
            values: Vec::new(),
            extent: Some(extent),
            version: 2,
        });
        self
    }

    /// Append raw, possibly malformed, layer bytes after the encoded layers.
    pub fn build_with_raw_layer(self, raw_layer: &[u8]) -> Vec<u8> {
        let mut out = self.build();
        // Field 3, wire type 2 (length-delimited)
        out.push(0x1a);
        prost::encoding::encode_varint(raw_layer.len() as u64, &mut out);
        out.extend_from_slice(raw_layer);
        out
    }

    pub fn build(self) -> Vec<u8> {
        Tile {
            layers: self.layers,
        }
        .encode_to_vec()
    }

    pub fn build_gzip(self) -> Vec<u8> {
        gzip(&self.build())
    }
}

/// Gzip-compress bytes.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder
        .write_all(data)
        .expect("writing to a Vec cannot fail");
    encoder.finish().expect("writing to a Vec cannot fail")
}
