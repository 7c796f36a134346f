//! Tile and layer decoding.

use prost::Message;
use std::collections::HashMap;
use tracing::warn;

use crate::geometry::{decode_geometry, Geometry, GeometryType};
use crate::proto::{self, GeomType, RawTile};
use crate::{DecodeError, DecodeResult};

/// Extent assumed when a layer does not declare one.
pub const DEFAULT_EXTENT: u32 = 4096;

/// A feature property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Float(f32),
    Double(f64),
    Int(i64),
    UInt(u64),
    Bool(bool),
}

impl PropertyValue {
    fn from_proto(value: &proto::Value) -> Option<Self> {
        if let Some(s) = &value.string_value {
            Some(PropertyValue::String(s.clone()))
        } else if let Some(v) = value.float_value {
            Some(PropertyValue::Float(v))
        } else if let Some(v) = value.double_value {
            Some(PropertyValue::Double(v))
        } else if let Some(v) = value.int_value {
            Some(PropertyValue::Int(v))
        } else if let Some(v) = value.uint_value {
            Some(PropertyValue::UInt(v))
        } else if let Some(v) = value.sint_value {
            Some(PropertyValue::Int(v))
        } else {
            value.bool_value.map(PropertyValue::Bool)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorFeature {
    pub id: Option<u64>,
    pub geometry_type: GeometryType,
    pub geometry: Geometry,
    pub properties: HashMap<String, PropertyValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorLayer {
    pub name: String,
    pub version: u32,
    /// Edge length of the tile in local coordinate units
    pub extent: u32,
    pub features: Vec<VectorFeature>,
}

/// Result of decoding one tile: the layers that decoded cleanly plus the
/// errors of those that did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedTile {
    pub layers: HashMap<String, VectorLayer>,
    pub errors: Vec<DecodeError>,
}

impl DecodedTile {
    pub fn layer(&self, name: &str) -> Option<&VectorLayer> {
        self.layers.get(name)
    }

    /// Features of a layer, empty when the layer is absent.
    pub fn features(&self, name: &str) -> &[VectorFeature] {
        self.layers
            .get(name)
            .map(|l| l.features.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Decode a (decompressed) vector tile.
///
/// Fails only when the outer tile message cannot be parsed; per-layer
/// failures are collected in [`DecodedTile::errors`].
pub fn decode(bytes: &[u8]) -> DecodeResult<DecodedTile> {
    let raw = RawTile::decode(bytes).map_err(|e| DecodeError::Protobuf(e.to_string()))?;
    let mut tile = DecodedTile::default();

    for (index, layer_bytes) in raw.layers.iter().enumerate() {
        match decode_layer(index, layer_bytes) {
            Ok(layer) => {
                if tile.layers.contains_key(&layer.name) {
                    warn!(layer = %layer.name, "Duplicate layer name, keeping the first");
                    continue;
                }
                tile.layers.insert(layer.name.clone(), layer);
            }
            Err(err) => {
                warn!(layer_index = index, error = %err, "Skipping malformed layer");
                tile.errors.push(err);
            }
        }
    }

    Ok(tile)
}

fn decode_layer(index: usize, bytes: &[u8]) -> DecodeResult<VectorLayer> {
    let layer = proto::Layer::decode(bytes).map_err(|e| DecodeError::Layer {
        index,
        message: e.to_string(),
    })?;

    let extent = layer.extent.unwrap_or(DEFAULT_EXTENT);
    if extent == 0 {
        return Err(DecodeError::Layer {
            index,
            message: format!("layer '{}' declares a zero extent", layer.name),
        });
    }

    let mut features = Vec::with_capacity(layer.features.len());
    for (i, feature) in layer.features.iter().enumerate() {
        let geometry_type = feature
            .geometry_type
            .and_then(|t| GeomType::try_from(t).ok())
            .map(GeometryType::from)
            .unwrap_or(GeometryType::Unknown);

        let geometry = decode_geometry(geometry_type, &feature.geometry).map_err(|message| {
            DecodeError::Geometry {
                layer: layer.name.clone(),
                feature: i,
                message,
            }
        })?;

        features.push(VectorFeature {
            id: feature.id,
            geometry_type,
            geometry,
            properties: decode_properties(&layer, &feature.tags)?,
        });
    }

    Ok(VectorLayer {
        name: layer.name,
        version: layer.version,
        extent,
        features,
    })
}

fn decode_properties(
    layer: &proto::Layer,
    tags: &[u32],
) -> DecodeResult<HashMap<String, PropertyValue>> {
    if tags.len() % 2 != 0 {
        return Err(DecodeError::Tags {
            layer: layer.name.clone(),
            message: format!("odd tag count {}", tags.len()),
        });
    }

    let mut properties = HashMap::with_capacity(tags.len() / 2);
    for pair in tags.chunks_exact(2) {
        let key = layer.keys.get(pair[0] as usize);
        let value = layer.values.get(pair[1] as usize);
        match (key, value) {
            (Some(key), Some(value)) => {
                if let Some(value) = PropertyValue::from_proto(value) {
                    properties.insert(key.clone(), value);
                }
            }
            _ => {
                return Err(DecodeError::Tags {
                    layer: layer.name.clone(),
                    message: format!("tag pair {:?} out of range", pair),
                })
            }
        }
    }
    Ok(properties)
}
