//! Decoded correction geometry for one tile.

use std::collections::HashMap;

use tile_common::CORRECTION_LAYERS;
use vector_tile::{DecodedTile, VectorFeature, DEFAULT_EXTENT};

/// Features of one correction layer plus the extent they are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionLayer {
    pub extent: u32,
    pub features: Vec<VectorFeature>,
}

/// Correction layers of one tile, keyed by layer name.
///
/// Only the four correction layer names are kept; absent layers read as
/// empty. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorrectionSet {
    layers: HashMap<String, CorrectionLayer>,
}

impl CorrectionSet {
    /// A set with no corrections.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Keep the correction layers of a decoded tile.
    pub fn from_decoded(mut tile: DecodedTile) -> Self {
        let layers = CORRECTION_LAYERS
            .iter()
            .filter_map(|name| {
                tile.layers.remove(*name).map(|layer| {
                    (
                        name.to_string(),
                        CorrectionLayer {
                            extent: layer.extent,
                            features: layer.features,
                        },
                    )
                })
            })
            .collect();
        Self { layers }
    }

    pub fn layer(&self, name: &str) -> Option<&CorrectionLayer> {
        self.layers.get(name)
    }

    /// Features of a layer, empty when the layer is absent.
    pub fn features(&self, name: &str) -> &[VectorFeature] {
        self.layers
            .get(name)
            .map(|l| l.features.as_slice())
            .unwrap_or(&[])
    }

    /// Extent of a layer, or the vector tile default when absent.
    pub fn extent(&self, name: &str) -> u32 {
        self.layers
            .get(name)
            .map(|l| l.extent)
            .unwrap_or(DEFAULT_EXTENT)
    }

    pub fn is_empty(&self) -> bool {
        self.layers.values().all(|l| l.features.is_empty())
    }

    /// Feature count per present layer, in correction layer order.
    pub fn feature_counts(&self) -> Vec<(&'static str, usize)> {
        CORRECTION_LAYERS
            .iter()
            .filter(|name| self.layers.contains_key(**name))
            .map(|name| (*name, self.features(name).len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vector_tile::{Geometry, GeometryType, VectorLayer};

    fn layer(name: &str, extent: u32, n: usize) -> VectorLayer {
        VectorLayer {
            name: name.to_string(),
            version: 2,
            extent,
            features: (0..n)
                .map(|i| VectorFeature {
                    id: Some(i as u64),
                    geometry_type: GeometryType::LineString,
                    geometry: Geometry::LineString(vec![(0, 0), (1, 1)]),
                    properties: HashMap::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_from_decoded_keeps_correction_layers_only() {
        let mut tile = DecodedTile::default();
        for l in [layer("to-add-osm", 512, 2), layer("roads", 4096, 5)] {
            tile.layers.insert(l.name.clone(), l);
        }
        let set = CorrectionSet::from_decoded(tile);
        assert_eq!(set.features("to-add-osm").len(), 2);
        assert_eq!(set.extent("to-add-osm"), 512);
        assert!(set.layer("roads").is_none());
        assert!(set.features("to-del-osm").is_empty());
        assert_eq!(set.extent("to-del-osm"), DEFAULT_EXTENT);
        assert_eq!(set.feature_counts(), vec![("to-add-osm", 2)]);
        assert!(!set.is_empty());
    }

    #[test]
    fn test_empty() {
        assert!(CorrectionSet::empty().is_empty());
    }
}
