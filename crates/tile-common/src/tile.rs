//! XYZ tile addressing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Deepest zoom level a tile coordinate may address.
pub const MAX_ZOOM: u8 = 31;

/// A tile coordinate (z/x/y) in the quad-tree tiling scheme.
///
/// Valid coordinates satisfy `0 <= x, y < 2^z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u8,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Build a coordinate, rejecting addresses outside the zoom level's grid.
    pub fn checked(z: u8, x: u32, y: u32) -> Option<Self> {
        let coord = Self { z, x, y };
        coord.is_valid().then_some(coord)
    }

    /// Number of tiles along one edge at this zoom.
    pub fn grid_size(&self) -> u64 {
        1u64 << self.z
    }

    pub fn is_valid(&self) -> bool {
        self.z <= MAX_ZOOM
            && u64::from(self.x) < self.grid_size()
            && u64::from(self.y) < self.grid_size()
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}
