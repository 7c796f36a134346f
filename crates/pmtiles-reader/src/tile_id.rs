//! Hilbert-curve tile ids.
//!
//! Ids count every tile of every shallower zoom first, then walk the
//! current zoom along a Hilbert curve: `(4^z - 1) / 3 + d(x, y)`.

use hilbert_2d::Variant;

use tile_common::tile::MAX_ZOOM;
use tile_common::TileCoord;

/// Number of tiles on all zoom levels shallower than `z`.
fn zoom_base(z: u8) -> u64 {
    (((1u128 << (2 * u32::from(z))) - 1) / 3) as u64
}

/// Tile id of a coordinate. The coordinate must lie on its zoom's grid.
pub fn tile_id(coord: TileCoord) -> u64 {
    if coord.z == 0 {
        return 0;
    }

    let d = hilbert_2d::xy2h_discrete(
        coord.x as usize,
        coord.y as usize,
        usize::from(coord.z),
        Variant::Hilbert,
    ) as u64;

    zoom_base(coord.z) + d
}

/// Inverse of [`tile_id`]. Returns `None` past the deepest supported zoom.
pub fn zxy(id: u64) -> Option<TileCoord> {
    if id == 0 {
        return Some(TileCoord::new(0, 0, 0));
    }

    let z = (1..=MAX_ZOOM).find(|&z| id < zoom_base(z + 1))?;
    let d = id - zoom_base(z);

    let (x, y) = hilbert_2d::h2xy_discrete(d as usize, usize::from(z), Variant::Hilbert);
    Some(TileCoord::new(z, x as u32, y as u32))
}
