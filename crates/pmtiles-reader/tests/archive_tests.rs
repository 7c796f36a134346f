//! Archive reader tests against generated archives.

use pmtiles_reader::{ArchiveError, ArchiveReader, Compression, MemorySource, TileType};
use test_utils::{
    corrupt_magic, gzip, line_feature, replace_root_directory, require_test_file, write_temp_bytes,
    PmtilesBuilder, VectorTileBuilder,
};
use integer_encoding::VarInt;
use tile_common::TileCoord;

fn mvt(name: &str) -> Vec<u8> {
    VectorTileBuilder::new()
        .layer(name, vec![line_feature(&[&[(0, 0), (4096, 4096)]])])
        .build()
}

fn reader(bytes: Vec<u8>) -> ArchiveReader {
    ArchiveReader::from_source(Box::new(MemorySource::new(bytes))).unwrap()
}

// ============================================================================
// Header
// ============================================================================

#[test]
fn test_open_file_and_read_header() {
    let file = PmtilesBuilder::new()
        .tile(TileCoord::new(3, 1, 2), mvt("a"))
        .tile(TileCoord::new(5, 10, 12), mvt("b"))
        .metadata(serde_json::json!({"name": "corrections", "vector_layers": []}))
        .write_temp();

    let reader = ArchiveReader::open(file.path()).unwrap();
    let header = reader.header();
    assert_eq!(header.version, 3);
    assert_eq!(header.min_zoom, 3);
    assert_eq!(header.max_zoom, 5);
    assert_eq!(header.tile_type, TileType::Mvt);
    assert_eq!(header.internal_compression, Compression::Gzip);
    assert_eq!(header.tile_compression, Compression::Gzip);

    let metadata = reader.metadata().unwrap();
    assert_eq!(metadata["name"], "corrections");
}

#[test]
fn test_bad_magic_is_format_error() {
    let bytes = corrupt_magic(PmtilesBuilder::new().build());
    let file = write_temp_bytes(&bytes);
    let err = ArchiveReader::open(file.path()).unwrap_err();
    assert!(matches!(err, ArchiveError::BadMagic));
    assert!(err.is_format_error());
}

#[test]
fn test_wrong_version_is_format_error() {
    let mut bytes = PmtilesBuilder::new().build();
    bytes[7] = 2;
    let err = ArchiveReader::from_source(Box::new(MemorySource::new(bytes))).unwrap_err();
    assert!(matches!(err, ArchiveError::UnsupportedVersion(2)));
}

#[test]
fn test_truncated_file_is_format_error() {
    let err = ArchiveReader::from_source(Box::new(MemorySource::new(b"PMTiles".to_vec())))
        .unwrap_err();
    assert!(err.is_format_error());
}

#[test]
fn test_overflowing_root_offsets_are_format_error() {
    // Two entries; the second "follows" a first entry that ends past u64::MAX
    let mut root = vec![2, 1, 1, 1, 1, 5, 5];
    root.extend(u64::MAX.encode_var_vec());
    root.push(0);

    let bytes = replace_root_directory(PmtilesBuilder::new().build(), &gzip(&root));
    let err = ArchiveReader::from_source(Box::new(MemorySource::new(bytes))).unwrap_err();
    assert!(matches!(err, ArchiveError::MalformedDirectory(_)));
    assert!(err.is_format_error());
}

#[test]
fn test_missing_file_is_io_error() {
    let err = ArchiveReader::open("/nonexistent/corrections.pmtiles").unwrap_err();
    assert!(matches!(err, ArchiveError::Io(_)));
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn test_lookup_returns_decompressed_tile() {
    let payload = mvt("to-add-osm");
    let reader = reader(
        PmtilesBuilder::new()
            .tile(TileCoord::new(5, 10, 12), payload.clone())
            .build(),
    );

    let tile = reader.lookup_tile(TileCoord::new(5, 10, 12)).unwrap().unwrap();
    assert_eq!(tile.data, payload);
    assert_eq!(tile.compression, Compression::Gzip);

    let decoded = vector_tile::decode(&tile.data).unwrap();
    assert_eq!(decoded.features("to-add-osm").len(), 1);
}

#[test]
fn test_lookup_uncompressed_tiles() {
    let payload = mvt("x");
    let reader = reader(
        PmtilesBuilder::new()
            .gzip_tiles(false)
            .gzip_internal(false)
            .tile(TileCoord::new(2, 3, 0), payload.clone())
            .build(),
    );
    let tile = reader.lookup_tile(TileCoord::new(2, 3, 0)).unwrap().unwrap();
    assert_eq!(tile.data, payload);
    assert_eq!(tile.compression, Compression::None);
}

#[test]
fn test_absent_tiles_are_none() {
    let reader = reader(
        PmtilesBuilder::new()
            .tile(TileCoord::new(4, 3, 3), mvt("a"))
            .tile(TileCoord::new(6, 40, 20), mvt("b"))
            .build(),
    );
    // Inside the zoom bounds but not stored
    assert!(reader.lookup_tile(TileCoord::new(5, 0, 0)).unwrap().is_none());
    // Outside the zoom bounds
    assert!(reader.lookup_tile(TileCoord::new(2, 1, 1)).unwrap().is_none());
    assert!(reader.lookup_tile(TileCoord::new(9, 1, 1)).unwrap().is_none());
    // Off the grid
    assert!(reader.lookup_tile(TileCoord::new(4, 16, 0)).unwrap().is_none());
}

#[test]
fn test_run_length_entries_share_payload() {
    let shared = mvt("same");
    // (1,0,0), (1,0,1), (1,1,1) are consecutive ids 1, 2, 3
    let reader = reader(
        PmtilesBuilder::new()
            .tile(TileCoord::new(1, 0, 0), shared.clone())
            .tile(TileCoord::new(1, 0, 1), shared.clone())
            .tile(TileCoord::new(1, 1, 1), shared.clone())
            .build(),
    );
    assert_eq!(reader.root_directory().len(), 1);
    assert_eq!(reader.root_directory().entries()[0].run_length, 3);

    for (x, y) in [(0, 0), (0, 1), (1, 1)] {
        let tile = reader.lookup_tile(TileCoord::new(1, x, y)).unwrap().unwrap();
        assert_eq!(tile.data, shared);
    }
    assert!(reader.lookup_tile(TileCoord::new(1, 1, 0)).unwrap().is_none());
}

#[test]
fn test_lookup_through_leaf_directories() {
    let mut builder = PmtilesBuilder::new().leaf_size(3);
    let mut coords = Vec::new();
    for x in 0..8u32 {
        for y in (0..8u32).step_by(3) {
            let coord = TileCoord::new(3, x, y);
            builder = builder.tile(coord, mvt(&format!("layer-{}-{}", x, y)));
            coords.push(coord);
        }
    }
    let reader = reader(builder.build());
    assert!(reader
        .root_directory()
        .entries()
        .iter()
        .all(|e| e.is_leaf_pointer()));

    for coord in &coords {
        let tile = reader.lookup_tile(*coord).unwrap().unwrap();
        let decoded = vector_tile::decode(&tile.data).unwrap();
        let name = format!("layer-{}-{}", coord.x, coord.y);
        assert!(decoded.layer(&name).is_some(), "wrong tile for {}", coord);
    }
    assert!(reader.lookup_tile(TileCoord::new(3, 0, 1)).unwrap().is_none());
}

#[test]
fn test_every_in_bounds_coordinate_is_some_or_none() {
    let mut builder = PmtilesBuilder::new().leaf_size(2).zoom_bounds(0, 4);
    for (z, x, y) in [(1, 1, 0), (2, 2, 3), (3, 5, 5), (4, 15, 0), (4, 7, 9)] {
        builder = builder.tile(TileCoord::new(z, x, y), mvt("a"));
    }
    let reader = reader(builder.build());

    let mut found = 0;
    for z in 0..=4u8 {
        let n = 1u32 << z;
        for x in 0..n {
            for y in 0..n {
                if reader.lookup_tile(TileCoord::new(z, x, y)).unwrap().is_some() {
                    found += 1;
                }
            }
        }
    }
    assert_eq!(found, 5);
}

#[test]
fn test_identical_lookups_are_identical() {
    let reader = reader(
        PmtilesBuilder::new()
            .leaf_size(1)
            .tile(TileCoord::new(7, 100, 50), mvt("a"))
            .build(),
    );
    let first = reader.lookup_tile(TileCoord::new(7, 100, 50)).unwrap();
    let second = reader.lookup_tile(TileCoord::new(7, 100, 50)).unwrap();
    assert!(first.is_some());
    assert_eq!(first, second);
}

// ============================================================================
// Traversal
// ============================================================================

#[test]
fn test_tile_coords_expand_leaves_and_runs() {
    let shared = mvt("same");
    let reader = reader(
        PmtilesBuilder::new()
            .leaf_size(1)
            .tile(TileCoord::new(1, 0, 0), shared.clone())
            .tile(TileCoord::new(1, 0, 1), shared)
            .tile(TileCoord::new(6, 3, 9), mvt("other"))
            .build(),
    );
    let mut coords = reader.tile_coords().unwrap();
    coords.sort();
    assert_eq!(
        coords,
        vec![
            TileCoord::new(1, 0, 0),
            TileCoord::new(1, 0, 1),
            TileCoord::new(6, 3, 9)
        ]
    );
    assert_eq!(reader.entries().unwrap().len(), 2);
}

#[test]
fn test_real_archive_if_present() {
    let path = require_test_file!("corrections.pmtiles");
    let reader = ArchiveReader::open(path).unwrap();
    let header = reader.header().clone();
    for z in header.min_zoom..=header.max_zoom.min(3) {
        let n = 1u32 << z;
        for x in 0..n {
            for y in 0..n {
                reader.lookup_tile(TileCoord::new(z, x, y)).unwrap();
            }
        }
    }
}
