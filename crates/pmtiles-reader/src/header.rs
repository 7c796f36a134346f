//! The fixed 127-byte archive header.

use crate::{ArchiveError, ArchiveResult, Compression};

pub const MAGIC: &[u8; 7] = b"PMTiles";
pub const HEADER_LEN: usize = 127;
pub const SPEC_VERSION: u8 = 3;

/// Payload type of the tiles in an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileType {
    Unknown,
    Mvt,
    Png,
    Jpeg,
    Webp,
    Avif,
}

impl TileType {
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => TileType::Mvt,
            2 => TileType::Png,
            3 => TileType::Jpeg,
            4 => TileType::Webp,
            5 => TileType::Avif,
            _ => TileType::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TileType::Unknown => "unknown",
            TileType::Mvt => "mvt",
            TileType::Png => "png",
            TileType::Jpeg => "jpeg",
            TileType::Webp => "webp",
            TileType::Avif => "avif",
        }
    }
}

/// Parsed archive header.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub version: u8,
    pub root_dir_offset: u64,
    pub root_dir_length: u64,
    pub metadata_offset: u64,
    pub metadata_length: u64,
    pub leaf_dirs_offset: u64,
    pub leaf_dirs_length: u64,
    pub tile_data_offset: u64,
    pub tile_data_length: u64,
    pub addressed_tiles: u64,
    pub tile_entries: u64,
    pub tile_contents: u64,
    pub clustered: bool,
    pub internal_compression: Compression,
    pub tile_compression: Compression,
    pub tile_type: TileType,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Bounds as (lon, lat) in degrees
    pub min_position: (f64, f64),
    pub max_position: (f64, f64),
    pub center_zoom: u8,
    pub center_position: (f64, f64),
}

impl Header {
    /// Parse a header from the first bytes of an archive.
    pub fn parse(bytes: &[u8]) -> ArchiveResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ArchiveError::OutOfRange {
                offset: 0,
                len: HEADER_LEN as u64,
            });
        }
        if &bytes[0..7] != MAGIC {
            return Err(ArchiveError::BadMagic);
        }
        let version = bytes[7];
        if version != SPEC_VERSION {
            return Err(ArchiveError::UnsupportedVersion(version));
        }

        let u64_at = |pos: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[pos..pos + 8]);
            u64::from_le_bytes(buf)
        };
        let degrees_at = |pos: usize| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[pos..pos + 4]);
            f64::from(i32::from_le_bytes(buf)) / 10_000_000.0
        };

        Ok(Self {
            version,
            root_dir_offset: u64_at(8),
            root_dir_length: u64_at(16),
            metadata_offset: u64_at(24),
            metadata_length: u64_at(32),
            leaf_dirs_offset: u64_at(40),
            leaf_dirs_length: u64_at(48),
            tile_data_offset: u64_at(56),
            tile_data_length: u64_at(64),
            addressed_tiles: u64_at(72),
            tile_entries: u64_at(80),
            tile_contents: u64_at(88),
            clustered: bytes[96] == 1,
            internal_compression: Compression::from_code(bytes[97])?,
            tile_compression: Compression::from_code(bytes[98])?,
            tile_type: TileType::from_code(bytes[99]),
            min_zoom: bytes[100],
            max_zoom: bytes[101],
            min_position: (degrees_at(102), degrees_at(106)),
            max_position: (degrees_at(110), degrees_at(114)),
            center_zoom: bytes[118],
            center_position: (degrees_at(119), degrees_at(123)),
        })
    }
}
