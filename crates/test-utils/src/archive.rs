//! PMTiles v3 archive generation for tests.

use std::collections::BTreeMap;
use std::io::Write;

use pmtiles_reader::{tile_id, Directory, Entry, HEADER_LEN, MAGIC};
use tile_common::TileCoord;

use crate::mvt::gzip;

/// Builds small but structurally complete archives.
///
/// Consecutive tile ids with identical payloads are folded into a single
/// run-length entry. With [`leaf_size`](Self::leaf_size) set, tile entries
/// go into leaf directories and the root holds only leaf pointers.
#[derive(Debug, Clone)]
pub struct PmtilesBuilder {
    tiles: BTreeMap<u64, Vec<u8>>,
    gzip_tiles: bool,
    gzip_internal: bool,
    leaf_size: Option<usize>,
    metadata: Option<serde_json::Value>,
    zoom_bounds: Option<(u8, u8)>,
}

impl Default for PmtilesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PmtilesBuilder {
    pub fn new() -> Self {
        Self {
            tiles: BTreeMap::new(),
            gzip_tiles: true,
            gzip_internal: true,
            leaf_size: None,
            metadata: None,
            zoom_bounds: None,
        }
    }

    /// Add a tile payload (uncompressed MVT bytes).
    pub fn tile(mut self, coord: TileCoord, data: Vec<u8>) -> Self {
        self.tiles.insert(tile_id(coord), data);
        self
    }

    pub fn gzip_tiles(mut self, enabled: bool) -> Self {
        self.gzip_tiles = enabled;
        self
    }

    pub fn gzip_internal(mut self, enabled: bool) -> Self {
        self.gzip_internal = enabled;
        self
    }

    /// Put at most `n` entries in each leaf directory.
    pub fn leaf_size(mut self, n: usize) -> Self {
        self.leaf_size = Some(n.max(1));
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Override the declared zoom bounds (default: derived from the tiles).
    pub fn zoom_bounds(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.zoom_bounds = Some((min_zoom, max_zoom));
        self
    }

    fn internal(&self, bytes: Vec<u8>) -> Vec<u8> {
        if self.gzip_internal {
            gzip(&bytes)
        } else {
            bytes
        }
    }

    pub fn build(self) -> Vec<u8> {
        // Tile data section and run-length folded entries
        let mut tile_data = Vec::new();
        let mut entries: Vec<Entry> = Vec::new();
        let mut last_payload: Option<&Vec<u8>> = None;
        for (&id, payload) in &self.tiles {
            if let (Some(last), Some(prev)) = (entries.last_mut(), last_payload) {
                if prev == payload && last.tile_id + u64::from(last.run_length) == id {
                    last.run_length += 1;
                    continue;
                }
            }
            let stored = if self.gzip_tiles {
                gzip(payload)
            } else {
                payload.clone()
            };
            entries.push(Entry {
                tile_id: id,
                offset: tile_data.len() as u64,
                length: stored.len() as u32,
                run_length: 1,
            });
            tile_data.extend_from_slice(&stored);
            last_payload = Some(payload);
        }

        let (root_entries, leaf_section) = match self.leaf_size {
            None => (entries.clone(), Vec::new()),
            Some(n) => {
                let mut root = Vec::new();
                let mut section = Vec::new();
                for chunk in entries.chunks(n) {
                    let leaf = self.internal(Directory::new(chunk.to_vec()).serialize());
                    root.push(Entry {
                        tile_id: chunk[0].tile_id,
                        offset: section.len() as u64,
                        length: leaf.len() as u32,
                        run_length: 0,
                    });
                    section.extend_from_slice(&leaf);
                }
                (root, section)
            }
        };

        let root = self.internal(Directory::new(root_entries).serialize());
        let metadata = self.internal(
            self.metadata
                .as_ref()
                .map(|m| m.to_string().into_bytes())
                .unwrap_or_else(|| b"{}".to_vec()),
        );

        let (min_zoom, max_zoom) = self.zoom_bounds.unwrap_or_else(|| {
            let zooms = self
                .tiles
                .keys()
                .filter_map(|id| pmtiles_reader::zxy(*id).map(|c| c.z));
            let min = zooms.clone().min().unwrap_or(0);
            let max = zooms.max().unwrap_or(0);
            (min, max)
        });

        let root_offset = HEADER_LEN as u64;
        let metadata_offset = root_offset + root.len() as u64;
        let leaf_offset = metadata_offset + metadata.len() as u64;
        let data_offset = leaf_offset + leaf_section.len() as u64;

        let mut header = vec![0u8; HEADER_LEN];
        header[0..7].copy_from_slice(MAGIC);
        header[7] = 3;
        let fields = [
            root_offset,
            root.len() as u64,
            metadata_offset,
            metadata.len() as u64,
            leaf_offset,
            leaf_section.len() as u64,
            data_offset,
            tile_data.len() as u64,
            self.tiles.len() as u64,
            entries.len() as u64,
            entries.len() as u64,
        ];
        for (i, value) in fields.iter().enumerate() {
            header[8 + i * 8..16 + i * 8].copy_from_slice(&value.to_le_bytes());
        }
        header[96] = 1;
        header[97] = if self.gzip_internal { 2 } else { 1 };
        header[98] = if self.gzip_tiles { 2 } else { 1 };
        header[99] = 1;
        header[100] = min_zoom;
        header[101] = max_zoom;
        header[102..106].copy_from_slice(&(-1_800_000_000i32).to_le_bytes());
        header[106..110].copy_from_slice(&(-850_511_287i32).to_le_bytes());
        header[110..114].copy_from_slice(&(1_800_000_000i32).to_le_bytes());
        header[114..118].copy_from_slice(&(850_511_287i32).to_le_bytes());
        header[118] = min_zoom;

        let mut out = header;
        out.extend_from_slice(&root);
        out.extend_from_slice(&metadata);
        out.extend_from_slice(&leaf_section);
        out.extend_from_slice(&tile_data);
        out
    }

    /// Build and write to a temporary file that lives as long as the handle.
    pub fn write_temp(self) -> tempfile::NamedTempFile {
        let bytes = self.build();
        let mut file = tempfile::NamedTempFile::new().expect("create temp archive");
        file.write_all(&bytes).expect("write temp archive");
        file.flush().expect("flush temp archive");
        file
    }
}

/// Write arbitrary bytes to a temporary file, e.g. a corrupted archive.
pub fn write_temp_bytes(bytes: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(bytes).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}

/// Overwrite the magic so the archive no longer opens.
pub fn corrupt_magic(mut archive: Vec<u8>) -> Vec<u8> {
    if archive.len() >= 7 {
        archive[0..7].copy_from_slice(b"NOTPMTL");
    }
    archive
}

/// Swap in already-encoded root directory bytes, shifting the later sections.
pub fn replace_root_directory(archive: Vec<u8>, root: &[u8]) -> Vec<u8> {
    let field = |pos: usize| u64::from_le_bytes(archive[pos..pos + 8].try_into().unwrap_or([0; 8]));
    let (root_offset, root_len) = (field(8) as usize, field(16) as usize);
    let shift = root.len() as i64 - root_len as i64;

    let mut out = archive[..root_offset].to_vec();
    out[16..24].copy_from_slice(&(root.len() as u64).to_le_bytes());
    for pos in [24, 40, 56] {
        let moved = (field(pos) as i64 + shift) as u64;
        out[pos..pos + 8].copy_from_slice(&moved.to_le_bytes());
    }
    out.extend_from_slice(root);
    out.extend_from_slice(&archive[root_offset + root_len..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let bytes = PmtilesBuilder::new()
            .tile(TileCoord::new(2, 1, 1), vec![1, 2, 3])
            .build();
        assert_eq!(&bytes[0..7], MAGIC);
        assert_eq!(bytes[7], 3);
        assert_eq!(bytes[100], 2);
        assert_eq!(bytes[101], 2);
        let root_offset = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        assert_eq!(root_offset, HEADER_LEN as u64);
    }

    #[test]
    fn test_replace_root_directory_keeps_sections() {
        let bytes = PmtilesBuilder::new()
            .tile(TileCoord::new(1, 0, 0), vec![7; 4])
            .gzip_internal(false)
            .build();
        let root_len = u64::from_le_bytes(bytes[16..24].try_into().unwrap()) as usize;
        let swapped = replace_root_directory(bytes.clone(), &[0]);
        assert_eq!(swapped.len(), bytes.len() - root_len + 1);
        assert_eq!(&swapped[swapped.len() - 4..], &[7; 4]);
        let data_offset = u64::from_le_bytes(swapped[56..64].try_into().unwrap()) as usize;
        assert_eq!(&swapped[data_offset..data_offset + 4], &[7; 4]);
    }

    #[test]
    fn test_corrupt_magic() {
        let bytes = corrupt_magic(PmtilesBuilder::new().build());
        assert_ne!(&bytes[0..7], MAGIC);
    }
}
