//! Archive reader: header, root directory, and tile lookup.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use tile_common::TileCoord;

use crate::{
    tile_id, ArchiveError, ArchiveResult, ByteSource, Compression, Directory, Entry, FileSource,
    Header, HEADER_LEN,
};

const LEAF_CACHE_SIZE: usize = 64;

/// Decompressed payload of one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileData {
    pub data: Vec<u8>,
    /// Compression the payload was stored with
    pub compression: Compression,
}

/// Read-only handle to a PMTiles v3 archive.
///
/// The header and root directory are read once at open time. Leaf
/// directories are read on demand and kept in a small LRU.
pub struct ArchiveReader {
    source: Box<dyn ByteSource>,
    header: Header,
    root: Directory,
    leaves: Mutex<LruCache<u64, Arc<Directory>>>,
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("header", &self.header)
            .field("root_entries", &self.root.len())
            .finish()
    }
}

impl ArchiveReader {
    /// Open an archive file.
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let source = FileSource::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), size = source.size(), "Opening archive");
        Self::from_source(Box::new(source))
    }

    /// Build a reader over any byte source, validating the header and root directory.
    pub fn from_source(source: Box<dyn ByteSource>) -> ArchiveResult<Self> {
        if source.size() < HEADER_LEN as u64 {
            return Err(ArchiveError::BadMagic);
        }
        let header = Header::parse(&source.read_at(0, HEADER_LEN)?)?;

        let raw_root = read_section(
            source.as_ref(),
            header.root_dir_offset,
            header.root_dir_length,
        )?;
        let root = Directory::deserialize(&header.internal_compression.decompress(&raw_root)?)?;

        debug!(
            root_entries = root.len(),
            min_zoom = header.min_zoom,
            max_zoom = header.max_zoom,
            tile_compression = header.tile_compression.name(),
            "Archive header parsed"
        );

        let capacity = NonZeroUsize::new(LEAF_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            source,
            header,
            root,
            leaves: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn root_directory(&self) -> &Directory {
        &self.root
    }

    /// Look up and decompress the tile at `coord`.
    ///
    /// Coordinates outside the declared zoom bounds, or with no covering
    /// directory entry, yield `Ok(None)`.
    pub fn lookup_tile(&self, coord: TileCoord) -> ArchiveResult<Option<TileData>> {
        if !coord.is_valid() || coord.z < self.header.min_zoom || coord.z > self.header.max_zoom {
            return Ok(None);
        }
        let id = tile_id(coord);

        let Some(entry) = self.find_entry(id)? else {
            return Ok(None);
        };

        let raw = read_section(
            self.source.as_ref(),
            offset_in(self.header.tile_data_offset, entry.offset)?,
            u64::from(entry.length),
        )?;
        let compression = self.header.tile_compression;
        Ok(Some(TileData {
            data: compression.decompress(&raw)?,
            compression,
        }))
    }

    fn find_entry(&self, id: u64) -> ArchiveResult<Option<Entry>> {
        let Some(entry) = self.root.find_tile(id).copied() else {
            return Ok(None);
        };
        if !entry.is_leaf_pointer() {
            return Ok(Some(entry));
        }

        let leaf = self.leaf_directory(&entry)?;
        match leaf.find_tile(id) {
            Some(found) if found.is_leaf_pointer() => {
                warn!(tile_id = id, "Leaf directory nests deeper than one level, ignoring");
                Ok(None)
            }
            found => Ok(found.copied()),
        }
    }

    fn leaf_directory(&self, pointer: &Entry) -> ArchiveResult<Arc<Directory>> {
        if let Some(dir) = self.lock_leaves().get(&pointer.offset) {
            return Ok(dir.clone());
        }

        let raw = read_section(
            self.source.as_ref(),
            offset_in(self.header.leaf_dirs_offset, pointer.offset)?,
            u64::from(pointer.length),
        )?;
        let dir = Arc::new(Directory::deserialize(
            &self.header.internal_compression.decompress(&raw)?,
        )?);

        self.lock_leaves().put(pointer.offset, dir.clone());
        Ok(dir)
    }

    fn lock_leaves(&self) -> std::sync::MutexGuard<'_, LruCache<u64, Arc<Directory>>> {
        self.leaves.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Parsed JSON metadata, or `Null` when the archive carries none.
    pub fn metadata(&self) -> ArchiveResult<serde_json::Value> {
        if self.header.metadata_length == 0 {
            return Ok(serde_json::Value::Null);
        }
        let raw = read_section(
            self.source.as_ref(),
            self.header.metadata_offset,
            self.header.metadata_length,
        )?;
        let json = self.header.internal_compression.decompress(&raw)?;
        serde_json::from_slice(&json).map_err(|e| ArchiveError::Metadata(e.to_string()))
    }

    /// Every tile entry in the archive, with leaf pointers expanded.
    pub fn entries(&self) -> ArchiveResult<Vec<Entry>> {
        let mut out = Vec::new();
        for entry in self.root.entries() {
            if entry.is_leaf_pointer() {
                let leaf = self.leaf_directory(entry)?;
                out.extend(leaf.entries().iter().filter(|e| !e.is_leaf_pointer()));
            } else {
                out.push(*entry);
            }
        }
        Ok(out)
    }

    /// Coordinates of every addressed tile, expanding runs.
    pub fn tile_coords(&self) -> ArchiveResult<Vec<TileCoord>> {
        let mut coords = Vec::new();
        for entry in self.entries()? {
            for id in entry.tile_id..entry.tile_id.saturating_add(u64::from(entry.run_length)) {
                if let Some(coord) = crate::zxy(id) {
                    coords.push(coord);
                }
            }
        }
        Ok(coords)
    }
}

fn offset_in(section_start: u64, relative: u64) -> ArchiveResult<u64> {
    section_start
        .checked_add(relative)
        .ok_or(ArchiveError::OutOfRange {
            offset: relative,
            len: 0,
        })
}

fn read_section(source: &dyn ByteSource, offset: u64, length: u64) -> ArchiveResult<Vec<u8>> {
    let len = usize::try_from(length).map_err(|_| ArchiveError::OutOfRange {
        offset,
        len: length,
    })?;
    source.read_at(offset, len)
}
