//! Correction lookup: archive read and vector decode behind the cache.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use pmtiles_reader::{ArchiveError, ArchiveReader};
use storage::{CacheOutcome, CorrectionCache, CorrectionSet};
use tile_common::{CorrectorError, CorrectorResult, TileCoord};

/// Supplies correction sets for tiles.
///
/// Holds the shared archive handle and the correction cache. Without an
/// archive every lookup reports corrections as disabled.
#[derive(Clone)]
pub struct Corrector {
    archive: Option<Arc<ArchiveReader>>,
    cache: CorrectionCache,
}

impl Corrector {
    pub fn new(archive: Option<Arc<ArchiveReader>>, cache_capacity: usize) -> Self {
        Self {
            archive,
            cache: CorrectionCache::new(cache_capacity),
        }
    }

    /// Open the archive at `path`, disabling corrections if it cannot be read.
    pub fn open(path: Option<&Path>, cache_capacity: usize) -> Self {
        let archive = path.and_then(|path| match ArchiveReader::open(path) {
            Ok(reader) => {
                let header = reader.header();
                info!(
                    path = %path.display(),
                    min_zoom = header.min_zoom,
                    max_zoom = header.max_zoom,
                    addressed_tiles = header.addressed_tiles,
                    "Opened correction archive"
                );
                Some(Arc::new(reader))
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Cannot open correction archive, serving tiles uncorrected"
                );
                None
            }
        });

        if path.is_none() {
            info!("No correction archive configured, serving tiles uncorrected");
        }

        Self::new(archive, cache_capacity)
    }

    pub fn is_enabled(&self) -> bool {
        self.archive.is_some()
    }

    pub fn archive(&self) -> Option<&Arc<ArchiveReader>> {
        self.archive.as_ref()
    }

    pub fn cache(&self) -> &CorrectionCache {
        &self.cache
    }

    /// Corrections for `coord`, computed at most once across concurrent callers.
    ///
    /// Returns `Ok(None)` when corrections are disabled.
    pub async fn corrections(
        &self,
        coord: TileCoord,
    ) -> CorrectorResult<Option<(Arc<CorrectionSet>, CacheOutcome)>> {
        let Some(archive) = self.archive.clone() else {
            return Ok(None);
        };

        let found = self
            .cache
            .get_or_compute(coord, move || async move {
                match tokio::task::spawn_blocking(move || load_corrections(&archive, coord)).await {
                    Ok(result) => result,
                    Err(e) => Err(CorrectorError::Internal(format!("lookup task failed: {}", e))),
                }
            })
            .await
            .map_err(|e| CorrectorError::Internal(e.to_string()))?;

        Ok(Some(found))
    }
}

/// Read and decode the corrections of one tile.
///
/// A tile the archive does not address yields an empty set. Bad tile bytes
/// are logged and also yield an empty set; only I/O failures propagate, so
/// they are retried by later requests.
pub fn load_corrections(archive: &ArchiveReader, coord: TileCoord) -> CorrectorResult<CorrectionSet> {
    let tile = match archive.lookup_tile(coord) {
        Ok(Some(tile)) => tile,
        Ok(None) => {
            debug!(tile = %coord, "No corrections for tile");
            return Ok(CorrectionSet::empty());
        }
        Err(e @ ArchiveError::Io(_)) => return Err(e.into()),
        Err(e) => {
            warn!(tile = %coord, error = %e, "Unreadable correction tile, ignoring");
            return Ok(CorrectionSet::empty());
        }
    };

    match vector_tile::decode(&tile.data) {
        Ok(decoded) => {
            if !decoded.is_clean() {
                warn!(
                    tile = %coord,
                    skipped_layers = decoded.errors.len(),
                    "Correction tile decoded with skipped layers"
                );
            }
            let set = CorrectionSet::from_decoded(decoded);
            debug!(tile = %coord, layers = ?set.feature_counts(), "Decoded corrections");
            Ok(set)
        }
        Err(e) => {
            warn!(tile = %coord, error = %e, "Cannot decode correction tile, ignoring");
            Ok(CorrectionSet::empty())
        }
    }
}
