//! Read-only PMTiles v3 archive access.
//!
//! An archive is a single file: a fixed 127-byte header, a root directory,
//! optional JSON metadata, optional leaf directories, and the tile data
//! section. Directories map Hilbert tile ids to byte ranges, either of tile
//! data or of a leaf directory one level down.
//!
//! ```ignore
//! let reader = ArchiveReader::open("corrections.pmtiles")?;
//! if let Some(tile) = reader.lookup_tile(TileCoord::new(5, 10, 12))? {
//!     // tile.data is decompressed MVT bytes
//! }
//! ```

pub mod compression;
pub mod directory;
pub mod error;
pub mod header;
pub mod reader;
pub mod source;
pub mod tile_id;

pub use compression::Compression;
pub use directory::{Directory, Entry};
pub use error::{ArchiveError, ArchiveResult};
pub use header::{Header, TileType, HEADER_LEN, MAGIC};
pub use reader::{ArchiveReader, TileData};
pub use source::{ByteSource, FileSource, MemorySource};
pub use tile_id::{tile_id, zxy};
