//! Compression codes used for directories and tile payloads.

use flate2::read::GzDecoder;
use std::io::Read;

use crate::{ArchiveError, ArchiveResult};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest decompressed directory, metadata or tile payload accepted.
pub const MAX_DECOMPRESSED_LEN: u64 = 64 * 1024 * 1024;

/// A compression code as stored in the archive header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Unknown,
    None,
    Gzip,
    Brotli,
    Zstd,
}

impl Compression {
    pub fn from_code(code: u8) -> ArchiveResult<Self> {
        match code {
            0 => Ok(Compression::Unknown),
            1 => Ok(Compression::None),
            2 => Ok(Compression::Gzip),
            3 => Ok(Compression::Brotli),
            4 => Ok(Compression::Zstd),
            other => Err(ArchiveError::UnsupportedCompression(format!(
                "unknown code {}",
                other
            ))),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Compression::Unknown => 0,
            Compression::None => 1,
            Compression::Gzip => 2,
            Compression::Brotli => 3,
            Compression::Zstd => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Compression::Unknown => "unknown",
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Brotli => "brotli",
            Compression::Zstd => "zstd",
        }
    }

    /// Decompress `data` according to this code.
    ///
    /// `Unknown` sniffs for the gzip magic and otherwise passes the bytes
    /// through untouched.
    pub fn decompress(&self, data: &[u8]) -> ArchiveResult<Vec<u8>> {
        match self {
            Compression::None => Ok(data.to_vec()),
            Compression::Gzip => gunzip(data),
            Compression::Unknown if data.starts_with(&GZIP_MAGIC) => gunzip(data),
            Compression::Unknown => Ok(data.to_vec()),
            Compression::Brotli | Compression::Zstd => {
                Err(ArchiveError::UnsupportedCompression(self.name().to_string()))
            }
        }
    }
}

fn gunzip(data: &[u8]) -> ArchiveResult<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4);
    GzDecoder::new(data)
        .take(MAX_DECOMPRESSED_LEN + 1)
        .read_to_end(&mut out)
        .map_err(|e| ArchiveError::Decompression(format!("gzip stream is corrupt: {}", e)))?;
    if out.len() as u64 > MAX_DECOMPRESSED_LEN {
        return Err(ArchiveError::Decompression(format!(
            "gzip stream expands past {} bytes",
            MAX_DECOMPRESSED_LEN
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_codes_round_trip() {
        for code in 0..=4 {
            assert_eq!(Compression::from_code(code).unwrap().code(), code);
        }
        assert!(Compression::from_code(9).is_err());
    }

    #[test]
    fn test_gzip_and_sniffing() {
        let packed = gzip(b"hello tiles");
        assert_eq!(Compression::Gzip.decompress(&packed).unwrap(), b"hello tiles");
        assert_eq!(Compression::Unknown.decompress(&packed).unwrap(), b"hello tiles");
        assert_eq!(Compression::Unknown.decompress(b"raw").unwrap(), b"raw");
        assert_eq!(Compression::None.decompress(b"raw").unwrap(), b"raw");
    }

    #[test]
    fn test_unsupported_codecs() {
        assert!(matches!(
            Compression::Brotli.decompress(b"x"),
            Err(ArchiveError::UnsupportedCompression(_))
        ));
    }

    #[test]
    fn test_corrupt_gzip_is_decompression_error() {
        assert!(matches!(
            Compression::Gzip.decompress(b"not gzip"),
            Err(ArchiveError::Decompression(_))
        ));
    }

    #[test]
    fn test_oversized_gzip_is_rejected() {
        let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::fast());
        let block = vec![0u8; 1024 * 1024];
        for _ in 0..=(MAX_DECOMPRESSED_LEN / block.len() as u64) {
            enc.write_all(&block).unwrap();
        }
        let bomb = enc.finish().unwrap();
        assert!(matches!(
            Compression::Gzip.decompress(&bomb),
            Err(ArchiveError::Decompression(_))
        ));
    }
}
