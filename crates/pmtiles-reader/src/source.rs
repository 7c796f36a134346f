//! Positioned byte access to an archive.

use bytes::Bytes;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::{ArchiveError, ArchiveResult};

/// Random-access reads over archive bytes.
///
/// Implementations must be safe to share across threads; reads do not
/// move any shared cursor.
pub trait ByteSource: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    fn read_at(&self, offset: u64, len: usize) -> ArchiveResult<Vec<u8>>;

    /// Total size in bytes.
    fn size(&self) -> u64;
}

fn check_range(offset: u64, len: usize, size: u64) -> ArchiveResult<()> {
    let end = offset.checked_add(len as u64);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(ArchiveError::OutOfRange {
            offset,
            len: len as u64,
        }),
    }
}

/// An archive on the local filesystem, read with positioned reads.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    path: PathBuf,
    size: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, path, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteSource for FileSource {
    fn read_at(&self, offset: u64, len: usize) -> ArchiveResult<Vec<u8>> {
        check_range(offset, len, self.size)?;
        let mut buf = vec![0u8; len];

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_exact_at(&mut buf, offset)?;
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut filled = 0;
            while filled < len {
                let n = self
                    .file
                    .seek_read(&mut buf[filled..], offset + filled as u64)?;
                if n == 0 {
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
                }
                filled += n;
            }
        }

        Ok(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// An archive held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

impl ByteSource for MemorySource {
    fn read_at(&self, offset: u64, len: usize) -> ArchiveResult<Vec<u8>> {
        check_range(offset, len, self.data.len() as u64)?;
        let start = offset as usize;
        Ok(self.data[start..start + len].to_vec())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_memory_source_bounds() {
        let src = MemorySource::new(vec![1u8, 2, 3, 4]);
        assert_eq!(src.read_at(1, 2).unwrap(), vec![2, 3]);
        assert_eq!(src.read_at(4, 0).unwrap(), Vec::<u8>::new());
        assert!(src.read_at(3, 2).is_err());
        assert!(src.read_at(u64::MAX, 2).is_err());
    }

    #[test]
    fn test_file_source_positioned_reads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();
        file.flush().unwrap();

        let src = FileSource::open(file.path()).unwrap();
        assert_eq!(src.size(), 10);
        assert_eq!(src.read_at(7, 3).unwrap(), b"789");
        assert_eq!(src.read_at(0, 2).unwrap(), b"01");
        assert!(matches!(
            src.read_at(8, 5),
            Err(ArchiveError::OutOfRange { offset: 8, len: 5 })
        ));
    }
}
