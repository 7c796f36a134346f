//! Directory encoding and tile lookup.
//!
//! A serialized directory is a varint entry count followed by four
//! column-ordered varint arrays: delta-coded tile ids, run lengths,
//! lengths, and offsets. An offset of zero after the first entry means
//! "immediately after the previous entry"; any other value is stored +1.

use integer_encoding::VarInt;

use crate::{ArchiveError, ArchiveResult};

/// One directory entry.
///
/// A `run_length` of zero marks a pointer to a leaf directory; otherwise the
/// entry covers `run_length` consecutive tile ids sharing the same bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub tile_id: u64,
    pub offset: u64,
    pub length: u32,
    pub run_length: u32,
}

impl Entry {
    pub fn is_leaf_pointer(&self) -> bool {
        self.run_length == 0
    }
}

/// Entries sorted by ascending tile id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    entries: Vec<Entry>,
}

struct VarIntCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> VarIntCursor<'a> {
    fn next(&mut self, what: &str) -> ArchiveResult<u64> {
        let (value, read) = u64::decode_var(&self.buf[self.pos..]).ok_or_else(|| {
            ArchiveError::MalformedDirectory(format!(
                "truncated varint reading {} at byte {}",
                what, self.pos
            ))
        })?;
        self.pos += read;
        Ok(value)
    }
}

fn narrow(value: u64, what: &str) -> ArchiveResult<u32> {
    u32::try_from(value)
        .map_err(|_| ArchiveError::MalformedDirectory(format!("{} {} exceeds u32", what, value)))
}

impl Directory {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode an (already decompressed) directory.
    pub fn deserialize(buf: &[u8]) -> ArchiveResult<Self> {
        let mut cursor = VarIntCursor { buf, pos: 0 };
        let count = cursor.next("entry count")?;
        // Every entry needs at least four bytes, so a larger count is garbage
        if count > buf.len() as u64 {
            return Err(ArchiveError::MalformedDirectory(format!(
                "entry count {} exceeds directory size {}",
                count,
                buf.len()
            )));
        }
        let count = count as usize;

        let mut entries = vec![
            Entry {
                tile_id: 0,
                offset: 0,
                length: 0,
                run_length: 0,
            };
            count
        ];

        let mut last_id = 0u64;
        for entry in entries.iter_mut() {
            let delta = cursor.next("tile id")?;
            last_id = last_id.checked_add(delta).ok_or_else(|| {
                ArchiveError::MalformedDirectory("tile id overflow".to_string())
            })?;
            entry.tile_id = last_id;
        }
        for entry in entries.iter_mut() {
            entry.run_length = narrow(cursor.next("run length")?, "run length")?;
        }
        for entry in entries.iter_mut() {
            entry.length = narrow(cursor.next("length")?, "length")?;
        }
        for i in 0..count {
            let value = cursor.next("offset")?;
            entries[i].offset = if value == 0 && i > 0 {
                let prev = &entries[i - 1];
                prev.offset.checked_add(u64::from(prev.length)).ok_or_else(|| {
                    ArchiveError::MalformedDirectory(format!("offset overflow at entry {}", i))
                })?
            } else {
                value.saturating_sub(1)
            };
        }

        Ok(Self { entries })
    }

    /// Encode the directory, using the "follows previous" offset shorthand.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend((self.entries.len() as u64).encode_var_vec());

        let mut last_id = 0u64;
        for entry in &self.entries {
            out.extend((entry.tile_id - last_id).encode_var_vec());
            last_id = entry.tile_id;
        }
        for entry in &self.entries {
            out.extend(u64::from(entry.run_length).encode_var_vec());
        }
        for entry in &self.entries {
            out.extend(u64::from(entry.length).encode_var_vec());
        }
        for (i, entry) in self.entries.iter().enumerate() {
            let follows_previous = i > 0 && {
                let prev = &self.entries[i - 1];
                entry.offset == prev.offset + u64::from(prev.length)
            };
            let value = if follows_previous { 0 } else { entry.offset + 1 };
            out.extend(value.encode_var_vec());
        }
        out
    }

    /// Find the entry covering `tile_id`.
    ///
    /// Returns an exact match, the nearest preceding leaf pointer, or the
    /// nearest preceding run containing the id.
    pub fn find_tile(&self, tile_id: u64) -> Option<&Entry> {
        let idx = self.entries.partition_point(|e| e.tile_id <= tile_id);
        let entry = self.entries.get(idx.checked_sub(1)?)?;

        if entry.tile_id == tile_id
            || entry.is_leaf_pointer()
            || tile_id - entry.tile_id < u64::from(entry.run_length)
        {
            Some(entry)
        } else {
            None
        }
    }
}
