//! Index entry representation
//!
//! Each entry in the index represents a staged file with:
//! - Repository-relative path (forward slashes)
//! - Merge stage
//! - Content hash (object ID)
//! - File metadata (mode, size, timestamps)
//!
//! ## Entry Format
//!
//! Entries are stored in a binary format padded with NUL bytes to 8-byte
//! alignment. Metadata includes both file status (mode, size) and timestamps
//! (mtime, ctime) which enable fast change detection without reading file
//! content. All stat fields are stored as 32-bit values, so they are kept
//! truncated in memory too and compare equal after a reload.

use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::entry_flags::{EntryFlags, ExtendedFlags, NAME_MASK};
use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::index::stage::Stage;
use crate::artifacts::index::{ENTRY_BLOCK, EXTENDED_VERSION};
use crate::artifacts::objects::object::Packable;
use crate::artifacts::objects::object_format::ObjectFormat;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, Result};
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use is_executable::IsExecutable;
use std::fs::Metadata;
use std::io::{Read, Write};
use std::os::unix::prelude::MetadataExt;
use std::path::Path;

/// Size of the ten 32-bit stat fields at the start of every entry
const STAT_SIZE: usize = 40;

/// Index entry representing a staged file
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexEntry {
    /// Path relative to repository root, using `/` separators
    pub path: String,
    /// Hash of the blob holding the file content
    pub oid: ObjectId,
    /// Merge stage, `Stage::Normal` outside of conflicts
    #[new(default)]
    pub stage: Stage,
    /// File metadata (mode, size, timestamps)
    pub metadata: EntryMetadata,
    #[new(default)]
    pub flags: EntryFlags,
    #[new(default)]
    pub extended_flags: ExtendedFlags,
}

impl IndexEntry {
    /// Sort key of the entry: path bytes first, then stage
    pub fn key(&self) -> (&str, Stage) {
        (&self.path, self.stage)
    }

    pub fn with_stage(self, stage: Stage) -> Self {
        IndexEntry { stage, ..self }
    }

    pub fn mode(&self) -> EntryMode {
        self.metadata.mode
    }

    /// Every proper parent directory of the entry, outermost first
    ///
    /// `a/b/c` yields `["a", "a/b"]`.
    pub fn parent_dirs(&self) -> Vec<&str> {
        self.path
            .match_indices('/')
            .map(|(position, _)| &self.path[..position])
            .collect()
    }

    pub fn is_extended(&self) -> bool {
        !self.extended_flags.is_empty()
    }

    pub fn stat_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.size == other.size
            && self.metadata.mode == other.mode
            && self.metadata.ino == other.ino
            && self.metadata.dev == other.dev
            && self.metadata.uid == other.uid
            && self.metadata.gid == other.gid
    }

    pub fn times_match(&self, other: &EntryMetadata) -> bool {
        self.metadata.ctime == other.ctime
            && self.metadata.ctime_nsec == other.ctime_nsec
            && self.metadata.mtime == other.mtime
            && self.metadata.mtime_nsec == other.mtime_nsec
    }

    /// Size of the fixed part of an on-disk entry, before the path
    pub(crate) fn fixed_size(format: ObjectFormat) -> usize {
        STAT_SIZE + format.raw_len() + 2
    }

    /// Read one entry from the index stream
    ///
    /// Consumes the entry including its NUL padding.
    pub(crate) fn read_from<R: Read>(
        reader: &mut Checksum<R>,
        format: ObjectFormat,
        version: u32,
    ) -> Result<Self> {
        let fixed = reader.read(Self::fixed_size(format))?;

        let field = |i: usize| byteorder::NetworkEndian::read_u32(&fixed[i * 4..i * 4 + 4]);
        let mode = EntryMode::try_from(field(6))
            .map_err(|_| reader.corrupt(format!("invalid entry mode {:o}", field(6))))?;
        let metadata = EntryMetadata {
            ctime: field(0),
            ctime_nsec: field(1),
            mtime: field(2),
            mtime_nsec: field(3),
            dev: field(4),
            ino: field(5),
            mode,
            uid: field(7),
            gid: field(8),
            size: field(9),
        };

        let oid = ObjectId::read_raw_from(format, &mut &fixed[STAT_SIZE..])
            .map_err(|_| reader.corrupt("truncated object ID"))?;
        let raw_flags = byteorder::NetworkEndian::read_u16(&fixed[fixed.len() - 2..]);
        let (flags, stage, name_len) = EntryFlags::unpack(raw_flags);
        let mut entry_len = fixed.len();

        let extended_flags = if flags.contains(EntryFlags::EXTENDED) {
            if version < EXTENDED_VERSION {
                return Err(reader.corrupt("extended flags in a version 2 index"));
            }
            let raw = reader.read(2)?;
            entry_len += 2;
            ExtendedFlags::from_bits_truncate(byteorder::NetworkEndian::read_u16(&raw))
        } else {
            ExtendedFlags::empty()
        };

        let name = if name_len < NAME_MASK as usize {
            reader.read(name_len)?.to_vec()
        } else {
            let mut name = Vec::with_capacity(name_len);
            let mut byte = [0u8; 1];
            loop {
                reader.read_into(&mut byte)?;
                if byte[0] == 0 {
                    break;
                }
                name.push(byte[0]);
            }
            // the terminator belongs to the padding
            entry_len += 1;
            name
        };
        entry_len += name.len();

        let padded_len = if name_len < NAME_MASK as usize {
            (entry_len + ENTRY_BLOCK) & !(ENTRY_BLOCK - 1)
        } else {
            (entry_len - 1 + ENTRY_BLOCK) & !(ENTRY_BLOCK - 1)
        };
        let padding = reader.read(padded_len - entry_len)?;
        if padding.iter().any(|&b| b != 0) {
            return Err(reader.corrupt("entry path is not NUL-padded"));
        }

        let path = String::from_utf8(name)
            .map_err(|_| reader.corrupt("invalid UTF-8 in entry path"))?;

        Ok(IndexEntry {
            path,
            oid,
            stage,
            metadata,
            flags: flags.difference(EntryFlags::EXTENDED),
            extended_flags,
        })
    }
}

/// File metadata stored in index entries
///
/// Contains both file status information (mode, size, inode) and timestamps.
/// This metadata lets the index skip rehashing a file whose stat data has
/// not changed. It never takes part in object ID computation.
///
/// ## Timestamps
///
/// - `ctime`: File status change time (inode modification)
/// - `mtime`: File content modification time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub ctime: u32,
    pub ctime_nsec: u32,
    pub mtime: u32,
    pub mtime_nsec: u32,
    pub dev: u32,
    pub ino: u32,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
}

impl EntryMetadata {
    /// Modification time as a comparable `(seconds, nanoseconds)` pair
    pub fn mtime(&self) -> (u32, u32) {
        (self.mtime, self.mtime_nsec)
    }
}

impl Packable for IndexEntry {
    fn serialize(&self) -> Result<Bytes> {
        let mut entry_bytes = Vec::new();
        let metadata = &self.metadata;

        for field in [
            metadata.ctime,
            metadata.ctime_nsec,
            metadata.mtime,
            metadata.mtime_nsec,
            metadata.dev,
            metadata.ino,
            metadata.mode.as_u32(),
            metadata.uid,
            metadata.gid,
            metadata.size,
        ] {
            entry_bytes
                .write_u32::<byteorder::NetworkEndian>(field)
                .map_err(Error::encoding)?;
        }
        self.oid
            .write_raw_to(&mut entry_bytes)
            .map_err(Error::encoding)?;

        let mut flags = self.flags.difference(EntryFlags::EXTENDED);
        if self.is_extended() {
            flags |= EntryFlags::EXTENDED;
        }
        entry_bytes
            .write_u16::<byteorder::NetworkEndian>(flags.pack(self.stage, self.path.len()))
            .map_err(Error::encoding)?;
        if self.is_extended() {
            entry_bytes
                .write_u16::<byteorder::NetworkEndian>(self.extended_flags.bits())
                .map_err(Error::encoding)?;
        }
        entry_bytes
            .write_all(self.path.as_bytes())
            .map_err(Error::encoding)?;

        // There must be at least one NUL byte at the end
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }
}

impl TryFrom<(&Path, &Metadata)> for EntryMetadata {
    type Error = Error;

    /// Capture the `lstat` data of the file at `file_path`
    fn try_from((file_path, metadata): (&Path, &Metadata)) -> Result<Self> {
        let file_type = metadata.file_type();
        let mode = if file_type.is_symlink() {
            EntryMode::Symlink
        } else if file_type.is_dir() {
            EntryMode::Directory
        } else if file_type.is_file() {
            match file_path.is_executable() {
                true => EntryMode::File(FileMode::Executable),
                false => EntryMode::File(FileMode::Regular),
            }
        } else {
            return Err(Error::NotAFile(file_path.to_path_buf()));
        };

        Ok(Self {
            ctime: metadata.ctime() as u32,
            ctime_nsec: metadata.ctime_nsec() as u32,
            mtime: metadata.mtime() as u32,
            mtime_nsec: metadata.mtime_nsec() as u32,
            dev: metadata.dev() as u32,
            ino: metadata.ino() as u32,
            mode,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size() as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::VERSION;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use std::io::Cursor;

    #[fixture]
    fn oid() -> ObjectId {
        ObjectId::try_parse("d4fa8600b4f37d7516bef4816ae2c64dbf029e3a").unwrap()
    }

    #[fixture]
    fn entry_metadata() -> EntryMetadata {
        EntryMetadata {
            mtime: 1_700_000_000,
            mode: EntryMode::File(FileMode::Regular),
            size: 9,
            ..Default::default()
        }
    }

    fn read_back(bytes: Bytes, version: u32) -> Result<IndexEntry> {
        let mut reader = Checksum::new(
            Cursor::new(bytes.to_vec()),
            ObjectFormat::Sha1,
            Path::new("index"),
        );
        IndexEntry::read_from(&mut reader, ObjectFormat::Sha1, version)
    }

    #[rstest]
    fn test_entry_parent_dirs(oid: ObjectId, entry_metadata: EntryMetadata) {
        let entry = IndexEntry::new(String::from("a/b/c"), oid, entry_metadata);

        assert_eq!(entry.parent_dirs(), vec!["a", "a/b"]);
    }

    #[rstest]
    fn test_entry_parent_dirs_root(oid: ObjectId, entry_metadata: EntryMetadata) {
        let entry = IndexEntry::new(String::from("a"), oid, entry_metadata);

        assert_eq!(entry.parent_dirs(), Vec::<&str>::new());
    }

    #[rstest]
    fn pads_short_entries_to_eight_bytes(oid: ObjectId, entry_metadata: EntryMetadata) {
        // 62 fixed bytes + 13 path bytes = 75, padded to 80
        let entry = IndexEntry::new(String::from("lame.name.txt"), oid, entry_metadata);

        let bytes = entry.serialize().unwrap();

        assert_eq!(bytes.len(), 80);
        assert_eq!(&bytes[60..62], &[0x00, 13]);
        assert!(bytes[75..].iter().all(|&b| b == 0));
    }

    #[rstest]
    fn adds_a_full_block_when_already_aligned(oid: ObjectId, entry_metadata: EntryMetadata) {
        // 62 fixed bytes + 2 path bytes = 64, needs a full block of NULs
        let entry = IndexEntry::new(String::from("ab"), oid, entry_metadata);

        assert_eq!(entry.serialize().unwrap().len(), 72);
    }

    #[rstest]
    fn reads_back_conflict_stage(oid: ObjectId, entry_metadata: EntryMetadata) {
        let entry = IndexEntry::new(String::from("src/lib.rs"), oid, entry_metadata)
            .with_stage(Stage::Theirs);

        let parsed = read_back(entry.serialize().unwrap(), VERSION).unwrap();

        assert_eq!(parsed, entry);
    }

    #[rstest]
    fn reads_back_extended_flags(oid: ObjectId, entry_metadata: EntryMetadata) {
        let mut entry = IndexEntry::new(String::from("sparse.txt"), oid, entry_metadata);
        entry.extended_flags = ExtendedFlags::SKIP_WORKTREE;

        let parsed = read_back(entry.serialize().unwrap(), EXTENDED_VERSION).unwrap();

        assert_eq!(parsed, entry);
    }

    #[rstest]
    fn rejects_extended_flags_in_version_two(oid: ObjectId, entry_metadata: EntryMetadata) {
        let mut entry = IndexEntry::new(String::from("sparse.txt"), oid, entry_metadata);
        entry.extended_flags = ExtendedFlags::INTENT_TO_ADD;

        let result = read_back(entry.serialize().unwrap(), VERSION);

        assert!(matches!(result, Err(Error::CorruptIndex { .. })));
    }

    #[rstest]
    fn reads_back_paths_longer_than_the_name_mask(oid: ObjectId, entry_metadata: EntryMetadata) {
        let path = format!("{}/file.txt", "d".repeat(4100));
        let entry = IndexEntry::new(path, oid, entry_metadata);

        let parsed = read_back(entry.serialize().unwrap(), VERSION).unwrap();

        assert_eq!(parsed, entry);
    }
}
