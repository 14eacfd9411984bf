//! Git index (staging area)
//!
//! The index is Git's staging area that tracks which files should be included
//! in the next commit. It maintains metadata about files including their mode,
//! timestamps, and object IDs.
//!
//! ## Data Structures
//!
//! Entries live in a single vector sorted by `(path, stage)`, so lookups are
//! binary searches and positions are plain indices. Any mutating call may
//! shift positions; borrowed entries cannot outlive it.
//!
//! ## Persistence
//!
//! The index is never saved implicitly. `rehydrate` reads the whole file and
//! verifies its checksum; `write_updates` writes a complete new file next to
//! the old one and renames it into place, so readers never observe a partial
//! index.

use crate::areas::database::Database;
use crate::areas::workspace::Workspace;
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::stage::Stage;
use crate::artifacts::index::{
    EXTENDED_VERSION, EXTENSION_HEADER_SIZE, HEADER_SIZE, SIGNATURE, VERSION,
};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::object::Packable;
use crate::artifacts::objects::object_format::ObjectFormat;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{Error, IoContext, Result};
use byteorder::ByteOrder;
use fake::rand;
use std::io::{BufReader, BufWriter, Read};
use std::ops::DerefMut;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Git index (staging area)
#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (typically `.git/index`)
    path: Box<Path>,
    /// Hash used for entry IDs and the trailing checksum
    format: ObjectFormat,
    /// Staged entries sorted by `(path, stage)`, unique on that pair
    entries: Vec<IndexEntry>,
    /// Index file header metadata
    header: IndexHeader,
    /// Flag indicating if the index has been modified since loading
    changed: bool,
    /// Modification time of the index file when it was last read or written
    timestamp: Option<(u32, u32)>,
}

impl Index {
    /// Create a new empty index
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the index file (typically `.git/index`)
    /// * `format` - Object format of the repository
    pub fn new(path: Box<Path>, format: ObjectFormat) -> Self {
        Index {
            path,
            format,
            entries: Vec::new(),
            header: IndexHeader::empty(),
            changed: false,
            timestamp: None,
        }
    }

    /// Get the path to the index file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ObjectFormat {
        self.format
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the in-memory index differs from what was last read or written
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter()
    }

    /// Position of the first entry for `path`, preferring the lowest stage
    pub fn find(&self, path: &str) -> Option<usize> {
        let position = self.entries.partition_point(|entry| entry.path.as_str() < path);

        self.entries
            .get(position)
            .filter(|entry| entry.path == path)
            .map(|_| position)
    }

    /// Entry at `position` in sorted order
    pub fn get_by_index(&self, position: usize) -> Result<&IndexEntry> {
        self.entries.get(position).ok_or(Error::OutOfRange {
            position,
            count: self.entries.len(),
        })
    }

    pub fn get_by_path(&self, path: &str, stage: Stage) -> Option<&IndexEntry> {
        self.position(path, stage)
            .ok()
            .map(|position| &self.entries[position])
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.iter().any(|entry| entry.stage.is_conflict())
    }

    /// Drop every entry; the change is persisted by the next `write_updates`
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.changed = true;
        }
        self.entries.clear();
    }

    /// Stage the current content of the workspace file at `path`
    ///
    /// The file is hashed and stored as a blob, then recorded at stage 0,
    /// replacing any entry already staged for it. Returns the blob ID.
    /// On error the index is left exactly as it was.
    pub fn add_by_path(
        &mut self,
        path: &str,
        workspace: &Workspace,
        database: &Database,
    ) -> Result<ObjectId> {
        validate_path(path)?;

        let stat = workspace.stat_file(path)?;
        if stat.mode == EntryMode::Directory {
            return Err(Error::NotAFile(PathBuf::from(path)));
        }

        let oid = match self.cached_oid(path, &stat, database) {
            Some(oid) => oid,
            None => {
                let data = workspace.read_file(path)?;
                database.store(&Blob::new(data))?
            }
        };

        self.add(IndexEntry::new(path.to_string(), oid, stat))?;
        debug!(path, oid = %oid, "staged file");

        Ok(oid)
    }

    /// Insert `entry`, replacing any entry with the same path and stage
    ///
    /// A stage 0 entry resolves a conflict on its path, and a conflict stage
    /// replaces the stage 0 entry. Adding a file also drops entries it
    /// collides with: a file where one of its parent directories used to be,
    /// or files nested below a path that is now a file.
    pub fn add(&mut self, entry: IndexEntry) -> Result<()> {
        validate_path(&entry.path)?;
        if entry.oid.format() != self.format {
            return Err(Error::InvalidObjectId(entry.oid.to_string()));
        }

        self.discard_conflicts(&entry);
        match self.position(&entry.path, entry.stage) {
            Ok(position) => self.entries[position] = entry,
            Err(position) => self.entries.insert(position, entry),
        }

        self.changed = true;
        Ok(())
    }

    /// Remove the entry at `(path, stage)`
    ///
    /// The blob it referenced stays in the database.
    pub fn remove(&mut self, path: &str, stage: Stage) -> Result<()> {
        let position = self
            .position(path, stage)
            .map_err(|_| Error::EntryNotFound {
                path: path.to_string(),
                stage,
            })?;

        self.entries.remove(position);
        self.changed = true;
        debug!(path, %stage, "removed entry");

        Ok(())
    }

    /// Remove every stage of `path`, returning how many entries were dropped
    pub fn remove_by_path(&mut self, path: &str) -> Result<usize> {
        let start = self.find(path).ok_or_else(|| Error::EntryNotFound {
            path: path.to_string(),
            stage: Stage::Normal,
        })?;
        let removed = self.remove_range(start, |entry| entry.path == path);

        debug!(path, removed, "removed all stages");
        Ok(removed)
    }

    /// Load the index from disk
    ///
    /// Reads the index file, parses the header and entries, and verifies
    /// the checksum. A missing or empty file yields an empty index.
    ///
    /// # Locking
    ///
    /// Acquires a shared lock on the index file during reading.
    ///
    /// On error the in-memory index is left as it was before the call.
    pub fn rehydrate(&mut self) -> Result<()> {
        let (header, entries, timestamp) = match self.load()? {
            Some((header, entries, timestamp)) => (header, entries, Some(timestamp)),
            None => (IndexHeader::empty(), Vec::new(), None),
        };

        self.entries = entries;
        self.header = header;
        self.timestamp = timestamp;
        self.changed = false;
        debug!(path = %self.path.display(), entries = self.entries.len(), "index loaded");

        Ok(())
    }

    /// Read and verify the index file; `None` when it is missing or empty
    fn load(&self) -> Result<Option<(IndexHeader, Vec<IndexEntry>, (u32, u32))>> {
        let mut index_file = match std::fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).io_context(|| {
                    format!("Unable to open index file {}", self.path.display())
                });
            }
        };
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)
            .io_context(|| format!("Unable to lock index file {}", self.path.display()))?;

        let metadata = lock
            .metadata()
            .io_context(|| format!("Unable to stat index file {}", self.path.display()))?;
        if metadata.len() == 0 {
            return Ok(None);
        }

        let mut reader = Checksum::new(
            BufReader::new(lock.deref_mut()),
            self.format,
            &self.path,
        );
        let header = self.parse_header(&mut reader)?;
        let entries = self.parse_entries(&header, metadata.len(), &mut reader)?;
        self.skip_extensions(metadata.len(), &mut reader)?;
        reader.verify()?;

        let timestamp = (metadata.mtime() as u32, metadata.mtime_nsec() as u32);
        Ok(Some((header, entries, timestamp)))
    }

    /// Persist the index, atomically replacing the file on disk
    pub fn write_updates(&mut self) -> Result<()> {
        let index_dir = self.path.parent().ok_or_else(|| Error::InvalidPath {
            path: self.path.display().to_string(),
            reason: "index path has no parent directory",
        })?;
        let temp_path = index_dir.join(format!(
            "index.tmp_{}_{}",
            std::process::id(),
            rand::random::<u32>()
        ));

        let header = IndexHeader {
            version: match self.entries.iter().any(IndexEntry::is_extended) {
                true => EXTENDED_VERSION,
                false => VERSION,
            },
            entries_count: self.entries.len() as u32,
            ..IndexHeader::empty()
        };

        let result = self.write_to(&temp_path, &header).and_then(|()| {
            std::fs::rename(&temp_path, &self.path)
                .io_context(|| format!("Unable to replace index file {}", self.path.display()))
        });
        if result.is_err()
            && let Err(err) = std::fs::remove_file(&temp_path)
            && err.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %temp_path.display(), error = %err, "unable to remove temp index file");
        }
        result?;

        let metadata = std::fs::metadata(&self.path)
            .io_context(|| format!("Unable to stat index file {}", self.path.display()))?;
        self.timestamp = Some((metadata.mtime() as u32, metadata.mtime_nsec() as u32));
        self.header = header;
        self.changed = false;
        debug!(path = %self.path.display(), entries = self.entries.len(), "index written");

        Ok(())
    }

    fn write_to(&self, temp_path: &Path, header: &IndexHeader) -> Result<()> {
        let temp_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp_path)
            .io_context(|| format!("Unable to create index file {}", temp_path.display()))?;

        let mut writer = Checksum::new(BufWriter::new(temp_file), self.format, &self.path);
        writer.write(&header.serialize()?)?;
        for entry in &self.entries {
            writer.write(&entry.serialize()?)?;
        }
        writer.write_checksum()?;

        let temp_file = writer
            .into_inner()
            .into_inner()
            .map_err(|err| err.into_error())
            .io_context(|| format!("Unable to flush index file {}", temp_path.display()))?;
        temp_file
            .sync_all()
            .io_context(|| format!("Unable to sync index file {}", temp_path.display()))
    }

    fn parse_header<R: Read>(&self, reader: &mut Checksum<R>) -> Result<IndexHeader> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        reader.read_into(&mut header_bytes)?;
        let header = IndexHeader::parse(&header_bytes);

        if &header.marker != SIGNATURE {
            return Err(reader.corrupt("invalid index file signature"));
        }

        if !header.is_supported_version() {
            return Err(reader.corrupt(format!(
                "unsupported index file version: {}",
                header.version
            )));
        }

        Ok(header)
    }

    /// Parse all entries from the index file
    ///
    /// Rejects files whose entries are out of order or repeat a `(path, stage)` pair.
    fn parse_entries<R: Read>(
        &self,
        header: &IndexHeader,
        file_len: u64,
        reader: &mut Checksum<R>,
    ) -> Result<Vec<IndexEntry>> {
        // every entry takes at least its fixed part plus one NUL
        let body_len = file_len.saturating_sub((HEADER_SIZE + self.format.raw_len()) as u64);
        let max_entries = body_len / (IndexEntry::fixed_size(self.format) as u64 + 1);
        if u64::from(header.entries_count) > max_entries {
            return Err(reader.corrupt(format!(
                "header declares {} entries but the file can hold at most {max_entries}",
                header.entries_count
            )));
        }

        let mut entries: Vec<IndexEntry> = Vec::with_capacity(header.entries_count as usize);

        for _ in 0..header.entries_count {
            let entry = IndexEntry::read_from(reader, self.format, header.version)?;

            if let Some(previous) = entries.last()
                && previous.key() >= entry.key()
            {
                return Err(reader.corrupt(format!(
                    "entry '{}' at stage {} is out of order",
                    entry.path, entry.stage
                )));
            }
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Skip the extensions between the last entry and the checksum
    ///
    /// Optional extensions (signature starting with an uppercase letter) are
    /// ignored; anything else cannot be understood and is rejected.
    fn skip_extensions<R: Read>(&self, file_len: u64, reader: &mut Checksum<R>) -> Result<()> {
        let trailer_start = file_len.saturating_sub(self.format.raw_len() as u64);

        while reader.position() + (EXTENSION_HEADER_SIZE as u64) <= trailer_start {
            let mut extension_header = [0u8; EXTENSION_HEADER_SIZE];
            reader.read_into(&mut extension_header)?;

            let signature = &extension_header[0..4];
            let size = byteorder::NetworkEndian::read_u32(&extension_header[4..8]) as u64;

            if !signature[0].is_ascii_uppercase() {
                return Err(reader.corrupt(format!(
                    "unsupported mandatory extension {}",
                    String::from_utf8_lossy(signature)
                )));
            }
            if reader.position() + size > trailer_start {
                return Err(reader.corrupt("extension runs past the checksum"));
            }

            trace!(extension = %String::from_utf8_lossy(signature), size, "skipping index extension");
            reader.read(size as usize)?;
        }

        Ok(())
    }

    /// Locate `(path, stage)`: `Ok` with its position, or `Err` with the insertion point
    fn position(&self, path: &str, stage: Stage) -> std::result::Result<usize, usize> {
        self.entries
            .binary_search_by(|entry| entry.key().cmp(&(path, stage)))
    }

    /// Reuse the staged ID of `path` when its stat data proves it unchanged
    ///
    /// Only trusted when the index was read from disk and the file was last
    /// modified strictly before the index was written; otherwise the file
    /// may have changed within the timestamp granularity and must be rehashed.
    fn cached_oid(&self, path: &str, stat: &EntryMetadata, database: &Database) -> Option<ObjectId> {
        let existing = self.get_by_path(path, Stage::Normal)?;
        let timestamp = self.timestamp?;

        if !existing.stat_match(stat) || !existing.times_match(stat) {
            return None;
        }
        if existing.metadata.mtime() >= timestamp {
            trace!(path, "racily clean entry, rehashing");
            return None;
        }
        if !database.exists(&existing.oid) {
            return None;
        }

        trace!(path, oid = %existing.oid, "stat data unchanged, reusing staged object");
        Some(existing.oid)
    }

    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        if entry.stage == Stage::Normal {
            // conflict stages of the same path are resolved by this entry
            if let Some(start) = self.find(&entry.path) {
                self.remove_range(start, |other| {
                    other.path == entry.path && other.stage.is_conflict()
                });
            }
        } else if let Ok(position) = self.position(&entry.path, Stage::Normal) {
            self.entries.remove(position);
        }

        for parent in entry.parent_dirs() {
            if let Some(start) = self.find(parent) {
                self.remove_range(start, |other| other.path == parent);
            }
        }

        let prefix = format!("{}/", entry.path);
        let start = self
            .entries
            .partition_point(|other| other.path.as_str() < prefix.as_str());
        self.remove_range(start, |other| other.path.starts_with(&prefix));
    }

    /// Remove the run of entries starting at `start` for which `belongs` holds
    fn remove_range<F: Fn(&IndexEntry) -> bool>(&mut self, start: usize, belongs: F) -> usize {
        let end = start
            + self.entries[start..]
                .iter()
                .take_while(|&entry| belongs(entry))
                .count();

        if end > start {
            self.entries.drain(start..end);
            self.changed = true;
        }

        end - start
    }
}

/// Check that `path` is a normalized repository-relative path
pub fn validate_path(path: &str) -> Result<()> {
    let invalid = |reason| {
        Err(Error::InvalidPath {
            path: path.to_string(),
            reason,
        })
    };

    if path.is_empty() {
        return invalid("empty path");
    }
    if path.contains('\0') {
        return invalid("contains a NUL byte");
    }
    if path.starts_with('/') || path.ends_with('/') {
        return invalid("leading or trailing slash");
    }

    for component in path.split('/') {
        match component {
            "" => return invalid("empty path component"),
            "." | ".." => return invalid("relative path component"),
            ".git" => return invalid("inside the .git directory"),
            _ => {}
        }
    }

    Ok(())
}
