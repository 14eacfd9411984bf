//! Loose object database
//!
//! Objects are stored one per file under `objects/<xx>/<rest-of-hex>`,
//! compressed with zlib. The database is append-only: identical content
//! always maps to the same file, so writes are idempotent and nothing is
//! ever deleted here.

use crate::artifacts::database::object_header::{MAX_HEADER_SIZE, ObjectHeader};
use crate::artifacts::database::raw_object::RawObject;
use crate::artifacts::objects::object::{Object, Unpackable};
use crate::artifacts::objects::object_format::ObjectFormat;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, IoContext, Result};
use bytes::Bytes;
use fake::rand;
use std::io::{BufReader, Cursor, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Shortest prefix accepted when resolving abbreviated object IDs
pub const MIN_PREFIX_LENGTH: usize = 4;

#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
    format: ObjectFormat,
    compression: flate2::Compression,
}

impl Database {
    pub fn new(path: Box<Path>, format: ObjectFormat, compression: flate2::Compression) -> Self {
        Database {
            path,
            format,
            compression,
        }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ObjectFormat {
        self.format
    }

    /// Compute the ID `content` would be stored under, without storing it
    pub fn hash(&self, content: impl Into<Bytes>, object_type: ObjectType) -> Result<ObjectId> {
        RawObject::new(object_type, content).object_id(self.format)
    }

    /// Store raw content under the given type tag
    pub fn write(&self, content: impl Into<Bytes>, object_type: ObjectType) -> Result<ObjectId> {
        self.store(&RawObject::new(object_type, content))
    }

    /// Store an object unless it already exists, returning its ID either way
    pub fn store(&self, object: &impl Object) -> Result<ObjectId> {
        let object_content = object.serialize()?;
        let object_id = self.format.hash(&object_content);

        if self.exists(&object_id) {
            debug!(oid = %object_id, "object already stored");
            return Ok(object_id);
        }

        let object_path = self.path.join(object_path(&object_id));
        self.write_object(&object_path, object_content)?;
        debug!(oid = %object_id, object_type = %object.object_type(), "object written");

        Ok(object_id)
    }

    /// Whether an object file exists for `object_id`; never decompresses
    pub fn exists(&self, object_id: &ObjectId) -> bool {
        self.path.join(object_path(object_id)).is_file()
    }

    /// Read the payload of an object, verifying its ID
    pub fn read(&self, object_id: &ObjectId) -> Result<Bytes> {
        Ok(self.read_object(object_id)?.content)
    }

    /// Read and decode an object, verifying that its content hashes to `object_id`
    pub fn read_object(&self, object_id: &ObjectId) -> Result<RawObject> {
        let object_path = self.path.join(object_path(object_id));
        let compressed = std::fs::read(&object_path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Error::ObjectNotFound(*object_id),
            _ => Error::Io {
                context: format!("Unable to read object file {}", object_path.display()),
                source: err,
            },
        })?;

        let object_content = Self::decompress(&compressed).map_err(|err| Error::CorruptObject {
            oid: *object_id,
            reason: format!("unable to decompress object content: {err}"),
        })?;

        let actual_id = object_id.format().hash(&object_content);
        if actual_id != *object_id {
            return Err(Error::CorruptObject {
                oid: *object_id,
                reason: format!("content hashes to {actual_id}"),
            });
        }

        let mut object_reader = Cursor::new(object_content);
        let header = ObjectHeader::deserialize(&mut object_reader).map_err(|err| {
            Error::CorruptObject {
                oid: *object_id,
                reason: err.to_string(),
            }
        })?;
        let header_len = object_reader.position() as usize;
        let content = Bytes::from(object_reader.into_inner()).slice(header_len..);

        if content.len() as u64 != header.size {
            return Err(Error::CorruptObject {
                oid: *object_id,
                reason: format!(
                    "header declares {} bytes but payload has {}",
                    header.size,
                    content.len()
                ),
            });
        }

        Ok(RawObject::new(header.object_type, content))
    }

    /// Read only the type and size of an object
    ///
    /// Decompresses just enough of the file to parse the header; the content
    /// is not verified against the ID.
    pub fn read_header(&self, object_id: &ObjectId) -> Result<ObjectHeader> {
        let object_path = self.path.join(object_path(object_id));
        let file = std::fs::File::open(&object_path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => Error::ObjectNotFound(*object_id),
            _ => Error::Io {
                context: format!("Unable to open object file {}", object_path.display()),
                source: err,
            },
        })?;

        let decoder = flate2::read::ZlibDecoder::new(file).take(MAX_HEADER_SIZE as u64);
        ObjectHeader::deserialize(BufReader::new(decoder)).map_err(|err| Error::CorruptObject {
            oid: *object_id,
            reason: err.to_string(),
        })
    }

    fn write_object(&self, object_path: &Path, object_content: Bytes) -> Result<()> {
        let object_content = self.compress(&object_content)?;

        let object_dir = object_path.parent().ok_or_else(|| Error::InvalidPath {
            path: object_path.display().to_string(),
            reason: "object path has no parent directory",
        })?;
        std::fs::create_dir_all(object_dir).io_context(|| {
            format!("Unable to create object directory {}", object_dir.display())
        })?;

        let temp_object_path = object_dir.join(Self::generate_temp_name());
        let result = Self::write_temp_file(&temp_object_path, &object_content).and_then(|()| {
            // rename the temp file to the object file to make it atomic
            std::fs::rename(&temp_object_path, object_path).io_context(|| {
                format!("Unable to rename object file to {}", object_path.display())
            })
        });

        if result.is_err()
            && let Err(err) = std::fs::remove_file(&temp_object_path)
            && err.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %temp_object_path.display(), error = %err, "unable to remove temp object file");
        }

        result
    }

    fn write_temp_file(temp_object_path: &Path, object_content: &[u8]) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp_object_path)
            .io_context(|| {
                format!(
                    "Unable to open object file {}",
                    temp_object_path.display()
                )
            })?;

        file.write_all(object_content).io_context(|| {
            format!(
                "Unable to write object file {}",
                temp_object_path.display()
            )
        })?;

        // objects are immutable once written
        file.set_permissions(std::fs::Permissions::from_mode(0o444))
            .io_context(|| {
                format!(
                    "Unable to set permissions on object file {}",
                    temp_object_path.display()
                )
            })
    }

    fn compress(&self, data: &[u8]) -> Result<Bytes> {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), self.compression);
        encoder.write_all(data).map_err(Error::encoding)?;

        encoder
            .finish()
            .map(Bytes::from)
            .map_err(Error::encoding)
    }

    fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut decoder = flate2::read::ZlibDecoder::new(data);
        let mut decompressed_content = Vec::new();
        decoder.read_to_end(&mut decompressed_content)?;

        Ok(decompressed_content)
    }

    fn generate_temp_name() -> String {
        format!("tmp_obj_{}_{}", std::process::id(), rand::random::<u32>())
    }

    /// Find all objects whose ID starts with the given hex prefix.
    ///
    /// Used to resolve abbreviated IDs. For prefixes of 2+ characters only
    /// the matching fan-out directory is scanned; shorter prefixes scan them all.
    pub fn find_objects_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>> {
        if !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidObjectId(prefix.to_string()));
        }
        let prefix = prefix.to_ascii_lowercase();
        let mut matches = Vec::new();

        let dir_names: Vec<String> = if prefix.len() >= 2 {
            vec![prefix[..2].to_string()]
        } else {
            (0..=255u8).map(|i| format!("{i:02x}")).collect()
        };

        for dir_name in dir_names {
            let dir_path = self.path.join(&dir_name);
            if !dir_path.is_dir() {
                continue;
            }

            let entries = std::fs::read_dir(&dir_path).io_context(|| {
                format!("Unable to list object directory {}", dir_path.display())
            })?;
            for entry in entries {
                let entry = entry.io_context(|| {
                    format!("Unable to list object directory {}", dir_path.display())
                })?;
                let full_oid = format!("{dir_name}{}", entry.file_name().to_string_lossy());

                // temp files and foreign formats do not parse
                if full_oid.starts_with(&prefix)
                    && let Ok(oid) = ObjectId::try_parse(&full_oid)
                    && oid.format() == self.format
                {
                    matches.push(oid);
                }
            }
        }

        matches.sort();
        Ok(matches)
    }

    /// Resolve a full or abbreviated hex object ID to a stored object
    pub fn resolve_prefix(&self, prefix: &str) -> Result<ObjectId> {
        if prefix.len() == self.format.hex_len() {
            return ObjectId::try_parse(prefix);
        }

        if prefix.len() < MIN_PREFIX_LENGTH
            || prefix.len() > self.format.hex_len()
            || !prefix.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(Error::InvalidObjectId(prefix.to_string()));
        }

        let mut candidates = self.find_objects_by_prefix(prefix)?;
        match candidates.len() {
            0 => Err(Error::UnknownObject(prefix.to_string())),
            1 => Ok(candidates.remove(0)),
            count => Err(Error::AmbiguousObjectId {
                prefix: prefix.to_string(),
                count,
            }),
        }
    }
}

/// Path of the object file for `object_id`, relative to the objects directory
pub fn object_path(object_id: &ObjectId) -> PathBuf {
    object_id.to_path()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::{fixture, rstest};

    const NEW_FILE_OID: &str = "d4fa8600b4f37d7516bef4816ae2c64dbf029e3a";

    struct Store {
        // keeps the directory alive for the duration of the test
        _dir: TempDir,
        database: Database,
    }

    fn store_with(format: ObjectFormat) -> Store {
        let dir = TempDir::new().unwrap();
        let database = Database::new(
            dir.path().join("objects").into_boxed_path(),
            format,
            flate2::Compression::default(),
        );
        Store {
            _dir: dir,
            database,
        }
    }

    #[fixture]
    fn store() -> Store {
        store_with(ObjectFormat::Sha1)
    }

    fn make_writable(path: &Path) {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[rstest]
    fn writes_blob_under_fan_out_path(store: Store) {
        let oid = store.database.write("new_file\n", ObjectType::Blob).unwrap();

        assert_eq!(oid.to_string(), NEW_FILE_OID);
        assert!(
            store
                .database
                .objects_path()
                .join("d4")
                .join("fa8600b4f37d7516bef4816ae2c64dbf029e3a")
                .is_file()
        );
    }

    #[rstest]
    fn hash_does_not_write(store: Store) {
        let oid = store.database.hash("new_file\n", ObjectType::Blob).unwrap();

        assert_eq!(oid.to_string(), NEW_FILE_OID);
        assert!(!store.database.exists(&oid));
    }

    #[rstest]
    fn writing_twice_is_idempotent(store: Store) {
        let first = store.database.write("same", ObjectType::Blob).unwrap();
        let second = store.database.write("same", ObjectType::Blob).unwrap();

        assert_eq!(first, second);
        let dir = store.database.objects_path().join(&first.to_hex()[..2]);
        assert_eq!(std::fs::read_dir(dir).unwrap().count(), 1);
    }

    #[rstest]
    fn stored_objects_are_read_only(store: Store) {
        let oid = store.database.write("frozen", ObjectType::Blob).unwrap();
        let path = store.database.objects_path().join(object_path(&oid));

        let mode = std::fs::metadata(path).unwrap().permissions().mode();

        assert_eq!(mode & 0o777, 0o444);
    }

    #[rstest]
    fn reads_back_type_and_content(store: Store) {
        let oid = store.database.write("new_file\n", ObjectType::Blob).unwrap();

        let object = store.database.read_object(&oid).unwrap();

        assert_eq!(object.object_type, ObjectType::Blob);
        assert_eq!(object.content, Bytes::from_static(b"new_file\n"));
    }

    #[rstest]
    fn reads_header_without_full_content(store: Store) {
        let content = "x".repeat(100_000);
        let oid = store.database.write(content, ObjectType::Blob).unwrap();

        let header = store.database.read_header(&oid).unwrap();

        assert_eq!(header, ObjectHeader::new(ObjectType::Blob, 100_000));
    }

    #[rstest]
    fn missing_object_is_not_found(store: Store) {
        let oid = ObjectId::try_parse(NEW_FILE_OID).unwrap();

        assert!(matches!(
            store.database.read(&oid),
            Err(Error::ObjectNotFound(missing)) if missing == oid
        ));
        assert!(matches!(
            store.database.read_header(&oid),
            Err(Error::ObjectNotFound(_))
        ));
    }

    #[rstest]
    fn tampered_content_is_corrupt(store: Store) {
        let oid = store.database.write("new_file\n", ObjectType::Blob).unwrap();
        let path = store.database.objects_path().join(object_path(&oid));
        make_writable(&path);

        // valid zlib stream, wrong content
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"blob 9\0old_file\n").unwrap();
        std::fs::write(&path, encoder.finish().unwrap()).unwrap();

        assert!(matches!(
            store.database.read(&oid),
            Err(Error::CorruptObject { oid: corrupt, .. }) if corrupt == oid
        ));
    }

    #[rstest]
    fn garbage_bytes_are_corrupt(store: Store) {
        let oid = store.database.write("new_file\n", ObjectType::Blob).unwrap();
        let path = store.database.objects_path().join(object_path(&oid));
        make_writable(&path);

        std::fs::write(&path, b"definitely not zlib").unwrap();

        assert!(matches!(
            store.database.read(&oid),
            Err(Error::CorruptObject { .. })
        ));
    }

    #[test]
    fn sha256_store_uses_long_ids() {
        let store = store_with(ObjectFormat::Sha256);

        let oid = store.database.write("", ObjectType::Blob).unwrap();

        assert_eq!(
            oid.to_string(),
            "473a0f4c3be8a93681a267e3b1e9a7dcda1185436fe141f7749120a303721813"
        );
        assert_eq!(store.database.read(&oid).unwrap(), Bytes::new());
    }

    #[rstest]
    fn resolves_unique_prefix(store: Store) {
        let oid = store.database.write("new_file\n", ObjectType::Blob).unwrap();

        assert_eq!(store.database.resolve_prefix("d4fa86").unwrap(), oid);
        assert_eq!(store.database.resolve_prefix(NEW_FILE_OID).unwrap(), oid);
        assert!(matches!(
            store.database.resolve_prefix("d4f"),
            Err(Error::InvalidObjectId(_))
        ));
        assert!(matches!(
            store.database.resolve_prefix("0000"),
            Err(Error::UnknownObject(_))
        ));
    }

    #[rstest]
    fn non_hex_prefixes_are_rejected(store: Store) {
        assert!(matches!(
            store.database.find_objects_by_prefix("a\u{e9}11"),
            Err(Error::InvalidObjectId(_))
        ));
    }

    #[rstest]
    fn concurrent_writers_store_one_object(store: Store) {
        let database = &store.database;

        let oids: Vec<ObjectId> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| database.write("new_file\n", ObjectType::Blob).unwrap()))
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert!(oids.iter().all(|oid| oid.to_string() == NEW_FILE_OID));
        let fan_out_dir = database.objects_path().join("d4");
        let names: Vec<String> = std::fs::read_dir(fan_out_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![String::from(&NEW_FILE_OID[2..])]);
        assert_eq!(database.read(&oids[0]).unwrap(), "new_file\n");
    }

    proptest! {
        #[test]
        fn read_returns_what_write_stored(content in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let store = store_with(ObjectFormat::Sha1);

            let oid = store.database.write(content.clone(), ObjectType::Blob).unwrap();

            prop_assert_eq!(store.database.read(&oid).unwrap().to_vec(), content);
        }
    }
}
