//! Git object identifier
//!
//! Object IDs are the raw digest of an object's canonical form, rendered as
//! lowercase hex for humans and file names. They uniquely identify every
//! object in the database.
//!
//! ## Format
//!
//! - SHA-1: 20 bytes, 40 hex characters
//! - SHA-256: 32 bytes, 64 hex characters
//! - Short: first 7 hex characters
//!
//! ## Storage
//!
//! Objects are stored in `.git/objects/<first-2-chars>/<remaining-chars>`

use crate::artifacts::objects::object_format::{MAX_RAW_LENGTH, ObjectFormat};
use crate::errors::{Error, Result};
use std::io;
use std::path::PathBuf;

/// Git object identifier
///
/// A fixed-size value type; equality is byte-wise comparison of the digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    format: ObjectFormat,
    bytes: [u8; MAX_RAW_LENGTH],
}

impl ObjectId {
    /// Build an object ID from a raw digest
    ///
    /// `raw` must be exactly `format.raw_len()` bytes long; hashers guarantee it.
    pub(crate) fn from_raw(format: ObjectFormat, raw: &[u8]) -> Self {
        let mut bytes = [0u8; MAX_RAW_LENGTH];
        bytes[..format.raw_len()].copy_from_slice(raw);

        ObjectId { format, bytes }
    }

    /// Parse and validate an object ID from its hex form
    ///
    /// The object format is inferred from the length (40 or 64 characters).
    pub fn try_parse(id: &str) -> Result<Self> {
        let format = ObjectFormat::from_hex_len(id.len())
            .ok_or_else(|| Error::InvalidObjectId(id.to_string()))?;

        let mut bytes = [0u8; MAX_RAW_LENGTH];
        hex::decode_to_slice(id, &mut bytes[..format.raw_len()])
            .map_err(|_| Error::InvalidObjectId(id.to_string()))?;

        Ok(ObjectId { format, bytes })
    }

    pub fn format(&self) -> ObjectFormat {
        self.format
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.format.raw_len()]
    }

    /// Write the object ID in binary form
    ///
    /// Used by the index codec, which stores digests raw.
    pub fn write_raw_to<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.as_bytes())
    }

    /// Read an object ID of the given format from its binary form
    pub fn read_raw_from<R: io::Read + ?Sized>(
        format: ObjectFormat,
        reader: &mut R,
    ) -> io::Result<Self> {
        let mut bytes = [0u8; MAX_RAW_LENGTH];
        reader.read_exact(&mut bytes[..format.raw_len()])?;

        Ok(ObjectId { format, bytes })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Convert to file system path for object storage
    ///
    /// Splits the hash as `XX/YYYYYY...` where XX is the first byte in hex.
    /// For example, `d4fa86...` becomes `d4/fa86...`
    pub fn to_path(&self) -> PathBuf {
        let hex = self.to_hex();
        let (dir, file) = hex.split_at(2);
        PathBuf::from(dir).join(file)
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({}:{})", self.format, self.to_hex())
    }
}

impl std::str::FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::try_parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::path::Path;

    const NEW_FILE_OID: &str = "d4fa8600b4f37d7516bef4816ae2c64dbf029e3a";

    #[test]
    fn fans_out_into_two_level_path() {
        let oid = ObjectId::try_parse(NEW_FILE_OID).unwrap();

        assert_eq!(
            oid.to_path(),
            Path::new("d4").join("fa8600b4f37d7516bef4816ae2c64dbf029e3a")
        );
    }

    #[test]
    fn parses_uppercase_hex_and_renders_lowercase() {
        let oid = ObjectId::try_parse(&NEW_FILE_OID.to_uppercase()).unwrap();

        assert_eq!(oid.to_string(), NEW_FILE_OID);
        assert_eq!(oid.format(), ObjectFormat::Sha1);
        assert_eq!(oid.as_bytes().len(), 20);
    }

    #[rstest]
    #[case("d4fa86")]
    #[case("")]
    #[case("z4fa8600b4f37d7516bef4816ae2c64dbf029e3a")]
    fn rejects_malformed_ids(#[case] id: &str) {
        assert!(matches!(
            ObjectId::try_parse(id),
            Err(Error::InvalidObjectId(_))
        ));
    }

    #[test]
    fn raw_form_survives_a_trip_through_a_buffer() {
        let oid = ObjectId::try_parse(NEW_FILE_OID).unwrap();
        let mut buffer = Vec::new();
        oid.write_raw_to(&mut buffer).unwrap();

        let read_back =
            ObjectId::read_raw_from(ObjectFormat::Sha1, &mut buffer.as_slice()).unwrap();

        assert_eq!(read_back, oid);
    }
}
