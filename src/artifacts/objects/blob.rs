//! Git blob object
//!
//! Blobs store file content. They contain only the raw file data, without
//! any metadata like filename or permissions (those live in the index and
//! in trees), which is why two files with identical content always share
//! the same blob.
//!
//! ## Format
//!
//! On disk: `blob <size>\0<content>`

use crate::artifacts::objects::object::{Object, Packable, Unpackable, serialize_object};
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{IoContext, Result};
use bytes::Bytes;
use derive_new::new;
use std::io::BufRead;

/// Git blob object representing file content
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Blob {
    #[new(into)]
    content: Bytes,
}

impl Packable for Blob {
    fn serialize(&self) -> Result<Bytes> {
        serialize_object(self)
    }
}

impl Unpackable for Blob {
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        // the header has already been read
        let mut content = Vec::new();
        reader
            .read_to_end(&mut content)
            .io_context(|| String::from("Unable to read blob content"))?;

        Ok(Self::new(content))
    }
}

impl Object for Blob {
    fn object_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn content(&self) -> &[u8] {
        &self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::objects::object_format::ObjectFormat;
    use pretty_assertions::assert_eq;

    #[test]
    fn serializes_header_then_content() {
        let blob = Blob::new("new_file\n");

        assert_eq!(
            blob.serialize().unwrap(),
            Bytes::from_static(b"blob 9\0new_file\n")
        );
    }

    #[test]
    fn object_id_depends_only_on_content() {
        let blob = Blob::new("new_file\n");

        assert_eq!(
            blob.object_id(ObjectFormat::Sha1).unwrap().to_string(),
            "d4fa8600b4f37d7516bef4816ae2c64dbf029e3a"
        );
    }

    #[test]
    fn keeps_binary_content_intact() {
        let content: &[u8] = &[0, 159, 146, 150, 255];
        let blob = Blob::deserialize(content).unwrap();

        assert_eq!(blob.content(), content);
    }
}
