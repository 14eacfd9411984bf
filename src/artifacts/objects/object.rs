use crate::artifacts::database::object_header::ObjectHeader;
use crate::artifacts::objects::object_format::ObjectFormat;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::Result;
use bytes::{BufMut, Bytes, BytesMut};
use std::io::BufRead;

pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

pub trait Unpackable {
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

/// An object that can be stored in the database
///
/// `serialize` yields the canonical form: header followed by `content`.
pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    /// The payload without the header
    fn content(&self) -> &[u8];

    fn header(&self) -> ObjectHeader {
        ObjectHeader::new(self.object_type(), self.content().len() as u64)
    }

    fn object_id(&self, format: ObjectFormat) -> Result<ObjectId> {
        let content = self.serialize()?;
        Ok(format.hash(&content))
    }
}

/// Canonical form of an object: header followed by content
pub(crate) fn serialize_object(object: &impl Object) -> Result<Bytes> {
    let header = object.header().serialize()?;
    let content = object.content();

    let mut object_bytes = BytesMut::with_capacity(header.len() + content.len());
    object_bytes.put_slice(&header);
    object_bytes.put_slice(content);

    Ok(object_bytes.freeze())
}
