use crate::artifacts::objects::object::{Object, Packable, serialize_object};
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::Result;
use bytes::Bytes;
use derive_new::new;

/// An object of any type, header stripped
///
/// This is what the database hands back on read, and what it builds when
/// asked to write raw content under a given type tag.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct RawObject {
    pub object_type: ObjectType,
    #[new(into)]
    pub content: Bytes,
}

impl Packable for RawObject {
    fn serialize(&self) -> Result<Bytes> {
        serialize_object(self)
    }
}

impl Object for RawObject {
    fn object_type(&self) -> ObjectType {
        self.object_type
    }

    fn content(&self) -> &[u8] {
        &self.content
    }
}
