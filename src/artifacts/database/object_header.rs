use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{Error, IoContext, Result};
use bytes::Bytes;
use derive_new::new;
use std::io::BufRead;

/// Upper bound on the header length, `"commit "` plus a 20-digit size and NUL
pub const MAX_HEADER_SIZE: usize = 32;

/// The `<type> <size>\0` prefix of a stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct ObjectHeader {
    pub object_type: ObjectType,
    pub size: u64,
}

impl Packable for ObjectHeader {
    fn serialize(&self) -> Result<Bytes> {
        Ok(Bytes::from(format!("{} {}\0", self.object_type, self.size)))
    }
}

impl Unpackable for ObjectHeader {
    /// Reads up to and including the NUL terminator, leaving the payload in `reader`
    fn deserialize(mut reader: impl BufRead) -> Result<Self> {
        let mut object_type = Vec::new();
        reader
            .read_until(b' ', &mut object_type)
            .io_context(|| String::from("Unable to read object type"))?;
        if object_type.pop() != Some(b' ') {
            return Err(Error::InvalidObjectType(
                String::from_utf8_lossy(&object_type).into_owned(),
            ));
        }
        let object_type = std::str::from_utf8(&object_type)
            .map_err(|_| Error::InvalidObjectType(String::from_utf8_lossy(&object_type).into()))?;
        let object_type = ObjectType::try_from(object_type)?;

        let mut size = Vec::new();
        reader
            .read_until(b'\0', &mut size)
            .io_context(|| String::from("Unable to read object size"))?;
        let size = match size.pop() {
            Some(b'\0') => std::str::from_utf8(&size).ok().and_then(|s| s.parse().ok()),
            _ => None,
        };
        let size = size.ok_or_else(|| {
            Error::InvalidObjectType(format!("{object_type} with malformed size"))
        })?;

        Ok(ObjectHeader { object_type, size })
    }
}
