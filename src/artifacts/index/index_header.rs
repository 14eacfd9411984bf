use crate::artifacts::index::{EXTENDED_VERSION, HEADER_SIZE, SIGNATURE, VERSION};
use crate::artifacts::objects::object::Packable;
use crate::errors::{Error, Result};
use byteorder::{ByteOrder, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexHeader {
    pub(crate) marker: [u8; 4],
    pub(crate) version: u32,
    pub(crate) entries_count: u32,
}

impl IndexHeader {
    pub(crate) fn empty() -> Self {
        IndexHeader {
            marker: *SIGNATURE,
            version: VERSION,
            entries_count: 0,
        }
    }

    pub(crate) fn is_supported_version(&self) -> bool {
        self.version == VERSION || self.version == EXTENDED_VERSION
    }

    /// Parse the fixed-size header
    ///
    /// Signature and version are returned as read; callers validate them.
    pub(crate) fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut marker = [0u8; 4];
        marker.copy_from_slice(&bytes[0..4]);

        IndexHeader {
            marker,
            version: byteorder::NetworkEndian::read_u32(&bytes[4..8]),
            entries_count: byteorder::NetworkEndian::read_u32(&bytes[8..12]),
        }
    }
}

impl Packable for IndexHeader {
    fn serialize(&self) -> Result<Bytes> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.write_all(&self.marker).map_err(Error::encoding)?;
        bytes
            .write_u32::<byteorder::NetworkEndian>(self.version)
            .map_err(Error::encoding)?;
        bytes
            .write_u32::<byteorder::NetworkEndian>(self.entries_count)
            .map_err(Error::encoding)?;

        Ok(Bytes::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_is_big_endian() {
        let header = IndexHeader::new(*SIGNATURE, 2, 1);

        assert_eq!(
            header.serialize().unwrap().as_ref(),
            b"DIRC\x00\x00\x00\x02\x00\x00\x00\x01"
        );
    }

    #[test]
    fn parses_what_it_serializes() {
        let header = IndexHeader::new(*SIGNATURE, 3, 42);
        let bytes: [u8; HEADER_SIZE] = header.serialize().unwrap().as_ref().try_into().unwrap();

        assert_eq!(IndexHeader::parse(&bytes), header);
    }
}
