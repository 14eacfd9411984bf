//! Checksummed stream over the index file
//!
//! Every byte read or written through [`Checksum`] is fed to the hasher so
//! the trailing digest can be produced on write and verified on read.

use crate::artifacts::objects::object_format::{Hasher, ObjectFormat};
use crate::errors::{Error, IoContext, Result};
use bytes::Bytes;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug)]
pub struct Checksum<S> {
    stream: S,
    hasher: Hasher,
    format: ObjectFormat,
    path: Box<Path>,
    position: u64,
}

impl<S> Checksum<S> {
    pub(crate) fn new(stream: S, format: ObjectFormat, path: &Path) -> Self {
        Checksum {
            stream,
            hasher: format.hasher(),
            format,
            path: path.into(),
            position: 0,
        }
    }

    /// Number of bytes hashed so far
    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn into_inner(self) -> S {
        self.stream
    }

    pub(crate) fn corrupt(&self, reason: impl Into<String>) -> Error {
        Error::CorruptIndex {
            path: self.path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl<S: Read> Checksum<S> {
    pub(crate) fn read(&mut self, size: usize) -> Result<Bytes> {
        let mut buffer = vec![0; size];
        self.read_into(&mut buffer)?;

        Ok(Bytes::from(buffer))
    }

    pub(crate) fn read_into(&mut self, buffer: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buffer).map_err(|err| match err.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                self.corrupt("unexpected end-of-file while reading index")
            }
            _ => Error::Io {
                context: format!("Unable to read index file {}", self.path.display()),
                source: err,
            },
        })?;

        self.hasher.update(buffer);
        self.position += buffer.len() as u64;
        Ok(())
    }

    /// Read the trailing digest and compare it with everything hashed so far
    pub(crate) fn verify(&mut self) -> Result<()> {
        let mut expected_checksum = vec![0u8; self.format.raw_len()];
        self.stream
            .read_exact(&mut expected_checksum)
            .map_err(|_| self.corrupt("missing trailing checksum"))?;

        let actual_checksum = self.hasher.clone().finalize();

        if expected_checksum != actual_checksum.as_bytes() {
            return Err(self.corrupt("checksum does not match value stored on disk"));
        }

        let mut trailing = [0u8; 1];
        let trailing_len = self.stream.read(&mut trailing).map_err(|err| Error::Io {
            context: format!("Unable to read index file {}", self.path.display()),
            source: err,
        })?;
        if trailing_len != 0 {
            return Err(self.corrupt("unexpected data after checksum"));
        }

        Ok(())
    }
}

impl<S: Write> Checksum<S> {
    pub(crate) fn write(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .io_context(|| format!("Unable to write index file {}", self.path.display()))?;

        self.hasher.update(data);
        self.position += data.len() as u64;
        Ok(())
    }

    pub(crate) fn write_checksum(&mut self) -> Result<()> {
        let checksum = self.hasher.clone().finalize();
        self.stream
            .write_all(checksum.as_bytes())
            .io_context(|| {
                format!(
                    "Failed to write checksum to index file {}",
                    self.path.display()
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Yields an I/O error on every read
    struct BrokenStream;

    impl Read for BrokenStream {
        fn read(&mut self, _buffer: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("device went away"))
        }
    }

    fn checksummed(format: ObjectFormat, payload: &[u8]) -> Vec<u8> {
        let mut writer = Checksum::new(Vec::new(), format, Path::new("index"));
        writer.write(payload).unwrap();
        writer.write_checksum().unwrap();
        writer.into_inner()
    }

    #[test]
    fn verifies_what_it_wrote() {
        let data = checksummed(ObjectFormat::Sha1, b"DIRC payload");
        let mut reader = Checksum::new(Cursor::new(data), ObjectFormat::Sha1, Path::new("index"));

        reader.read(12).unwrap();

        assert_eq!(reader.position(), 12);
        assert!(reader.verify().is_ok());
    }

    #[test]
    fn detects_flipped_bits() {
        let mut data = checksummed(ObjectFormat::Sha256, b"DIRC payload");
        data[3] ^= 0x01;
        let mut reader =
            Checksum::new(Cursor::new(data), ObjectFormat::Sha256, Path::new("index"));

        reader.read(12).unwrap();

        assert!(matches!(reader.verify(), Err(Error::CorruptIndex { .. })));
    }

    #[test]
    fn reports_truncation_as_corruption() {
        let mut reader = Checksum::new(
            Cursor::new(b"DIR".to_vec()),
            ObjectFormat::Sha1,
            Path::new("index"),
        );

        assert!(matches!(reader.read(12), Err(Error::CorruptIndex { .. })));
    }

    #[test]
    fn read_errors_after_the_trailer_are_reported() {
        let data = checksummed(ObjectFormat::Sha1, b"DIRC payload");
        let mut reader = Checksum::new(
            Cursor::new(data).chain(BrokenStream),
            ObjectFormat::Sha1,
            Path::new("index"),
        );

        reader.read(12).unwrap();

        assert!(matches!(reader.verify(), Err(Error::Io { .. })));
    }
}
