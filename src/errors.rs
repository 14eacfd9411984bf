//! Error types shared by the object database and the index
//!
//! Every fallible operation in the library returns [`Result`]. I/O failures
//! carry the path they happened on so callers can report it and decide
//! whether to abort or skip.

use crate::artifacts::index::stage::Stage;
use crate::artifacts::objects::object_id::ObjectId;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("no object matches '{0}'")]
    UnknownObject(String),

    #[error("short object ID {prefix} is ambiguous ({count} candidates)")]
    AmbiguousObjectId { prefix: String, count: usize },

    #[error("no index entry for '{path}' at stage {stage}")]
    EntryNotFound { path: String, stage: Stage },

    #[error("file '{0}' not found")]
    FileNotFound(PathBuf),

    #[error("'{0}' is not a regular file or symlink")]
    NotAFile(PathBuf),

    #[error("position {position} out of range for index with {count} entries")]
    OutOfRange { position: usize, count: usize },

    #[error("corrupt object {oid}: {reason}")]
    CorruptObject { oid: ObjectId, reason: String },

    #[error("corrupt index {}: {reason}", .path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("unable to encode content: {source}")]
    Encoding {
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("invalid stage {0}, expected 0..=3")]
    InvalidStage(u32),

    #[error("invalid object ID '{0}'")]
    InvalidObjectId(String),

    #[error("invalid object type '{0}'")]
    InvalidObjectType(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn encoding(source: std::io::Error) -> Self {
        Error::Encoding { source }
    }
}

/// Attach a description of what was being attempted to a raw I/O error.
pub trait IoContext<T> {
    fn io_context<F: FnOnce() -> String>(self, context: F) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F: FnOnce() -> String>(self, context: F) -> Result<T> {
        self.map_err(|source| Error::Io {
            context: context(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_context_keeps_the_failing_path() {
        let result: std::io::Result<()> = Err(std::io::Error::other("disk on fire"));
        let err = result
            .io_context(|| String::from("Unable to read object file objects/d4/fa86"))
            .unwrap_err();

        pretty_assertions::assert_eq!(
            err.to_string(),
            "Unable to read object file objects/d4/fa86: disk on fire"
        );
    }

    #[test]
    fn entry_not_found_names_path_and_stage() {
        let err = Error::EntryNotFound {
            path: String::from("lame.name.txt"),
            stage: Stage::Normal,
        };

        pretty_assertions::assert_eq!(
            err.to_string(),
            "no index entry for 'lame.name.txt' at stage 0"
        );
    }
}
