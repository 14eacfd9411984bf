//! A git-compatible content store
//!
//! The crate provides the two pieces git keeps under `.git`: a loose,
//! zlib-compressed, content-addressed object database and the staging index
//! that maps repository-relative paths to the objects that will be committed
//! next.
//!
//! - `areas`: stateful components (object database, index, workspace, repository)
//! - `artifacts`: value types and their on-disk codecs
//! - `commands`: operations composed by the repository context
//! - `errors`: the library error type

pub mod areas;
pub mod artifacts;
pub mod commands;
pub mod errors;
