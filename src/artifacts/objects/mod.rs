//! Git object types and operations
//!
//! Git stores all content as objects identified by a hash of their canonical
//! form, `<type> <size>\0<content>`. Only blobs are built by this crate, but
//! the type tag of every object kind is understood when reading headers.

pub mod blob;
pub mod object;
pub mod object_format;
pub mod object_id;
pub mod object_type;
