//! Plumbing commands (low-level operations)
//!
//! ## Commands
//!
//! - `hash-object`: Compute object ID and optionally store in database
//! - `cat-file`: Print an object's content, type or size
//! - `ls-files`: List the entries of the index

pub mod cat_file;
pub mod hash_object;
pub mod ls_files;
