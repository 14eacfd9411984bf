//! Git data structures
//!
//! - `database`: Object headers and raw objects read back from the database
//! - `index`: Index entries, header, flags and the checksummed file codec
//! - `objects`: Object identifiers, hash formats and the blob object

pub mod database;
pub mod index;
pub mod objects;
