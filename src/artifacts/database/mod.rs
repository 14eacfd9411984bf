//! Database object framing
//!
//! Types used when reading objects back from the database: the
//! `<type> <size>\0` header that prefixes every object and the decoded
//! object itself.

pub mod object_header;
pub mod raw_object;
