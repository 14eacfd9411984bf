//! Git index file format
//!
//! The index (also called staging area or cache) stores the set of paths and
//! blob IDs destined for the next commit, together with cached `stat` data.
//!
//! ## File Format (Version 2 and 3)
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "DIRC" (4 bytes)
//!   - Version: 2 or 3 (4 bytes)
//!   - Entry count (4 bytes)
//!
//! Entries (variable length):
//!   - Sorted by (path, stage)
//!   - Each entry padded with 1-8 NUL bytes to 8-byte alignment
//!
//! Extensions (optional, skipped when read)
//!
//! Checksum (20 or 32 bytes):
//!   - Hash of all preceding bytes, in the repository's object format
//! ```

pub mod checksum;
pub mod entry_flags;
pub mod entry_mode;
pub mod index_entry;
pub mod index_header;
pub mod stage;

/// Size of index header in bytes
pub const HEADER_SIZE: usize = 12; // 4 bytes for marker, 4 for version, 4 for entries_count

/// Magic signature identifying index files
pub const SIGNATURE: &[u8; 4] = b"DIRC";

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Index file format versions understood by the reader
pub const VERSION: u32 = 2;
pub const EXTENDED_VERSION: u32 = 3;

/// Size of an extension header: 4-byte signature and 4-byte length
pub const EXTENSION_HEADER_SIZE: usize = 8;
