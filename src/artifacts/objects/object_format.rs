//! Hash algorithms used to address objects
//!
//! Repositories use SHA-1 (20-byte IDs) unless they were created with the
//! newer SHA-256 object format (32-byte IDs). The same algorithm is used for
//! object IDs and for the trailing checksum of the index file.

use crate::artifacts::objects::object_id::ObjectId;
use sha1::Digest;
use std::str::FromStr;

/// Largest raw digest size of any supported format
pub const MAX_RAW_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ObjectFormat {
    #[default]
    Sha1,
    Sha256,
}

impl ObjectFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectFormat::Sha1 => "sha1",
            ObjectFormat::Sha256 => "sha256",
        }
    }

    /// Number of bytes in a raw digest
    pub fn raw_len(&self) -> usize {
        match self {
            ObjectFormat::Sha1 => 20,
            ObjectFormat::Sha256 => 32,
        }
    }

    /// Number of characters in a hex-rendered digest
    pub fn hex_len(&self) -> usize {
        self.raw_len() * 2
    }

    pub fn from_hex_len(len: usize) -> Option<Self> {
        match len {
            40 => Some(ObjectFormat::Sha1),
            64 => Some(ObjectFormat::Sha256),
            _ => None,
        }
    }

    pub fn hasher(&self) -> Hasher {
        match self {
            ObjectFormat::Sha1 => Hasher::Sha1(sha1::Sha1::new()),
            ObjectFormat::Sha256 => Hasher::Sha256(sha2::Sha256::new()),
        }
    }

    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }
}

impl FromStr for ObjectFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "sha1" => Ok(ObjectFormat::Sha1),
            "sha256" => Ok(ObjectFormat::Sha256),
            other => Err(format!("unknown object format '{other}'")),
        }
    }
}

impl std::fmt::Display for ObjectFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Incremental hasher for either object format
#[derive(Debug, Clone)]
pub enum Hasher {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
}

impl Hasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha1(hasher) => hasher.update(data),
            Hasher::Sha256(hasher) => hasher.update(data),
        }
    }

    pub fn finalize(self) -> ObjectId {
        match self {
            Hasher::Sha1(hasher) => ObjectId::from_raw(ObjectFormat::Sha1, &hasher.finalize()),
            Hasher::Sha256(hasher) => {
                ObjectId::from_raw(ObjectFormat::Sha256, &hasher.finalize())
            }
        }
    }
}
