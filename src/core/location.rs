//! File-relative addresses
//!
//! Blocks and records form doubly-linked lists on disk. Links are not
//! pointers but `(file number, byte offset)` pairs into the collection's
//! numbered data files. A negative file number marks the end of a chain.

use crate::error::{ReaderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of an encoded location in bytes
pub const LOCATION_SIZE: usize = 8;

/// A position inside a collection's file set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Number of the data file (`db.0`, `db.1`, ...)
    pub file_number: i32,

    /// Byte offset within that file
    pub offset: i32,
}

impl Location {
    /// The "no location" sentinel written at chain ends
    pub const NULL: Location = Location {
        file_number: -1,
        offset: 0,
    };

    pub const fn new(file_number: i32, offset: i32) -> Self {
        Location {
            file_number,
            offset,
        }
    }

    /// Whether this is the absent sentinel
    pub fn is_null(&self) -> bool {
        self.file_number < 0
    }

    /// Decode a location from `bytes` at `at` (file number first, then offset)
    pub fn read(bytes: &[u8], at: usize) -> Result<Self> {
        Ok(Location {
            file_number: read_i32(bytes, at)?,
            offset: read_i32(bytes, at + 4)?,
        })
    }

    /// Encode in the on-disk layout
    pub fn to_bytes(&self) -> [u8; LOCATION_SIZE] {
        let mut bytes = [0u8; LOCATION_SIZE];
        bytes[0..4].copy_from_slice(&self.file_number.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.offset.to_le_bytes());
        bytes
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Location {} {}}}", self.file_number, self.offset)
    }
}

/// Read a little-endian `i32` at `at`
///
/// Every integer in the data files is stored this way, assembled one byte
/// at a time regardless of host byte order.
pub fn read_i32(bytes: &[u8], at: usize) -> Result<i32> {
    let end = at.checked_add(4).ok_or(ReaderError::Truncated {
        what: "integer",
        needed: usize::MAX,
        available: bytes.len(),
    })?;

    if end > bytes.len() {
        return Err(ReaderError::Truncated {
            what: "integer",
            needed: end,
            available: bytes.len(),
        });
    }

    Ok(i32::from_le_bytes([
        bytes[at],
        bytes[at + 1],
        bytes[at + 2],
        bytes[at + 3],
    ]))
}
