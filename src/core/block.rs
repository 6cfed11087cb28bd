//! Data blocks
//!
//! A block (the storage engine calls it an extent) is one contiguous region
//! of a data file. It starts with a fixed 176-byte header and holds a
//! doubly-linked chain of records. Blocks of one collection are themselves
//! chained through their headers.
//!
//! ```text
//! ┌───────┬──────────┬──────────┬──────────┬───────────┬────────┬──────────────┬─────────────┐
//! │ magic │ self     │ next     │ prev     │ reserved  │ length │ first record │ last record │
//! │ @0    │ @4       │ @12      │ @20      │ @28 (128) │ @156   │ @160         │ @168        │
//! └───────┴──────────┴──────────┴──────────┴───────────┴────────┴──────────────┴─────────────┘
//! ```
//!
//! The header is read eagerly; the rest of the block is loaded on first
//! use and kept for the lifetime of the `Block`.

use crate::error::{ReaderError, Result};
use crate::fs::FileSystem;
use crate::location::{read_i32, Location};
use crate::record::Record;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cell::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Block header magic
pub const MAGIC: [u8; 4] = *b"DCBA";

/// Size of the block header
pub const HEADER_SIZE: usize = 176;

const SELF_OFFSET: usize = 4;
const NEXT_OFFSET: usize = 12;
const PREV_OFFSET: usize = 20;
const LENGTH_OFFSET: usize = 156;
const FIRST_RECORD_OFFSET: usize = 160;
const LAST_RECORD_OFFSET: usize = 168;

/// One block of a collection
///
/// Field order is the transport layout: path, the five locations, length.
#[derive(Clone, Serialize, Deserialize)]
pub struct Block {
    path: PathBuf,
    location: Location,
    prev: Location,
    next: Location,
    first_record: Location,
    last_record: Location,
    length: i32,

    #[serde(skip)]
    cache: OnceCell<Bytes>,
}

impl Block {
    /// Read the block header at `location` of the data file `path`
    ///
    /// Fails if the magic number is wrong or the header does not name
    /// `location` as its own position.
    pub fn read(fs: &dyn FileSystem, path: &Path, location: Location) -> Result<Self> {
        debug!("Reading block header {} in {}", location, path.display());

        let offset =
            u64::try_from(location.offset).map_err(|_| ReaderError::InvalidLocation(location))?;
        let header = fs
            .read_range(path, offset, HEADER_SIZE)
            .map_err(|source| ReaderError::BlockRead {
                location,
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_header(path.to_path_buf(), location, &header)
    }

    /// Decode a block from header bytes read at `location`
    pub fn from_header(path: PathBuf, location: Location, header: &[u8]) -> Result<Self> {
        if location.offset < 0 {
            return Err(ReaderError::InvalidLocation(location));
        }
        if header.len() < HEADER_SIZE {
            return Err(ReaderError::Truncated {
                what: "block header",
                needed: HEADER_SIZE,
                available: header.len(),
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        if magic != MAGIC {
            return Err(ReaderError::InvalidMagic {
                location,
                found: magic,
            });
        }

        let found = Location::read(header, SELF_OFFSET)?;
        if found != location {
            return Err(ReaderError::LocationMismatch {
                expected: location,
                found,
            });
        }

        Ok(Block {
            path,
            location,
            next: Location::read(header, NEXT_OFFSET)?,
            prev: Location::read(header, PREV_OFFSET)?,
            length: read_i32(header, LENGTH_OFFSET)?,
            first_record: Location::read(header, FIRST_RECORD_OFFSET)?,
            last_record: Location::read(header, LAST_RECORD_OFFSET)?,
            cache: OnceCell::new(),
        })
    }

    /// Data file holding this block
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Byte offset of the block within its file
    pub fn offset(&self) -> i32 {
        self.location.offset
    }

    pub fn next(&self) -> Location {
        self.next
    }

    pub fn prev(&self) -> Location {
        self.prev
    }

    pub fn first_record_location(&self) -> Location {
        self.first_record
    }

    pub fn last_record_location(&self) -> Location {
        self.last_record
    }

    /// Declared size of the block in bytes, header included
    pub fn length(&self) -> i32 {
        self.length
    }

    /// Whether the header links to a following block
    ///
    /// File number 0 counts as "no next block" here, unlike the general
    /// null convention (negative file number) used by chain walking.
    pub fn has_next(&self) -> bool {
        self.next.file_number > 0
    }

    /// Whether the block buffer has been loaded
    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }

    /// The whole block, loaded on first call and cached afterwards
    pub fn buffer(&self, fs: &dyn FileSystem) -> Result<&Bytes> {
        if let Some(buffer) = self.cache.get() {
            return Ok(buffer);
        }

        self.check_location()?;
        if self.length < 0 {
            return Err(ReaderError::InvalidBlockLength {
                location: self.location,
                length: self.length,
            });
        }

        debug!(
            "Loading {} bytes of block {} from {}",
            self.length,
            self.location,
            self.path.display()
        );
        let bytes = fs
            .read_range(&self.path, self.location.offset as u64, self.length as usize)
            .map_err(|source| ReaderError::BlockRead {
                location: self.location,
                path: self.path.clone(),
                source,
            })?;

        Ok(self.cache.get_or_init(|| Bytes::from(bytes)))
    }

    /// First record of the chain, or `None` for an empty block
    pub fn first_record(&self, fs: &dyn FileSystem) -> Result<Option<Record>> {
        if self.first_record.file_number < 0 || self.first_record.offset < 0 {
            return Ok(None);
        }

        let offset = self.local_offset(self.first_record.offset)?;
        Record::new(self, fs, offset).map(Some)
    }

    /// Local offset of the record at absolute file offset `at`
    fn local_offset(&self, at: i32) -> Result<i32> {
        at.checked_sub(self.location.offset).ok_or(ReaderError::InvalidLocation(
            Location::new(self.location.file_number, at),
        ))
    }

    /// Lazy iterator over this block's records in link order
    pub fn records<'a>(&'a self, fs: &'a dyn FileSystem) -> Records<'a> {
        Records::new(Cow::Borrowed(self), fs)
    }

    /// Like [`Block::records`], taking ownership of the block
    pub fn into_records(self, fs: &dyn FileSystem) -> Records<'_> {
        Records::new(Cow::Owned(self), fs)
    }

    /// Encode for transport to a worker (the buffer is never included)
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let block: Block = bincode::deserialize(bytes)?;
        block.check_location()?;
        Ok(block)
    }

    /// Reject a self location no header could have been read from
    pub(crate) fn check_location(&self) -> Result<()> {
        if self.location.offset < 0 {
            return Err(ReaderError::InvalidLocation(self.location));
        }
        Ok(())
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.location == other.location
            && self.prev == other.prev
            && self.next == other.next
            && self.first_record == other.first_record
            && self.last_record == other.last_record
            && self.length == other.length
    }
}

impl Eq for Block {}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("path", &self.path)
            .field("location", &self.location)
            .field("prev", &self.prev)
            .field("next", &self.next)
            .field("first_record", &self.first_record)
            .field("last_record", &self.last_record)
            .field("length", &self.length)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "block {} next {} prev {} first record {}",
            self.location, self.next, self.prev, self.first_record
        )
    }
}

enum Cursor {
    Start,
    /// Absolute file offset of the next record; negative ends the chain
    Link(i32),
    Done,
}

/// Forward-only iterator over the records of one block
///
/// Yields `Err` at most once; iteration ends after the first failure.
pub struct Records<'a> {
    block: Cow<'a, Block>,
    fs: &'a dyn FileSystem,
    cursor: Cursor,
}

impl<'a> Records<'a> {
    fn new(block: Cow<'a, Block>, fs: &'a dyn FileSystem) -> Self {
        Records {
            block,
            fs,
            cursor: Cursor::Start,
        }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let step = match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Start => self.block.first_record(self.fs),
            Cursor::Link(next) if next >= 0 => self
                .block
                .local_offset(next)
                .and_then(|offset| Record::new(&self.block, self.fs, offset))
                .map(Some),
            Cursor::Link(_) | Cursor::Done => return None,
        };

        match step {
            Ok(Some(record)) => {
                self.cursor = Cursor::Link(record.next_offset());
                Some(Ok(record))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
