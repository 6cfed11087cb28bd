//! Records inside a block
//!
//! ```text
//! ┌────────┬───────────────┬──────────────┬──────────────┬────────────────────────────┐
//! │ length │ extent offset │ next record  │ prev record  │ payload (own i32 length …) │
//! │ @0     │ @4            │ @8           │ @12          │ @16                        │
//! └────────┴───────────────┴──────────────┴──────────────┴────────────────────────────┘
//! ```
//!
//! Offsets in the header are absolute file offsets. The payload begins at
//! +16 with its own length prefix, so the fifth header integer doubles as
//! the payload length.

use crate::block::Block;
use crate::bson::Document;
use crate::error::{ReaderError, Result};
use crate::fs::FileSystem;
use crate::location::{read_i32, Location};
use bytes::Bytes;
use std::cell::OnceCell;
use std::fmt;

/// Bytes read for a record header, including the payload length prefix
pub const RECORD_HEADER_SIZE: usize = 20;

/// Offset of the payload from the start of the record
pub const PAYLOAD_OFFSET: usize = 16;

/// One stored document and its framing
///
/// A record shares its block's buffer and decodes its payload lazily.
#[derive(Clone)]
pub struct Record {
    buffer: Bytes,
    block: Location,
    offset: usize,

    length: i32,
    extent_offset: i32,
    next: i32,
    prev: i32,
    payload_length: i32,

    payload: OnceCell<Document>,
}

impl Record {
    /// Record at byte `offset` of `block`'s buffer
    ///
    /// Loads the block buffer if needed. Fails on a negative offset, a
    /// header running past the buffer, or a header naming another block.
    pub fn new(block: &Block, fs: &dyn FileSystem, offset: i32) -> Result<Self> {
        if offset < 0 {
            return Err(ReaderError::NegativeRecordOffset {
                offset,
                block: block.location(),
            });
        }

        let buffer = block.buffer(fs)?.clone();
        Self::parse(buffer, block.location(), offset as usize)
    }

    fn parse(buffer: Bytes, block: Location, offset: usize) -> Result<Self> {
        let end = offset + RECORD_HEADER_SIZE;
        if end > buffer.len() {
            return Err(ReaderError::CorruptRecord {
                block,
                record: block.offset as i64 + offset as i64,
                source: Box::new(ReaderError::Truncated {
                    what: "record header",
                    needed: end,
                    available: buffer.len(),
                }),
            });
        }

        let record = Record {
            length: read_i32(&buffer, offset)?,
            extent_offset: read_i32(&buffer, offset + 4)?,
            next: read_i32(&buffer, offset + 8)?,
            prev: read_i32(&buffer, offset + 12)?,
            payload_length: read_i32(&buffer, offset + 16)?,
            buffer,
            block,
            offset,
            payload: OnceCell::new(),
        };

        if record.extent_offset != block.offset {
            return Err(ReaderError::ExtentMismatch {
                block,
                found: record.extent_offset,
            });
        }

        Ok(record)
    }

    /// Offset of this record within its block
    pub fn local_offset(&self) -> usize {
        self.offset
    }

    /// Absolute offset of this record within its data file
    pub fn file_offset(&self) -> i64 {
        self.offset as i64 + self.extent_offset as i64
    }

    pub fn block_location(&self) -> Location {
        self.block
    }

    pub fn length(&self) -> i32 {
        self.length
    }

    pub fn extent_offset(&self) -> i32 {
        self.extent_offset
    }

    pub fn prev_offset(&self) -> i32 {
        self.prev
    }

    /// Absolute file offset of the next record, negative at chain end
    pub fn next_offset(&self) -> i32 {
        self.next
    }

    pub fn payload_length(&self) -> i32 {
        self.payload_length
    }

    pub fn has_next(&self) -> bool {
        self.next >= 0
    }

    /// The following record in the same block
    pub fn next_record(&self) -> Result<Option<Record>> {
        if !self.has_next() {
            return Ok(None);
        }

        let offset = self.next.checked_sub(self.extent_offset).ok_or(
            ReaderError::InvalidLocation(Location::new(self.block.file_number, self.next)),
        )?;
        if offset < 0 {
            return Err(ReaderError::NegativeRecordOffset {
                offset,
                block: self.block,
            });
        }

        Self::parse(self.buffer.clone(), self.block, offset as usize).map(Some)
    }

    /// Raw payload bytes
    pub fn payload_bytes(&self) -> Result<Bytes> {
        let start = self.offset + PAYLOAD_OFFSET;
        let len = usize::try_from(self.payload_length).map_err(|_| {
            self.corrupt(ReaderError::MalformedPayload(format!(
                "negative payload length {}",
                self.payload_length
            )))
        })?;

        let end = start + len;
        if end > self.buffer.len() {
            return Err(self.corrupt(ReaderError::Truncated {
                what: "record payload",
                needed: end,
                available: self.buffer.len(),
            }));
        }

        Ok(self.buffer.slice(start..end))
    }

    /// Decoded payload, decoded on first call and cached afterwards
    pub fn payload(&self) -> Result<&Document> {
        if let Some(doc) = self.payload.get() {
            return Ok(doc);
        }

        let doc = self.decode()?;
        Ok(self.payload.get_or_init(|| doc))
    }

    /// Decode the payload, consuming the record
    pub fn into_payload(mut self) -> Result<Document> {
        match self.payload.take() {
            Some(doc) => Ok(doc),
            None => self.decode(),
        }
    }

    fn decode(&self) -> Result<Document> {
        Document::from_bytes(&self.payload_bytes()?).map_err(|e| self.corrupt(e))
    }

    /// Attach this record's position to a decoding failure
    fn corrupt(&self, source: ReaderError) -> ReaderError {
        match source {
            ReaderError::CorruptRecord { .. } => source,
            source => ReaderError::CorruptRecord {
                block: self.block,
                record: self.file_offset(),
                source: Box::new(source),
            },
        }
    }

    /// String form of the payload's `_id`
    pub fn identifier(&self) -> Result<String> {
        self.payload()?
            .get("_id")
            .map(|id| id.to_string())
            .ok_or(ReaderError::MissingId)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("block", &self.block)
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("extent_offset", &self.extent_offset)
            .field("next", &self.next)
            .field("prev", &self.prev)
            .field("payload_length", &self.payload_length)
            .finish()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "record {} length {} next {} prev {} payload {} in block {}",
            self.file_offset(),
            self.length,
            self.next,
            self.prev,
            self.payload_length,
            self.block
        )
    }
}
