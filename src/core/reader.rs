//! Reading a work unit
//!
//! [`UnitReader`] is what a worker runs over its [`WorkUnit`]: the block's
//! records in link order, each turned into its `_id` string and decoded
//! document.

use crate::block::{Block, Records};
use crate::bson::Document;
use crate::error::Result;
use crate::fs::FileSystem;
use crate::split::WorkUnit;
use tracing::debug;

/// Lazy `(identifier, document)` iterator over one work unit
pub struct UnitReader<'a> {
    records: Records<'a>,
    records_read: u64,
    position: u64,
}

impl<'a> UnitReader<'a> {
    pub fn new(unit: WorkUnit, fs: &'a dyn FileSystem) -> Self {
        debug!("Reading work unit {}", unit.block());
        UnitReader {
            records: unit.into_block().into_records(fs),
            records_read: 0,
            position: 0,
        }
    }

    /// Number of records yielded so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Fraction of the block consumed, by the end of the last record read
    pub fn progress(&self) -> f32 {
        let length = self.records.block().length();
        if length <= 0 {
            return 1.0;
        }
        (self.position as f32 / length as f32).min(1.0)
    }

    pub fn block(&self) -> &Block {
        self.records.block()
    }
}

impl Iterator for UnitReader<'_> {
    type Item = Result<(String, Document)>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };

        self.records_read += 1;
        self.position = record.local_offset() as u64 + record.length().max(0) as u64;

        let item = record
            .identifier()
            .and_then(|id| record.into_payload().map(|doc| (id, doc)));
        Some(item)
    }
}
