//! A collection's block chain
//!
//! A collection is known only by the two ends of its block chain, taken
//! from the catalog. Blocks are rebuilt from their locations on demand and
//! never held as a linked object graph.

use crate::block::{Block, Records};
use crate::catalog::CatalogEntry;
use crate::error::{ReaderError, Result};
use crate::fs::{FileSystem, ReadSeek};
use crate::location::Location;
use crate::record::Record;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One collection of a database
#[derive(Debug, Clone)]
pub struct Collection {
    fs: Arc<dyn FileSystem>,
    directory: PathBuf,
    name: String,
    first_block: Location,
    last_block: Location,
}

impl Collection {
    pub fn new(fs: Arc<dyn FileSystem>, directory: impl Into<PathBuf>, entry: &CatalogEntry) -> Self {
        Collection {
            fs,
            directory: directory.into(),
            name: entry.name.clone(),
            first_block: entry.first_block,
            last_block: entry.last_block,
        }
    }

    /// Fully qualified name (`database.collection`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Database part of the name, everything before the first `.`
    pub fn database_name(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }

    pub fn first_block_location(&self) -> Location {
        self.first_block
    }

    pub fn last_block_location(&self) -> Location {
        self.last_block
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.fs
    }

    /// Directory holding the data files
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Data file for `file_number`: `{directory}/{database}.{n}`
    pub fn path(&self, file_number: i32) -> PathBuf {
        self.directory
            .join(format!("{}.{}", self.database_name(), file_number))
    }

    /// Open the data file for `file_number`
    pub fn stream(&self, file_number: i32) -> Result<Box<dyn ReadSeek>> {
        Ok(self.fs.open(&self.path(file_number))?)
    }

    /// Block at `location`
    pub fn block(&self, location: Location) -> Result<Block> {
        if location.file_number < 0 {
            return Err(ReaderError::InvalidLocation(location));
        }
        Block::read(self.fs.as_ref(), &self.path(location.file_number), location)
    }

    /// Head of the chain, or `None` for a collection without blocks
    pub fn first_block(&self) -> Result<Option<Block>> {
        if self.first_block.is_null() {
            return Ok(None);
        }
        self.block(self.first_block).map(Some)
    }

    /// Block following `current`, or `None` at the end of the chain
    pub fn next_block(&self, current: &Block) -> Result<Option<Block>> {
        let next = current.next();
        if next.is_null() {
            return Ok(None);
        }
        self.block(next).map(Some)
    }

    /// Lazy iterator over the block chain
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            collection: self,
            cursor: BlockCursor::Start,
        }
    }

    /// Lazy iterator over every record of every block, in chain order
    pub fn records(&self) -> CollectionRecords<'_> {
        CollectionRecords {
            fs: self.fs.as_ref(),
            blocks: self.blocks(),
            current: None,
        }
    }
}

enum BlockCursor {
    Start,
    Next(Location),
    Done,
}

/// Forward-only iterator over a collection's blocks
///
/// Ends after the first `Err`.
pub struct Blocks<'a> {
    collection: &'a Collection,
    cursor: BlockCursor,
}

impl Iterator for Blocks<'_> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let step = match std::mem::replace(&mut self.cursor, BlockCursor::Done) {
            BlockCursor::Start => self.collection.first_block(),
            BlockCursor::Next(location) => self.collection.block(location).map(Some),
            BlockCursor::Done => return None,
        };

        match step {
            Ok(Some(block)) => {
                debug!("Found {} in {}", block, block.path().display());
                if !block.next().is_null() {
                    self.cursor = BlockCursor::Next(block.next());
                }
                Some(Ok(block))
            }
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Records of all blocks, moving to the next block only once the current
/// block's chain is exhausted
pub struct CollectionRecords<'a> {
    fs: &'a dyn FileSystem,
    blocks: Blocks<'a>,
    current: Option<Records<'a>>,
}

impl CollectionRecords<'_> {
    /// Block currently being read
    pub fn current_block(&self) -> Option<&Block> {
        self.current.as_ref().map(Records::block)
    }
}

impl Iterator for CollectionRecords<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(records) = self.current.as_mut() {
                match records.next() {
                    Some(Err(e)) => {
                        self.blocks.cursor = BlockCursor::Done;
                        self.current = None;
                        return Some(Err(e));
                    }
                    Some(item) => return Some(item),
                    None => {}
                }
            }

            match self.blocks.next()? {
                Ok(block) => self.current = Some(block.into_records(self.fs)),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
