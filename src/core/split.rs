//! Work units
//!
//! A [`WorkUnit`] is one block plus the hosts that store its bytes. Units
//! are planned on one coordinating thread, serialized, and shipped to
//! independent workers which rebuild the block and read its records.

use crate::block::{Block, Records};
use crate::error::Result;
use crate::fs::FileSystem;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One unit of parallel, locality-aware work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    block: Block,
    hosts: Vec<String>,
}

impl WorkUnit {
    /// Resolve the hosts backing `block`
    ///
    /// Hosts are collected from every physical range overlapping the block,
    /// in the order reported. A host holding several ranges appears once
    /// per range.
    pub fn new(block: Block, fs: &dyn FileSystem) -> Result<Self> {
        let offset = block.offset().max(0) as u64;
        let len = block.length().max(0) as u64;

        let hosts: Vec<String> = fs
            .block_locations(block.path(), offset, len)?
            .into_iter()
            .flat_map(|location| location.hosts)
            .collect();

        debug!(
            "Work unit for {} at offset {} covers hosts {:?}",
            block.path().display(),
            offset,
            hosts
        );

        Ok(WorkUnit { block, hosts })
    }

    /// Build a unit from already-resolved parts
    pub fn from_parts(block: Block, hosts: Vec<String>) -> Self {
        WorkUnit { block, hosts }
    }

    /// Bytes of data in the unit
    pub fn size(&self) -> u64 {
        self.block.length().max(0) as u64
    }

    pub fn preferred_hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn into_block(self) -> Block {
        self.block
    }

    /// Records of the unit's block
    pub fn records<'a>(&'a self, fs: &'a dyn FileSystem) -> Records<'a> {
        self.block.records(fs)
    }

    /// Encode for transport: the block, then the host list
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let unit: WorkUnit = bincode::deserialize(bytes)?;
        unit.block.check_location()?;
        Ok(unit)
    }
}
