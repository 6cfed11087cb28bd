//! Shared fixture builder: lays out a catalog and data files byte by byte

#![allow(dead_code)]

use extent_reader::{Document, Location, MemoryFileSystem};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const BLOCK_HEADER_SIZE: usize = 176;
pub const SLOT_SIZE: usize = 628;
pub const PAYLOAD_OFFSET: usize = 16;

/// Document with the given `_id` and a little filler
pub fn doc(id: &str) -> Document {
    Document::new()
        .with("_id", id)
        .with("name", format!("document {}", id))
        .with("tags", vec!["a", "b"])
}

pub fn docs(ids: &[&str]) -> Vec<Document> {
    ids.iter().map(|id| doc(id)).collect()
}

/// One block to lay out
#[derive(Debug, Clone)]
pub struct BlockSpec {
    pub location: Location,
    pub docs: Vec<Document>,
    /// Store records in reverse physical order; link order is unchanged
    pub reversed: bool,
}

impl BlockSpec {
    pub fn new(location: Location, docs: Vec<Document>) -> Self {
        BlockSpec {
            location,
            docs,
            reversed: false,
        }
    }

    pub fn physically_reversed(mut self) -> Self {
        self.reversed = true;
        self
    }
}

/// Encode one block: header plus records, linked in `docs` order
pub fn encode_block(spec: &BlockSpec, prev: Location, next: Location) -> Vec<u8> {
    let base = spec.location.offset;
    let payloads: Vec<Vec<u8>> = spec.docs.iter().map(Document::to_bytes).collect();

    let mut physical: Vec<usize> = (0..payloads.len()).collect();
    if spec.reversed {
        physical.reverse();
    }

    let mut local = vec![0usize; payloads.len()];
    let mut cursor = BLOCK_HEADER_SIZE;
    for &index in &physical {
        local[index] = cursor;
        cursor += PAYLOAD_OFFSET + payloads[index].len();
    }
    let length = cursor;

    let record_location = |index: usize| Location::new(spec.location.file_number, base + local[index] as i32);
    let (first, last) = if payloads.is_empty() {
        (Location::NULL, Location::NULL)
    } else {
        (record_location(0), record_location(payloads.len() - 1))
    };

    let mut bytes = vec![0u8; length];
    bytes[0..4].copy_from_slice(b"DCBA");
    bytes[4..12].copy_from_slice(&spec.location.to_bytes());
    bytes[12..20].copy_from_slice(&next.to_bytes());
    bytes[20..28].copy_from_slice(&prev.to_bytes());
    bytes[156..160].copy_from_slice(&(length as i32).to_le_bytes());
    bytes[160..168].copy_from_slice(&first.to_bytes());
    bytes[168..176].copy_from_slice(&last.to_bytes());

    for (index, payload) in payloads.iter().enumerate() {
        let at = local[index];
        let next_record = if index + 1 < payloads.len() {
            base + local[index + 1] as i32
        } else {
            -1
        };
        let prev_record = if index > 0 {
            base + local[index - 1] as i32
        } else {
            -1
        };

        bytes[at..at + 4].copy_from_slice(&((PAYLOAD_OFFSET + payload.len()) as i32).to_le_bytes());
        bytes[at + 4..at + 8].copy_from_slice(&base.to_le_bytes());
        bytes[at + 8..at + 12].copy_from_slice(&next_record.to_le_bytes());
        bytes[at + 12..at + 16].copy_from_slice(&prev_record.to_le_bytes());
        bytes[at + PAYLOAD_OFFSET..at + PAYLOAD_OFFSET + payload.len()].copy_from_slice(payload);
    }

    bytes
}

/// One catalog slot
pub fn encode_slot(hash: i32, name: &str, first: Location, last: Location) -> Vec<u8> {
    let mut bytes = vec![0u8; SLOT_SIZE];
    bytes[0..4].copy_from_slice(&hash.to_le_bytes());
    bytes[4..4 + name.len()].copy_from_slice(name.as_bytes());
    bytes[132..140].copy_from_slice(&first.to_bytes());
    bytes[140..148].copy_from_slice(&last.to_bytes());
    bytes
}

/// A database: its catalog and numbered data files
#[derive(Debug, Clone)]
pub struct Fixture {
    database: String,
    catalog: Vec<u8>,
    files: BTreeMap<i32, Vec<u8>>,
}

impl Fixture {
    pub fn new(database: &str) -> Self {
        Fixture {
            database: database.to_string(),
            catalog: Vec::new(),
            files: BTreeMap::new(),
        }
    }

    /// Add a collection whose blocks are chained in the given order
    pub fn collection(mut self, name: &str, blocks: Vec<BlockSpec>) -> Self {
        for (index, spec) in blocks.iter().enumerate() {
            let prev = if index > 0 {
                blocks[index - 1].location
            } else {
                Location::NULL
            };
            let next = blocks
                .get(index + 1)
                .map(|b| b.location)
                .unwrap_or(Location::NULL);

            let bytes = encode_block(spec, prev, next);
            self.write(spec.location.file_number, spec.location.offset as usize, &bytes);
        }

        let first = blocks.first().map(|b| b.location).unwrap_or(Location::NULL);
        let last = blocks.last().map(|b| b.location).unwrap_or(Location::NULL);
        let qualified = format!("{}.{}", self.database, name);
        self.slot(&qualified, first, last)
    }

    /// Add a raw catalog slot
    pub fn slot(mut self, name: &str, first: Location, last: Location) -> Self {
        let hash = (self.catalog.len() / SLOT_SIZE) as i32 + 1;
        self.catalog.extend(encode_slot(hash, name, first, last));
        self
    }

    pub fn empty_slot(mut self) -> Self {
        self.catalog.extend(vec![0u8; SLOT_SIZE]);
        self
    }

    /// Overwrite bytes of a data file
    pub fn write(&mut self, file_number: i32, offset: usize, bytes: &[u8]) {
        let file = self.files.entry(file_number).or_default();
        if file.len() < offset + bytes.len() {
            file.resize(offset + bytes.len(), 0);
        }
        file[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Cut a data file down to `len` bytes
    pub fn truncate(&mut self, file_number: i32, len: usize) {
        if let Some(file) = self.files.get_mut(&file_number) {
            file.truncate(len);
        }
    }

    pub fn catalog(&self) -> &[u8] {
        &self.catalog
    }

    pub fn file(&self, file_number: i32) -> Option<&[u8]> {
        self.files.get(&file_number).map(Vec::as_slice)
    }

    pub fn catalog_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.ns", self.database))
    }

    /// Write the catalog and data files into `dir`
    pub fn write_to(&self, dir: &Path) {
        std::fs::write(self.catalog_path(dir), &self.catalog).unwrap();
        for (n, bytes) in &self.files {
            std::fs::write(dir.join(format!("{}.{}", self.database, n)), bytes).unwrap();
        }
    }

    /// Load the catalog and data files into a memory filesystem under `dir`
    pub fn memory_fs(&self, dir: &Path) -> MemoryFileSystem {
        let fs = MemoryFileSystem::new();
        fs.insert(self.catalog_path(dir), self.catalog.clone());
        for (n, bytes) in &self.files {
            fs.insert(dir.join(format!("{}.{}", self.database, n)), bytes.clone());
        }
        fs
    }
}

/// The two-block collection used across tests: r0..r2 then r3
pub fn two_block_fixture() -> Fixture {
    Fixture::new("test").collection(
        "users",
        vec![
            BlockSpec::new(Location::new(0, 8192), docs(&["r0", "r1", "r2"])),
            BlockSpec::new(Location::new(1, 4096), docs(&["r3"])),
        ],
    )
}
