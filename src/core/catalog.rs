//! Collection catalog (`<db>.ns`)
//!
//! The catalog file is an open hash table dumped straight to disk: a run of
//! fixed 628-byte slots, each either empty (hash 0) or describing one
//! collection by its qualified name and the ends of its block chain.
//!
//! ```text
//! ┌────────┬──────────────────┬─────────────┬─────────────┬──────────┐
//! │ hash   │ name (128 bytes) │ first block │ last block  │ ...      │
//! │ @0     │ @4               │ @132        │ @140        │ to @628  │
//! └────────┴──────────────────┴─────────────┴─────────────┴──────────┘
//! ```

use crate::collection::Collection;
use crate::error::{ReaderError, Result};
use crate::fs::FileSystem;
use crate::location::{read_i32, Location};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Size of one catalog slot
pub const SLOT_SIZE: usize = 628;

/// Bytes reserved for a collection name
pub const NAME_SIZE: usize = 128;

const NAME_OFFSET: usize = 4;
const FIRST_BLOCK_OFFSET: usize = 132;
const LAST_BLOCK_OFFSET: usize = 140;

/// Chain endpoints of one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Fully qualified name (`database.collection`)
    pub name: String,
    pub first_block: Location,
    pub last_block: Location,
}

/// Parsed catalog: qualified collection name to chain endpoints
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    directory: PathBuf,
    entries: HashMap<String, CatalogEntry>,
}

impl Catalog {
    /// Parse raw catalog bytes
    ///
    /// Empty slots are skipped. A trailing partial slot is ignored. If a
    /// name appears twice the later slot wins.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut entries = HashMap::new();

        let remainder = bytes.len() % SLOT_SIZE;
        if remainder != 0 {
            warn!(
                "Catalog is not a whole number of slots, ignoring {} trailing bytes",
                remainder
            );
        }

        for slot in bytes.chunks_exact(SLOT_SIZE) {
            if read_i32(slot, 0)? == 0 {
                continue;
            }

            let name = decode_name(&slot[NAME_OFFSET..NAME_OFFSET + NAME_SIZE]);
            let entry = CatalogEntry {
                name: name.clone(),
                first_block: Location::read(slot, FIRST_BLOCK_OFFSET)?,
                last_block: Location::read(slot, LAST_BLOCK_OFFSET)?,
            };

            debug!(
                "Catalog entry {} first {} last {}",
                entry.name, entry.first_block, entry.last_block
            );
            entries.insert(name, entry);
        }

        Ok(Catalog {
            directory: PathBuf::new(),
            entries,
        })
    }

    /// Read and parse the catalog file at `path`
    ///
    /// Any failure to read the file is reported as
    /// [`ReaderError::CatalogNotFound`]. Data files are resolved relative to
    /// the catalog's directory.
    pub fn open(fs: &dyn FileSystem, path: &Path) -> Result<Self> {
        info!("Reading catalog {}", path.display());

        let bytes = fs.read_all(path).map_err(|e| {
            debug!("Could not read catalog {}: {}", path.display(), e);
            ReaderError::CatalogNotFound(path.display().to_string())
        })?;

        let mut catalog = Self::parse(&bytes)?;
        catalog.directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(catalog)
    }

    /// Directory holding the data files
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn lookup(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(name)
    }

    /// Build a [`Collection`] for `name`, if the catalog knows it
    pub fn collection(&self, name: &str, fs: Arc<dyn FileSystem>) -> Option<Collection> {
        self.lookup(name)
            .map(|entry| Collection::new(fs, self.directory.clone(), entry))
    }

    /// Entries sorted by name
    pub fn entries(&self) -> Vec<&CatalogEntry> {
        let mut entries: Vec<&CatalogEntry> = self.entries.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn decode_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_matches(|c: char| c == '\0' || c.is_ascii_whitespace())
        .to_string()
}
