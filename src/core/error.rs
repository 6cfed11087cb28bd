use crate::core::location::Location;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("Catalog not found: {0}")]
    CatalogNotFound(String),

    #[error("Collection not found in catalog: {0}")]
    CollectionNotFound(String),

    #[error("Did not find expected block magic number at {location} (found {found:?})")]
    InvalidMagic { location: Location, found: [u8; 4] },

    #[error("Block {expected} could not be found, header claims {found}")]
    LocationMismatch { expected: Location, found: Location },

    #[error("Record in block {block} had extent offset set to {found}")]
    ExtentMismatch { block: Location, found: i32 },

    #[error("Tried to create record with offset {offset} in block {block}")]
    NegativeRecordOffset { offset: i32, block: Location },

    #[error("Invalid location {0}")]
    InvalidLocation(Location),

    #[error("Block {location} has invalid byte length {length}")]
    InvalidBlockLength { location: Location, length: i32 },

    #[error("Failed to read block {location} from {}: {source}", .path.display())]
    BlockRead {
        location: Location,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt record at offset {record} in block {block}: {source}")]
    CorruptRecord {
        block: Location,
        record: i64,
        #[source]
        source: Box<ReaderError>,
    },

    #[error("Truncated {what}: needed {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Payload has no _id field")]
    MissingId,

    #[error("Invalid database name: {0}")]
    InvalidDatabaseName(String),

    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] bincode::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReaderError {
    /// True for the "nothing there" outcomes that split planning turns into
    /// an empty plan instead of a failure.
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            ReaderError::CatalogNotFound(_) | ReaderError::CollectionNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;
