//! On-disk format of a document database's data files
//!
//! - [`location`] - `(file number, byte offset)` pointers used everywhere
//! - [`catalog`] - the `<db>.ns` namespace table
//! - [`collection`] - a collection's chain of blocks
//! - [`block`] - block headers and the lazily-loaded block buffer
//! - [`record`] - record framing and payload access
//! - [`bson`] - the self-describing binary payload
//! - [`split`] - locality-aware work units
//! - [`reader`] - per-unit `(identifier, document)` reading
//!
//! ## Layout
//!
//! ```text
//! {dir}/{db}.ns          catalog: name → (first block, last block)
//! {dir}/{db}.0, .1, ...  data files
//!
//!   ┌──────── block (0, 8192) ────────┐      ┌──────── block (1, 0) ───────┐
//!   │ header  next ─────────────────────────▶│ header  next = null         │
//!   │ record ⇄ record ⇄ record        │      │ record ⇄ record             │
//!   └─────────────────────────────────┘      └─────────────────────────────┘
//! ```

pub mod block;
pub mod bson;
pub mod catalog;
pub mod collection;
pub mod config;
pub mod error;
pub mod fs;
pub mod location;
pub mod path;
pub mod reader;
pub mod record;
pub mod split;
pub mod validation;

pub use block::Block;
pub use catalog::{Catalog, CatalogEntry};
pub use collection::Collection;
pub use location::Location;
pub use record::Record;
pub use split::WorkUnit;
