//! Filesystem seam
//!
//! The decoder never talks to `std::fs` directly. Everything goes through
//! [`FileSystem`], which gives byte-range reads plus the physical block
//! layout of a file so work can be scheduled next to its data.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default physical block size reported by [`LocalFileSystem`] (64 MiB)
pub const DEFAULT_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// Readable, seekable stream returned by [`FileSystem::open`]
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// One physical storage range of a file and the hosts holding it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLocation {
    pub offset: u64,
    pub length: u64,
    pub hosts: Vec<String>,
}

impl BlockLocation {
    pub fn new(offset: u64, length: u64, hosts: Vec<String>) -> Self {
        BlockLocation {
            offset,
            length,
            hosts,
        }
    }

    fn overlaps(&self, offset: u64, len: u64) -> bool {
        self.offset < offset.saturating_add(len) && offset < self.offset + self.length
    }
}

/// Storage backend holding the catalog and data files
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Open a file for reading
    fn open(&self, path: &Path) -> io::Result<Box<dyn ReadSeek>>;

    /// Length of a file in bytes
    fn len(&self, path: &Path) -> io::Result<u64>;

    /// Whether a file exists
    fn exists(&self, path: &Path) -> bool;

    /// Physical ranges covering `[offset, offset + len)` of `path`
    fn block_locations(&self, path: &Path, offset: u64, len: u64)
        -> io::Result<Vec<BlockLocation>>;

    /// Read a whole file
    fn read_all(&self, path: &Path) -> io::Result<Vec<u8>> {
        let len = self.len(path)?;
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "file too large"))?;
        let mut stream = self.open(path)?;
        let mut buffer = vec![0u8; len];
        stream.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Read exactly `len` bytes starting at `offset`
    fn read_range(&self, path: &Path, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut stream = self.open(path)?;
        stream.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        stream.read_exact(&mut buffer)?;
        Ok(buffer)
    }
}

fn default_hosts() -> Vec<String> {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string());
    vec![host]
}

/// Local disk backend
///
/// Physical ranges are reported by cutting files at multiples of
/// `block_size`; every range lives on the same configured hosts.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    block_size: u64,
    hosts: Vec<String>,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        LocalFileSystem {
            block_size: DEFAULT_BLOCK_SIZE,
            hosts: default_hosts(),
        }
    }

    pub fn with_block_size(mut self, block_size: u64) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn with_hosts(mut self, hosts: Vec<String>) -> Self {
        self.hosts = hosts;
        self
    }
}

impl Default for LocalFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for LocalFileSystem {
    fn open(&self, path: &Path) -> io::Result<Box<dyn ReadSeek>> {
        Ok(Box::new(File::open(path)?))
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn block_locations(
        &self,
        path: &Path,
        offset: u64,
        len: u64,
    ) -> io::Result<Vec<BlockLocation>> {
        let file_len = self.len(path)?;
        let end = offset.saturating_add(len.max(1)).min(file_len);

        let mut locations = Vec::new();
        let mut start = (offset / self.block_size) * self.block_size;
        while start < end {
            let length = self.block_size.min(file_len - start);
            locations.push(BlockLocation::new(start, length, self.hosts.clone()));
            start += self.block_size;
        }

        Ok(locations)
    }
}

/// In-memory backend
///
/// Holds whole files in memory and answers block-location queries from a
/// per-file script. Counts `open` calls so callers can observe how much
/// I/O a traversal performs.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<HashMap<PathBuf, Arc<Vec<u8>>>>,
    locations: Mutex<HashMap<PathBuf, Vec<BlockLocation>>>,
    opens: AtomicUsize,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&self, path: impl Into<PathBuf>, content: Vec<u8>) {
        self.files.lock().insert(path.into(), Arc::new(content));
    }

    /// Script the physical ranges reported for `path`
    ///
    /// Without a script a file is one range on `localhost`.
    pub fn set_block_locations(&self, path: impl Into<PathBuf>, locations: Vec<BlockLocation>) {
        self.locations.lock().insert(path.into(), locations);
    }

    /// Number of times any file has been opened
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn content(&self, path: &Path) -> io::Result<Arc<Vec<u8>>> {
        self.files.lock().get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file: {}", path.display()),
            )
        })
    }
}

/// Stream over a shared in-memory file
struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl FileSystem for MemoryFileSystem {
    fn open(&self, path: &Path) -> io::Result<Box<dyn ReadSeek>> {
        let content = self.content(path)?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Cursor::new(SharedBytes(content))))
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        Ok(self.content(path)?.len() as u64)
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    fn block_locations(
        &self,
        path: &Path,
        offset: u64,
        len: u64,
    ) -> io::Result<Vec<BlockLocation>> {
        let file_len = self.len(path)?;

        match self.locations.lock().get(path) {
            Some(scripted) => Ok(scripted
                .iter()
                .filter(|loc| loc.overlaps(offset, len.max(1)))
                .cloned()
                .collect()),
            None => Ok(vec![BlockLocation::new(
                0,
                file_len,
                vec!["localhost".to_string()],
            )]),
        }
    }
}
