//! Collection traversal tests
//!
//! Walk block chains and record chains laid out on disk by the fixture
//! builder and check what comes back, and in which order.

mod common;

use common::{doc, docs, two_block_fixture, BlockSpec, Fixture};
use extent_reader::{Catalog, FileSystem, LocalFileSystem, Location};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn ids<I>(records: I) -> Vec<String>
where
    I: Iterator<Item = extent_reader::Result<extent_reader::Record>>,
{
    records.map(|r| r.unwrap().identifier().unwrap()).collect()
}

#[test]
fn test_two_block_collection_on_disk() {
    let dir = TempDir::new().unwrap();
    let fixture = two_block_fixture();
    fixture.write_to(dir.path());

    let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
    let catalog = Catalog::open(fs.as_ref(), &fixture.catalog_path(dir.path())).unwrap();
    let users = catalog.collection("test.users", fs).unwrap();

    assert_eq!(ids(users.records()), vec!["r0", "r1", "r2", "r3"]);

    let blocks: Vec<_> = users.blocks().map(|b| b.unwrap()).collect();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].location(), Location::new(0, 8192));
    assert_eq!(blocks[1].location(), Location::new(1, 4096));
    assert_eq!(blocks[0].next(), blocks[1].location());
    assert_eq!(blocks[1].prev(), blocks[0].location());
    assert_eq!(blocks[0].path(), dir.path().join("test.0"));
    assert_eq!(blocks[1].path(), dir.path().join("test.1"));
}

#[test]
fn test_single_block_chain() {
    let dir = Path::new("/mongo/host1");
    let fixture = Fixture::new("db").collection(
        "one",
        vec![BlockSpec::new(Location::new(0, 0), docs(&["a", "b"]))],
    );
    let fs = Arc::new(fixture.memory_fs(dir));

    let catalog = Catalog::open(fs.as_ref(), &fixture.catalog_path(dir)).unwrap();
    let entry = catalog.lookup("db.one").unwrap();
    assert_eq!(entry.first_block, entry.last_block);

    let coll = catalog.collection("db.one", fs).unwrap();
    assert_eq!(coll.blocks().count(), 1);
    assert_eq!(coll.records().count(), 2);
}

#[test]
fn test_records_follow_links_not_layout() {
    let dir = Path::new("/data");
    let fixture = Fixture::new("db").collection(
        "shuffled",
        vec![BlockSpec::new(Location::new(0, 0), docs(&["r0", "r1", "r2", "r3", "r4"])).physically_reversed()],
    );
    let fs = Arc::new(fixture.memory_fs(dir));

    let catalog = Catalog::open(fs.as_ref(), &fixture.catalog_path(dir)).unwrap();
    let coll = catalog.collection("db.shuffled", fs.clone()).unwrap();

    assert_eq!(ids(coll.records()), vec!["r0", "r1", "r2", "r3", "r4"]);

    let block = coll.first_block().unwrap().unwrap();
    let offsets: Vec<i64> = block
        .records(fs.as_ref())
        .map(|r| r.unwrap().file_offset())
        .collect();
    assert!(offsets.windows(2).all(|w| w[0] > w[1]));
}

#[test]
fn test_last_record_has_no_next() {
    let dir = Path::new("/data");
    let fixture = Fixture::new("db").collection(
        "c",
        vec![BlockSpec::new(Location::new(0, 512), docs(&["x", "y", "z"]))],
    );
    let fs = Arc::new(fixture.memory_fs(dir));
    let coll = Catalog::open(fs.as_ref(), &fixture.catalog_path(dir))
        .unwrap()
        .collection("db.c", fs.clone())
        .unwrap();

    let block = coll.first_block().unwrap().unwrap();
    let records: Vec<_> = block.records(fs.as_ref()).map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 3);

    let last = records.last().unwrap();
    assert!(!last.has_next());
    assert!(last.next_record().unwrap().is_none());
    assert_eq!(
        last.file_offset(),
        block.last_record_location().offset as i64
    );
}

#[test]
fn test_empty_block_in_chain_is_skipped() {
    let dir = Path::new("/data");
    let fixture = Fixture::new("db").collection(
        "gaps",
        vec![
            BlockSpec::new(Location::new(0, 0), docs(&["a"])),
            BlockSpec::new(Location::new(0, 4096), Vec::new()),
            BlockSpec::new(Location::new(0, 8192), docs(&["b"])),
        ],
    );
    let fs = Arc::new(fixture.memory_fs(dir));
    let coll = Catalog::open(fs.as_ref(), &fixture.catalog_path(dir))
        .unwrap()
        .collection("db.gaps", fs)
        .unwrap();

    assert_eq!(coll.blocks().count(), 3);
    assert_eq!(ids(coll.records()), vec!["a", "b"]);
}

#[test]
fn test_next_block_in_file_zero() {
    // Both blocks live in file 0: the header's has_next() reports false for
    // the first one, but the chain is still followed.
    let dir = Path::new("/data");
    let fixture = Fixture::new("db").collection(
        "zero",
        vec![
            BlockSpec::new(Location::new(0, 0), docs(&["a"])),
            BlockSpec::new(Location::new(0, 2048), docs(&["b"])),
        ],
    );
    let fs = Arc::new(fixture.memory_fs(dir));
    let coll = Catalog::open(fs.as_ref(), &fixture.catalog_path(dir))
        .unwrap()
        .collection("db.zero", fs)
        .unwrap();

    let first = coll.first_block().unwrap().unwrap();
    assert!(!first.has_next());
    assert!(coll.next_block(&first).unwrap().is_some());
    assert_eq!(ids(coll.records()), vec!["a", "b"]);
}

#[test]
fn test_collection_without_blocks() {
    let dir = Path::new("/data");
    let fixture = Fixture::new("db").collection("empty", Vec::new());
    let fs = Arc::new(fixture.memory_fs(dir));
    let coll = Catalog::open(fs.as_ref(), &fixture.catalog_path(dir))
        .unwrap()
        .collection("db.empty", fs)
        .unwrap();

    assert!(coll.first_block().unwrap().is_none());
    assert_eq!(coll.records().count(), 0);
}

#[test]
fn test_buffer_read_once_per_block() {
    let dir = Path::new("/data");
    let fixture = two_block_fixture();
    let fs = Arc::new(fixture.memory_fs(dir));
    let coll = Catalog::open(fs.as_ref(), &fixture.catalog_path(dir))
        .unwrap()
        .collection("test.users", fs.clone())
        .unwrap();

    let block = coll.first_block().unwrap().unwrap();
    let before = fs.opens();

    let first = block.buffer(fs.as_ref()).unwrap().clone();
    let second = block.buffer(fs.as_ref()).unwrap().clone();
    assert_eq!(first, second);
    assert_eq!(fs.opens(), before + 1);

    assert_eq!(block.records(fs.as_ref()).count(), 3);
    assert_eq!(fs.opens(), before + 1);
}

#[test]
fn test_payload_fields_and_paths() {
    let dir = Path::new("/data");
    let nested = doc("n1").with(
        "address",
        extent_reader::Document::new().with("city", "Chicago").with("zip", 60601),
    );
    let fixture = Fixture::new("db").collection(
        "people",
        vec![BlockSpec::new(Location::new(0, 0), vec![nested])],
    );
    let fs: Arc<dyn FileSystem> = Arc::new(fixture.memory_fs(dir));
    let coll = Catalog::open(fs.as_ref(), &fixture.catalog_path(dir))
        .unwrap()
        .collection("db.people", fs)
        .unwrap();

    let record = coll.records().next().unwrap().unwrap();
    let payload = record.payload().unwrap();
    assert_eq!(payload.find_first("address.city").and_then(|v| v.as_str()), Some("Chicago"));
    assert_eq!(payload.find("tags").len(), 2);
    assert_eq!(record.identifier().unwrap(), "n1");
}

#[test]
fn test_memory_and_local_agree() {
    let dir = TempDir::new().unwrap();
    let fixture = two_block_fixture();
    fixture.write_to(dir.path());

    let local: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
    let memory: Arc<dyn FileSystem> = Arc::new(fixture.memory_fs(dir.path()));

    let read = |fs: Arc<dyn FileSystem>| {
        Catalog::open(fs.as_ref(), &fixture.catalog_path(dir.path()))
            .unwrap()
            .collection("test.users", fs)
            .unwrap()
            .records()
            .map(|r| r.unwrap().into_payload().unwrap())
            .collect::<Vec<_>>()
    };

    assert_eq!(read(local), read(memory));
}
