//! Corruption detection tests
//!
//! Damaged headers and truncated files must surface as errors naming the
//! offending location, never as partially-read data.

mod common;

use common::{docs, two_block_fixture, BlockSpec, Fixture, BLOCK_HEADER_SIZE};
use extent_reader::{
    Block, Catalog, CollectionInput, FileSystem, Location, ReaderError, WorkUnit,
};
use std::path::Path;
use std::sync::Arc;

const DIR: &str = "/data";

fn collection(fixture: &Fixture, name: &str) -> extent_reader::Collection {
    let fs: Arc<dyn FileSystem> = Arc::new(fixture.memory_fs(Path::new(DIR)));
    Catalog::open(fs.as_ref(), &fixture.catalog_path(Path::new(DIR)))
        .unwrap()
        .collection(name, fs)
        .unwrap()
}

#[test]
fn test_corrupted_magic() {
    let mut fixture = two_block_fixture();
    fixture.write(0, 8192, b"XXXX");

    let users = collection(&fixture, "test.users");
    match users.first_block() {
        Err(ReaderError::InvalidMagic { location, found }) => {
            assert_eq!(location, Location::new(0, 8192));
            assert_eq!(&found, b"XXXX");
        }
        other => panic!("expected InvalidMagic, got {:?}", other),
    }
}

#[test]
fn test_magic_error_names_location() {
    let mut fixture = two_block_fixture();
    fixture.write(1, 4096, &[0u8; 4]);

    let users = collection(&fixture, "test.users");
    let results: Vec<_> = users.blocks().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());

    let err = results[1].as_ref().unwrap_err();
    assert!(err.to_string().contains("{Location 1 4096}"));
}

#[test]
fn test_self_location_mismatch() {
    let mut fixture = two_block_fixture();
    fixture.write(0, 8192 + 4, &Location::new(0, 9999).to_bytes());

    let users = collection(&fixture, "test.users");
    assert!(matches!(
        users.first_block(),
        Err(ReaderError::LocationMismatch { expected, found })
            if expected == Location::new(0, 8192) && found == Location::new(0, 9999)
    ));
}

#[test]
fn test_extent_offset_mismatch_stops_iteration() {
    let mut fixture = two_block_fixture();
    // Extent offset of the first record, just past the block header
    fixture.write(0, 8192 + BLOCK_HEADER_SIZE + 4, &1234i32.to_le_bytes());

    let users = collection(&fixture, "test.users");
    let results: Vec<_> = users.records().collect();
    assert_eq!(results.len(), 1);
    assert!(matches!(
        results[0],
        Err(ReaderError::ExtentMismatch { found: 1234, .. })
    ));
}

#[test]
fn test_truncated_block_buffer() {
    let mut fixture = two_block_fixture();
    fixture.truncate(0, 8192 + BLOCK_HEADER_SIZE + 10);

    let users = collection(&fixture, "test.users");
    let block = users.first_block().unwrap().unwrap();
    let err = block.buffer(users.file_system().as_ref()).unwrap_err();
    assert!(matches!(err, ReaderError::BlockRead { location, .. } if location == Location::new(0, 8192)));
    assert!(err.to_string().contains("{Location 0 8192}"));
    assert!(err.to_string().contains("test.0"));
    assert!(!block.is_loaded());

    // Record iteration surfaces the same failure
    let first = users.records().next().unwrap().unwrap_err();
    assert!(first.to_string().contains("{Location 0 8192}"));
}

#[test]
fn test_truncated_block_header() {
    let mut fixture = two_block_fixture();
    fixture.truncate(1, 4096 + 100);

    let users = collection(&fixture, "test.users");
    let results: Vec<_> = users.blocks().collect();
    assert_eq!(results.len(), 2);
    assert!(matches!(
        &results[1],
        Err(ReaderError::BlockRead { location, .. }) if *location == Location::new(1, 4096)
    ));

    let err = results[1].as_ref().unwrap_err();
    assert!(err.to_string().contains("{Location 1 4096}"));
    assert!(err.to_string().contains("test.1"));
}

#[test]
fn test_negative_next_record_offset() {
    let mut fixture = Fixture::new("db").collection(
        "c",
        vec![BlockSpec::new(Location::new(0, 4096), docs(&["a", "b"]))],
    );
    // First record's next pointer aims before the block start
    fixture.write(0, 4096 + BLOCK_HEADER_SIZE + 8, &100i32.to_le_bytes());

    let coll = collection(&fixture, "db.c");
    let results: Vec<_> = coll.records().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(ReaderError::NegativeRecordOffset { offset, .. }) if offset == 100 - 4096
    ));
}

#[test]
fn test_corrupt_payload() {
    let mut fixture = two_block_fixture();
    // Payload's document length prefix larger than the record
    fixture.write(0, 8192 + BLOCK_HEADER_SIZE + 16, &5000i32.to_le_bytes());

    let users = collection(&fixture, "test.users");
    let record = users.records().next().unwrap().unwrap();
    let err = record.payload().unwrap_err();
    assert!(matches!(
        &err,
        ReaderError::CorruptRecord { block, record, .. }
            if *block == Location::new(0, 8192) && *record == 8192 + BLOCK_HEADER_SIZE as i64
    ));
}

#[test]
fn test_bad_element_type_names_record() {
    let mut fixture = two_block_fixture();
    // First element type byte of r0, after the payload's length prefix
    fixture.write(0, 8192 + BLOCK_HEADER_SIZE + 20, &[0x42]);

    let users = collection(&fixture, "test.users");
    let record = users.records().next().unwrap().unwrap();
    let message = record.payload().unwrap_err().to_string();
    assert!(message.contains("{Location 0 8192}"));
    assert!(message.contains("8368"));
    assert!(message.contains("0x42"));
}

#[test]
fn test_transported_block_with_negative_offset() {
    let fixture = two_block_fixture();
    let fs = Arc::new(fixture.memory_fs(Path::new(DIR)));
    let units = CollectionInput::new(DIR, "test", "users").unwrap().plan(fs).unwrap();
    let mut bytes = units[0].to_bytes().unwrap();

    // Overwrite the self offset that follows the length-prefixed path
    let path_len = u64::from_le_bytes(bytes[0..8].try_into().unwrap()) as usize;
    let at = 8 + path_len + 4;
    bytes[at..at + 4].copy_from_slice(&(-2_147_483_000i32).to_le_bytes());

    assert!(matches!(
        WorkUnit::from_bytes(&bytes),
        Err(ReaderError::InvalidLocation(_))
    ));

    let header = vec![0u8; BLOCK_HEADER_SIZE];
    let at = Location::new(0, -2_147_483_000);
    assert!(matches!(
        Block::from_header(Path::new(DIR).join("test.0"), at, &header),
        Err(ReaderError::InvalidLocation(loc)) if loc == at
    ));
}

#[test]
fn test_planning_reports_corruption() {
    let mut fixture = two_block_fixture();
    fixture.write(1, 4096, b"DCBX");

    let fs = Arc::new(fixture.memory_fs(Path::new(DIR)));
    let input = CollectionInput::new(DIR, "test", "users").unwrap();
    let err = input.plan(fs).unwrap_err();
    assert!(matches!(err, ReaderError::InvalidMagic { .. }));
    assert!(!err.is_absent());
}

#[test]
fn test_block_read_never_partial() {
    let mut fixture = two_block_fixture();
    fixture.write(0, 8192, b"ABCD");
    let fs = fixture.memory_fs(Path::new(DIR));

    let result = Block::read(&fs, &Path::new(DIR).join("test.0"), Location::new(0, 8192));
    assert!(result.is_err());
}
