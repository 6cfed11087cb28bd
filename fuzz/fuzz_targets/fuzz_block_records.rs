#![no_main]
use arbitrary::Arbitrary;
use extent_reader::{Block, Location, MemoryFileSystem};
use libfuzzer_sys::fuzz_target;
use std::path::Path;

#[derive(Arbitrary, Debug)]
struct Input {
    offset: u16,
    data: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let fs = MemoryFileSystem::new();
    fs.insert("/fuzz/db.0", input.data);

    let location = Location::new(0, input.offset as i32);
    let block = match Block::read(&fs, Path::new("/fuzz/db.0"), location) {
        Ok(block) => block,
        Err(_) => return,
    };

    // Record links may form cycles; bound the walk
    for record in block.records(&fs).take(4096) {
        match record {
            Ok(record) => {
                let _ = record.payload();
            }
            Err(_) => break,
        }
    }
});
