#![no_main]
use extent_reader::Catalog;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(catalog) = Catalog::parse(data) {
        for entry in catalog.entries() {
            assert!(catalog.lookup(&entry.name).is_some());
        }
    }
});
