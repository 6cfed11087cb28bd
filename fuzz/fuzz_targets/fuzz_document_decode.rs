#![no_main]
use extent_reader::Document;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(doc) = Document::from_bytes(data) {
        // Anything that decodes must re-encode and decode to the same value
        let again = Document::from_bytes(&doc.to_bytes()).expect("re-encoded document decodes");
        assert_eq!(doc.len(), again.len());
        let _ = doc.to_json();
    }
});
