#![no_main]
use libfuzzer_sys::fuzz_target;
use plp_bookstore::import::{ImportFormat, ImportOptions, read_documents};

fuzz_target!(|data: &[u8]| {
    if data.len() > 16384 { return; }
    let opts = ImportOptions { skip_errors: true, progress_every: None, ..ImportOptions::default() };
    let _ = read_documents(data, ImportFormat::Ndjson, &opts);
    let _ = read_documents(data, ImportFormat::Auto, &ImportOptions::default());
});
