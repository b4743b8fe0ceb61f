#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    let Ok(s) = std::str::from_utf8(data) else { return };
    let Ok(serde_json::Value::Array(stages)) = serde_json::from_str::<serde_json::Value>(s) else { return };
    let pipeline: Vec<bson::Document> = stages
        .into_iter()
        .filter_map(|v| bson::to_document(&v).ok())
        .collect();
    let _ = plp_bookstore::query::aggregate_docs(plp_bookstore::seed::sample_books(), &pipeline);
});
