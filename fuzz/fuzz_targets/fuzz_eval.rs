#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(filter) = plp_bookstore::query::parse_filter_json(s)
    {
        for book in plp_bookstore::seed::sample_books() {
            let _ = plp_bookstore::query::eval_filter(&book, &filter);
        }
        let _ = plp_bookstore::query::eval_filter(&bson::doc! {"price": bson::Bson::Null}, &filter);
    }
});
