#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(upd) = plp_bookstore::query::parse_update_json(s)
    {
        let mut book = bson::doc! {"title": "Moby Dick", "price": 12.5, "pages": 635, "meta": {"isbn": "x"}};
        let _ = plp_bookstore::query::apply_update(&mut book, &upd);
    }
});
