use bson::{Bson, doc};
use plp_bookstore::collection::Collection;
use plp_bookstore::query::{
    FindOptions, Order, SortSpec, count_docs, delete_one, find_docs, parse_filter, parse_filter_json,
    parse_projection, parse_update, update_one,
};
use std::sync::Arc;

fn shelf() -> Arc<Collection> {
    let col = Arc::new(Collection::new("books"));
    for d in plp_bookstore::seed::sample_books() {
        col.insert_document(d);
    }
    col
}

fn titles(docs: &[bson::Document]) -> Vec<String> {
    docs.iter().map(|d| d.get_str("title").unwrap().to_string()).collect()
}

#[test]
fn conjunction_of_range_and_equality() {
    let col = shelf();
    let f = parse_filter(&doc! {"in_stock": true, "published_year": {"$gt": 1950}}).unwrap();
    let mut got = titles(&find_docs(&col, &f, &FindOptions::default()).to_vec());
    got.sort();
    assert_eq!(got, ["The Alchemist", "The Catcher in the Rye", "The Lord of the Rings", "To Kill a Mockingbird"]);
    assert_eq!(count_docs(&col, &f), 4);
}

#[test]
fn in_or_and_exists_operators() {
    let col = shelf();
    let f = parse_filter_json(r#"{"genre": {"$in": ["Romance", "Adventure"]}}"#).unwrap();
    assert_eq!(count_docs(&col, &f), 2);

    let f = parse_filter_json(r#"{"$or": [{"author": "Jane Austen"}, {"price": {"$gte": 19}}]}"#).unwrap();
    let mut got = titles(&find_docs(&col, &f, &FindOptions::default()).to_vec());
    got.sort();
    assert_eq!(got, ["Pride and Prejudice", "The Lord of the Rings"]);

    let f = parse_filter_json(r#"{"isbn": {"$exists": false}}"#).unwrap();
    assert_eq!(count_docs(&col, &f), 12);
}

#[test]
fn sort_skip_limit_and_projection() {
    let col = shelf();
    let opts = FindOptions {
        projection: Some(parse_projection(&doc! {"title": 1, "_id": 0}).unwrap()),
        sort: Some(vec![SortSpec { field: "published_year".into(), order: Order::Asc }]),
        limit: Some(2),
        skip: Some(1),
    };
    let docs = find_docs(&col, &plp_bookstore::query::Filter::True, &opts).to_vec();
    assert_eq!(docs, vec![doc! {"title": "Wuthering Heights"}, doc! {"title": "Moby Dick"}]);
}

#[test]
fn update_one_inc_keeps_integers() {
    let col = shelf();
    let f = parse_filter(&doc! {"title": "1984"}).unwrap();
    let u = parse_update(&doc! {"$inc": {"pages": 1}, "$set": {"reviewed": true}}).unwrap();
    let r = update_one(&col, &f, &u).unwrap();
    assert_eq!((r.matched, r.modified), (1, 1));
    let d = &find_docs(&col, &f, &FindOptions::default()).to_vec()[0];
    assert!(matches!(d.get("pages"), Some(Bson::Int32(329))));
    assert!(d.get_bool("reviewed").unwrap());
    let reviewed = parse_filter(&doc! {"reviewed": true}).unwrap();
    assert_eq!(count_docs(&col, &reviewed), 1);
}

#[test]
fn inc_on_a_string_is_rejected() {
    let col = shelf();
    let f = parse_filter(&doc! {"title": "1984"}).unwrap();
    let u = parse_update(&doc! {"$inc": {"author": 1}}).unwrap();
    assert!(update_one(&col, &f, &u).is_err());
    let unchanged = parse_filter(&doc! {"author": "George Orwell"}).unwrap();
    assert_eq!(count_docs(&col, &unchanged), 2);
}

#[test]
fn delete_one_removes_a_single_match() {
    let col = shelf();
    let f = parse_filter(&doc! {"in_stock": false}).unwrap();
    assert_eq!(delete_one(&col, &f).deleted, 1);
    assert_eq!(col.len(), 11);
    assert_eq!(count_docs(&col, &f), 2);
}

#[test]
fn malformed_filters_are_query_errors() {
    let e = parse_filter_json(r#"{"price": {"$near": 3}}"#).unwrap_err();
    assert_eq!(e.to_string(), "Query error: unknown operator: $near");
    assert!(parse_filter_json("{not json").is_err());
    assert!(parse_filter(&doc! {"$where": "1"}).is_err());
}
