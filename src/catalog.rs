//! The fixed queries the runner executes, as Mongo-shaped documents.
//!
//! Every step of the run reads its filter, update, projection, pipeline or index keys
//! from here, so both stores see exactly the same requests.

use bson::{Document, doc};

pub const RECENT_YEAR: i32 = 1950;
pub const AUTHOR: &str = "Herman Melville";
pub const UPDATE_TITLE: &str = "Wuthering Heights";
pub const NEW_PRICE: i32 = 1000;
pub const DELETE_TITLE: &str = "The Alchemist";
pub const IN_STOCK_AFTER: i32 = 2010;
pub const EXPLAIN_TITLE: &str = "Book A";

#[must_use]
pub fn published_after(year: i32) -> Document {
    doc! {"published_year": {"$gt": year}}
}

#[must_use]
pub fn by_author(author: &str) -> Document {
    doc! {"author": author}
}

#[must_use]
pub fn by_title(title: &str) -> Document {
    doc! {"title": title}
}

#[must_use]
pub fn set_price(price: i32) -> Document {
    doc! {"$set": {"price": price}}
}

#[must_use]
pub fn in_stock_after(year: i32) -> Document {
    doc! {"in_stock": true, "published_year": {"$gt": year}}
}

/// Title, author and price only; `_id` suppressed.
#[must_use]
pub fn summary_projection() -> Document {
    doc! {"title": 1, "author": 1, "price": 1, "_id": 0}
}

#[must_use]
pub fn price_descending() -> Document {
    doc! {"price": -1}
}

#[must_use]
pub fn average_price_by_genre() -> Vec<Document> {
    vec![doc! {"$group": {"_id": "$genre", "averagePrice": {"$avg": "$price"}}}]
}

/// Ties on `bookCount` go to the lexicographically smallest author.
#[must_use]
pub fn top_author() -> Vec<Document> {
    vec![
        doc! {"$group": {"_id": "$author", "bookCount": {"$sum": 1}}},
        doc! {"$sort": {"bookCount": -1, "_id": 1}},
        doc! {"$limit": 1},
    ]
}

#[must_use]
pub fn title_index() -> Document {
    doc! {"title": 1}
}

#[must_use]
pub fn author_year_index() -> Document {
    doc! {"author": 1, "published_year": -1}
}
