use bson::{Document, doc};

/// The sample bookstore: twelve books across several genres, three of them out of stock.
#[must_use]
pub fn sample_books() -> Vec<Document> {
    vec![
        doc! {
            "title": "To Kill a Mockingbird", "author": "Harper Lee", "genre": "Fiction",
            "published_year": 1960, "price": 12.99, "in_stock": true, "pages": 336,
            "publisher": "J. B. Lippincott & Co.",
        },
        doc! {
            "title": "1984", "author": "George Orwell", "genre": "Dystopian",
            "published_year": 1949, "price": 10.99, "in_stock": true, "pages": 328,
            "publisher": "Secker & Warburg",
        },
        doc! {
            "title": "The Great Gatsby", "author": "F. Scott Fitzgerald", "genre": "Fiction",
            "published_year": 1925, "price": 9.99, "in_stock": true, "pages": 180,
            "publisher": "Charles Scribner's Sons",
        },
        doc! {
            "title": "Brave New World", "author": "Aldous Huxley", "genre": "Dystopian",
            "published_year": 1932, "price": 11.50, "in_stock": false, "pages": 311,
            "publisher": "Chatto & Windus",
        },
        doc! {
            "title": "The Hobbit", "author": "J.R.R. Tolkien", "genre": "Fantasy",
            "published_year": 1937, "price": 14.99, "in_stock": true, "pages": 310,
            "publisher": "George Allen & Unwin",
        },
        doc! {
            "title": "The Catcher in the Rye", "author": "J.D. Salinger", "genre": "Fiction",
            "published_year": 1951, "price": 8.99, "in_stock": true, "pages": 224,
            "publisher": "Little, Brown and Company",
        },
        doc! {
            "title": "Pride and Prejudice", "author": "Jane Austen", "genre": "Romance",
            "published_year": 1813, "price": 7.99, "in_stock": true, "pages": 432,
            "publisher": "T. Egerton",
        },
        doc! {
            "title": "The Lord of the Rings", "author": "J.R.R. Tolkien", "genre": "Fantasy",
            "published_year": 1954, "price": 19.99, "in_stock": true, "pages": 1178,
            "publisher": "Allen & Unwin",
        },
        doc! {
            "title": "Animal Farm", "author": "George Orwell", "genre": "Political Satire",
            "published_year": 1945, "price": 8.50, "in_stock": false, "pages": 112,
            "publisher": "Secker & Warburg",
        },
        doc! {
            "title": "The Alchemist", "author": "Paulo Coelho", "genre": "Fiction",
            "published_year": 1988, "price": 10.99, "in_stock": true, "pages": 197,
            "publisher": "HarperOne",
        },
        doc! {
            "title": "Moby Dick", "author": "Herman Melville", "genre": "Adventure",
            "published_year": 1851, "price": 12.50, "in_stock": false, "pages": 635,
            "publisher": "Harper & Brothers",
        },
        doc! {
            "title": "Wuthering Heights", "author": "Emily Brontë", "genre": "Gothic Fiction",
            "published_year": 1847, "price": 9.99, "in_stock": true, "pages": 416,
            "publisher": "Thomas Cautley Newby",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_book_has_the_core_fields() {
        let books = sample_books();
        assert_eq!(books.len(), 12);
        for b in &books {
            for f in ["title", "author", "genre", "published_year", "price", "in_stock"] {
                assert!(b.contains_key(f), "{b} lacks {f}");
            }
        }
        assert_eq!(books.iter().filter(|b| matches!(b.get_bool("in_stock"), Ok(false))).count(), 3);
    }
}
