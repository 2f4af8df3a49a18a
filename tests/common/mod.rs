#![allow(dead_code)]

use std::sync::Arc;

use bson::{doc, Document};
use folio_app::books::BookFacade;
use folio_db::{DocumentStore, MemoryStore};

pub const TOTAL_BOOKS: usize = 12;

fn book(
    title: &str,
    author: &str,
    genre: &str,
    published_year: i32,
    price: f64,
    in_stock: bool,
) -> Document {
    doc! {
        "title": title,
        "author": author,
        "genre": genre,
        "published_year": published_year,
        "price": price,
        "in_stock": in_stock,
        "pages": 200 + published_year % 100,
        "publisher": "Riverside Press",
    }
}

/// Twelve books across five genres, three decades of the 2000s, and five authors.
pub fn books() -> Vec<Document> {
    vec![
        book("Book One", "Alice", "Fiction", 2021, 15.0, true),
        book("Book Two", "Bob", "Fiction", 2018, 22.5, true),
        book("Book Three", "Alice", "Science", 2015, 30.0, false),
        book("Book Four", "Carol", "History", 1999, 12.0, true),
        book("Book Five", "Alice", "Fiction", 2005, 9.5, true),
        book("Book Six", "Bob", "Science", 2020, 40.0, true),
        book("Book Seven", "Dave", "History", 2012, 18.0, false),
        book("Book Eight", "Carol", "Fiction", 1987, 7.0, true),
        book("Book Nine", "Alice", "Poetry", 2023, 11.0, true),
        book("Book Ten", "Bob", "Poetry", 2011, 14.0, true),
        book("Book Eleven", "Eve", "Science", 2009, 27.0, true),
        book("Book Twelve", "Carol", "History", 2016, 19.5, false),
    ]
}

pub fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_documents("books", books()))
}

pub fn facade(store: &Arc<MemoryStore>) -> BookFacade {
    let shared: Arc<dyn DocumentStore> = store.clone();
    BookFacade::new(shared)
}
