mod common;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use bson::doc;
use folio_app::books::{
    Accumulator, Book, BookField, BookFilter, BookUpdate, GenreAverage, GroupKey, Pipeline,
    Projection,
};
use folio_db::{DocumentStore, MemoryStore, SortDirection};

fn titles(books: &[Book]) -> Vec<&str> {
    books.iter().filter_map(|b| b.title.as_deref()).collect()
}

#[tokio::test]
async fn no_match_is_an_empty_result() {
    let store = common::store();
    let books = common::facade(&store);

    let found = books
        .find_by_filter(&BookFilter::all().eq(BookField::Genre, "Cookbooks"))
        .await
        .unwrap();
    assert!(found.is_empty());

    let page = books
        .find_paginated(&BookFilter::all().eq(BookField::Genre, "Cookbooks"), 1, 5)
        .await
        .unwrap();
    assert!(page.is_empty());
}

#[tokio::test]
async fn conjunction_of_equality_and_comparison() {
    let store = common::store();
    let books = common::facade(&store);

    let filter = BookFilter::all()
        .eq(BookField::InStock, true)
        .gt(BookField::PublishedYear, 2010);
    let found = books.find_by_filter(&filter).await.unwrap();

    assert_eq!(
        titles(&found),
        vec!["Book One", "Book Two", "Book Six", "Book Nine", "Book Ten"]
    );
    assert!(found.iter().all(|b| b.id.is_some()));
}

#[tokio::test]
async fn projection_returns_only_requested_fields() {
    let store = common::store();
    let books = common::facade(&store);
    let filter = BookFilter::all().eq(BookField::Author, "Alice");

    let without_id = books
        .find_by_filter_projected(
            &filter,
            &Projection::of([BookField::Title, BookField::Author, BookField::Price]).exclude_id(),
        )
        .await
        .unwrap();
    assert_eq!(without_id.len(), 4);
    for book in &without_id {
        assert!(book.id.is_none());
        assert!(book.title.is_some() && book.price.is_some());
        assert_eq!(book.author.as_deref(), Some("Alice"));
        assert!(book.genre.is_none() && book.published_year.is_none());
    }

    let with_id = books
        .find_by_filter_projected(&filter, &Projection::of([BookField::Title]))
        .await
        .unwrap();
    assert!(with_id.iter().all(|b| b.id.is_some() && b.price.is_none()));
}

#[tokio::test]
async fn sorting_in_both_directions() {
    let store = common::store();
    let books = common::facade(&store);

    let ascending = books
        .find_sorted(&BookFilter::all(), BookField::Price, SortDirection::Ascending)
        .await
        .unwrap();
    let descending = books
        .find_sorted(&BookFilter::all(), BookField::Price, SortDirection::Descending)
        .await
        .unwrap();

    assert_eq!(ascending.len(), common::TOTAL_BOOKS);
    assert_eq!(ascending[0].title.as_deref(), Some("Book Eight"));
    assert_eq!(descending[0].title.as_deref(), Some("Book Six"));

    let prices: Vec<f64> = ascending.iter().filter_map(|b| b.price).collect();
    assert!(prices.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn pagination_covers_every_match_exactly_once() {
    let store = common::store();
    let books = common::facade(&store);
    let page_size = 5;

    let mut seen = BTreeSet::new();
    let mut non_empty_pages = 0;
    for page in 1..=4 {
        let found = books
            .find_paginated(&BookFilter::all(), page, page_size)
            .await
            .unwrap();
        assert!(found.len() <= page_size as usize);
        if !found.is_empty() {
            non_empty_pages += 1;
        }
        for book in found {
            assert!(seen.insert(book.id.unwrap()), "book repeated across pages");
        }
    }

    assert_eq!(non_empty_pages, common::TOTAL_BOOKS.div_ceil(page_size as usize));
    assert_eq!(seen.len(), common::TOTAL_BOOKS);

    let second = books
        .find_paginated(&BookFilter::all(), 2, page_size)
        .await
        .unwrap();
    assert_eq!(
        titles(&second),
        vec!["Book Six", "Book Seven", "Book Eight", "Book Nine", "Book Ten"]
    );
}

#[tokio::test]
async fn pagination_rejects_page_zero_and_empty_pages() {
    let store = common::store();
    let books = common::facade(&store);

    assert!(books
        .find_paginated(&BookFilter::all(), 0, 5)
        .await
        .unwrap_err()
        .is_query());
    assert!(books
        .find_paginated(&BookFilter::all(), 1, 0)
        .await
        .unwrap_err()
        .is_query());
}

#[tokio::test]
async fn update_one_is_visible_and_reapplicable() {
    let store = common::store();
    let books = common::facade(&store);
    let book_one = BookFilter::all().eq(BookField::Title, "Book One");
    let update = BookUpdate::new().price(18.0);

    assert_eq!(books.update_one(&book_one, &update).await.unwrap(), 1);
    let found = books.find_by_filter(&book_one).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].price, Some(18.0));

    assert_eq!(books.update_one(&book_one, &update).await.unwrap(), 1);
    let again = books.find_by_filter(&book_one).await.unwrap();
    assert_eq!(again, found);

    let missing = BookFilter::all().eq(BookField::Title, "Book Zero");
    assert_eq!(books.update_one(&missing, &update).await.unwrap(), 0);
}

#[tokio::test]
async fn update_one_touches_only_the_first_match() {
    let store = common::store();
    let books = common::facade(&store);

    let fiction = BookFilter::all().eq(BookField::Genre, "Fiction");
    let modified = books
        .update_one(&fiction, &BookUpdate::new().in_stock(false))
        .await
        .unwrap();
    assert_eq!(modified, 1);

    let out_of_stock_fiction = books
        .find_by_filter(&fiction.clone().eq(BookField::InStock, false))
        .await
        .unwrap();
    assert_eq!(titles(&out_of_stock_fiction), vec!["Book One"]);
}

#[tokio::test]
async fn delete_one_then_nothing_left_to_delete() {
    let store = common::store();
    let books = common::facade(&store);
    let book_ten = BookFilter::all().eq(BookField::Title, "Book Ten");

    assert_eq!(books.delete_one(&book_ten).await.unwrap(), 1);
    assert!(books.find_by_filter(&book_ten).await.unwrap().is_empty());
    assert_eq!(books.delete_one(&book_ten).await.unwrap(), 0);
    assert_eq!(store.documents().await.len(), common::TOTAL_BOOKS - 1);
}

#[tokio::test]
async fn group_averages_reconstruct_genre_totals() {
    let store = common::store();
    let books = common::facade(&store);

    let pipeline = Pipeline::new().group(
        GroupKey::Field(BookField::Genre),
        [
            ("averagePrice", Accumulator::Average(BookField::Price)),
            ("count", Accumulator::Count),
        ],
    );
    let rows = books.aggregate(&pipeline).await.unwrap();
    assert_eq!(rows.len(), 4);

    let all = books.find_by_filter(&BookFilter::all()).await.unwrap();
    let mut totals: HashMap<String, f64> = HashMap::new();
    for book in &all {
        *totals.entry(book.genre.clone().unwrap()).or_default() += book.price.unwrap();
    }

    for row in rows {
        let genre = row.key_str().unwrap().to_string();
        let reconstructed = row.number("count").unwrap() * row.number("averagePrice").unwrap();
        assert!(
            (reconstructed - totals[&genre]).abs() < 1e-9,
            "{genre}: {reconstructed} != {}",
            totals[&genre]
        );
    }
}

#[tokio::test]
async fn filtered_sum_over_one_group() {
    let store = common::store();
    let books = common::facade(&store);

    let pipeline = Pipeline::new()
        .filter(BookFilter::all().eq(BookField::Genre, "Fiction"))
        .group(
            GroupKey::All,
            [
                ("total", Accumulator::Sum(BookField::Price)),
                ("count", Accumulator::Count),
            ],
        );
    let rows = books.aggregate(&pipeline).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key, bson::Bson::Null);
    // Book One, Two, Five and Eight.
    assert_eq!(rows[0].number("total"), Some(15.0 + 22.5 + 9.5 + 7.0));
    assert_eq!(rows[0].number("count"), Some(4.0));
}

#[tokio::test]
async fn match_after_group_sees_group_rows_not_books() {
    let store = common::store();
    let books = common::facade(&store);
    let fiction = BookFilter::all().eq(BookField::Genre, "Fiction");

    let filter_first = Pipeline::new()
        .filter(fiction.clone())
        .group(GroupKey::Field(BookField::Genre), [("count", Accumulator::Count)]);
    let rows = books.aggregate(&filter_first).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].key_str(), Some("Fiction"));

    let group_first = Pipeline::new()
        .group(GroupKey::Field(BookField::Genre), [("count", Accumulator::Count)])
        .filter(fiction);
    assert!(books.aggregate(&group_first).await.unwrap().is_empty());
}

#[tokio::test]
async fn mistyped_stored_field_does_not_hide_the_record() {
    let mut documents = common::books();
    documents.push(doc! {
        "title": "Legacy",
        "author": "Frank",
        "genre": "Fiction",
        "published_year": "1999",
        "price": 5.0,
    });
    let store = Arc::new(MemoryStore::with_documents("books", documents));
    let books = common::facade(&store);

    let fiction = BookFilter::all().eq(BookField::Genre, "Fiction");
    let found = books.find_by_filter(&fiction).await.unwrap();
    assert_eq!(
        titles(&found),
        vec!["Book One", "Book Two", "Book Five", "Book Eight", "Legacy"]
    );
    let legacy = &found[4];
    assert_eq!(legacy.published_year, None);
    assert_eq!(legacy.price, Some(5.0));

    let sorted = books
        .find_sorted(&fiction, BookField::Price, SortDirection::Ascending)
        .await
        .unwrap();
    assert_eq!(sorted[0].title.as_deref(), Some("Legacy"));

    let page = books.find_paginated(&fiction, 1, 10).await.unwrap();
    assert_eq!(page.len(), 5);
}

#[tokio::test]
async fn average_price_by_genre_example() {
    let store = Arc::new(MemoryStore::with_documents(
        "books",
        vec![
            doc! { "title": "A", "genre": "Fiction", "price": 10 },
            doc! { "title": "B", "genre": "Fiction", "price": 20 },
        ],
    ));
    let books = common::facade(&store);

    assert_eq!(
        books.average_price_by_genre().await.unwrap(),
        vec![GenreAverage {
            genre: Some("Fiction".to_string()),
            average_price: Some(15.0),
        }]
    );
}

#[tokio::test]
async fn top_authors_and_decades() {
    let store = common::store();
    let books = common::facade(&store);

    let top = books.top_authors(2).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].author.as_deref(), Some("Alice"));
    assert_eq!(top[0].count, 4);
    // Bob and Carol tie on three; ties break by name.
    assert_eq!(top[1].author.as_deref(), Some("Bob"));
    assert_eq!(top[1].count, 3);

    let decades: Vec<(Option<i64>, u64)> = books
        .books_by_decade()
        .await
        .unwrap()
        .into_iter()
        .map(|d| (d.decade, d.count))
        .collect();
    assert_eq!(
        decades,
        vec![
            (Some(1980), 1),
            (Some(1990), 1),
            (Some(2000), 2),
            (Some(2010), 5),
            (Some(2020), 3),
        ]
    );
}

#[tokio::test]
async fn ensure_index_twice_creates_one_index() {
    let store = common::store();
    let books = common::facade(&store);
    let keys = [
        (BookField::Author, SortDirection::Ascending),
        (BookField::PublishedYear, SortDirection::Descending),
    ];

    let first = books.ensure_index(&keys).await.unwrap();
    let second = books.ensure_index(&keys).await.unwrap();
    assert_eq!(first, "author_1_published_year_-1");
    assert_eq!(first, second);
    assert_eq!(
        store.list_indexes().await.unwrap(),
        vec!["_id_", "author_1_published_year_-1"]
    );

    assert!(books.ensure_index(&[]).await.unwrap_err().is_query());
    assert!(books
        .ensure_index(&[
            (BookField::Title, SortDirection::Ascending),
            (BookField::Title, SortDirection::Descending),
        ])
        .await
        .unwrap_err()
        .is_query());
}

#[tokio::test]
async fn explain_reports_execution_stats() {
    let store = common::store();
    let books = common::facade(&store);

    let stats = books
        .explain(&BookFilter::all().eq(BookField::Title, "Book Three"))
        .await
        .unwrap();
    assert_eq!(stats.get_i64("nReturned").unwrap(), 1);
    assert!(stats.get_bool("executionSuccess").unwrap());
}

#[tokio::test]
async fn unreachable_store_is_a_connection_error() {
    let store = common::store();
    let books = common::facade(&store);
    store.set_reachable(false);

    let everything = BookFilter::all();
    assert!(books.find_by_filter(&everything).await.unwrap_err().is_connection());
    assert!(books
        .delete_one(&everything)
        .await
        .unwrap_err()
        .is_connection());
    assert!(books
        .average_price_by_genre()
        .await
        .unwrap_err()
        .is_connection());

    store.set_reachable(true);
    assert_eq!(store.documents().await.len(), common::TOTAL_BOOKS);
}

#[tokio::test]
async fn malformed_requests_are_query_errors_and_change_nothing() {
    let store = common::store();
    let books = common::facade(&store);
    let before = store.documents().await;

    let wrong_type = BookFilter::all().eq(BookField::InStock, "yes");
    assert!(books.find_by_filter(&wrong_type).await.unwrap_err().is_query());
    assert!(books
        .update_one(&BookFilter::all(), &BookUpdate::new())
        .await
        .unwrap_err()
        .is_query());
    assert!(books
        .update_one(&BookFilter::all(), &BookUpdate::new().price(f64::NAN))
        .await
        .unwrap_err()
        .is_query());
    assert!(books
        .aggregate(&Pipeline::new().group(
            GroupKey::Field(BookField::Genre),
            [("avg", Accumulator::Average(BookField::Publisher))],
        ))
        .await
        .unwrap_err()
        .is_query());

    assert_eq!(store.documents().await, before);
}
