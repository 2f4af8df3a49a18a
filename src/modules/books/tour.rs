//! Scripted walk through every facade operation against the live collection.

use std::io::Write;

use anyhow::Context;
use bson::Document;
use folio_db::SortDirection;

use super::facade::{AuthorCount, BookFacade, DecadeCount, GenreAverage};
use super::filter::{BookFilter, Projection};
use super::models::{BookField, BookUpdate};
use crate::utils;

const PAGE: u64 = 2;
const PAGE_SIZE: u64 = 5;

/// What the tour observed, step by step.
#[derive(Debug, Clone, Default)]
pub struct TourReport {
    pub fiction: usize,
    pub published_after_2019: usize,
    pub by_alice: usize,
    pub price_updated: u64,
    pub deleted: u64,
    pub in_stock_after_2010: usize,
    pub projected: usize,
    pub sorted: usize,
    pub page_two: usize,
    pub genre_averages: Vec<GenreAverage>,
    pub top_author: Option<AuthorCount>,
    pub decades: Vec<DecadeCount>,
    pub indexes: Vec<String>,
    pub explain: Document,
}

/// Run the tour, writing each step's results to `out` as JSON.
pub async fn run(facade: &BookFacade, out: &mut impl Write) -> anyhow::Result<TourReport> {
    let mut report = TourReport::default();

    let fiction = BookFilter::all().eq(BookField::Genre, "Fiction");
    let books = facade.find_by_filter(&fiction).await.context("fiction books")?;
    utils::write_section(out, "Fiction books", &books)?;
    report.fiction = books.len();

    let recent = BookFilter::all().gt(BookField::PublishedYear, 2019);
    let books = facade.find_by_filter(&recent).await.context("books after 2019")?;
    utils::write_section(out, "Books published after 2019", &books)?;
    report.published_after_2019 = books.len();

    let alice = BookFilter::all().eq(BookField::Author, "Alice");
    let books = facade.find_by_filter(&alice).await.context("books by Alice")?;
    utils::write_section(out, "Books by Alice", &books)?;
    report.by_alice = books.len();

    let book_one = BookFilter::all().eq(BookField::Title, "Book One");
    report.price_updated = facade
        .update_one(&book_one, &BookUpdate::new().price(18.0))
        .await
        .context("update price of Book One")?;
    utils::write_section(out, "Price updated for Book One", &report.price_updated)?;

    let book_ten = BookFilter::all().eq(BookField::Title, "Book Ten");
    report.deleted = facade.delete_one(&book_ten).await.context("delete Book Ten")?;
    utils::write_section(out, "Book Ten deleted", &report.deleted)?;

    let in_stock_recent = BookFilter::all()
        .eq(BookField::InStock, true)
        .gt(BookField::PublishedYear, 2010);
    let books = facade
        .find_by_filter(&in_stock_recent)
        .await
        .context("in-stock books after 2010")?;
    utils::write_section(out, "In-stock books published after 2010", &books)?;
    report.in_stock_after_2010 = books.len();

    let projection =
        Projection::of([BookField::Title, BookField::Author, BookField::Price]).exclude_id();
    let books = facade
        .find_by_filter_projected(&in_stock_recent, &projection)
        .await
        .context("projected in-stock books")?;
    utils::write_section(out, "Projection: title, author, price", &books)?;
    report.projected = books.len();

    let ascending = facade
        .find_sorted(&BookFilter::all(), BookField::Price, SortDirection::Ascending)
        .await
        .context("books by price ascending")?;
    utils::write_section(out, "Books sorted by price ascending", &ascending)?;
    let descending = facade
        .find_sorted(&BookFilter::all(), BookField::Price, SortDirection::Descending)
        .await
        .context("books by price descending")?;
    utils::write_section(out, "Books sorted by price descending", &descending)?;
    report.sorted = descending.len();

    let page = facade
        .find_paginated(&BookFilter::all(), PAGE, PAGE_SIZE)
        .await
        .context("paginated books")?;
    utils::write_section(out, &format!("Page {PAGE} ({PAGE_SIZE} per page)"), &page)?;
    report.page_two = page.len();

    report.genre_averages = facade
        .average_price_by_genre()
        .await
        .context("average price by genre")?;
    utils::write_section(out, "Average price by genre", &report.genre_averages)?;

    report.top_author = facade
        .top_authors(1)
        .await
        .context("author with most books")?
        .into_iter()
        .next();
    utils::write_section(out, "Author with most books", &report.top_author)?;

    report.decades = facade.books_by_decade().await.context("books by decade")?;
    utils::write_section(out, "Books grouped by decade", &report.decades)?;

    for keys in super::index_keys() {
        let name = facade
            .ensure_index(&keys)
            .await
            .with_context(|| format!("create index on {:?}", keys))?;
        report.indexes.push(name);
    }
    utils::write_section(out, "Indexes created", &report.indexes)?;

    let book_a = BookFilter::all().eq(BookField::Title, "Book A");
    report.explain = facade.explain(&book_a).await.context("explain title lookup")?;
    utils::write_section(out, "Execution stats for finding Book A", &report.explain)?;

    tracing::info!(
        module = "books",
        fiction = report.fiction,
        updated = report.price_updated,
        deleted = report.deleted,
        "tour complete"
    );

    Ok(report)
}
