//! Command-line access to the book collection.

use anyhow::{anyhow, bail, Context};
use bson::oid::ObjectId;
use clap::{Parser, Subcommand};
use folio_app::books::models::FieldKind;
use folio_app::books::{tour, BookFacade, BookField, BookFilter, BookUpdate, Comparison, FieldValue, Projection};
use folio_app::App;
use folio_db::SortDirection;
use folio_kernel::settings::Settings;
use serde::Serialize;

const DEFAULT_PAGE_SIZE: u64 = 5;

#[derive(Parser)]
#[command(name = "folio-cli")]
#[command(version)]
#[command(about = "Query and maintain the folio book collection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every query operation in sequence and print the results
    Tour,
    /// Find books matching conditions such as `genre=Fiction` or `published_year>2010`
    Find {
        #[arg(long = "where", value_name = "CONDITION")]
        conditions: Vec<String>,
        /// Sort by a field, e.g. `price` or `price:desc`
        #[arg(long, conflicts_with_all = ["page", "fields"])]
        sort: Option<String>,
        /// 1-based page number
        #[arg(long, conflicts_with = "fields")]
        page: Option<u64>,
        /// Books per page [default: 5]
        #[arg(long, requires = "page")]
        page_size: Option<u64>,
        /// Only return these fields (comma separated)
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        /// Keep `_id` alongside the projected fields
        #[arg(long, requires = "fields")]
        with_id: bool,
    },
    /// Set the price of the first book with the given title
    SetPrice { title: String, price: f64 },
    /// Delete the first book with the given title
    Delete { title: String },
    /// Grouped statistics
    Stats {
        #[command(subcommand)]
        report: StatsReport,
    },
    /// Ensure the standard indexes exist and list their names
    Indexes,
    /// Show execution statistics for a query
    Explain {
        #[arg(long = "where", value_name = "CONDITION")]
        conditions: Vec<String>,
    },
}

#[derive(Subcommand)]
enum StatsReport {
    /// Average price per genre
    GenrePrices,
    /// Authors with the most books
    TopAuthors {
        #[arg(long, default_value_t = 1)]
        limit: u64,
    },
    /// Number of books per publication decade
    Decades,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load folio settings")?;
    folio_telemetry::init(&settings.telemetry)?;

    let app = App::connect(settings).await?;
    let outcome = run(cli.command, app.books()).await;
    app.shutdown().await?;
    outcome
}

async fn run(command: Commands, books: &BookFacade) -> anyhow::Result<()> {
    match command {
        Commands::Tour => {
            tour::run(books, &mut std::io::stdout()).await?;
        }
        Commands::Find {
            conditions,
            sort,
            page,
            page_size,
            fields,
            with_id,
        } => {
            let filter = parse_filter(&conditions)?;
            let found = if let Some(sort) = sort {
                let (field, direction) = parse_sort(&sort)?;
                books.find_sorted(&filter, field, direction).await?
            } else if let Some(page) = page {
                let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
                books.find_paginated(&filter, page, page_size).await?
            } else if !fields.is_empty() {
                let fields = fields
                    .iter()
                    .map(|name| parse_field(name))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let projection = Projection::of(fields);
                let projection = if with_id {
                    projection
                } else {
                    projection.exclude_id()
                };
                books.find_by_filter_projected(&filter, &projection).await?
            } else {
                books.find_by_filter(&filter).await?
            };
            print_json(&found)?;
        }
        Commands::SetPrice { title, price } => {
            let filter = BookFilter::all().eq(BookField::Title, title);
            let modified = books
                .update_one(&filter, &BookUpdate::new().price(price))
                .await?;
            print_json(&serde_json::json!({ "modified": modified }))?;
        }
        Commands::Delete { title } => {
            let filter = BookFilter::all().eq(BookField::Title, title);
            let deleted = books.delete_one(&filter).await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
        Commands::Stats { report } => match report {
            StatsReport::GenrePrices => print_json(&books.average_price_by_genre().await?)?,
            StatsReport::TopAuthors { limit } => print_json(&books.top_authors(limit).await?)?,
            StatsReport::Decades => print_json(&books.books_by_decade().await?)?,
        },
        Commands::Indexes => {
            let mut names = Vec::new();
            for keys in folio_app::books::index_keys() {
                names.push(books.ensure_index(&keys).await?);
            }
            print_json(&names)?;
        }
        Commands::Explain { conditions } => {
            let stats = books.explain(&parse_filter(&conditions)?).await?;
            print_json(&stats)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_field(name: &str) -> anyhow::Result<BookField> {
    BookField::parse(name.trim()).ok_or_else(|| anyhow!("unknown book field '{name}'"))
}

/// `field` or `field:asc|desc`.
fn parse_sort(raw: &str) -> anyhow::Result<(BookField, SortDirection)> {
    let (name, direction) = match raw.split_once(':') {
        Some((name, "asc")) => (name, SortDirection::Ascending),
        Some((name, "desc")) => (name, SortDirection::Descending),
        Some((_, other)) => bail!("unknown sort direction '{other}', expected asc or desc"),
        None => (raw, SortDirection::Ascending),
    };
    Ok((parse_field(name)?, direction))
}

fn parse_filter(conditions: &[String]) -> anyhow::Result<BookFilter> {
    conditions.iter().try_fold(BookFilter::all(), |filter, raw| {
        let (field, op, value) = parse_condition(raw)?;
        Ok(filter.compare(field, op, value))
    })
}

/// Split `field<op>value`; the value is typed by the field.
fn parse_condition(raw: &str) -> anyhow::Result<(BookField, Comparison, FieldValue)> {
    const OPERATORS: [(&str, Comparison); 6] = [
        ("!=", Comparison::Ne),
        (">=", Comparison::Gte),
        ("<=", Comparison::Lte),
        ("=", Comparison::Eq),
        (">", Comparison::Gt),
        ("<", Comparison::Lt),
    ];

    let at = raw
        .find(['!', '>', '<', '='])
        .ok_or_else(|| anyhow!("condition '{raw}' has no operator"))?;
    let (name, rest) = raw.split_at(at);
    let (symbol, op) = OPERATORS
        .into_iter()
        .find(|(symbol, _)| rest.starts_with(symbol))
        .ok_or_else(|| anyhow!("condition '{raw}' has an unknown operator"))?;

    let field = parse_field(name)?;
    let text = rest[symbol.len()..].trim();
    let value = match field.kind() {
        FieldKind::Id => FieldValue::Id(
            ObjectId::parse_str(text).with_context(|| format!("invalid object id '{text}'"))?,
        ),
        FieldKind::Text => FieldValue::Text(text.to_string()),
        FieldKind::Integer => FieldValue::Integer(
            text.parse()
                .with_context(|| format!("'{field}' expects an integer, got '{text}'"))?,
        ),
        FieldKind::Number => FieldValue::Number(
            text.parse()
                .with_context(|| format!("'{field}' expects a number, got '{text}'"))?,
        ),
        FieldKind::Flag => FieldValue::Flag(
            text.parse()
                .with_context(|| format!("'{field}' expects true or false, got '{text}'"))?,
        ),
    };

    Ok((field, op, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_are_typed_by_field() {
        let (field, op, value) = parse_condition("published_year>=2010").unwrap();
        assert_eq!(field, BookField::PublishedYear);
        assert_eq!(op, Comparison::Gte);
        assert_eq!(value, FieldValue::Integer(2010));

        let (_, op, value) = parse_condition("in_stock!=false").unwrap();
        assert_eq!(op, Comparison::Ne);
        assert_eq!(value, FieldValue::Flag(false));

        let (_, op, value) = parse_condition("genre=Science Fiction").unwrap();
        assert_eq!(op, Comparison::Eq);
        assert_eq!(value, FieldValue::Text("Science Fiction".to_string()));
    }

    #[test]
    fn bad_conditions_are_rejected() {
        assert!(parse_condition("genre").is_err());
        assert!(parse_condition("colour=red").is_err());
        assert!(parse_condition("price<cheap").is_err());
    }

    #[test]
    fn sort_direction_defaults_to_ascending() {
        assert_eq!(
            parse_sort("price").unwrap(),
            (BookField::Price, SortDirection::Ascending)
        );
        assert_eq!(
            parse_sort("published_year:desc").unwrap(),
            (BookField::PublishedYear, SortDirection::Descending)
        );
        assert!(parse_sort("price:sideways").is_err());
    }

    #[test]
    fn page_size_and_with_id_need_their_companions() {
        assert!(Cli::try_parse_from(["folio-cli", "find", "--page-size", "3"]).is_err());
        assert!(Cli::try_parse_from(["folio-cli", "find", "--with-id"]).is_err());

        let cli = Cli::try_parse_from([
            "folio-cli", "find", "--fields", "title,price", "--with-id",
        ])
        .unwrap();
        let Commands::Find { fields, with_id, page_size, .. } = cli.command else {
            panic!("expected find");
        };
        assert_eq!(fields, vec!["title", "price"]);
        assert!(with_id);
        assert_eq!(page_size, None);

        let cli = Cli::try_parse_from(["folio-cli", "find", "--page", "2", "--page-size", "3"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Find { page: Some(2), page_size: Some(3), .. }
        ));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
