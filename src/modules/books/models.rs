use bson::{oid::ObjectId, Bson, Document};
use folio_db::{DbError, Result};
use serde::Serialize;

/// A book record as stored in the collection.
///
/// Every field is optional: the collection schema is advisory and projected
/// reads only populate the requested fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Book {
    /// Store-assigned identifier; immutable after creation
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
}

impl Book {
    /// Decode a stored document one field at a time.
    ///
    /// Numeric fields accept any BSON number width. A value whose type does
    /// not fit its field is logged and left unset; the rest of the record
    /// is kept.
    pub fn from_document(doc: &Document) -> Self {
        let mut book = Self::default();

        for field in BookField::ALL {
            let value = match doc.get(field.as_str()) {
                None | Some(Bson::Null) => continue,
                Some(value) => value,
            };

            let decoded = match field {
                BookField::Id => value.as_object_id().map(|id| book.id = Some(id)),
                BookField::Title => text(value).map(|s| book.title = Some(s)),
                BookField::Author => text(value).map(|s| book.author = Some(s)),
                BookField::Genre => text(value).map(|s| book.genre = Some(s)),
                BookField::Publisher => text(value).map(|s| book.publisher = Some(s)),
                BookField::PublishedYear => integer(value).map(|n| book.published_year = Some(n)),
                BookField::Pages => integer(value).map(|n| book.pages = Some(n)),
                BookField::Price => number(value).map(|n| book.price = Some(n)),
                BookField::InStock => value.as_bool().map(|b| book.in_stock = Some(b)),
            };

            if decoded.is_none() {
                tracing::warn!(
                    module = "books",
                    id = ?doc.get("_id"),
                    field = %field,
                    %value,
                    "ignoring book field with unexpected type"
                );
            }
        }

        book
    }
}

fn text(value: &Bson) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn integer(value: &Bson) -> Option<i32> {
    match value {
        Bson::Int32(n) => Some(*n),
        Bson::Int64(n) => i32::try_from(*n).ok(),
        Bson::Double(n) if n.fract() == 0.0 && n.abs() <= f64::from(i32::MAX) => Some(*n as i32),
        _ => None,
    }
}

fn number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Value type a [`BookField`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Id,
    Text,
    Integer,
    Number,
    Flag,
}

/// Known fields of the book collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookField {
    Id,
    Title,
    Author,
    Genre,
    PublishedYear,
    Price,
    InStock,
    Pages,
    Publisher,
}

impl BookField {
    pub const ALL: [BookField; 9] = [
        BookField::Id,
        BookField::Title,
        BookField::Author,
        BookField::Genre,
        BookField::PublishedYear,
        BookField::Price,
        BookField::InStock,
        BookField::Pages,
        BookField::Publisher,
    ];

    /// Name of the field in stored documents.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Id => "_id",
            Self::Title => "title",
            Self::Author => "author",
            Self::Genre => "genre",
            Self::PublishedYear => "published_year",
            Self::Price => "price",
            Self::InStock => "in_stock",
            Self::Pages => "pages",
            Self::Publisher => "publisher",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Self::Id => FieldKind::Id,
            Self::Title | Self::Author | Self::Genre | Self::Publisher => FieldKind::Text,
            Self::PublishedYear | Self::Pages => FieldKind::Integer,
            Self::Price => FieldKind::Number,
            Self::InStock => FieldKind::Flag,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self.kind(), FieldKind::Integer | FieldKind::Number)
    }

    /// Parse a field by stored name; `id` and `_id` both name the identifier.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "id" => Some(Self::Id),
            other => Self::ALL.into_iter().find(|field| field.as_str() == other),
        }
    }
}

impl std::fmt::Display for BookField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookField {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| DbError::query(format!("unknown book field '{s}'")))
    }
}

/// A typed value compared against a [`BookField`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Id(ObjectId),
    Text(String),
    Integer(i64),
    Number(f64),
    Flag(bool),
}

impl FieldValue {
    /// Check this value can be stored in or compared against `field`.
    pub fn check(&self, field: BookField) -> Result<()> {
        let compatible = match (field.kind(), self) {
            (FieldKind::Id, Self::Id(_)) => true,
            (FieldKind::Text, Self::Text(_)) => true,
            (FieldKind::Integer, Self::Integer(_)) => true,
            (FieldKind::Number, Self::Integer(_)) => true,
            (FieldKind::Number, Self::Number(n)) => n.is_finite(),
            (FieldKind::Flag, Self::Flag(_)) => true,
            _ => false,
        };

        if compatible {
            Ok(())
        } else {
            Err(DbError::query(format!(
                "value {:?} is not valid for field '{}'",
                self, field
            )))
        }
    }

    pub fn to_bson(&self) -> Bson {
        match self {
            Self::Id(id) => Bson::ObjectId(*id),
            Self::Text(s) => Bson::String(s.clone()),
            Self::Integer(n) => match i32::try_from(*n) {
                Ok(small) => Bson::Int32(small),
                Err(_) => Bson::Int64(*n),
            },
            Self::Number(n) => Bson::Double(*n),
            Self::Flag(b) => Bson::Boolean(*b),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<ObjectId> for FieldValue {
    fn from(value: ObjectId) -> Self {
        Self::Id(value)
    }
}

/// A validated partial update: only known, mutable fields can be set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub genre: Option<String>,
    pub published_year: Option<i32>,
    pub price: Option<f64>,
    pub in_stock: Option<bool>,
    pub pages: Option<i32>,
    pub publisher: Option<String>,
}

impl BookUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn published_year(mut self, year: i32) -> Self {
        self.published_year = Some(year);
        self
    }

    pub fn price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn in_stock(mut self, in_stock: bool) -> Self {
        self.in_stock = Some(in_stock);
        self
    }

    pub fn pages(mut self, pages: i32) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Render as a `$set` update document, rejecting empty or invalid updates.
    pub fn to_update_document(&self) -> Result<Document> {
        if self.is_empty() {
            return Err(DbError::query("update sets no fields"));
        }
        if let Some(price) = self.price {
            if !price.is_finite() || price < 0.0 {
                return Err(DbError::query(format!(
                    "price must be a finite non-negative number, got {price}"
                )));
            }
        }
        if let Some(pages) = self.pages {
            if pages < 0 {
                return Err(DbError::query(format!(
                    "pages must not be negative, got {pages}"
                )));
            }
        }

        let mut set = Document::new();
        let mut put = |field: BookField, value: Option<Bson>| {
            if let Some(value) = value {
                set.insert(field.as_str(), value);
            }
        };
        put(BookField::Title, self.title.clone().map(Bson::String));
        put(BookField::Author, self.author.clone().map(Bson::String));
        put(BookField::Genre, self.genre.clone().map(Bson::String));
        put(BookField::PublishedYear, self.published_year.map(Bson::Int32));
        put(BookField::Price, self.price.map(Bson::Double));
        put(BookField::InStock, self.in_stock.map(Bson::Boolean));
        put(BookField::Pages, self.pages.map(Bson::Int32));
        put(BookField::Publisher, self.publisher.clone().map(Bson::String));

        let mut update = Document::new();
        update.insert("$set", set);
        Ok(update)
    }
}
