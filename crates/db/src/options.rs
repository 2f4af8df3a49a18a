//! Request shapes shared by every store implementation

use bson::{doc, Document};

/// Sort direction for find sorts and index keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// Numeric form used in sort and index key documents.
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Ascending => 1,
            Self::Descending => -1,
        }
    }
}

/// Cursor options for a find call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub sort: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
    pub projection: Option<Document>,
}

impl FindSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }
}

/// Key specification for a single or compound index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    keys: Vec<(String, SortDirection)>,
}

impl IndexSpec {
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Append a key; order of calls is the key order of the index.
    pub fn key(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    pub fn keys(&self) -> &[(String, SortDirection)] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Key document, e.g. `{ author: 1, published_year: -1 }`.
    pub fn keys_document(&self) -> Document {
        let mut keys = Document::new();
        for (field, direction) in &self.keys {
            keys.insert(field.clone(), direction.as_i32());
        }
        keys
    }

    /// Server-style default name, e.g. `author_1_published_year_-1`.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|(field, direction)| format!("{}_{}", field, direction.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl Default for IndexSpec {
    fn default() -> Self {
        Self::new()
    }
}

/// The `_id` index every collection carries.
pub fn id_index_keys() -> Document {
    doc! { "_id": 1 }
}
