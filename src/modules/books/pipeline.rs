//! Aggregation pipelines over the book collection

use bson::{doc, Bson, Document};
use folio_db::{DbError, Result, SortDirection};

use super::filter::BookFilter;
use super::models::BookField;

/// How records are grouped.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    /// One group per distinct value of the field.
    Field(BookField),
    /// Numeric bucket: `floor(field / width) * width`, e.g. decades.
    Bucket { field: BookField, width: i64 },
    /// A single group holding every record.
    All,
}

/// Per-group value computed by a group stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulator {
    Average(BookField),
    Sum(BookField),
    Count,
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(BookFilter),
    Group {
        key: GroupKey,
        outputs: Vec<(String, Accumulator)>,
    },
    /// Sort on output names; `_id` is the group key.
    Sort(Vec<(String, SortDirection)>),
    Limit(u64),
}

/// An ordered sequence of stages, executed left to right.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: BookFilter) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    pub fn group<S: Into<String>>(
        mut self,
        key: GroupKey,
        outputs: impl IntoIterator<Item = (S, Accumulator)>,
    ) -> Self {
        self.stages.push(Stage::Group {
            key,
            outputs: outputs
                .into_iter()
                .map(|(name, acc)| (name.into(), acc))
                .collect(),
        });
        self
    }

    pub fn sort(mut self, key: impl Into<String>, direction: SortDirection) -> Self {
        self.stages.push(Stage::Sort(vec![(key.into(), direction)]));
        self
    }

    /// Sort on several keys; earlier keys take precedence.
    pub fn sort_by<S: Into<String>>(
        mut self,
        keys: impl IntoIterator<Item = (S, SortDirection)>,
    ) -> Self {
        self.stages.push(Stage::Sort(
            keys.into_iter()
                .map(|(key, direction)| (key.into(), direction))
                .collect(),
        ));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.stages.push(Stage::Limit(limit));
        self
    }

    /// Validate every stage and render the store pipeline.
    pub fn to_documents(&self) -> Result<Vec<Document>> {
        self.stages.iter().map(render_stage).collect()
    }
}

fn render_stage(stage: &Stage) -> Result<Document> {
    match stage {
        Stage::Match(filter) => {
            let filter = filter.to_document()?;
            Ok(doc! { "$match": filter })
        }
        Stage::Group { key, outputs } => {
            let mut group = Document::new();
            group.insert("_id", group_key(key)?);
            for (name, accumulator) in outputs {
                check_output_name(name)?;
                if group.contains_key(name) {
                    return Err(DbError::query(format!(
                        "group output '{name}' is defined twice"
                    )));
                }
                group.insert(name.clone(), accumulator_expression(*accumulator)?);
            }
            Ok(doc! { "$group": group })
        }
        Stage::Sort(keys) => {
            if keys.is_empty() {
                return Err(DbError::query("sort stage names no keys"));
            }
            let mut sort = Document::new();
            for (name, direction) in keys {
                if name != "_id" {
                    check_output_name(name)?;
                }
                sort.insert(name.clone(), direction.as_i32());
            }
            Ok(doc! { "$sort": sort })
        }
        Stage::Limit(0) => Err(DbError::query("limit must be positive")),
        Stage::Limit(limit) => {
            let limit = i64::try_from(*limit)
                .map_err(|_| DbError::query(format!("limit {limit} is too large")))?;
            Ok(doc! { "$limit": limit })
        }
    }
}

fn check_output_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "_id" || name.starts_with('$') || name.contains('.') {
        return Err(DbError::query(format!("invalid output name '{name}'")));
    }
    Ok(())
}

fn field_path(field: BookField) -> Bson {
    Bson::String(format!("${}", field.as_str()))
}

fn group_key(key: &GroupKey) -> Result<Bson> {
    match key {
        GroupKey::Field(field) => Ok(field_path(*field)),
        GroupKey::Bucket { field, width } => {
            if !field.is_numeric() {
                return Err(DbError::query(format!(
                    "cannot bucket non-numeric field '{field}'"
                )));
            }
            if *width <= 0 {
                return Err(DbError::query(format!(
                    "bucket width must be positive, got {width}"
                )));
            }
            Ok(Bson::Document(doc! {
                "$multiply": [
                    { "$floor": { "$divide": [field_path(*field), *width] } },
                    *width,
                ]
            }))
        }
        GroupKey::All => Ok(Bson::Null),
    }
}

fn accumulator_expression(accumulator: Accumulator) -> Result<Document> {
    match accumulator {
        Accumulator::Count => Ok(doc! { "$sum": 1 }),
        Accumulator::Average(field) | Accumulator::Sum(field) if !field.is_numeric() => Err(
            DbError::query(format!("cannot aggregate non-numeric field '{field}'")),
        ),
        Accumulator::Average(field) => Ok(doc! { "$avg": field_path(field) }),
        Accumulator::Sum(field) => Ok(doc! { "$sum": field_path(field) }),
    }
}

/// One output row of an aggregation: the group key plus named values.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub key: Bson,
    pub values: Document,
}

impl GroupRow {
    pub fn from_document(mut doc: Document) -> Self {
        let key = doc.remove("_id").unwrap_or(Bson::Null);
        Self { key, values: doc }
    }

    /// Group key as text, when it is a string.
    pub fn key_str(&self) -> Option<&str> {
        self.key.as_str()
    }

    /// Group key as a number, whatever its numeric width.
    pub fn key_number(&self) -> Option<f64> {
        number(&self.key)
    }

    /// Named output value as a number.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(number)
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
