//! Typed filters, projections, and sorts over book fields

use bson::{Bson, Document};
use folio_db::{DbError, Result, SortDirection};

use super::models::{BookField, FieldValue};

/// Comparison applied by a single predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn operator(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Compare {
        field: BookField,
        op: Comparison,
        value: FieldValue,
    },
    OneOf {
        field: BookField,
        values: Vec<FieldValue>,
    },
}

/// A conjunction of field predicates. The empty filter matches every book.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    predicates: Vec<Predicate>,
}

impl BookFilter {
    /// Filter matching every book
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn compare(
        mut self,
        field: BookField,
        op: Comparison,
        value: impl Into<FieldValue>,
    ) -> Self {
        self.predicates.push(Predicate::Compare {
            field,
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: BookField, value: impl Into<FieldValue>) -> Self {
        self.compare(field, Comparison::Eq, value)
    }

    pub fn ne(self, field: BookField, value: impl Into<FieldValue>) -> Self {
        self.compare(field, Comparison::Ne, value)
    }

    pub fn gt(self, field: BookField, value: impl Into<FieldValue>) -> Self {
        self.compare(field, Comparison::Gt, value)
    }

    pub fn gte(self, field: BookField, value: impl Into<FieldValue>) -> Self {
        self.compare(field, Comparison::Gte, value)
    }

    pub fn lt(self, field: BookField, value: impl Into<FieldValue>) -> Self {
        self.compare(field, Comparison::Lt, value)
    }

    pub fn lte(self, field: BookField, value: impl Into<FieldValue>) -> Self {
        self.compare(field, Comparison::Lte, value)
    }

    /// Match when the field equals any of `values`.
    pub fn one_of<V: Into<FieldValue>>(
        mut self,
        field: BookField,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.predicates.push(Predicate::OneOf {
            field,
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Validate every predicate and render the store filter document.
    ///
    /// Predicates on the same field are merged into one operator document,
    /// e.g. `{ published_year: { $gt: 2010, $lte: 2020 } }`.
    pub fn to_document(&self) -> Result<Document> {
        let mut filter = Document::new();

        for predicate in &self.predicates {
            let (field, operator, operand) = match predicate {
                Predicate::Compare { field, op, value } => {
                    value.check(*field)?;
                    (*field, op.operator(), value.to_bson())
                }
                Predicate::OneOf { field, values } => {
                    let mut operands = Vec::with_capacity(values.len());
                    for value in values {
                        value.check(*field)?;
                        operands.push(value.to_bson());
                    }
                    (*field, "$in", Bson::Array(operands))
                }
            };

            let key = field.as_str();
            if !matches!(filter.get(key), Some(Bson::Document(_))) {
                filter.insert(key, Document::new());
            }
            let Some(Bson::Document(slot)) = filter.get_mut(key) else {
                return Err(DbError::query("filter construction failed"));
            };

            if slot.contains_key(operator) {
                return Err(DbError::query(format!(
                    "duplicate {operator} predicate on field '{field}'"
                )));
            }
            slot.insert(operator, operand);
        }

        Ok(filter)
    }
}

/// Fields to return from a projected find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<BookField>,
    include_id: bool,
}

impl Projection {
    pub fn of(fields: impl IntoIterator<Item = BookField>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
            include_id: true,
        }
    }

    /// Leave the identifier out of the returned records.
    pub fn exclude_id(mut self) -> Self {
        self.include_id = false;
        self
    }

    pub fn to_document(&self) -> Result<Document> {
        let fields: Vec<BookField> = self
            .fields
            .iter()
            .copied()
            .filter(|field| *field != BookField::Id)
            .collect();
        if fields.is_empty() {
            return Err(DbError::query("projection names no fields"));
        }

        let mut projection = Document::new();
        for field in fields {
            projection.insert(field.as_str(), 1);
        }
        if !self.include_id {
            projection.insert(BookField::Id.as_str(), 0);
        }
        Ok(projection)
    }
}

pub(crate) fn sort_document(keys: &[(BookField, SortDirection)]) -> Document {
    let mut sort = Document::new();
    for (field, direction) in keys {
        sort.insert(field.as_str(), direction.as_i32());
    }
    sort
}
