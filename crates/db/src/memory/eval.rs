//! Filter, projection, sort, and update evaluation over BSON documents

use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::error::{DbError, Result};

/// Resolve a dotted field path against a document.
pub(crate) fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

pub(crate) fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

/// Canonical cross-type ordering: null, numbers, strings, objects, arrays,
/// ids, booleans, dates.
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        _ => 12,
    }
}

/// Total order used for sorting.
pub(crate) fn compare(a: &Bson, b: &Bson) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Bson::String(a), Bson::String(b)) => a.cmp(b),
        (Bson::Boolean(a), Bson::Boolean(b)) => a.cmp(b),
        (Bson::ObjectId(a), Bson::ObjectId(b)) => a.cmp(b),
        (Bson::DateTime(a), Bson::DateTime(b)) => a.cmp(b),
        _ => match (as_number(a), as_number(b)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

pub(crate) fn compare_optional(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    compare(a.unwrap_or(&Bson::Null), b.unwrap_or(&Bson::Null))
}

pub(crate) fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// Evaluate a filter document (implicit conjunction of its keys).
pub(crate) fn matches(doc: &Document, filter: &Document) -> Result<bool> {
    for (key, condition) in filter {
        if key.starts_with('$') {
            return Err(DbError::query(format!("unknown top level operator: {key}")));
        }
        if !field_matches(lookup(doc, key), condition)? {
            return Ok(false);
        }
    }

    Ok(true)
}

fn is_operator_document(condition: &Bson) -> Option<&Document> {
    match condition {
        Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => Some(ops),
        _ => None,
    }
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> Result<bool> {
    let Some(ops) = is_operator_document(condition) else {
        return Ok(equals(value, condition));
    };

    for (operator, operand) in ops {
        if !apply_operator(value, operator, operand)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn equals(value: Option<&Bson>, literal: &Bson) -> bool {
    match value {
        None => matches!(literal, Bson::Null),
        Some(Bson::Array(items)) if !matches!(literal, Bson::Array(_)) => {
            items.iter().any(|item| values_equal(item, literal))
        }
        Some(value) => values_equal(value, literal),
    }
}

fn ordered(value: Option<&Bson>, operand: &Bson) -> Option<Ordering> {
    let value = value?;
    if type_rank(value) != type_rank(operand) {
        return None;
    }
    Some(compare(value, operand))
}

fn apply_operator(value: Option<&Bson>, operator: &str, operand: &Bson) -> Result<bool> {
    let matched = match operator {
        "$eq" => equals(value, operand),
        "$ne" => !equals(value, operand),
        "$gt" => ordered(value, operand) == Some(Ordering::Greater),
        "$gte" => matches!(
            ordered(value, operand),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        "$lt" => ordered(value, operand) == Some(Ordering::Less),
        "$lte" => matches!(
            ordered(value, operand),
            Some(Ordering::Less | Ordering::Equal)
        ),
        "$in" => {
            let Bson::Array(candidates) = operand else {
                return Err(DbError::query("$in needs an array"));
            };
            candidates.iter().any(|candidate| equals(value, candidate))
        }
        other => {
            return Err(DbError::query(format!("unknown operator: {other}")));
        }
    };

    Ok(matched)
}

fn projection_flag(field: &str, flag: &Bson) -> Result<bool> {
    match flag {
        Bson::Boolean(b) => Ok(*b),
        other => as_number(other)
            .map(|n| n != 0.0)
            .ok_or_else(|| DbError::query(format!("invalid projection value for '{field}'"))),
    }
}

/// Apply an inclusion projection to one document; `_id` is kept unless
/// excluded with `_id: 0`.
pub(crate) fn project(doc: &Document, projection: &Document) -> Result<Document> {
    let mut include_id = true;
    let mut included = Vec::new();

    for (field, flag) in projection {
        let on = projection_flag(field, flag)?;
        if field == "_id" {
            include_id = on;
        } else if on {
            included.push(field.as_str());
        } else {
            return Err(DbError::query(format!(
                "exclusion of '{field}' is not supported; list the fields to include"
            )));
        }
    }

    let mut out = Document::new();
    if include_id {
        if let Some(id) = doc.get("_id") {
            out.insert("_id", id.clone());
        }
    }
    for field in included {
        if let Some(value) = doc.get(field) {
            out.insert(field, value.clone());
        }
    }
    Ok(out)
}

/// Stable multi-key sort; ties keep their current relative order.
pub(crate) fn sort_documents(docs: &mut [Document], sort: &Document) -> Result<()> {
    let mut keys = Vec::with_capacity(sort.len());
    for (field, direction) in sort {
        let descending = match as_number(direction) {
            Some(d) if d == 1.0 => false,
            Some(d) if d == -1.0 => true,
            _ => {
                return Err(DbError::query(format!(
                    "sort direction for '{field}' must be 1 or -1"
                )));
            }
        };
        keys.push((field.as_str(), descending));
    }

    docs.sort_by(|a, b| {
        for (field, descending) in &keys {
            let ord = compare_optional(lookup(a, field), lookup(b, field));
            let ord = if *descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    Ok(())
}

/// Apply a `$set` update to a document. The document is untouched on error.
pub(crate) fn apply_update(doc: &mut Document, update: &Document) -> Result<()> {
    if update.is_empty() {
        return Err(DbError::query("update document must not be empty"));
    }

    let mut updated = doc.clone();
    for (operator, fields) in update {
        if !operator.starts_with('$') {
            return Err(DbError::query(
                "update document must contain only update operators",
            ));
        }
        if operator != "$set" {
            return Err(DbError::query(format!("unsupported update operator: {operator}")));
        }
        let Bson::Document(fields) = fields else {
            return Err(DbError::query("$set requires a document"));
        };

        for (field, value) in fields {
            if field == "_id" {
                return Err(DbError::query("the _id field is immutable"));
            }
            updated.insert(field.clone(), value.clone());
        }
    }

    *doc = updated;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn book() -> Document {
        doc! {
            "title": "Book One",
            "genre": "Fiction",
            "published_year": 2021,
            "price": 12.5,
            "in_stock": true,
        }
    }

    #[test]
    fn equality_and_comparison_filters() {
        let doc = book();
        assert!(matches(&doc, &doc! { "genre": "Fiction" }).unwrap());
        assert!(matches(&doc, &doc! { "published_year": { "$gt": 2019 } }).unwrap());
        assert!(!matches(&doc, &doc! { "published_year": { "$lt": 2019 } }).unwrap());
        assert!(matches(&doc, &doc! { "price": { "$gte": 12, "$lte": 13.0 } }).unwrap());
        assert!(matches(&doc, &doc! { "in_stock": true, "genre": { "$in": ["Fiction", "Poetry"] } }).unwrap());
    }

    #[test]
    fn comparisons_do_not_cross_types() {
        let doc = book();
        assert!(!matches(&doc, &doc! { "title": { "$gt": 5 } }).unwrap());
        assert!(!matches(&doc, &doc! { "missing": { "$gt": 0 } }).unwrap());
    }

    #[test]
    fn missing_field_equals_null() {
        let doc = book();
        assert!(matches(&doc, &doc! { "publisher": Bson::Null }).unwrap());
        assert!(matches(&doc, &doc! { "publisher": { "$ne": "Riverside Press" } }).unwrap());
    }

    #[test]
    fn unknown_operator_is_a_query_error() {
        let err = matches(&book(), &doc! { "price": { "$near": 3 } }).unwrap_err();
        assert!(err.is_query());

        let err = matches(&book(), &doc! { "$or": [ { "genre": "Poetry" } ] }).unwrap_err();
        assert!(err.is_query());
    }

    #[test]
    fn inclusion_projection_keeps_id_unless_excluded() {
        let mut doc = book();
        doc.insert("_id", bson::oid::ObjectId::new());

        let with_id = project(&doc, &doc! { "title": 1 }).unwrap();
        assert!(with_id.contains_key("_id"));
        assert_eq!(with_id.len(), 2);

        let without_id = project(&doc, &doc! { "title": 1, "_id": 0 }).unwrap();
        assert_eq!(without_id, doc! { "title": "Book One" });
    }

    #[test]
    fn exclusion_projection_is_rejected() {
        let err = project(&book(), &doc! { "price": 0 }).unwrap_err();
        assert!(err.is_query());
    }

    #[test]
    fn sort_is_stable_and_orders_across_types() {
        let mut docs = vec![
            doc! { "n": 1, "price": 20 },
            doc! { "n": 2, "price": 10.0 },
            doc! { "n": 3, "price": 20.0 },
            doc! { "n": 4 },
        ];
        sort_documents(&mut docs, &doc! { "price": 1 }).unwrap();
        let order: Vec<i32> = docs.iter().map(|d| d.get_i32("n").unwrap()).collect();
        assert_eq!(order, vec![4, 2, 1, 3]);

        sort_documents(&mut docs, &doc! { "price": -1 }).unwrap();
        let order: Vec<i32> = docs.iter().map(|d| d.get_i32("n").unwrap()).collect();
        assert_eq!(order, vec![1, 3, 2, 4]);
    }

    #[test]
    fn set_update_and_rejected_update_leaves_document_unchanged() {
        let mut doc = book();
        apply_update(&mut doc, &doc! { "$set": { "price": 18 } }).unwrap();
        assert_eq!(doc.get("price"), Some(&Bson::Int32(18)));

        let before = doc.clone();
        let err = apply_update(&mut doc, &doc! { "$set": { "price": 1 }, "$inc": { "price": 1 } })
            .unwrap_err();
        assert!(err.is_query());
        assert_eq!(doc, before);
    }

    #[test]
    fn id_cannot_be_updated() {
        let mut doc = book();
        let err = apply_update(&mut doc, &doc! { "$set": { "_id": 1 } }).unwrap_err();
        assert!(err.is_query());
    }
}
