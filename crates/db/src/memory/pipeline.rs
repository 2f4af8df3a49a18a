//! Aggregation pipeline execution for the in-memory store

use bson::{Bson, Document};

use super::eval::{as_number, lookup, matches, sort_documents, values_equal};
use crate::error::{DbError, Result};

/// Run `pipeline` over `docs`, one stage at a time, left to right.
pub(crate) fn run(mut docs: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>> {
    for stage in pipeline {
        let (name, spec) = match (stage.len(), stage.iter().next()) {
            (1, Some(entry)) => entry,
            _ => {
                return Err(DbError::query(
                    "a pipeline stage must have exactly one field",
                ));
            }
        };

        docs = match name.as_str() {
            "$match" => {
                let filter = stage_document(name, spec)?;
                let mut kept = Vec::with_capacity(docs.len());
                for doc in docs {
                    if matches(&doc, filter)? {
                        kept.push(doc);
                    }
                }
                kept
            }
            "$group" => group(&docs, stage_document(name, spec)?)?,
            "$sort" => {
                sort_documents(&mut docs, stage_document(name, spec)?)?;
                docs
            }
            "$limit" => {
                let limit = stage_count(name, spec)?;
                if limit == 0 {
                    return Err(DbError::query("the limit must be positive"));
                }
                docs.truncate(limit);
                docs
            }
            other => {
                return Err(DbError::query(format!(
                    "unrecognized pipeline stage name: '{other}'"
                )));
            }
        };
    }

    Ok(docs)
}

fn stage_document<'a>(name: &str, spec: &'a Bson) -> Result<&'a Document> {
    match spec {
        Bson::Document(doc) => Ok(doc),
        _ => Err(DbError::query(format!(
            "the {name} stage specification must be an object"
        ))),
    }
}

fn stage_count(name: &str, spec: &Bson) -> Result<usize> {
    match as_number(spec) {
        Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
        _ => Err(DbError::query(format!(
            "{name} must be a non-negative integer"
        ))),
    }
}

enum Accumulator {
    Avg { total: f64, count: u64 },
    Sum { total: f64, integral: bool },
}

impl Accumulator {
    fn new(operator: &str) -> Result<Self> {
        match operator {
            "$avg" => Ok(Self::Avg {
                total: 0.0,
                count: 0,
            }),
            "$sum" => Ok(Self::Sum {
                total: 0.0,
                integral: true,
            }),
            other => Err(DbError::query(format!("unknown group operator '{other}'"))),
        }
    }

    fn push(&mut self, value: &Bson) {
        match self {
            Self::Avg { total, count } => {
                if let Some(n) = as_number(value) {
                    *total += n;
                    *count += 1;
                }
            }
            Self::Sum { total, integral } => {
                if let Some(n) = as_number(value) {
                    *total += n;
                    *integral &= !matches!(value, Bson::Double(_));
                }
            }
        }
    }

    fn finish(self) -> Bson {
        match self {
            Self::Avg { count: 0, .. } => Bson::Null,
            Self::Avg { total, count } => Bson::Double(total / count as f64),
            Self::Sum {
                total,
                integral: true,
            } => integral_number(total),
            Self::Sum { total, .. } => Bson::Double(total),
        }
    }
}

fn integral_number(value: f64) -> Bson {
    if value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX) {
        Bson::Int32(value as i32)
    } else {
        Bson::Int64(value as i64)
    }
}

fn group(docs: &[Document], spec: &Document) -> Result<Vec<Document>> {
    let key_expr = spec
        .get("_id")
        .ok_or_else(|| DbError::query("a group specification must include an _id"))?;

    let mut outputs = Vec::new();
    for (name, accumulator) in spec {
        if name == "_id" {
            continue;
        }
        let operator = match accumulator {
            Bson::Document(op) if op.len() == 1 => op.iter().next(),
            _ => None,
        };
        let Some((operator, operand)) = operator else {
            return Err(DbError::query(format!(
                "the field '{name}' must be an accumulator object"
            )));
        };
        Accumulator::new(operator)?;
        outputs.push((name.as_str(), operator.as_str(), operand));
    }

    let mut groups: Vec<(Bson, Vec<Accumulator>)> = Vec::new();
    for doc in docs {
        let key = evaluate(key_expr, doc)?;
        let slot = match groups.iter().position(|(existing, _)| values_equal(existing, &key)) {
            Some(slot) => slot,
            None => {
                let accumulators = outputs
                    .iter()
                    .map(|(_, operator, _)| Accumulator::new(operator))
                    .collect::<Result<Vec<_>>>()?;
                groups.push((key, accumulators));
                groups.len() - 1
            }
        };

        for ((_, _, operand), accumulator) in outputs.iter().zip(groups[slot].1.iter_mut()) {
            accumulator.push(&evaluate(operand, doc)?);
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, accumulators)| {
            let mut row = Document::new();
            row.insert("_id", key);
            for ((name, _, _), accumulator) in outputs.iter().zip(accumulators) {
                row.insert(*name, accumulator.finish());
            }
            row
        })
        .collect())
}

fn numeric_args(operator: &str, args: &Bson, doc: &Document) -> Result<Option<Vec<Bson>>> {
    let items = match args {
        Bson::Array(items) => items.clone(),
        single => vec![single.clone()],
    };

    let mut values = Vec::with_capacity(items.len());
    for item in &items {
        let value = evaluate(item, doc)?;
        if matches!(value, Bson::Null) {
            return Ok(None);
        }
        if as_number(&value).is_none() {
            return Err(DbError::query(format!(
                "{operator} only supports numeric types"
            )));
        }
        values.push(value);
    }
    Ok(Some(values))
}

/// Evaluate a group key or accumulator operand against one document.
fn evaluate(expr: &Bson, doc: &Document) -> Result<Bson> {
    match expr {
        Bson::String(path) if path.starts_with('$') => {
            Ok(lookup(doc, &path[1..]).cloned().unwrap_or(Bson::Null))
        }
        Bson::Document(spec) if spec.keys().next().is_some_and(|k| k.starts_with('$')) => {
            let (operator, args) = match (spec.len(), spec.iter().next()) {
                (1, Some(entry)) => entry,
                _ => {
                    return Err(DbError::query(
                        "an expression object must have exactly one field",
                    ));
                }
            };
            evaluate_operator(operator, args, doc)
        }
        literal => Ok(literal.clone()),
    }
}

fn evaluate_operator(operator: &str, args: &Bson, doc: &Document) -> Result<Bson> {
    let Some(values) = numeric_args(operator, args, doc)? else {
        return Ok(Bson::Null);
    };
    let numbers: Vec<f64> = values.iter().filter_map(as_number).collect();

    match operator {
        "$multiply" => {
            let integral = values
                .iter()
                .all(|v| matches!(v, Bson::Int32(_) | Bson::Int64(_)));
            let product: f64 = numbers.iter().product();
            if integral {
                Ok(Bson::Int64(product as i64))
            } else {
                Ok(Bson::Double(product))
            }
        }
        "$divide" => {
            let [dividend, divisor] = numbers[..] else {
                return Err(DbError::query("$divide takes exactly 2 arguments"));
            };
            if divisor == 0.0 {
                return Err(DbError::query("can't $divide by zero"));
            }
            Ok(Bson::Double(dividend / divisor))
        }
        "$floor" => {
            let [value] = numbers[..] else {
                return Err(DbError::query("$floor takes exactly 1 argument"));
            };
            match values.first() {
                Some(Bson::Double(_)) => Ok(Bson::Double(value.floor())),
                Some(other) => Ok(other.clone()),
                None => Ok(Bson::Null),
            }
        }
        other => Err(DbError::query(format!(
            "unrecognized expression '{other}'"
        ))),
    }
}
