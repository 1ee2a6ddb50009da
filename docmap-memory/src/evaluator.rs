//! Query document evaluation for in-memory filtering.
//!
//! This module interprets compiled query documents against stored documents, covering
//! the subset of the MongoDB query language that criteria produce plus the common
//! comparison, membership and logical operators.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docmap_core::error::{MappingError, MappingResult};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `Int32(1)`, `Int64(1)` and
/// `Double(1.0)` compare equal, the way the server compares them.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Values with no meaningful ordering or equality here, such as binary data
    Opaque,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect::<Vec<_>>()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>(),
            ),
            _ => Comparable::Opaque,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Evaluates query documents against one stored document.
pub(crate) struct QueryEvaluator<'a> {
    document: &'a Document,
}

impl<'a> QueryEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` if the document satisfies every condition in `query`.
    pub fn matches(&self, query: &Document) -> MappingResult<bool> {
        for (key, condition) in query {
            let matched = match key.as_str() {
                "$and" => self.all(condition)?,
                "$or" => self.any(condition)?,
                "$nor" => !self.any(condition)?,
                op if op.starts_with('$') => return Err(unsupported(op)),
                path => self.field_matches(path, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        query: &Document,
    ) -> MappingResult<Vec<&'a Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if QueryEvaluator::new(document).matches(query)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn all(&self, conditions: &Bson) -> MappingResult<bool> {
        for query in subqueries(conditions)? {
            if !self.matches(query)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any(&self, conditions: &Bson) -> MappingResult<bool> {
        for query in subqueries(conditions)? {
            if self.matches(query)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn field_matches(&self, path: &str, condition: &Bson) -> MappingResult<bool> {
        let mut values = Vec::new();
        if let Some((head, rest)) = split_path(path)
            && let Some(value) = self.document.get(head)
        {
            collect(value, rest, &mut values);
        }

        match condition {
            Bson::Document(operators) if is_operator_document(operators) => {
                for (op, operand) in operators {
                    if !apply(op, &values, operand)? {
                        return Ok(false);
                    }
                }

                Ok(true)
            }
            other => Ok(equals(&values, other)),
        }
    }
}

fn apply(op: &str, values: &[&Bson], operand: &Bson) -> MappingResult<bool> {
    match op {
        "$eq" => Ok(equals(values, operand)),
        "$ne" => Ok(!equals(values, operand)),
        "$gt" => Ok(compares(values, operand, |o| o == Ordering::Greater)),
        "$gte" => Ok(compares(values, operand, |o| o != Ordering::Less)),
        "$lt" => Ok(compares(values, operand, |o| o == Ordering::Less)),
        "$lte" => Ok(compares(values, operand, |o| o != Ordering::Greater)),
        "$in" => Ok(members(op, operand)?.iter().any(|item| equals(values, item))),
        "$nin" => Ok(!members(op, operand)?.iter().any(|item| equals(values, item))),
        "$exists" => Ok(values.is_empty() != truthy(operand)),
        other => Err(unsupported(other)),
    }
}

fn split_path(path: &str) -> Option<(&str, &str)> {
    match path.split_once('.') {
        Some((head, rest)) => Some((head, rest)),
        None if path.is_empty() => None,
        None => Some((path, "")),
    }
}

/// Resolves the rest of a dotted path below `value`.
///
/// Numeric segments index into arrays; other segments fan out over the documents in an
/// array, so `lines.sku` reaches the `sku` of every line.
fn collect<'d>(value: &'d Bson, rest: &str, out: &mut Vec<&'d Bson>) {
    let Some((segment, rest)) = split_path(rest) else {
        out.push(value);
        return;
    };

    match value {
        Bson::Document(nested) => {
            if let Some(child) = nested.get(segment) {
                collect(child, rest, out);
            }
        }
        Bson::Array(items) => match segment.parse::<usize>() {
            Ok(index) => {
                if let Some(item) = items.get(index) {
                    collect(item, rest, out);
                }
            }
            Err(_) => {
                for item in items.iter().filter(|item| matches!(item, Bson::Document(_))) {
                    collect(item, &join(segment, rest), out);
                }
            }
        },
        _ => {}
    }
}

fn join(segment: &str, rest: &str) -> String {
    if rest.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", segment, rest)
    }
}

/// Server-style equality: a missing field equals `null`, and an array field matches
/// when the whole array or any of its elements equals the operand.
fn equals(values: &[&Bson], operand: &Bson) -> bool {
    let expected = Comparable::from(operand);

    if values.is_empty() {
        return expected == Comparable::Null;
    }

    values.iter().any(|value| match value {
        Bson::Array(items) if !matches!(operand, Bson::Array(_)) => {
            items.iter().any(|item| Comparable::from(item) == expected)
        }
        value => Comparable::from(*value) == expected,
    })
}

fn compares(values: &[&Bson], operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let bound = Comparable::from(operand);
    let check = |item: &Bson| {
        Comparable::from(item)
            .partial_cmp(&bound)
            .is_some_and(&accept)
    };

    values.iter().any(|value| match value {
        Bson::Array(items) => items.iter().any(&check),
        value => check(*value),
    })
}

fn members<'o>(op: &str, operand: &'o Bson) -> MappingResult<&'o [Bson]> {
    operand
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| MappingError::Executor(format!("{} needs an array operand", op)))
}

fn subqueries(conditions: &Bson) -> MappingResult<Vec<&Document>> {
    conditions
        .as_array()
        .ok_or_else(|| MappingError::Executor("Logical operators need an array of queries".to_string()))?
        .iter()
        .map(|query| {
            query
                .as_document()
                .ok_or_else(|| MappingError::Executor("Logical operator clauses must be documents".to_string()))
        })
        .collect()
}

fn truthy(operand: &Bson) -> bool {
    match operand {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

/// A condition is an operator document only when every key is an operator; mixed
/// documents are compared as literals.
fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

fn unsupported(op: &str) -> MappingError {
    MappingError::Executor(format!("Unsupported query operator {}", op))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn matches(document: Document, query: Document) -> bool {
        QueryEvaluator::new(&document).matches(&query).unwrap()
    }

    #[test]
    fn implicit_equality_normalizes_numbers() {
        assert!(matches(doc! { "age": 30 }, doc! { "age": 30_i64 }));
        assert!(matches(doc! { "age": 30.0 }, doc! { "age": 30 }));
        assert!(!matches(doc! { "age": 31 }, doc! { "age": 30 }));
    }

    #[test]
    fn missing_field_equals_null() {
        assert!(matches(doc! {}, doc! { "deleted": null }));
        assert!(!matches(doc! {}, doc! { "deleted": true }));
    }

    #[test]
    fn half_open_range() {
        let query = doc! { "at": { "$gte": 10, "$lt": 20 } };

        assert!(matches(doc! { "at": 10 }, query.clone()));
        assert!(matches(doc! { "at": 19_i64 }, query.clone()));
        assert!(!matches(doc! { "at": 20 }, query.clone()));
        assert!(!matches(doc! { "name": "x" }, query));
    }

    #[test]
    fn dotted_paths_and_array_membership() {
        let document = doc! {
            "owner": { "name": "Alice" },
            "tags": ["red", "blue"],
            "lines": [{ "sku": "a" }, { "sku": "b" }],
        };

        assert!(matches(document.clone(), doc! { "owner.name": "Alice" }));
        assert!(matches(document.clone(), doc! { "tags": "blue" }));
        assert!(matches(document.clone(), doc! { "lines.1.sku": "b" }));
        assert!(!matches(document, doc! { "tags": "green" }));
    }

    #[test]
    fn membership_and_existence_operators() {
        let document = doc! { "status": "open", "rank": 3 };

        assert!(matches(document.clone(), doc! { "status": { "$in": ["open", "new"] } }));
        assert!(matches(document.clone(), doc! { "status": { "$nin": ["closed"] } }));
        assert!(matches(document.clone(), doc! { "rank": { "$ne": 4 } }));
        assert!(matches(document.clone(), doc! { "rank": { "$exists": true } }));
        assert!(matches(document, doc! { "owner": { "$exists": false } }));
    }

    #[test]
    fn logical_operators() {
        let document = doc! { "status": "open", "rank": 3 };

        assert!(matches(
            document.clone(),
            doc! { "$or": [{ "status": "closed" }, { "rank": { "$gt": 2 } }] }
        ));
        assert!(!matches(
            document,
            doc! { "$and": [{ "status": "open" }, { "rank": { "$lte": 2 } }] }
        ));
    }

    #[test]
    fn unsupported_operator_is_an_error() {
        let document = doc! { "name": "Alice" };

        assert!(matches!(
            QueryEvaluator::new(&document).matches(&doc! { "name": { "$regex": "^A" } }),
            Err(MappingError::Executor(_))
        ));
        assert!(QueryEvaluator::new(&document)
            .matches(&doc! { "name": { "$in": "Alice" } })
            .is_err());
    }

    #[test]
    fn mixed_key_documents_compare_as_literals() {
        let document = doc! { "range": { "$gte": 1, "x": 2 } };

        assert!(matches(document.clone(), doc! { "range": { "$gte": 1, "x": 2 } }));
        assert!(!matches(document, doc! { "range": { "$gte": 1, "x": 3 } }));
    }
}
