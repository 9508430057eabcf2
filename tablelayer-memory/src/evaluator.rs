//! Selector evaluation and row ordering for in-memory tables.
//!
//! Selectors use the MongoDB document form: `{field: value}` for equality, or
//! `{field: {$op: operand}}` with `$eq`, `$ne`, `$gt`, `$gte`, `$lt`, `$lte`, `$in`, `$nin` and
//! `$exists`. Top-level `$and`, `$or` and `$nor` take arrays of selectors. Field names may be
//! dotted paths into nested documents.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, DateTime, Document};

use tablelayer_core::{
    error::{DatabaseError, DatabaseResult},
    query::{Sort, SortDirection},
};

/// Type-erased, comparable representation of BSON values.
///
/// Numbers of every width compare as `f64`. Values without an ordering (ObjectId, binary,
/// decimal and the like) only compare equal to an identical value.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            Bson::Null | Bson::Undefined => Comparable::Null,
            other => Comparable::Other(other),
        }
    }
}

impl<'a> Comparable<'a> {
    fn of(value: Option<&'a Bson>) -> Self {
        value.map(Comparable::from).unwrap_or(Comparable::Null)
    }

    /// Rank of the value's type, so values of different types still sort deterministically.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Bool(_) => 5,
            Comparable::DateTime(_) => 6,
            Comparable::Other(_) => 7,
        }
    }

    fn sort_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
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
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Reads a possibly dotted field path.
pub(crate) fn lookup<'a>(row: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = row.get(parts.next()?)?;

    for part in parts {
        current = current.as_document()?.get(part)?;
    }

    Some(current)
}

pub(crate) struct SelectorEvaluator<'a> {
    row: &'a Document,
}

impl<'a> SelectorEvaluator<'a> {
    pub fn new(row: &'a Document) -> Self {
        Self { row }
    }

    pub fn matches(&self, selector: &Document) -> DatabaseResult<bool> {
        for (key, condition) in selector {
            let matched = match key.as_str() {
                "$and" => self.all(branches(key, condition)?)?,
                "$or" => self.any(branches(key, condition)?)?,
                "$nor" => !self.any(branches(key, condition)?)?,
                _ => self.field_matches(key, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn all(&self, selectors: Vec<&Document>) -> DatabaseResult<bool> {
        for selector in selectors {
            if !self.matches(selector)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn any(&self, selectors: Vec<&Document>) -> DatabaseResult<bool> {
        for selector in selectors {
            if self.matches(selector)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn field_matches(&self, field: &str, condition: &Bson) -> DatabaseResult<bool> {
        let value = lookup(self.row, field);

        match condition {
            Bson::Document(ops) if is_operator_document(ops) => {
                for (op, operand) in ops {
                    if !apply(op, value, operand)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            expected => Ok(equals(value, expected)),
        }
    }

    /// Keeps the rows matching `selector`. `None` keeps every row.
    pub fn filter_rows(
        rows: impl IntoIterator<Item = &'a Document>,
        selector: Option<&Document>,
    ) -> DatabaseResult<Vec<&'a Document>> {
        let mut matched = Vec::new();

        for row in rows {
            let keep = match selector {
                Some(selector) => SelectorEvaluator::new(row).matches(selector)?,
                None => true,
            };
            if keep {
                matched.push(row);
            }
        }

        Ok(matched)
    }
}

pub(crate) fn is_operator_document(document: &Document) -> bool {
    document.keys().next().is_some_and(|key| key.starts_with('$'))
}

fn branches<'b>(key: &str, condition: &'b Bson) -> DatabaseResult<Vec<&'b Document>> {
    match condition {
        Bson::Array(items) => items
            .iter()
            .map(|item| {
                item.as_document().ok_or_else(|| {
                    DatabaseError::InvalidDocument(format!("{key} expects an array of selectors"))
                })
            })
            .collect(),
        _ => Err(DatabaseError::InvalidDocument(format!("{key} expects an array"))),
    }
}

/// Equality as MongoDB defines it: a missing field equals `null`, and an array field equals any
/// of its items.
fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
    let expected = Comparable::from(expected);

    match Comparable::of(value) {
        Comparable::Array(items) if !matches!(expected, Comparable::Array(_)) => {
            items.iter().any(|item| *item == expected)
        }
        actual => actual == expected,
    }
}

fn apply(op: &str, value: Option<&Bson>, operand: &Bson) -> DatabaseResult<bool> {
    let ordered = |accept: fn(Ordering) -> bool| {
        value
            .and_then(|value| Comparable::from(value).partial_cmp(&Comparable::from(operand)))
            .is_some_and(accept)
    };

    Ok(match op {
        "$eq" => equals(value, operand),
        "$ne" => !equals(value, operand),
        "$gt" => ordered(Ordering::is_gt),
        "$gte" => ordered(Ordering::is_ge),
        "$lt" => ordered(Ordering::is_lt),
        "$lte" => ordered(Ordering::is_le),
        "$in" => candidates(op, operand)?.iter().any(|item| equals(value, item)),
        "$nin" => !candidates(op, operand)?.iter().any(|item| equals(value, item)),
        "$exists" => value.is_some() == !matches!(operand, Bson::Boolean(false) | Bson::Null),
        _ => {
            return Err(DatabaseError::InvalidDocument(format!(
                "unsupported selector operator {op}"
            )));
        }
    })
}

fn candidates<'b>(op: &str, operand: &'b Bson) -> DatabaseResult<&'b Vec<Bson>> {
    operand
        .as_array()
        .ok_or_else(|| DatabaseError::InvalidDocument(format!("{op} expects an array")))
}

/// Orders two rows by a list of sort keys.
pub(crate) fn compare_rows(a: &Document, b: &Document, sort: &[Sort]) -> Ordering {
    for key in sort {
        let left = Comparable::of(lookup(a, &key.field));
        let right = Comparable::of(lookup(b, &key.field));

        let ordering = match key.direction {
            SortDirection::Asc => left.sort_cmp(&right),
            SortDirection::Desc => right.sort_cmp(&left),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use bson::{doc, oid::ObjectId};

    use super::*;

    fn matches(row: &Document, selector: Document) -> bool {
        SelectorEvaluator::new(row).matches(&selector).unwrap()
    }

    #[test]
    fn equality_and_operators() {
        let row = doc! { "name": "Alice", "age": 30, "tags": ["a", "b"], "address": { "city": "Oslo" } };

        assert!(matches(&row, doc! { "name": "Alice" }));
        assert!(matches(&row, doc! { "age": 30.0 }));
        assert!(matches(&row, doc! { "tags": "b" }));
        assert!(matches(&row, doc! { "address.city": "Oslo" }));
        assert!(matches(&row, doc! { "missing": null }));
        assert!(!matches(&row, doc! { "name": "Bob" }));

        assert!(matches(&row, doc! { "age": { "$gte": 30, "$lt": 31 } }));
        assert!(!matches(&row, doc! { "age": { "$gt": 30 } }));
        assert!(matches(&row, doc! { "name": { "$in": ["Bob", "Alice"] } }));
        assert!(matches(&row, doc! { "name": { "$nin": ["Bob"] } }));
        assert!(matches(&row, doc! { "name": { "$ne": "Bob" } }));
        assert!(matches(&row, doc! { "email": { "$exists": false } }));
        assert!(!matches(&row, doc! { "name": { "$exists": false } }));
    }

    #[test]
    fn unordered_values_match_exactly() {
        let id = ObjectId::new();
        let rows = [doc! { "ref": id }, doc! { "ref": ObjectId::new() }, doc! { "n": 2 }];

        let matched = SelectorEvaluator::filter_rows(&rows, Some(&doc! { "ref": ObjectId::new() })).unwrap();
        assert!(matched.is_empty());

        let matched = SelectorEvaluator::filter_rows(&rows, Some(&doc! { "ref": id })).unwrap();
        assert_eq!(matched, vec![&rows[0]]);

        assert!(matches(&rows[2], doc! { "ref": null }));
        assert!(!matches(&rows[0], doc! { "ref": null }));
        assert!(matches(&rows[0], doc! { "ref": { "$in": [id] } }));
    }

    #[test]
    fn logical_operators() {
        let row = doc! { "a": 1, "b": 2 };

        assert!(matches(&row, doc! { "$or": [{ "a": 5 }, { "b": 2 }] }));
        assert!(!matches(&row, doc! { "$and": [{ "a": 1 }, { "b": 3 }] }));
        assert!(matches(&row, doc! { "$nor": [{ "a": 5 }] }));
    }

    #[test]
    fn unsupported_operators_are_errors() {
        let row = doc! { "a": 1 };
        assert!(SelectorEvaluator::new(&row).matches(&doc! { "a": { "$regex": "x" } }).is_err());
        assert!(SelectorEvaluator::new(&row).matches(&doc! { "$or": 1 }).is_err());
    }

    #[test]
    fn multi_key_ordering() {
        let mut rows = vec![
            doc! { "a": 1, "b": "x" },
            doc! { "a": 2, "b": "y" },
            doc! { "a": 1, "b": "z" },
            doc! { "b": "w" },
        ];

        rows.sort_by(|l, r| compare_rows(l, r, &[Sort::asc("a"), Sort::desc("b")]));

        let order = rows.iter().map(|row| row.get_str("b").unwrap()).collect::<Vec<_>>();
        assert_eq!(order, vec!["w", "z", "x", "y"]);
    }
}
