//! Filter evaluation for in-memory documents.
//!
//! Filters use the familiar document-database shape: `{ field: literal }` for equality,
//! `{ field: { $op: operand } }` for operators and `$and` / `$or` / `$nor` at the top level.
//! Field names may be dotted paths into nested documents and arrays.

use std::cmp::Ordering;

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docgate_core::error::{DocumentStoreError, DocumentStoreResult};

/// Comparable view of a BSON value.
///
/// Numeric types are normalized to `f64`. Values of different kinds never compare as
/// ordered; [`Comparable::total_cmp`] falls back to a fixed kind order for sorting.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(Vec<(&'a str, Comparable<'a>)>),
    /// Binary and the remaining BSON types, compared by value only.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl Comparable<'_> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Other(_) => 6,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
        }
    }

    /// Orders any two values: first by kind, then by value.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Comparable::Array(a), Comparable::Array(b)) => lexicographic(a.iter(), b.iter()),
            (Comparable::Map(a), Comparable::Map(b)) => {
                lexicographic(a.iter().map(|(_, v)| v), b.iter().map(|(_, v)| v))
            }
            // NaN sorts below every other number.
            (Comparable::Number(a), Comparable::Number(b)) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            },
            _ => self
                .rank()
                .cmp(&other.rank())
                .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal)),
        }
    }
}

fn lexicographic<'a, 'b: 'a>(
    mut left: impl Iterator<Item = &'a Comparable<'b>>,
    mut right: impl Iterator<Item = &'a Comparable<'b>>,
) -> Ordering {
    loop {
        match (left.next(), right.next()) {
            (Some(a), Some(b)) => match a.total_cmp(b) {
                Ordering::Equal => continue,
                ordering => return ordering,
            },
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
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
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
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

/// Resolves a dotted path. Numeric segments index into arrays.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(child) => child.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Evaluates filters against a single document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns whether the document satisfies every clause of `filter`.
    pub fn matches(&self, filter: &Document) -> DocumentStoreResult<bool> {
        for (key, condition) in filter {
            if !self.clause(key, condition)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Keeps the documents matching `filter`, preserving order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();
        for document in documents {
            if DocumentEvaluator::new(document).matches(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn clause(&self, key: &str, condition: &Bson) -> DocumentStoreResult<bool> {
        match key {
            "$and" => {
                for filter in subfilters(key, condition)? {
                    if !self.matches(filter)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            "$or" => {
                for filter in subfilters(key, condition)? {
                    if self.matches(filter)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            "$nor" => {
                for filter in subfilters(key, condition)? {
                    if self.matches(filter)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            operator if operator.starts_with('$') => Err(DocumentStoreError::InvalidDocument(
                format!("unsupported top-level operator {operator}"),
            )),
            path => field_matches(lookup(self.document, path), condition),
        }
    }
}

fn subfilters<'b>(operator: &str, condition: &'b Bson) -> DocumentStoreResult<Vec<&'b Document>> {
    let invalid = || DocumentStoreError::InvalidDocument(format!("{operator} expects an array of documents"));

    condition
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|item| item.as_document().ok_or_else(invalid))
        .collect()
}

pub(crate) fn is_operator_document(document: &Document) -> bool {
    document.keys().next().is_some_and(|key| key.starts_with('$'))
}

fn field_matches(value: Option<&Bson>, condition: &Bson) -> DocumentStoreResult<bool> {
    match condition {
        Bson::Document(operators) if is_operator_document(operators) => {
            for (operator, operand) in operators {
                if !operator_matches(value, operator, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        literal => Ok(equals(value, literal)),
    }
}

fn operator_matches(value: Option<&Bson>, operator: &str, operand: &Bson) -> DocumentStoreResult<bool> {
    Ok(match operator {
        "$eq" => equals(value, operand),
        "$ne" => !equals(value, operand),
        "$gt" => compare(value, operand, |ordering| ordering == Ordering::Greater),
        "$gte" => compare(value, operand, |ordering| ordering != Ordering::Less),
        "$lt" => compare(value, operand, |ordering| ordering == Ordering::Less),
        "$lte" => compare(value, operand, |ordering| ordering != Ordering::Greater),
        "$in" => any_of(value, operator, operand)?,
        "$nin" => !any_of(value, operator, operand)?,
        "$exists" => value.is_some() == truthy(operand),
        "$not" => match operand {
            Bson::Document(_) => !field_matches(value, operand)?,
            _ => {
                return Err(DocumentStoreError::InvalidDocument(
                    "$not expects an operator document".into(),
                ));
            }
        },
        other => {
            return Err(DocumentStoreError::InvalidDocument(format!(
                "unsupported query operator {other}"
            )));
        }
    })
}

/// Equality with array membership: an array field matches an operand equal to any of
/// its elements. A missing field equals `null`.
fn equals(value: Option<&Bson>, operand: &Bson) -> bool {
    let expected = Comparable::from(operand);

    match value {
        None => expected == Comparable::Null,
        Some(array @ Bson::Array(items)) => {
            Comparable::from(array) == expected
                || items.iter().any(|item| Comparable::from(item) == expected)
        }
        Some(value) => Comparable::from(value) == expected,
    }
}

fn compare(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let bound = Comparable::from(operand);
    let ordered = |item: &Bson| {
        Comparable::from(item)
            .partial_cmp(&bound)
            .is_some_and(&accept)
    };

    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(ordered),
        Some(value) => ordered(value),
    }
}

fn any_of(value: Option<&Bson>, operator: &str, operand: &Bson) -> DocumentStoreResult<bool> {
    let candidates = operand.as_array().ok_or_else(|| {
        DocumentStoreError::InvalidDocument(format!("{operator} expects an array"))
    })?;

    Ok(candidates.iter().any(|candidate| equals(value, candidate)))
}

pub(crate) fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(value) => *value,
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Double(value) => *value != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}
