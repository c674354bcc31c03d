//! Update operators and upsert seeding.

use bson::{Bson, Document, doc, oid::ObjectId};

use docgate_core::error::{DocumentStoreError, DocumentStoreResult};

use crate::evaluator::is_operator_document;

/// Whether `update` is an operator update (`$set`, `$inc`, ...) rather than a replacement.
///
/// # Errors
///
/// Mixing operators and plain fields is rejected.
pub(crate) fn is_operator_update(update: &Document) -> DocumentStoreResult<bool> {
    let operators = update.keys().filter(|key| key.starts_with('$')).count();

    match operators {
        0 => Ok(false),
        n if n == update.len() => Ok(true),
        _ => Err(DocumentStoreError::InvalidDocument(
            "update document mixes operators and fields".into(),
        )),
    }
}

/// Applies `update` to `document`, returning whether anything changed.
///
/// The document is left untouched when the update fails.
pub(crate) fn apply(document: &mut Document, update: &Document) -> DocumentStoreResult<bool> {
    let mut updated = document.clone();

    if is_operator_update(update)? {
        for (operator, fields) in update {
            let fields = fields.as_document().ok_or_else(|| {
                DocumentStoreError::InvalidDocument(format!("{operator} expects a document"))
            })?;

            for (path, value) in fields {
                if path == "_id" {
                    return Err(DocumentStoreError::InvalidDocument("_id is immutable".into()));
                }
                match operator.as_str() {
                    "$set" => set_path(&mut updated, path, value.clone())?,
                    "$unset" => unset_path(&mut updated, path),
                    "$inc" => increment(&mut updated, path, value)?,
                    "$push" => push(&mut updated, path, value)?,
                    other => {
                        return Err(DocumentStoreError::InvalidDocument(format!(
                            "unsupported update operator {other}"
                        )));
                    }
                }
            }
        }
    } else {
        updated = replace(document, update)?;
    }

    let modified = updated != *document;
    *document = updated;

    Ok(modified)
}

/// Builds the document inserted by an upsert that matched nothing.
///
/// Equality clauses of the filter seed the document, then the update is applied on top.
pub(crate) fn upsert(filter: &Document, update: &Document) -> DocumentStoreResult<Document> {
    let mut seed = Document::new();

    if is_operator_update(update)? {
        for (path, condition) in filter {
            if path.starts_with('$') {
                continue;
            }
            match condition {
                Bson::Document(operators) if is_operator_document(operators) => {
                    if let Some(value) = operators.get("$eq") {
                        set_path(&mut seed, path, value.clone())?;
                    }
                }
                literal => set_path(&mut seed, path, literal.clone())?,
            }
        }
        apply(&mut seed, update)?;
    } else {
        seed = update.clone();
        if let Some(id) = filter.get("_id").filter(|id| !matches!(id, Bson::Document(_))) {
            seed.insert("_id", id.clone());
        }
    }

    Ok(with_id(seed))
}

/// Ensures `document` carries an `_id`, generating an `ObjectId` first in field order.
pub(crate) fn with_id(document: Document) -> Document {
    if document.contains_key("_id") {
        return document;
    }

    let mut identified = doc! { "_id": ObjectId::new() };
    for (key, value) in document {
        identified.insert(key, value);
    }

    identified
}

fn replace(document: &Document, replacement: &Document) -> DocumentStoreResult<Document> {
    let id = document.get("_id");
    if let (Some(current), Some(requested)) = (id, replacement.get("_id")) {
        if current != requested {
            return Err(DocumentStoreError::InvalidDocument("_id is immutable".into()));
        }
    }

    let mut replaced = Document::new();
    if let Some(id) = id {
        replaced.insert("_id", id.clone());
    }
    for (key, value) in replacement {
        if key != "_id" {
            replaced.insert(key.clone(), value.clone());
        }
    }

    Ok(replaced)
}

pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }
            match document.get_mut(head) {
                Some(Bson::Document(child)) => set_path(child, rest, value),
                _ => Err(DocumentStoreError::InvalidDocument(format!(
                    "cannot set {path}: {head} is not a document"
                ))),
            }
        }
    }
}

pub(crate) fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                unset_path(child, rest);
            }
        }
    }
}

fn field_mut<'a>(document: &'a mut Document, path: &str) -> Option<&'a mut Bson> {
    match path.split_once('.') {
        None => document.get_mut(path),
        Some((head, rest)) => match document.get_mut(head)? {
            Bson::Document(child) => field_mut(child, rest),
            _ => None,
        },
    }
}

fn increment(document: &mut Document, path: &str, amount: &Bson) -> DocumentStoreResult<()> {
    match field_mut(document, path) {
        Some(current) => {
            *current = add(current, amount).ok_or_else(|| {
                DocumentStoreError::InvalidDocument(format!("cannot apply $inc to field {path}: not a number or out of range"))
            })?;
            Ok(())
        }
        None if add(&Bson::Int32(0), amount).is_some() => set_path(document, path, amount.clone()),
        None => Err(DocumentStoreError::InvalidDocument("$inc expects a number".into())),
    }
}

fn add(left: &Bson, right: &Bson) -> Option<Bson> {
    Some(match (left, right) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(*a as i64 + *b as i64)),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64(b.checked_add(*a as i64)?),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.checked_add(*b as i64)?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b)?),
        (Bson::Double(a), b) => Bson::Double(a + as_f64(b)?),
        (a, Bson::Double(b)) => Bson::Double(as_f64(a)? + b),
        _ => return None,
    })
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn push(document: &mut Document, path: &str, value: &Bson) -> DocumentStoreResult<()> {
    match field_mut(document, path) {
        Some(Bson::Array(items)) => {
            items.push(value.clone());
            Ok(())
        }
        Some(_) => Err(DocumentStoreError::InvalidDocument(format!(
            "cannot apply $push to non-array field {path}"
        ))),
        None => set_path(document, path, Bson::Array(vec![value.clone()])),
    }
}
