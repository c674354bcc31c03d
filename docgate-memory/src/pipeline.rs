//! Read-side document shaping: sort, skip/limit, projection and aggregation stages.

use std::cmp::Ordering;

use bson::{Bson, Document};

use docgate_core::{
    backend::FindSpec,
    error::{DocumentStoreError, DocumentStoreResult},
};

use crate::{
    evaluator::{Comparable, DocumentEvaluator, lookup, truthy},
    update::{set_path, unset_path},
};

/// Applies the read options of a `find` to already filtered documents.
pub(crate) fn shape(mut documents: Vec<Document>, spec: &FindSpec) -> DocumentStoreResult<Vec<Document>> {
    if let Some(sort) = &spec.sort {
        sort_documents(&mut documents, sort)?;
    }

    let documents = window(documents, spec.skip, spec.limit);

    match &spec.projection {
        Some(projection) => documents
            .iter()
            .map(|document| project(document, projection))
            .collect(),
        None => Ok(documents),
    }
}

/// Skips then limits. A limit of zero means no limit; a negative limit counts as its
/// absolute value.
pub(crate) fn window(documents: Vec<Document>, skip: Option<u64>, limit: Option<i64>) -> Vec<Document> {
    let skip = skip.and_then(|n| usize::try_from(n).ok()).unwrap_or(0);
    let limit = match limit.map(i64::unsigned_abs) {
        None | Some(0) => usize::MAX,
        Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
    };

    documents.into_iter().skip(skip).take(limit).collect()
}

/// Sorts by each key of `sort` in turn; `1` ascending, `-1` descending.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &Document) -> DocumentStoreResult<()> {
    let keys = sort
        .iter()
        .map(|(path, direction)| match direction {
            Bson::Int32(1) | Bson::Int64(1) => Ok((path.as_str(), Ordering::Less)),
            Bson::Int32(-1) | Bson::Int64(-1) => Ok((path.as_str(), Ordering::Greater)),
            Bson::Double(d) if *d == 1.0 => Ok((path.as_str(), Ordering::Less)),
            Bson::Double(d) if *d == -1.0 => Ok((path.as_str(), Ordering::Greater)),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "sort direction for {path} must be 1 or -1, found {other}"
            ))),
        })
        .collect::<DocumentStoreResult<Vec<_>>>()?;

    documents.sort_by(|a, b| {
        keys.iter()
            .map(|(path, first)| {
                let left = lookup(a, path).map(Comparable::from).unwrap_or(Comparable::Null);
                let right = lookup(b, path).map(Comparable::from).unwrap_or(Comparable::Null);
                let ordering = left.total_cmp(&right);

                if *first == Ordering::Less { ordering } else { ordering.reverse() }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    Ok(())
}

/// Applies an inclusion or exclusion projection. `_id` is kept unless excluded explicitly.
pub(crate) fn project(document: &Document, projection: &Document) -> DocumentStoreResult<Document> {
    let including = projection
        .iter()
        .filter(|(path, _)| path.as_str() != "_id")
        .map(|(_, flag)| truthy(flag))
        .collect::<Vec<_>>();

    let inclusion = match (including.iter().any(|f| *f), including.iter().any(|f| !*f)) {
        (true, true) => {
            return Err(DocumentStoreError::InvalidDocument(
                "projection cannot mix inclusion and exclusion".into(),
            ));
        }
        (true, false) => true,
        (false, _) => including.is_empty() && projection.get("_id").is_some_and(truthy),
    };

    if inclusion {
        let mut projected = Document::new();
        if projection.get("_id").is_none_or(truthy) {
            if let Some(id) = document.get("_id") {
                projected.insert("_id", id.clone());
            }
        }
        for (path, _) in projection.iter().filter(|(path, _)| path.as_str() != "_id") {
            if let Some(value) = lookup(document, path) {
                set_path(&mut projected, path, value.clone())?;
            }
        }
        Ok(projected)
    } else {
        let mut projected = document.clone();
        for (path, flag) in projection {
            if !truthy(flag) {
                unset_path(&mut projected, path);
            }
        }
        Ok(projected)
    }
}

/// Runs the supported aggregation stages over `documents`.
pub(crate) fn aggregate(mut documents: Vec<Document>, pipeline: &[Document]) -> DocumentStoreResult<Vec<Document>> {
    for stage in pipeline {
        let mut entries = stage.iter();
        let (Some((name, argument)), None) = (entries.next(), entries.next()) else {
            return Err(DocumentStoreError::InvalidDocument(
                "pipeline stage must have exactly one field".into(),
            ));
        };

        documents = match (name.as_str(), argument) {
            ("$match", Bson::Document(filter)) => {
                DocumentEvaluator::filter_documents(documents.iter(), filter)?
            }
            ("$sort", Bson::Document(sort)) => {
                sort_documents(&mut documents, sort)?;
                documents
            }
            ("$skip", count) => window(documents, Some(non_negative(name, count)?), None),
            ("$limit", count) => {
                let limit = non_negative(name, count)?;
                if limit == 0 {
                    return Err(DocumentStoreError::InvalidDocument("$limit must be positive".into()));
                }
                window(documents, None, Some(i64::try_from(limit).unwrap_or(i64::MAX)))
            }
            ("$project", Bson::Document(projection)) => documents
                .iter()
                .map(|document| project(document, projection))
                .collect::<DocumentStoreResult<_>>()?,
            ("$count", Bson::String(field)) if !field.is_empty() && !field.starts_with('$') => {
                let count = i64::try_from(documents.len()).unwrap_or(i64::MAX);
                if documents.is_empty() {
                    Vec::new()
                } else {
                    let mut counted = Document::new();
                    counted.insert(field.as_str(), count_value(count));
                    vec![counted]
                }
            }
            (other, _) => {
                return Err(DocumentStoreError::InvalidDocument(format!(
                    "unsupported or malformed pipeline stage {other}"
                )));
            }
        };
    }

    Ok(documents)
}

fn count_value(count: i64) -> Bson {
    i32::try_from(count).map(Bson::Int32).unwrap_or(Bson::Int64(count))
}

fn non_negative(stage: &str, value: &Bson) -> DocumentStoreResult<u64> {
    let number = match value {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        Bson::Double(n) if n.fract() == 0.0 => *n as i64,
        _ => -1,
    };

    u64::try_from(number).map_err(|_| {
        DocumentStoreError::InvalidDocument(format!("{stage} expects a non-negative integer"))
    })
}
