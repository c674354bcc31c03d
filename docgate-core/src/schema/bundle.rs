//! Local `$ref` bundling.
//!
//! Internal references (`#/...`) are checked against the schema itself. External
//! references must point at documents registered with [`LocalRefBundler::with_document`];
//! those documents are embedded under `$defs` and every reference to them (including
//! their own internal references) is rewritten to an internal pointer.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::SchemaResolver;
use crate::error::{DocumentStoreError, DocumentStoreResult};

const DEFS: &str = "$defs";

/// [`SchemaResolver`] for schemas whose references are local or pre-registered.
#[derive(Debug, Clone, Default)]
pub struct LocalRefBundler {
    documents: HashMap<String, Value>,
}

impl LocalRefBundler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an external schema document under `uri`.
    pub fn with_document(mut self, uri: impl Into<String>, document: Value) -> Self {
        self.documents.insert(uri.into(), document);
        self
    }

    fn bundle_sync(&self, schema: &Value) -> DocumentStoreResult<Value> {
        let mut root = schema.clone();
        let mut embedded = BTreeMap::new();
        let mut pending = Vec::new();

        rewrite_refs(&mut root, None, &self.documents, &mut embedded, &mut pending)?;

        let mut defs = Map::new();
        while let Some(uri) = pending.pop() {
            let key = embedded[&uri].clone();
            let mut document = self.documents[&uri].clone();

            if let Some(object) = document.as_object_mut() {
                object.shift_remove("$id");
                object.shift_remove("$schema");
            }
            rewrite_refs(&mut document, Some(&key), &self.documents, &mut embedded, &mut pending)?;
            defs.insert(key, document);
        }

        if !defs.is_empty() {
            let object = root.as_object_mut().ok_or_else(|| {
                DocumentStoreError::SchemaResolution(
                    "cannot embed referenced documents into a non-object schema".into(),
                )
            })?;
            let target = object
                .entry(DEFS)
                .or_insert_with(|| Value::Object(Map::new()))
                .as_object_mut()
                .ok_or_else(|| {
                    DocumentStoreError::SchemaResolution(format!("`{DEFS}` must be an object"))
                })?;

            for (key, document) in defs {
                if target.contains_key(&key) {
                    return Err(DocumentStoreError::SchemaResolution(format!(
                        "`{DEFS}/{key}` already exists"
                    )));
                }
                target.insert(key, document);
            }
        }

        check_refs(&root, &root)?;
        debug!(embedded = embedded.len(), "schema bundled");

        Ok(root)
    }
}

#[async_trait]
impl SchemaResolver for LocalRefBundler {
    async fn bundle(&self, schema: &Value) -> DocumentStoreResult<Value> {
        self.bundle_sync(schema)
    }
}

/// Rewrites references in `value`. `base` is the `$defs` key of the embedded document
/// being rewritten, `None` for the root schema.
fn rewrite_refs(
    value: &mut Value,
    base: Option<&str>,
    documents: &HashMap<String, Value>,
    embedded: &mut BTreeMap<String, String>,
    pending: &mut Vec<String>,
) -> DocumentStoreResult<()> {
    match value {
        Value::Object(object) => {
            if let Some(Value::String(reference)) = object.get_mut("$ref") {
                if let Some(fragment) = reference.strip_prefix('#') {
                    if let Some(key) = base {
                        *reference = format!("#/{DEFS}/{key}{fragment}");
                    }
                } else {
                    let (uri, fragment) = match reference.split_once('#') {
                        Some((uri, fragment)) => (uri.to_string(), fragment.to_string()),
                        None => (reference.clone(), String::new()),
                    };
                    if !documents.contains_key(&uri) {
                        return Err(DocumentStoreError::SchemaResolution(format!(
                            "unresolvable reference `{reference}`"
                        )));
                    }
                    let key = match embedded.get(&uri) {
                        Some(key) => key.clone(),
                        None => {
                            let key = defs_key(&uri, embedded.len());
                            embedded.insert(uri.clone(), key.clone());
                            pending.push(uri);
                            key
                        }
                    };
                    *reference = format!("#/{DEFS}/{key}{fragment}");
                }
            }

            for (_, child) in object.iter_mut() {
                rewrite_refs(child, base, documents, embedded, pending)?;
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_refs(item, base, documents, embedded, pending)?;
            }
        }
        _ => {}
    }

    Ok(())
}

fn defs_key(uri: &str, index: usize) -> String {
    let stem: String = uri
        .rsplit('/')
        .next()
        .unwrap_or(uri)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();

    format!("{stem}_{index}")
}

fn check_refs(value: &Value, root: &Value) -> DocumentStoreResult<()> {
    match value {
        Value::Object(object) => {
            if let Some(Value::String(reference)) = object.get("$ref") {
                let fragment = reference.strip_prefix('#').ok_or_else(|| {
                    DocumentStoreError::SchemaResolution(format!(
                        "unresolvable reference `{reference}`"
                    ))
                })?;
                let found = if fragment.is_empty() || fragment.starts_with('/') {
                    root.pointer(fragment).is_some()
                } else {
                    has_anchor(root, fragment)
                };
                if !found {
                    return Err(DocumentStoreError::SchemaResolution(format!(
                        "unresolvable reference `{reference}`"
                    )));
                }
            }

            object.values().try_for_each(|child| check_refs(child, root))
        }
        Value::Array(items) => items.iter().try_for_each(|item| check_refs(item, root)),
        _ => Ok(()),
    }
}

fn has_anchor(value: &Value, anchor: &str) -> bool {
    match value {
        Value::Object(object) => {
            object.get("$anchor").and_then(Value::as_str) == Some(anchor)
                || object.values().any(|child| has_anchor(child, anchor))
        }
        Value::Array(items) => items.iter().any(|item| has_anchor(item, anchor)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_internal_refs_are_kept_and_checked() {
        let schema = json!({
            "name": "users",
            "type": "object",
            "properties": {"address": {"$ref": "#/definitions/address"}},
            "definitions": {"address": {"type": "object"}},
        });

        let bundle = LocalRefBundler::new().bundle(&schema).await.unwrap();

        assert_eq!(bundle, schema);
    }

    #[tokio::test]
    async fn test_dangling_internal_ref_fails() {
        let schema = json!({"properties": {"a": {"$ref": "#/definitions/missing"}}});

        let err = LocalRefBundler::new().bundle(&schema).await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::SchemaResolution(_)));
    }

    #[tokio::test]
    async fn test_unknown_external_ref_fails() {
        let schema = json!({"properties": {"a": {"$ref": "https://example.com/a.json"}}});

        let err = LocalRefBundler::new().bundle(&schema).await.unwrap_err();

        assert!(matches!(err, DocumentStoreError::SchemaResolution(msg) if msg.contains("a.json")));
    }

    #[tokio::test]
    async fn test_registered_documents_are_embedded() {
        let address = json!({
            "$id": "https://example.com/address.json",
            "type": "object",
            "properties": {"zip": {"$ref": "#/definitions/zip"}},
            "definitions": {"zip": {"type": "string"}},
        });
        let schema = json!({
            "name": "users",
            "properties": {
                "home": {"$ref": "https://example.com/address.json"},
                "zip": {"$ref": "https://example.com/address.json#/definitions/zip"},
            },
        });

        let bundle = LocalRefBundler::new()
            .with_document("https://example.com/address.json", address)
            .bundle(&schema)
            .await
            .unwrap();

        assert_eq!(bundle["properties"]["home"]["$ref"], json!("#/$defs/address_json_0"));
        assert_eq!(
            bundle["properties"]["zip"]["$ref"],
            json!("#/$defs/address_json_0/definitions/zip")
        );
        let embedded = &bundle["$defs"]["address_json_0"];
        assert!(embedded.get("$id").is_none());
        assert_eq!(
            embedded["properties"]["zip"]["$ref"],
            json!("#/$defs/address_json_0/definitions/zip")
        );
    }
}
