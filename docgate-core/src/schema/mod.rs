//! JSON Schema support for gated collections.
//!
//! Validation is split across three collaborators, each behind a trait so alternative
//! implementations can be plugged in:
//!
//! - [`SchemaResolver`] - turns a schema with `$ref`s into one self-contained bundle
//!   (default: [`LocalRefBundler`])
//! - [`ValidationEngine`] - compiles a bundle into a [`CompiledValidator`]
//!   (default: [`JsonSchemaEngine`])
//! - [`SchemaValidator`] - owns a collection's schema, memoizes its bundle and runs the
//!   compiled validator against documents

mod bundle;
mod coerce;
mod engine;
mod validator;

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult, ValidationIssue},
    options::ValidatorOptions,
};

pub use bundle::LocalRefBundler;
pub use engine::JsonSchemaEngine;
pub use validator::SchemaValidator;

/// A JSON Schema document together with the collection name it declares.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    document: Value,
}

impl Schema {
    /// Creates a schema from a document carrying a string `name` field.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidCollection`] when the document is not an
    /// object or has no non-empty `name`.
    pub fn new(document: Value) -> DocumentStoreResult<Self> {
        let name = document
            .as_object()
            .ok_or_else(|| DocumentStoreError::InvalidCollection("schema must be an object".into()))?
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                DocumentStoreError::InvalidCollection("schema must declare a `name`".into())
            })?
            .to_string();

        Ok(Self { name, document })
    }

    /// Creates a schema whose name is not used to pick the collection.
    pub(crate) fn unnamed(document: Value) -> Self {
        let name = document
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Self { name, document }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &Value {
        &self.document
    }
}

/// Resolves the references of a schema into a single self-contained document.
#[async_trait]
pub trait SchemaResolver: Send + Sync + Debug {
    /// Bundles `schema`.
    ///
    /// # Errors
    ///
    /// Should return [`DocumentStoreError::SchemaResolution`] for unresolvable references.
    async fn bundle(&self, schema: &Value) -> DocumentStoreResult<Value>;
}

/// Compiles schema bundles into validators.
pub trait ValidationEngine: Send + Sync + Debug {
    /// Compiles `bundle` for the given options.
    ///
    /// # Errors
    ///
    /// Should return [`DocumentStoreError::InvalidSchema`] when the bundle is not a valid schema.
    fn compile(
        &self,
        bundle: Arc<Value>,
        options: ValidatorOptions,
    ) -> DocumentStoreResult<Arc<dyn CompiledValidator>>;
}

/// A compiled validation function.
pub trait CompiledValidator: Send + Sync {
    /// Validates `document`, applying defaults and coercions in place as configured.
    ///
    /// Returns every issue found (or only the first, when `all_errors` is off).
    fn validate(&self, document: &mut Value) -> Result<(), Vec<ValidationIssue>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_requires_a_name() {
        let schema = Schema::new(json!({"name": "users", "type": "object"})).unwrap();
        assert_eq!(schema.name(), "users");

        assert!(Schema::new(json!({"type": "object"})).is_err());
        assert!(Schema::new(json!({"name": ""})).is_err());
        assert!(Schema::new(json!("users")).is_err());
    }

    #[test]
    fn test_schema_is_an_independent_copy() {
        let mut original = json!({"name": "users", "required": ["name"]});
        let schema = Schema::new(original.clone()).unwrap();

        original["required"] = json!([]);

        assert_eq!(schema.document()["required"], json!(["name"]));
    }
}
