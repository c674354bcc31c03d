//! Collection configuration and construction-argument parsing.
//!
//! A gated collection can be constructed from three argument shapes:
//!
//! - a bare collection name, optionally with [`CollectionOptions`] carrying a schema;
//! - a [`CollectionOptions`] whose schema's `name` names the collection;
//! - a schema document whose `name` field names the collection.
//!
//! [`CollectionTarget::resolve`] is the single parsing step that turns any of those into
//! a `(name, schema, options)` triple.
//!
//! Options deserialize from JSON with camelCase keys:
//!
//! ```ignore
//! let options: CollectionOptions = serde_json::from_value(json!({
//!     "schema": { "name": "users", "type": "object" },
//!     "extJsonMode": "canonical",
//!     "validation": { "coerceTypes": false }
//! }))?;
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::{
    codec::ExtJsonMode,
    error::{DocumentStoreError, DocumentStoreResult},
    schema::Schema,
};

/// How the validation engine treats documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorOptions {
    /// Fill in `default` values for missing properties.
    pub use_defaults: bool,
    /// Coerce scalars to the schema-declared type where unambiguous.
    pub coerce_types: bool,
    /// Report every issue instead of stopping at the first.
    pub all_errors: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            use_defaults: true,
            coerce_types: true,
            all_errors: true,
        }
    }
}

impl ValidatorOptions {
    pub fn with_use_defaults(mut self, use_defaults: bool) -> Self {
        self.use_defaults = use_defaults;
        self
    }

    pub fn with_coerce_types(mut self, coerce_types: bool) -> Self {
        self.coerce_types = coerce_types;
        self
    }

    pub fn with_all_errors(mut self, all_errors: bool) -> Self {
        self.all_errors = all_errors;
        self
    }
}

/// Options a gated collection is constructed with.
///
/// Backends receive the same options when the collection handle is opened.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectionOptions {
    /// JSON Schema documents must satisfy before insertion.
    pub schema: Option<Value>,
    /// Output format of canonicalized results.
    pub ext_json_mode: ExtJsonMode,
    /// Validation engine behavior.
    pub validation: ValidatorOptions,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_ext_json_mode(mut self, mode: ExtJsonMode) -> Self {
        self.ext_json_mode = mode;
        self
    }

    pub fn with_validation(mut self, validation: ValidatorOptions) -> Self {
        self.validation = validation;
        self
    }
}

/// The first construction argument of a gated collection.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionSource {
    /// A bare collection name.
    Name(String),
    /// Options whose schema names the collection.
    Options(CollectionOptions),
    /// A schema document whose `name` names the collection.
    Schema(Value),
}

impl From<&str> for CollectionSource {
    fn from(name: &str) -> Self {
        CollectionSource::Name(name.to_string())
    }
}

impl From<String> for CollectionSource {
    fn from(name: String) -> Self {
        CollectionSource::Name(name)
    }
}

impl From<CollectionOptions> for CollectionSource {
    fn from(options: CollectionOptions) -> Self {
        CollectionSource::Options(options)
    }
}

impl From<Value> for CollectionSource {
    /// Classifies a JSON argument: a string is a name, an object with a `$schema` key is a
    /// schema document, an object with a `schema` key is options, and anything else is taken
    /// as a schema document.
    fn from(value: Value) -> Self {
        match value {
            Value::String(name) => CollectionSource::Name(name),
            document if document.get("$schema").is_some() => CollectionSource::Schema(document),
            Value::Object(ref map) if map.contains_key("schema") => {
                match serde_json::from_value::<CollectionOptions>(value.clone()) {
                    Ok(options) => CollectionSource::Options(options),
                    Err(_) => CollectionSource::Schema(value),
                }
            }
            other => CollectionSource::Schema(other),
        }
    }
}

/// The parsed construction arguments of a gated collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionTarget {
    pub name: String,
    pub schema: Option<Schema>,
    pub options: CollectionOptions,
}

impl CollectionTarget {
    /// Resolves the collection name and schema from the construction arguments.
    ///
    /// Options embedded in `source` take precedence over `options`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidCollection`] when no usable name can be found.
    pub fn resolve(
        source: CollectionSource,
        options: Option<CollectionOptions>,
    ) -> DocumentStoreResult<Self> {
        let (name, schema, options) = match source {
            CollectionSource::Name(name) => {
                let options = options.unwrap_or_default();
                let schema = options.schema.clone().map(Schema::unnamed);

                (name, schema, options)
            }
            CollectionSource::Options(options) => {
                let schema = options
                    .schema
                    .clone()
                    .ok_or_else(|| {
                        DocumentStoreError::InvalidCollection(
                            "options must carry a schema when no collection name is given".into(),
                        )
                    })
                    .and_then(Schema::new)?;

                (schema.name().to_string(), Some(schema), options)
            }
            CollectionSource::Schema(document) => {
                let schema = Schema::new(document)?;
                let options = options
                    .unwrap_or_default()
                    .with_schema(schema.document().clone());

                (schema.name().to_string(), Some(schema), options)
            }
        };

        if name.trim().is_empty() {
            return Err(DocumentStoreError::InvalidCollection(
                "collection name must not be empty".into(),
            ));
        }

        Ok(Self { name, schema, options })
    }
}
