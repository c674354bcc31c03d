//! [`ValidationEngine`] backed by the `jsonschema` crate.

use std::sync::Arc;

use jsonschema::{ValidationError, Validator};
use serde_json::Value;

use super::{CompiledValidator, ValidationEngine, coerce::Preparer};
use crate::{
    error::{DocumentStoreError, DocumentStoreResult, ValidationIssue},
    options::ValidatorOptions,
};

/// Compiles bundles with `jsonschema`, draft detected from `$schema`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaEngine;

impl ValidationEngine for JsonSchemaEngine {
    fn compile(
        &self,
        bundle: Arc<Value>,
        options: ValidatorOptions,
    ) -> DocumentStoreResult<Arc<dyn CompiledValidator>> {
        let validator = jsonschema::validator_for(&bundle)
            .map_err(|e| DocumentStoreError::InvalidSchema(e.to_string()))?;

        Ok(Arc::new(CompiledSchema {
            bundle,
            validator,
            options,
        }))
    }
}

struct CompiledSchema {
    bundle: Arc<Value>,
    validator: Validator,
    options: ValidatorOptions,
}

impl CompiledValidator for CompiledSchema {
    fn validate(&self, document: &mut Value) -> Result<(), Vec<ValidationIssue>> {
        if self.options.use_defaults || self.options.coerce_types {
            Preparer::new(&self.bundle, self.options).apply(document);
        }

        let limit = if self.options.all_errors { usize::MAX } else { 1 };
        let issues: Vec<ValidationIssue> = self
            .validator
            .iter_errors(document)
            .take(limit)
            .map(|error| issue_from(&error))
            .collect();

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}

fn issue_from(error: &ValidationError<'_>) -> ValidationIssue {
    let schema_path = error.schema_path.to_string();
    let keyword = schema_path
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    ValidationIssue {
        instance_path: error.instance_path.to_string(),
        schema_path,
        keyword,
        message: error.to_string(),
    }
}
