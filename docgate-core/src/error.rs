//! Error types and result types for gateway operations.
//!
//! This module provides error handling for every stage a collection operation goes
//! through. Use [`DocumentStoreResult<T>`] as the return type for fallible operations.
//!
//! The four gateway stages each have their own variant so callers can tell input
//! problems apart from store failures and from result-shaping bugs:
//!
//! - [`DocumentStoreError::InputConversion`]
//! - [`DocumentStoreError::Delegation`]
//! - [`DocumentStoreError::ResultAdaptation`]
//! - [`DocumentStoreError::OutputConversion`]

use std::fmt;

use bson::error::Error as BsonError;
use serde::Serialize;
use serde_json::{Error as SerdeJsonError, Value};
use thiserror::Error;

/// A single field-level failure reported by schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// JSON pointer to the offending value inside the document.
    pub instance_path: String,
    /// JSON pointer to the schema keyword that rejected the value.
    pub schema_path: String,
    /// The rejecting keyword (`type`, `required`, `minimum`, ...).
    pub keyword: String,
    /// Human readable description.
    pub message: String,
}

impl ValidationIssue {
    /// Returns a copy of this issue with `prefix` prepended to its instance path.
    pub fn with_instance_prefix(mut self, prefix: &str) -> Self {
        self.instance_path = format!("{}{}", prefix, self.instance_path);
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// The gateway stage an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    InputConversion,
    Delegation,
    ResultAdaptation,
    OutputConversion,
}

/// Represents all possible errors that can occur when operating on a gated collection.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// The document failed schema validation. Carries every issue found.
    #[error("Validation error: {}", join_issues(.errors))]
    Validation { errors: Vec<ValidationIssue> },
    /// An argument could not be canonicalized before reaching the store.
    #[error("Input conversion error in {operation}: {original}")]
    InputConversion {
        operation: &'static str,
        original: String,
        subject: Value,
    },
    /// The underlying store rejected or failed the operation.
    #[error("Error calling {operation}: {original}")]
    Delegation {
        operation: &'static str,
        original: String,
        subject: Value,
    },
    /// The operation-specific result adapter failed on the raw store result.
    #[error("Result adaptation error in {operation}: {original}")]
    ResultAdaptation {
        operation: &'static str,
        original: String,
        subject: Value,
        result: String,
    },
    /// The adapted result could not be canonicalized for the caller.
    #[error("Output conversion error in {operation}: {original}")]
    OutputConversion {
        operation: &'static str,
        original: String,
        subject: Value,
        result: String,
        adapted: String,
    },
    /// Schema `$ref` resolution failed. Retried on the next validation.
    #[error("Schema resolution error: {0}")]
    SchemaResolution(String),
    /// The schema could not be compiled by the validation engine.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// The collection name or schema given at construction is unusable.
    #[error("Invalid collection: {0}")]
    InvalidCollection(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The document has an invalid structure for the requested operation.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DocumentStoreError {
    /// Returns the gateway stage this error was raised from, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            DocumentStoreError::InputConversion { .. } => Some(Stage::InputConversion),
            DocumentStoreError::Delegation { .. } => Some(Stage::Delegation),
            DocumentStoreError::ResultAdaptation { .. } => Some(Stage::ResultAdaptation),
            DocumentStoreError::OutputConversion { .. } => Some(Stage::OutputConversion),
            _ => None,
        }
    }

    /// Returns the validation issues if this is a validation error.
    pub fn validation_errors(&self) -> Option<&[ValidationIssue]> {
        match self {
            DocumentStoreError::Validation { errors } => Some(errors),
            _ => None,
        }
    }

    /// Returns the identifying first argument attached by the gateway.
    pub fn subject(&self) -> Option<&Value> {
        match self {
            DocumentStoreError::InputConversion { subject, .. }
            | DocumentStoreError::Delegation { subject, .. }
            | DocumentStoreError::ResultAdaptation { subject, .. }
            | DocumentStoreError::OutputConversion { subject, .. } => Some(subject),
            _ => None,
        }
    }
}

fn join_issues(errors: &[ValidationIssue]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A specialized `Result` type for gateway operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
