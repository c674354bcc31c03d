//! The four-stage operation pipeline.
//!
//! [`OperationGateway::invoke`] runs every forwarded operation through the same stages,
//! strictly in order:
//!
//! 1. canonicalize each argument through the codec ([`Stage::InputConversion`])
//! 2. dispatch to the store collection ([`Stage::Delegation`])
//! 3. apply the operation's [`ResultAdapter`] ([`Stage::ResultAdaptation`])
//! 4. canonicalize structured results for the caller ([`Stage::OutputConversion`])
//!
//! A failure in any stage is re-raised as that stage's error variant, carrying the
//! original error text and the operation's identifying first argument.
//!
//! [`Stage::InputConversion`]: crate::error::Stage::InputConversion
//! [`Stage::Delegation`]: crate::error::Stage::Delegation
//! [`Stage::ResultAdaptation`]: crate::error::Stage::ResultAdaptation
//! [`Stage::OutputConversion`]: crate::error::Stage::OutputConversion

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    adapter::{ResultAdapter, Shaped, describe},
    backend::StoreCollection,
    codec::ExtendedValueCodec,
    error::{DocumentStoreError, DocumentStoreResult},
    operation::Call,
};

/// Wraps a store collection handle with argument and result canonicalization.
#[derive(Debug)]
pub struct OperationGateway<C: StoreCollection> {
    collection: C,
    codec: Arc<dyn ExtendedValueCodec>,
}

impl<C: StoreCollection> OperationGateway<C> {
    pub fn new(collection: C, codec: Arc<dyn ExtendedValueCodec>) -> Self {
        Self { collection, codec }
    }

    /// Returns the wrapped store collection handle.
    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub fn codec(&self) -> &Arc<dyn ExtendedValueCodec> {
        &self.codec
    }

    /// Unwraps the gateway, returning the store collection handle.
    pub fn into_collection(self) -> C {
        self.collection
    }

    /// Runs `call` through the pipeline and returns the canonical result.
    pub async fn invoke(&self, call: Call, adapter: ResultAdapter) -> DocumentStoreResult<Value> {
        let operation = call.operation().as_str();
        debug!(operation, "invoking store operation");

        let request = call.canonicalize(self.codec.as_ref()).map_err(|e| {
            warn!(operation, error = %e, "input conversion failed");
            DocumentStoreError::InputConversion {
                operation,
                original: e.to_string(),
                subject: call.subject().clone(),
            }
        })?;

        let response = request.dispatch(&self.collection).await.map_err(|e| {
            warn!(operation, error = %e, "store operation failed");
            DocumentStoreError::Delegation {
                operation,
                original: e.to_string(),
                subject: call.subject().clone(),
            }
        })?;

        let result = describe(&response);
        let shaped = adapter.apply(response).await.map_err(|e| {
            warn!(operation, error = %e, result = %result, "result adaptation failed");
            DocumentStoreError::ResultAdaptation {
                operation,
                original: e.to_string(),
                subject: call.subject().clone(),
                result: result.clone(),
            }
        })?;

        let output = match &shaped {
            Shaped::Structured(value) => self.codec.canonicalize_output(value).map_err(|e| {
                warn!(operation, error = %e, result = %result, "output conversion failed");
                DocumentStoreError::OutputConversion {
                    operation,
                    original: e.to_string(),
                    subject: call.subject().clone(),
                    result: result.clone(),
                    adapted: format!("{shaped:?}"),
                }
            })?,
            Shaped::Scalar(value) => value.clone(),
            Shaped::Null => Value::Null,
        };

        debug!(operation, "store operation completed");
        Ok(output)
    }
}
