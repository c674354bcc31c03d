//! Extended value canonicalization at the gateway boundary.
//!
//! Callers speak plain JSON. Stores speak BSON, which has types plain JSON cannot express
//! (object ids, dates, binary, 64-bit integers, decimals). The codec moves values across
//! that boundary using MongoDB Extended JSON:
//!
//! - on the way **in**, a plain JSON tree is parsed as Extended JSON so wrappers such as
//!   `{"$oid": "..."}` or `{"$date": "..."}` become real BSON values;
//! - on the way **out**, BSON is rendered as Extended JSON and handed back as a generic
//!   JSON tree that any JSON consumer can carry.
//!
//! # Example
//!
//! ```ignore
//! use docgate_core::codec::{ExtJsonCodec, ExtendedValueCodec};
//! use serde_json::json;
//!
//! let codec = ExtJsonCodec::default();
//! let bson = codec.canonicalize_input(&json!({"_id": {"$oid": "65f1c2a4e3b0a1d2c3b4a5f6"}}))?;
//! assert!(bson.as_document().unwrap().get_object_id("_id").is_ok());
//! ```

use std::fmt::Debug;

use bson::Bson;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Converts values between the caller's JSON form and the store's BSON form.
///
/// Implementations must be pure: inputs are borrowed and never mutated.
pub trait ExtendedValueCodec: Send + Sync + Debug {
    /// Reconstitutes extended types from a plain JSON tree.
    fn canonicalize_input(&self, value: &Value) -> DocumentStoreResult<Bson>;

    /// Projects a BSON tree onto plain JSON safe for generic consumers.
    fn canonicalize_output(&self, value: &Bson) -> DocumentStoreResult<Value>;

    /// The Extended JSON mode produced by [`canonicalize_output`](Self::canonicalize_output),
    /// if the codec follows one.
    fn output_mode(&self) -> Option<ExtJsonMode> {
        None
    }
}

/// Extended JSON output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtJsonMode {
    /// Numbers stay native JSON numbers, dates in range render as ISO-8601 strings.
    #[default]
    Relaxed,
    /// Every non-string scalar keeps its type wrapper (`$numberInt`, `$numberLong`, ...).
    Canonical,
}

/// [`ExtendedValueCodec`] backed by bson's Extended JSON support.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtJsonCodec {
    mode: ExtJsonMode,
}

impl ExtJsonCodec {
    pub fn new(mode: ExtJsonMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ExtJsonMode {
        self.mode
    }
}

impl ExtendedValueCodec for ExtJsonCodec {
    fn canonicalize_input(&self, value: &Value) -> DocumentStoreResult<Bson> {
        Bson::try_from(value.clone())
            .map_err(|e| DocumentStoreError::Serialization(e.to_string()))
    }

    fn canonicalize_output(&self, value: &Bson) -> DocumentStoreResult<Value> {
        Ok(match self.mode {
            ExtJsonMode::Relaxed => value.clone().into_relaxed_extjson(),
            ExtJsonMode::Canonical => value.clone().into_canonical_extjson(),
        })
    }

    fn output_mode(&self) -> Option<ExtJsonMode> {
        Some(self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Binary, DateTime, doc, oid::ObjectId, spec::BinarySubtype};
    use serde_json::json;

    #[test]
    fn test_plain_values_round_trip() {
        let codec = ExtJsonCodec::default();
        let value = json!({
            "name": "Ana",
            "age": 30,
            "score": 4.5,
            "big": 5_000_000_000i64,
            "active": true,
            "nickname": null,
            "tags": ["a", "b", {"nested": [1, 2, 3]}],
        });

        let bson = codec.canonicalize_input(&value).unwrap();
        let document = bson.as_document().unwrap();
        assert_eq!(document.get("age"), Some(&Bson::Int32(30)));
        assert_eq!(document.get("big"), Some(&Bson::Int64(5_000_000_000)));
        assert_eq!(document.get("score"), Some(&Bson::Double(4.5)));

        assert_eq!(codec.canonicalize_output(&bson).unwrap(), value);
    }

    #[test]
    fn test_key_order_survives_round_trip() {
        let codec = ExtJsonCodec::default();
        let value = json!({"team": 1, "age": -1, "nested": {"z": 1, "a": 2}});

        let bson = codec.canonicalize_input(&value).unwrap();
        let keys: Vec<_> = bson.as_document().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["team", "age", "nested"]);

        let output = codec.canonicalize_output(&bson).unwrap();
        let keys: Vec<_> = output.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["team", "age", "nested"]);
        let nested: Vec<_> = output["nested"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(nested, ["z", "a"]);
    }

    #[test]
    fn test_extended_wrappers_become_bson_types() {
        let codec = ExtJsonCodec::default();
        let oid = ObjectId::new();
        let value = json!({
            "_id": {"$oid": oid.to_hex()},
            "createdAt": {"$date": {"$numberLong": "1700000000000"}},
            "blob": {"$binary": {"base64": "AQID", "subType": "00"}},
            "filter": {"$gt": 5},
        });

        let bson = codec.canonicalize_input(&value).unwrap();
        let document = bson.as_document().unwrap();
        assert_eq!(document.get_object_id("_id").unwrap(), oid);
        assert_eq!(
            document.get_datetime("createdAt").unwrap(),
            &DateTime::from_millis(1_700_000_000_000)
        );
        assert_eq!(
            document.get("blob"),
            Some(&Bson::Binary(Binary { subtype: BinarySubtype::Generic, bytes: vec![1, 2, 3] }))
        );
        assert_eq!(document.get_document("filter").unwrap(), &doc! { "$gt": 5 });
    }

    #[test]
    fn test_extended_values_project_to_generic_json() {
        let codec = ExtJsonCodec::default();
        let oid = ObjectId::new();
        let created = DateTime::from_chrono(
            chrono::DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
                .unwrap()
                .with_timezone(&chrono::Utc),
        );
        let uuid = bson::Uuid::from(uuid::Uuid::new_v4());
        let bson = Bson::Document(doc! { "_id": oid, "createdAt": created, "ref": uuid });

        let output = codec.canonicalize_output(&bson).unwrap();
        assert_eq!(output["_id"], json!({"$oid": oid.to_hex()}));
        assert!(output["createdAt"]["$date"].is_string());
        assert!(output["ref"]["$binary"]["base64"].is_string());

        // the generic projection parses back to the same extended values
        assert_eq!(codec.canonicalize_input(&output).unwrap(), bson);
    }

    #[test]
    fn test_canonical_mode_keeps_number_wrappers() {
        let codec = ExtJsonCodec::new(ExtJsonMode::Canonical);
        let output = codec
            .canonicalize_output(&Bson::Document(doc! { "n": 7, "l": 7i64 }))
            .unwrap();

        assert_eq!(output, json!({"n": {"$numberInt": "7"}, "l": {"$numberLong": "7"}}));
    }

    #[test]
    fn test_malformed_wrapper_is_an_error() {
        let codec = ExtJsonCodec::default();
        let value = json!({"_id": {"$oid": "not-an-object-id"}});

        let err = codec.canonicalize_input(&value).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Serialization(_)));
        // input untouched
        assert_eq!(value, json!({"_id": {"$oid": "not-an-object-id"}}));
    }
}
