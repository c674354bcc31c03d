//! Default-value and type-coercion pass run ahead of validation.
//!
//! Walks a document alongside its schema (following `$ref`, `allOf`, `properties`,
//! `additionalProperties`, `items` and `prefixItems`) and rewrites it in place:
//! missing properties with a `default` are filled in, and scalars whose type does not
//! match the declared `type` are converted when the conversion is unambiguous.

use std::collections::HashSet;

use serde_json::{Map, Number, Value};

use crate::options::ValidatorOptions;

pub(crate) struct Preparer<'a> {
    root: &'a Value,
    options: ValidatorOptions,
}

impl<'a> Preparer<'a> {
    pub(crate) fn new(root: &'a Value, options: ValidatorOptions) -> Self {
        Self { root, options }
    }

    pub(crate) fn apply(&self, document: &mut Value) {
        self.visit(self.root, document, &mut HashSet::new());
    }

    /// `expanded` holds the references already followed at the current document node, so
    /// each one is applied at most once per node.
    fn visit(&self, schema: &Value, value: &mut Value, expanded: &mut HashSet<String>) {
        let Some(schema) = schema.as_object() else {
            return;
        };

        if let Some(Value::String(reference)) = schema.get("$ref") {
            if expanded.insert(reference.clone()) {
                if let Some(target) = self.resolve(reference) {
                    self.visit(target, value, expanded);
                }
            }
        }
        if let Some(subschemas) = schema.get("allOf").and_then(Value::as_array) {
            for subschema in subschemas {
                self.visit(subschema, value, expanded);
            }
        }

        if self.options.coerce_types {
            if let Some(declared) = schema.get("type") {
                coerce(value, declared);
            }
        }

        match value {
            Value::Object(map) => self.visit_object(schema, map),
            Value::Array(items) => self.visit_array(schema, items),
            _ => {}
        }
    }

    fn visit_object(&self, schema: &Map<String, Value>, map: &mut Map<String, Value>) {
        let properties = schema.get("properties").and_then(Value::as_object);

        if let Some(properties) = properties {
            for (key, property) in properties {
                if self.options.use_defaults && !map.contains_key(key) {
                    if let Some(default) = property.get("default") {
                        map.insert(key.clone(), default.clone());
                    }
                }
                if let Some(child) = map.get_mut(key) {
                    self.visit(property, child, &mut HashSet::new());
                }
            }
        }

        if let Some(additional @ Value::Object(_)) = schema.get("additionalProperties") {
            for (key, child) in map.iter_mut() {
                if !properties.is_some_and(|properties| properties.contains_key(key)) {
                    self.visit(additional, child, &mut HashSet::new());
                }
            }
        }
    }

    fn visit_array(&self, schema: &Map<String, Value>, items: &mut [Value]) {
        let tuple = match (schema.get("prefixItems"), schema.get("items")) {
            (Some(Value::Array(tuple)), _) | (None, Some(Value::Array(tuple))) => Some(tuple),
            _ => None,
        };

        if let Some(tuple) = tuple {
            for (item, subschema) in items.iter_mut().zip(tuple) {
                self.visit(subschema, item, &mut HashSet::new());
            }
            return;
        }

        if let Some(subschema @ Value::Object(_)) = schema.get("items") {
            for item in items {
                self.visit(subschema, item, &mut HashSet::new());
            }
        }
    }

    fn resolve(&self, reference: &str) -> Option<&'a Value> {
        let fragment = reference.strip_prefix('#')?;

        if fragment.is_empty() || fragment.starts_with('/') {
            self.root.pointer(fragment)
        } else {
            find_anchor(self.root, fragment)
        }
    }
}

fn find_anchor<'v>(value: &'v Value, anchor: &str) -> Option<&'v Value> {
    match value {
        Value::Object(object) => {
            if object.get("$anchor").and_then(Value::as_str) == Some(anchor) {
                return Some(value);
            }
            object.values().find_map(|child| find_anchor(child, anchor))
        }
        Value::Array(items) => items.iter().find_map(|item| find_anchor(item, anchor)),
        _ => None,
    }
}

/// Converts `value` to the first declared type it can be coerced to, unless it already
/// matches one of them.
fn coerce(value: &mut Value, declared: &Value) {
    let types: Vec<&str> = match declared {
        Value::String(name) => vec![name.as_str()],
        Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
        _ => return,
    };

    if types.iter().any(|name| matches_type(value, name)) {
        return;
    }

    if let Some(coerced) = types.iter().find_map(|name| coerce_to(value, name)) {
        *value = coerced;
    }
}

fn matches_type(value: &Value, name: &str) -> bool {
    match name {
        "null" => value.is_null(),
        "boolean" => value.is_boolean(),
        "number" => value.is_number(),
        "integer" => is_integer(value),
        "string" => value.is_string(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => false,
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(number) => {
            number.is_i64() || number.is_u64() || number.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        _ => false,
    }
}

fn coerce_to(value: &Value, name: &str) -> Option<Value> {
    match (name, value) {
        ("string", Value::Number(number)) => Some(Value::String(number.to_string())),
        ("string", Value::Bool(flag)) => Some(Value::String(flag.to_string())),
        ("string", Value::Null) => Some(Value::String(String::new())),

        ("number", Value::String(text)) => parse_number(text),
        ("integer", Value::String(text)) => parse_number(text).filter(is_integer),
        ("number" | "integer", Value::Bool(flag)) => Some(Value::from(u8::from(*flag))),
        ("number" | "integer", Value::Null) => Some(Value::from(0)),

        ("boolean", Value::String(text)) => match text.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Number(number)) => match number.as_f64() {
            Some(n) if n == 1.0 => Some(Value::Bool(true)),
            Some(n) if n == 0.0 => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Null) => Some(Value::Bool(false)),

        ("null", Value::String(text)) if text.is_empty() => Some(Value::Null),
        ("null", Value::Number(number)) if number.as_f64() == Some(0.0) => Some(Value::Null),
        ("null", Value::Bool(false)) => Some(Value::Null),

        _ => None,
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if text.is_empty() || text.trim() != text {
        return None;
    }
    if let Ok(integer) = text.parse::<i64>() {
        return Some(Value::from(integer));
    }

    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}
