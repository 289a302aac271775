//! Request body encoders.
//!
//! An [`Encoder`] turns the outbound fields of an envelope into a
//! transport-neutral [`RequestBody`]. The HTTP layer only has to copy the
//! result onto the wire.

use crate::PayloadEncoding;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";

/// One text part of a multipart form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

impl FormField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Encoded request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum RequestBody {
    Json(Value),
    /// Parts in append order; names may repeat
    Multipart(Vec<FormField>),
}

impl RequestBody {
    pub fn content_type(&self) -> &'static str {
        match self {
            RequestBody::Json(_) => JSON_CONTENT_TYPE,
            RequestBody::Multipart(_) => MULTIPART_CONTENT_TYPE,
        }
    }
}

/// Serializes outbound fields into a request body.
pub trait Encoder: Send + Sync {
    fn encode(&self, fields: &Map<String, Value>) -> RequestBody;
}

/// Sends the fields as a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn encode(&self, fields: &Map<String, Value>) -> RequestBody {
        RequestBody::Json(Value::Object(fields.clone()))
    }
}

/// Flattens the fields into multipart form parts.
///
/// - nested objects become `field[sub]`
/// - arrays of objects become `field[index][sub]`
/// - arrays of scalars are appended as repeated `field` parts
/// - numbers and booleans are sent as their JSON text
#[derive(Debug, Clone, Copy, Default)]
pub struct MultipartEncoder;

impl Encoder for MultipartEncoder {
    fn encode(&self, fields: &Map<String, Value>) -> RequestBody {
        let mut parts = Vec::new();
        for (name, value) in fields {
            flatten_into(name, value, &mut parts);
        }
        RequestBody::Multipart(parts)
    }
}

fn flatten_into(name: &str, value: &Value, parts: &mut Vec<FormField>) {
    match value {
        Value::Null => {}
        Value::String(s) => parts.push(FormField::new(name, s.as_str())),
        Value::Bool(b) => parts.push(FormField::new(name, b.to_string())),
        Value::Number(n) => parts.push(FormField::new(name, n.to_string())),
        Value::Object(map) => {
            for (sub, v) in map {
                flatten_into(&format!("{name}[{sub}]"), v, parts);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                match item {
                    Value::Object(_) | Value::Array(_) => {
                        flatten_into(&format!("{name}[{index}]"), item, parts)
                    }
                    scalar => flatten_into(name, scalar, parts),
                }
            }
        }
    }
}

/// Encoder selected by a record's payload encoding.
pub fn encoder_for(encoding: PayloadEncoding) -> &'static dyn Encoder {
    match encoding {
        PayloadEncoding::Json => &JsonEncoder,
        PayloadEncoding::Multipart => &MultipartEncoder,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    fn names(body: &RequestBody) -> Vec<(&str, &str)> {
        match body {
            RequestBody::Multipart(parts) => parts
                .iter()
                .map(|p| (p.name.as_str(), p.value.as_str()))
                .collect(),
            RequestBody::Json(_) => panic!("expected multipart"),
        }
    }

    #[test]
    fn json_keeps_structure() {
        let input = fields(json!({"name": "Acme", "tags": ["a", "b"], "qty": 2}));
        let body = JsonEncoder.encode(&input);

        assert_eq!(body.content_type(), "application/json");
        assert_eq!(
            body,
            RequestBody::Json(json!({"name": "Acme", "tags": ["a", "b"], "qty": 2}))
        );
    }

    #[test]
    fn multipart_scalars() {
        let input = fields(json!({"name": "Acme", "active": true, "qty": 3, "price": 1.5}));
        let body = MultipartEncoder.encode(&input);

        assert_eq!(body.content_type(), "multipart/form-data");
        let mut parts = names(&body);
        parts.sort();
        assert_eq!(
            parts,
            vec![
                ("active", "true"),
                ("name", "Acme"),
                ("price", "1.5"),
                ("qty", "3"),
            ]
        );
    }

    #[test]
    fn multipart_array_of_objects_is_indexed() {
        let input = fields(json!({
            "medicines": [
                {"name": "ibuprofen", "dose": 200},
                {"name": "paracetamol", "dose": 500}
            ]
        }));
        let body = MultipartEncoder.encode(&input);
        let mut parts = names(&body);
        parts.sort();

        assert_eq!(
            parts,
            vec![
                ("medicines[0][dose]", "200"),
                ("medicines[0][name]", "ibuprofen"),
                ("medicines[1][dose]", "500"),
                ("medicines[1][name]", "paracetamol"),
            ]
        );
    }

    #[test]
    fn multipart_scalar_list_repeats_field() {
        let input = fields(json!({"days": ["mon", "wed", "fri"]}));
        let body = MultipartEncoder.encode(&input);

        assert_eq!(
            names(&body),
            vec![("days", "mon"), ("days", "wed"), ("days", "fri")]
        );
    }

    #[test]
    fn multipart_nested_object() {
        let input = fields(json!({"address": {"city": "Dhaka", "geo": {"lat": 23.8}}}));
        let body = MultipartEncoder.encode(&input);

        assert_eq!(
            names(&body),
            vec![("address[city]", "Dhaka"), ("address[geo][lat]", "23.8")]
        );
    }

    #[test]
    fn encoder_selection() {
        let input = fields(json!({"a": 1}));
        assert!(matches!(
            encoder_for(PayloadEncoding::Json).encode(&input),
            RequestBody::Json(_)
        ));
        assert!(matches!(
            encoder_for(PayloadEncoding::Multipart).encode(&input),
            RequestBody::Multipart(_)
        ));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn count_scalars(value: &Value) -> usize {
            match value {
                Value::Null => 0,
                Value::Object(map) => map.values().map(count_scalars).sum(),
                Value::Array(items) => items.iter().map(count_scalars).sum(),
                _ => 1,
            }
        }

        fn arb_value() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(|n| json!(n)),
                "[a-z]{0,8}".prop_map(Value::String),
            ];
            leaf.prop_recursive(3, 24, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                    prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                        .prop_map(|m| Value::Object(m.into_iter().collect())),
                ]
            })
        }

        proptest! {
            #[test]
            fn prop_multipart_emits_every_scalar(
                entries in prop::collection::btree_map("[a-z]{1,6}", arb_value(), 0..6)
            ) {
                let input: Map<String, Value> = entries.into_iter().collect();
                let expected: usize = input.values().map(count_scalars).sum();

                let RequestBody::Multipart(parts) = MultipartEncoder.encode(&input) else {
                    panic!("expected multipart");
                };

                prop_assert_eq!(parts.len(), expected);
                for part in &parts {
                    let root = part.name.split('[').next().unwrap_or_default();
                    prop_assert!(input.contains_key(root));
                }
            }
        }
    }
}
