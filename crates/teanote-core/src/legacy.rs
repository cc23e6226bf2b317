//! Legacy flat ratings blob.
//!
//! Before rating schemas existed a note carried `rating` (overall) and a JSON
//! object `ratings` with five fixed fields. This module decodes that untyped
//! payload into a fixed field set and encodes it back from axis values.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};
use crate::models::AxisValues;

/// The five fields a legacy `ratings` blob may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LegacyField {
    Richness,
    Strength,
    Smoothness,
    Clarity,
    Complexity,
}

impl LegacyField {
    pub const ALL: [LegacyField; 5] = [
        LegacyField::Richness,
        LegacyField::Strength,
        LegacyField::Smoothness,
        LegacyField::Clarity,
        LegacyField::Complexity,
    ];

    /// Key inside the legacy JSON object.
    pub fn key(self) -> &'static str {
        match self {
            LegacyField::Richness => "richness",
            LegacyField::Strength => "strength",
            LegacyField::Smoothness => "smoothness",
            LegacyField::Clarity => "clarity",
            LegacyField::Complexity => "complexity",
        }
    }

    /// Axis code in the default schema.
    pub fn axis_code(self) -> &'static str {
        match self {
            LegacyField::Richness => "RICHNESS",
            LegacyField::Strength => "STRENGTH",
            LegacyField::Smoothness => "SMOOTHNESS",
            LegacyField::Clarity => "CLARITY",
            LegacyField::Complexity => "COMPLEXITY",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    pub fn from_axis_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.axis_code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for LegacyField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Shape of a stored `ratings` payload before field decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyBlob {
    /// Already a JSON object.
    Object(Map<String, Value>),
    /// A JSON string holding serialized JSON.
    Encoded(String),
}

impl LegacyBlob {
    /// Classify a parsed JSON value. Anything other than an object or a
    /// string is rejected.
    pub fn classify(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(LegacyBlob::Object(map)),
            Value::String(s) => Ok(LegacyBlob::Encoded(s)),
            other => Err(Error::Parse(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }

    /// Resolve to the underlying object, decoding one level of string
    /// encoding if needed.
    pub fn into_object(self) -> Result<Map<String, Value>> {
        match self {
            LegacyBlob::Object(map) => Ok(map),
            LegacyBlob::Encoded(text) => {
                let inner: Value = serde_json::from_str(&text)
                    .map_err(|e| Error::Parse(format!("invalid encoded JSON: {}", e)))?;
                match inner {
                    Value::Object(map) => Ok(map),
                    other => Err(Error::Parse(format!(
                        "encoded JSON is {}, not an object",
                        json_kind(&other)
                    ))),
                }
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Validated contents of a legacy `ratings` blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacyRatings {
    values: BTreeMap<LegacyField, f64>,
    /// Keys that were present but dropped (unknown name or non-numeric value).
    dropped: Vec<String>,
}

impl LegacyRatings {
    /// Decode the raw text of a `ratings` column (json, jsonb, or text).
    pub fn decode_text(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::Parse(format!("invalid JSON: {}", e)))?;
        Self::decode(value)
    }

    /// Decode an already-parsed value, tolerating one level of string encoding.
    pub fn decode(value: Value) -> Result<Self> {
        let object = LegacyBlob::classify(value)?.into_object()?;
        let mut ratings = LegacyRatings::default();

        for (key, value) in object {
            let Some(field) = LegacyField::from_key(&key) else {
                ratings.dropped.push(key);
                continue;
            };
            match value {
                Value::Null => {}
                Value::Number(n) => match n.as_f64() {
                    Some(v) if v.is_finite() => {
                        ratings.values.insert(field, v);
                    }
                    _ => ratings.dropped.push(key),
                },
                _ => ratings.dropped.push(key),
            }
        }

        Ok(ratings)
    }

    /// Rebuild from axis values read back from the normalized tables.
    /// Codes without a legacy field are ignored.
    pub fn from_axis_values(values: &AxisValues) -> Self {
        let mut ratings = LegacyRatings::default();
        for (code, &value) in values {
            match LegacyField::from_axis_code(code) {
                Some(field) => {
                    ratings.values.insert(field, value);
                }
                None => ratings.dropped.push(code.clone()),
            }
        }
        ratings
    }

    pub fn get(&self, field: LegacyField) -> Option<f64> {
        self.values.get(&field).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// Present fields in field order.
    pub fn iter(&self) -> impl Iterator<Item = (LegacyField, f64)> + '_ {
        self.values.iter().map(|(f, v)| (*f, *v))
    }

    /// Present fields keyed by their default-schema axis code.
    pub fn axis_values(&self) -> AxisValues {
        self.iter()
            .map(|(field, value)| (field.axis_code().to_string(), value))
            .collect()
    }

    /// Legacy JSON object. Integral values are emitted as JSON integers so a
    /// blob like `{"richness":4}` reproduces exactly.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .iter()
            .map(|(field, value)| (field.key().to_string(), number_value(value)))
            .collect();
        Value::Object(map)
    }
}

fn number_value(value: f64) -> Value {
    // 2^53: largest range where every integer is exactly representable
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_object() {
        let ratings = LegacyRatings::decode(json!({
            "richness": 4, "strength": 3, "smoothness": 5, "clarity": 4, "complexity": 4
        }))
        .unwrap();
        assert_eq!(ratings.len(), 5);
        assert_eq!(ratings.get(LegacyField::Smoothness), Some(5.0));
        assert!(ratings.dropped().is_empty());
    }

    #[test]
    fn test_decode_encoded_string() {
        let stored = json!("{\"richness\":2,\"clarity\":3.5}");
        let ratings = LegacyRatings::decode(stored).unwrap();
        assert_eq!(ratings.get(LegacyField::Richness), Some(2.0));
        assert_eq!(ratings.get(LegacyField::Clarity), Some(3.5));
        assert_eq!(ratings.get(LegacyField::Strength), None);
    }

    #[test]
    fn test_decode_text_of_jsonb_string_column() {
        // ::text of a jsonb string value keeps the outer quotes
        let text = r#""{\"strength\":1}""#;
        let ratings = LegacyRatings::decode_text(text).unwrap();
        assert_eq!(ratings.get(LegacyField::Strength), Some(1.0));
    }

    #[test]
    fn test_decode_malformed_is_parse_error() {
        assert!(matches!(
            LegacyRatings::decode(json!("{invalid json")),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            LegacyRatings::decode_text("{invalid json"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            LegacyRatings::decode(json!([1, 2, 3])),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            LegacyRatings::decode(json!("\"nested\"")),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_null_and_non_numeric_fields() {
        let ratings = LegacyRatings::decode(json!({
            "richness": null,
            "strength": "4",
            "clarity": 2,
            "aroma": 5
        }))
        .unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings.get(LegacyField::Clarity), Some(2.0));
        assert_eq!(ratings.get(LegacyField::Richness), None);
        let mut dropped = ratings.dropped().to_vec();
        dropped.sort();
        assert_eq!(dropped, vec!["aroma".to_string(), "strength".to_string()]);
    }

    #[test]
    fn test_axis_values_are_uppercased() {
        let ratings = LegacyRatings::decode(json!({"richness": 4, "complexity": 1})).unwrap();
        let values = ratings.axis_values();
        assert_eq!(values.get("RICHNESS"), Some(&4.0));
        assert_eq!(values.get("COMPLEXITY"), Some(&1.0));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_reconstitution_reproduces_original() {
        let original = json!({"richness": 4, "strength": 3, "clarity": 4.5});
        let decoded = LegacyRatings::decode(original.clone()).unwrap();
        let rebuilt = LegacyRatings::from_axis_values(&decoded.axis_values());
        assert_eq!(rebuilt.to_json(), original);
    }

    #[test]
    fn test_from_axis_values_ignores_foreign_codes() {
        let values = AxisValues::from([("RICHNESS".to_string(), 3.0), ("AROMA".to_string(), 2.0)]);
        let ratings = LegacyRatings::from_axis_values(&values);
        assert_eq!(ratings.to_json(), json!({"richness": 3}));
        assert_eq!(ratings.dropped(), &["AROMA".to_string()]);
    }

    #[test]
    fn test_field_lookup() {
        assert_eq!(LegacyField::from_key("clarity"), Some(LegacyField::Clarity));
        assert_eq!(LegacyField::from_key("CLARITY"), None);
        assert_eq!(
            LegacyField::from_axis_code("smoothness"),
            Some(LegacyField::Smoothness)
        );
        assert_eq!(LegacyField::Strength.to_string(), "strength");
    }
}
