//! Closed value model for the free-form part of a telemetry event.

use serde::{Deserialize, Deserializer};
use serde_json::Number;

/// A decoded JSON value.
///
/// Object members are kept as an ordered list of pairs in source order;
/// nothing in the pipeline ever sorts them. Numbers keep the digits they
/// were written with.
#[derive(Debug, Clone, PartialEq)]
pub enum GenericValue {
    Object(Vec<(String, GenericValue)>),
    Array(Vec<GenericValue>),
    Number(Number),
    String(String),
    Boolean(bool),
    Null,
}

impl GenericValue {
    /// Parse strict JSON text.
    pub fn from_json_text(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GenericValue::Object(_) => "object",
            GenericValue::Array(_) => "array",
            GenericValue::Number(_) => "number",
            GenericValue::String(_) => "string",
            GenericValue::Boolean(_) => "boolean",
            GenericValue::Null => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, GenericValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GenericValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up an object member by name (first match).
    pub fn get(&self, key: &str) -> Option<&GenericValue> {
        match self {
            GenericValue::Object(members) => members
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    /// Canonical text of a scalar, or `None` for containers.
    ///
    /// Null has empty text; numbers keep their source text; booleans are
    /// lower-case.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            GenericValue::Number(n) => Some(n.to_string()),
            GenericValue::String(s) => Some(s.clone()),
            GenericValue::Boolean(b) => Some(b.to_string()),
            GenericValue::Null => Some(String::new()),
            GenericValue::Object(_) | GenericValue::Array(_) => None,
        }
    }

    /// Convert back to a `serde_json::Value`. Duplicate members collapse to
    /// the last one.
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            GenericValue::Object(members) => Value::Object(
                members
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect(),
            ),
            GenericValue::Array(items) => {
                Value::Array(items.iter().map(GenericValue::to_json_value).collect())
            }
            GenericValue::Number(n) => Value::Number(n.clone()),
            GenericValue::String(s) => Value::String(s.clone()),
            GenericValue::Boolean(b) => Value::Bool(*b),
            GenericValue::Null => Value::Null,
        }
    }
}

impl From<serde_json::Value> for GenericValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Object(map) => GenericValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, GenericValue::from(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                GenericValue::Array(items.into_iter().map(GenericValue::from).collect())
            }
            Value::Number(n) => GenericValue::Number(n),
            Value::String(s) => GenericValue::String(s),
            Value::Bool(b) => GenericValue::Boolean(b),
            Value::Null => GenericValue::Null,
        }
    }
}

impl From<&str> for GenericValue {
    fn from(s: &str) -> Self {
        GenericValue::String(s.to_string())
    }
}

impl From<i64> for GenericValue {
    fn from(n: i64) -> Self {
        GenericValue::Number(n.into())
    }
}

impl From<bool> for GenericValue {
    fn from(b: bool) -> Self {
        GenericValue::Boolean(b)
    }
}

/// Decodes through `serde_json::Value`, which keeps member order and the
/// exact source text of numbers. A repeated member keeps its first position
/// and its last value.
impl<'de> Deserialize<'de> for GenericValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(GenericValue::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_member_order() {
        let value = GenericValue::from_json_text(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let GenericValue::Object(members) = value else {
            panic!("expected object");
        };
        let names: Vec<&str> = members.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn repeated_member_keeps_first_position() {
        let value = GenericValue::from_json_text(r#"{"a": 1, "b": 2, "a": 3}"#).unwrap();
        assert_eq!(
            value,
            GenericValue::Object(vec![
                ("a".to_string(), GenericValue::from(3i64)),
                ("b".to_string(), GenericValue::from(2i64)),
            ])
        );
    }

    #[test]
    fn numbers_keep_source_text() {
        for text in ["123456789012345678901234567890", "1e2", "1e400", "-0.000", "2.50"] {
            let value = GenericValue::from_json_text(text).unwrap();
            assert_eq!(value.scalar_text().as_deref(), Some(text));
        }
    }

    #[test]
    fn parse_every_kind() {
        let value =
            GenericValue::from_json_text(r#"[{}, [], 1.5, "s", true, null]"#).unwrap();
        let GenericValue::Array(items) = value else {
            panic!("expected array");
        };
        let kinds: Vec<&str> = items.iter().map(GenericValue::kind).collect();
        assert_eq!(
            kinds,
            vec!["object", "array", "number", "string", "boolean", "null"]
        );
    }

    #[test]
    fn scalar_text_forms() {
        assert_eq!(GenericValue::from(3i64).scalar_text().as_deref(), Some("3"));
        assert_eq!(
            GenericValue::from_json_text("2.50").unwrap().scalar_text().as_deref(),
            Some("2.50")
        );
        assert_eq!(GenericValue::from(false).scalar_text().as_deref(), Some("false"));
        assert_eq!(GenericValue::Null.scalar_text().as_deref(), Some(""));
        assert_eq!(GenericValue::Array(vec![]).scalar_text(), None);
    }

    #[test]
    fn to_json_value_keeps_order() {
        let value = GenericValue::from_json_text(r#"{"b": [1, "x"], "a": null}"#).unwrap();
        assert_eq!(value.to_json_value().to_string(), r#"{"b":[1,"x"],"a":null}"#);
    }

    #[test]
    fn get_member() {
        let value = GenericValue::from_json_text(r#"{"a": {"b": "c"}}"#).unwrap();
        assert_eq!(
            value.get("a").and_then(|a| a.get("b")).and_then(GenericValue::as_str),
            Some("c")
        );
        assert!(value.get("missing").is_none());
    }

    #[test]
    fn from_json_value() {
        let value = GenericValue::from(serde_json::json!({"n": 1, "list": [true, null]}));
        assert_eq!(
            value,
            GenericValue::Object(vec![
                ("n".to_string(), GenericValue::from(1i64)),
                (
                    "list".to_string(),
                    GenericValue::Array(vec![GenericValue::Boolean(true), GenericValue::Null])
                ),
            ])
        );
    }
}
