use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A typed field value as declared in reference data or read back from a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Only produced by stores; declarations cannot carry raw bytes.
    #[serde(skip_deserializing)]
    Blob(Vec<u8>),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Value::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Field name → value mapping for one declared record.
///
/// Iteration follows declaration order. Overwriting a field keeps its place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldValues(IndexMap<String, Value>);

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FieldValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_values_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            values: FieldValues,
        }
        let doc: Doc = toml::from_str(
            r#"values = { code = "10", beds = 12, ratio = 0.5, active = true }"#,
        )
        .unwrap();
        assert_eq!(doc.values.get("code"), Some(&Value::Text("10".into())));
        assert_eq!(doc.values.get("beds"), Some(&Value::Int(12)));
        assert_eq!(doc.values.get("ratio"), Some(&Value::Float(0.5)));
        assert_eq!(doc.values.get("active"), Some(&Value::Bool(true)));
    }

    #[test]
    fn json_null_is_null() {
        let v: Value = serde_json::from_str("null").unwrap();
        assert!(v.is_null());
    }

    #[test]
    fn display_quotes_text() {
        assert_eq!(Value::from("10A").to_string(), "\"10A\"");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::from(None::<i64>).to_string(), "null");
    }

    #[test]
    fn field_values_keep_declaration_order() {
        let mut values = FieldValues::new().with("name", "Clinic A").with("code", "10");
        values.insert("name", "Clinic B");
        let names: Vec<_> = values.field_names().collect();
        assert_eq!(names, vec!["name", "code"]);
        assert_eq!(values.get("name"), Some(&Value::from("Clinic B")));
    }

    #[test]
    fn toml_tables_keep_document_order() {
        #[derive(Deserialize)]
        struct Doc {
            values: FieldValues,
        }
        let doc: Doc = toml::from_str(r#"values = { zone = "N", code = "10", beds = 3 }"#).unwrap();
        let names: Vec<_> = doc.values.field_names().collect();
        assert_eq!(names, vec!["zone", "code", "beds"]);
    }
}
