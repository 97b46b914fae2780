//! Cell values carried between the SQLite reader and the BigQuery writer.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;

use super::schema::FieldType;

/// A single cell.
///
/// The reader produces the SQLite storage classes (`Null`, `Integer`,
/// `Float`, `Text`, `Bytes`); coercion may additionally produce `Boolean`
/// and `Timestamp`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl Value {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Target type a pass-through column of this value would be loaded as.
    ///
    /// Returns `None` for `Null`. Bytes are loaded as STRING.
    #[must_use]
    pub fn inferred_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(FieldType::Integer),
            Value::Float(_) => Some(FieldType::Float),
            Value::Boolean(_) => Some(FieldType::Boolean),
            Value::Text(_) | Value::Bytes(_) => Some(FieldType::String),
            Value::Timestamp(_) => Some(FieldType::Timestamp),
        }
    }

    /// Encode for a newline-delimited JSON load file.
    ///
    /// Integers are sent as strings so values above 2^53 survive JSON
    /// number parsing on the server side. Non-finite floats become null.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Integer(v) => JsonValue::String(v.to_string()),
            Value::Float(v) if v.is_finite() => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Float(_) => JsonValue::Null,
            Value::Boolean(v) => JsonValue::Bool(*v),
            Value::Text(v) => JsonValue::String(v.clone()),
            Value::Bytes(v) => JsonValue::String(String::from_utf8_lossy(v).into_owned()),
            Value::Timestamp(v) => {
                JsonValue::String(v.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_json_encoding() {
        assert_eq!(Value::Null.to_json(), JsonValue::Null);
        assert_eq!(Value::Integer(9_007_199_254_740_993).to_json(), json!("9007199254740993"));
        assert_eq!(Value::Float(12.5).to_json(), json!(12.5));
        assert_eq!(Value::Float(f64::NAN).to_json(), JsonValue::Null);
        assert_eq!(Value::Boolean(true).to_json(), json!(true));
        assert_eq!(Value::from("EUR").to_json(), json!("EUR"));
    }

    #[test]
    fn test_timestamp_json_is_utc_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2023, 4, 5, 6, 7, 8).unwrap();
        assert_eq!(Value::Timestamp(ts).to_json(), json!("2023-04-05T06:07:08.000000Z"));
    }

    #[test]
    fn test_option_into_value() {
        let v: Value = Option::<i64>::None.into();
        assert!(v.is_null());
        let v: Value = Some(3i64).into();
        assert_eq!(v, Value::Integer(3));
    }

    #[test]
    fn test_inferred_type() {
        assert_eq!(Value::Null.inferred_type(), None);
        assert_eq!(Value::Integer(1).inferred_type(), Some(FieldType::Integer));
        assert_eq!(Value::Bytes(vec![1]).inferred_type(), Some(FieldType::String));
    }
}
