//! Load-file encoding: remote schema derivation and newline-delimited JSON.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::core::{FieldSpec, FieldType, RowSet, Value};

/// One entry of a load job's `schema.fields`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub mode: &'static str,
}

impl SchemaField {
    fn nullable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: "NULLABLE",
        }
    }
}

/// Remote schema for a load: the declared fields in order, followed by any
/// row-set columns they don't name, typed from their values.
///
/// A pass-through column whose non-null values disagree on type, or that is
/// entirely null, is loaded as STRING.
pub fn load_schema(rows: &RowSet, declared: &[FieldSpec]) -> Vec<SchemaField> {
    let mut fields: Vec<SchemaField> = declared
        .iter()
        .map(|f| SchemaField::nullable(f.name.clone(), f.field_type))
        .collect();

    for (idx, col) in rows.columns().iter().enumerate() {
        if fields.iter().any(|f| f.name.eq_ignore_ascii_case(col)) {
            continue;
        }
        let mut inferred: Option<FieldType> = None;
        let mut mixed = false;
        for t in rows.column_values(idx).filter_map(Value::inferred_type) {
            match inferred {
                None => inferred = Some(t),
                Some(prev) if prev != t => {
                    mixed = true;
                    break;
                }
                Some(_) => {}
            }
        }
        let field_type = match inferred {
            Some(t) if !mixed => t,
            _ => FieldType::String,
        };
        fields.push(SchemaField::nullable(col.clone(), field_type));
    }

    fields
}

/// Encode one cell for a column of `field_type`.
///
/// STRING columns receive the textual rendering of whatever the source
/// stored, since SQLite does not enforce column types.
pub fn encode_cell(value: &Value, field_type: FieldType) -> JsonValue {
    match (field_type, value) {
        (_, Value::Null) => JsonValue::Null,
        (FieldType::String, Value::Integer(i)) => JsonValue::String(i.to_string()),
        (FieldType::String, Value::Float(f)) => JsonValue::String(f.to_string()),
        (FieldType::String, Value::Boolean(b)) => JsonValue::String(b.to_string()),
        _ => value.to_json(),
    }
}

/// Render a row set as newline-delimited JSON objects keyed by column name.
///
/// When several columns share a name, the first one wins.
pub fn to_ndjson(rows: &RowSet, schema: &[SchemaField]) -> Vec<u8> {
    let column_types: Vec<FieldType> = rows
        .columns()
        .iter()
        .map(|col| {
            schema
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(col))
                .map(|f| f.field_type)
                .unwrap_or(FieldType::String)
        })
        .collect();

    let mut out = Vec::new();
    for row in rows.rows() {
        let mut obj = Map::with_capacity(row.len());
        for ((col, value), field_type) in rows.columns().iter().zip(row).zip(&column_types) {
            if !obj.contains_key(col) {
                obj.insert(col.clone(), encode_cell(value, *field_type));
            }
        }
        // A Map of JSON values always serializes.
        if let Ok(line) = serde_json::to_vec(&obj) {
            out.extend_from_slice(&line);
            out.push(b'\n');
        }
    }
    out
}
