//! Target schema types: field types, field specs, and table specs.
//!
//! The default registry mirrors the three tables loaded into the
//! `resq_data` dataset. Field names are always stored lowercase.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LoadError;

/// Target primitive type of a field, spelled the way BigQuery spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Integer,
    Float,
    Boolean,
    String,
    Timestamp,
}

impl FieldType {
    /// BigQuery legacy type name (used in load job schemas).
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Integer => "INTEGER",
            FieldType::Float => "FLOAT",
            FieldType::Boolean => "BOOLEAN",
            FieldType::String => "STRING",
            FieldType::Timestamp => "TIMESTAMP",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "INTEGER" | "INT64" => Ok(FieldType::Integer),
            "FLOAT" | "FLOAT64" => Ok(FieldType::Float),
            "BOOLEAN" | "BOOL" => Ok(FieldType::Boolean),
            "STRING" => Ok(FieldType::String),
            "TIMESTAMP" => Ok(FieldType::Timestamp),
            other => Err(LoadError::Config(format!("unknown field type '{}'", other))),
        }
    }
}

/// A single target column: lowercase name plus target type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldSpec {
    /// Create a field spec; the name is lowercased.
    pub fn new(name: impl AsRef<str>, field_type: FieldType) -> Self {
        Self {
            name: name.as_ref().to_lowercase(),
            field_type,
        }
    }
}

/// A source table and the ordered schema it is loaded with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Look up a field by name, ignoring case.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// The built-in table registry: `orders`, `providers`, `users`.
pub fn default_tables() -> Vec<TableSpec> {
    use FieldType::*;

    vec![
        TableSpec::new(
            "orders",
            vec![
                FieldSpec::new("id", Integer),
                FieldSpec::new("createdat", Timestamp),
                FieldSpec::new("userid", Integer),
                FieldSpec::new("quantity", Integer),
                FieldSpec::new("refunded", Boolean),
                FieldSpec::new("currency", String),
                FieldSpec::new("sales", Float),
                FieldSpec::new("providerid", Integer),
            ],
        ),
        TableSpec::new(
            "providers",
            vec![
                FieldSpec::new("id", Integer),
                FieldSpec::new("defaultoffertype", String),
                FieldSpec::new("country", String),
                FieldSpec::new("registereddate", Timestamp),
            ],
        ),
        TableSpec::new(
            "users",
            vec![
                FieldSpec::new("id", Integer),
                FieldSpec::new("country", String),
                FieldSpec::new("registereddate", Timestamp),
            ],
        ),
    ]
}
