//! Named-column in-memory row buffer.

use crate::error::{LoadError, Result};

use super::value::Value;

/// Rows × named columns, materialized from one source table.
///
/// Every row has exactly `columns.len()` cells; [`RowSet::push_row`]
/// enforces this.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a row set from columns and rows, checking row arity.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut set = Self::new(columns);
        for row in rows {
            set.push_row(row)?;
        }
        Ok(set)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(LoadError::RowSet(format!(
                "row has {} values but row set has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column with exactly this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Indexes of every column with exactly this name.
    ///
    /// SQLite allows result sets with repeated names, and lowercasing can
    /// make distinct names collide.
    pub fn column_indexes(&self, name: &str) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_str() == name)
            .map(|(i, _)| i)
            .collect()
    }

    /// Iterate over the values of one column.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |row| &row[idx])
    }

    /// Replace every value of one column in place.
    pub fn map_column<F>(&mut self, idx: usize, mut f: F)
    where
        F: FnMut(Value) -> Value,
    {
        for row in &mut self.rows {
            let old = std::mem::replace(&mut row[idx], Value::Null);
            row[idx] = f(old);
        }
    }

    /// Lowercase every column name.
    pub fn lowercase_columns(&mut self) {
        for col in &mut self.columns {
            *col = col.to_lowercase();
        }
    }
}
