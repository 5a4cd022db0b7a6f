use std::sync::Arc;

use serde::ser::{Serialize, SerializeStruct, Serializer};

use super::row::{DataColumn, DataRow, Schema};
use crate::error::DacError;
use crate::types::RowValues;

/// A single materialized result set: ordered columns and ordered rows.
///
/// Every row holds exactly one value per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    name: String,
    schema: Arc<Schema>,
    rows: Vec<DataRow>,
}

impl DataTable {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_columns(name: impl Into<String>, columns: Vec<DataColumn>) -> Self {
        Self {
            name: name.into(),
            schema: Arc::new(Schema::new(columns)),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn columns(&self) -> &[DataColumn] {
        &self.schema.columns
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.schema.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Ordinal of the named column.
    #[must_use]
    pub fn column_ordinal(&self, name: &str) -> Option<usize> {
        self.schema.position(name)
    }

    #[must_use]
    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&DataRow> {
        self.rows.get(index)
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the table holds no rows. A table may have columns and still be empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn has_schema(&self) -> bool {
        !self.schema.columns.is_empty()
    }

    /// Shortcut for `row(row)?.get(column)`.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&RowValues> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Append a row of values.
    ///
    /// # Errors
    ///
    /// Returns `DacError::Generic` when the number of values differs from the column count.
    pub fn push_row(&mut self, values: Vec<RowValues>) -> Result<(), DacError> {
        if values.len() != self.schema.columns.len() {
            return Err(DacError::generic(format!(
                "row has {} values but table `{}` has {} columns",
                values.len(),
                self.name,
                self.schema.columns.len()
            )));
        }
        self.rows.push(DataRow::new(Arc::clone(&self.schema), values));
        Ok(())
    }

    /// Remove all rows, keeping the columns.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Merge `other` into this table.
    ///
    /// A table without columns adopts the columns of `other`; otherwise both tables must
    /// have the same column names in the same order, and the rows of `other` are appended.
    ///
    /// # Errors
    ///
    /// Returns `DacError::Generic` when the column sets differ.
    pub fn append(&mut self, other: DataTable) -> Result<(), DacError> {
        if !self.has_schema() && self.rows.is_empty() {
            self.schema = other.schema;
            self.rows = other.rows;
            return Ok(());
        }
        if !self.schema.same_shape(&other.schema) {
            return Err(DacError::generic(format!(
                "cannot fill table `{}`: columns {:?} do not match {:?}",
                self.name,
                self.column_names(),
                other.column_names()
            )));
        }
        self.rows.reserve(other.rows.len());
        for row in other.rows {
            self.rows
                .push(DataRow::new(Arc::clone(&self.schema), row.into_values()));
        }
        Ok(())
    }
}

impl Serialize for DataTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DataTable", 3)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("columns", &self.schema.columns)?;
        state.serialize_field("rows", &self.rows)?;
        state.end()
    }
}
