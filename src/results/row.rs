use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::{Serialize, Serializer};

use crate::types::RowValues;

/// Column metadata read once per result set.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DataColumn {
    pub name: String,
    /// Zero-based position in the result set.
    pub ordinal: usize,
    /// Type declared by the database, when the driver reports one.
    pub declared_type: Option<String>,
}

impl DataColumn {
    #[must_use]
    pub fn new(name: impl Into<String>, ordinal: usize, declared_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            ordinal,
            declared_type,
        }
    }
}

/// Columns shared by every row of a table, with a name lookup cache.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Schema {
    pub(crate) columns: Vec<DataColumn>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub(crate) fn new(columns: Vec<DataColumn>) -> Self {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            // first column wins when a result set repeats a name
            index.entry(col.name.clone()).or_insert(i);
        }
        Self { columns, index }
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        if let Some(&idx) = self.index.get(name) {
            return Some(idx);
        }
        self.columns
            .iter()
            .position(|col| col.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn same_shape(&self, other: &Schema) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.name.eq_ignore_ascii_case(&b.name))
    }
}

/// One materialized row.
///
/// Column names are shared with the owning table, so rows stay cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub(crate) schema: Arc<Schema>,
    values: Vec<RowValues>,
}

impl DataRow {
    pub(crate) fn new(schema: Arc<Schema>, values: Vec<RowValues>) -> Self {
        Self { schema, values }
    }

    /// Get a value by column name. Exact matches are preferred over case-insensitive ones.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.schema
            .position(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(column name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> + Clone {
        self.schema
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .zip(self.values.iter())
    }
}

impl Serialize for DataRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.values)
    }
}
