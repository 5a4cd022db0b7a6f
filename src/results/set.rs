use serde::Serialize;

use super::table::DataTable;

/// Ordered collection of tables, one per result set.
///
/// Tables added without a unique name are called `Table`, `Table1`, `Table2`, and so on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSet {
    name: String,
    tables: Vec<DataTable>,
}

impl Default for DataSet {
    fn default() -> Self {
        Self::new("NewDataSet")
    }
}

impl DataSet {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn tables(&self) -> &[DataTable] {
        &self.tables
    }

    #[must_use]
    pub fn table(&self, index: usize) -> Option<&DataTable> {
        self.tables.get(index)
    }

    #[must_use]
    pub fn table_by_name(&self, name: &str) -> Option<&DataTable> {
        self.tables.iter().find(|t| t.name() == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DataTable> {
        self.tables.iter()
    }

    #[must_use]
    pub fn into_tables(self) -> Vec<DataTable> {
        self.tables
    }

    /// Append a table, renaming it when its name is empty or already taken.
    pub fn push_table(&mut self, mut table: DataTable) {
        if table.name().is_empty() || self.table_by_name(table.name()).is_some() {
            table.set_name(self.next_table_name());
        }
        self.tables.push(table);
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }

    fn next_table_name(&self) -> String {
        let mut n = self.tables.len();
        loop {
            let candidate = if n == 0 {
                "Table".to_string()
            } else {
                format!("Table{n}")
            };
            if self.table_by_name(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}

impl<'a> IntoIterator for &'a DataSet {
    type Item = &'a DataTable;
    type IntoIter = std::slice::Iter<'a, DataTable>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}
