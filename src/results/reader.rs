use super::row::{DataColumn, DataRow};
use super::table::DataTable;
use crate::types::RowValues;

/// Forward-only reader over the result sets of one command.
///
/// The reader starts positioned before the first row of the first result set. Call
/// [`DataReader::read`] to advance row by row and [`DataReader::next_result`] to move to the
/// following result set.
///
/// ```rust
/// use sql_dac::prelude::*;
///
/// let mut reader = DataReader::default();
/// assert!(!reader.read());
/// assert!(!reader.next_result());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DataReader {
    results: std::vec::IntoIter<DataTable>,
    current: Option<DataTable>,
    position: Option<usize>,
    records_affected: u64,
}

impl DataReader {
    #[must_use]
    pub fn new(results: Vec<DataTable>, records_affected: u64) -> Self {
        let mut results = results.into_iter();
        let current = results.next();
        Self {
            results,
            current,
            position: None,
            records_affected,
        }
    }

    /// Advance to the next row of the current result set.
    pub fn read(&mut self) -> bool {
        let Some(table) = &self.current else {
            return false;
        };
        let next = self.position.map_or(0, |p| p + 1);
        if next < table.row_count() {
            self.position = Some(next);
            true
        } else {
            self.position = Some(table.row_count());
            false
        }
    }

    /// Advance to the next result set, discarding unread rows of the current one.
    pub fn next_result(&mut self) -> bool {
        self.current = self.results.next();
        self.position = None;
        self.current.is_some()
    }

    /// Rows changed by the statements of the command.
    #[must_use]
    pub fn records_affected(&self) -> u64 {
        self.records_affected
    }

    #[must_use]
    pub fn has_rows(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.is_empty())
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.current.as_ref().map_or(0, |t| t.columns().len())
    }

    #[must_use]
    pub fn columns(&self) -> &[DataColumn] {
        match &self.current {
            Some(table) => table.columns(),
            None => &[],
        }
    }

    #[must_use]
    pub fn name(&self, ordinal: usize) -> Option<&str> {
        self.columns().get(ordinal).map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.current.as_ref().and_then(|t| t.column_ordinal(name))
    }

    /// The row the reader is positioned on, if any.
    #[must_use]
    pub fn current_row(&self) -> Option<&DataRow> {
        let table = self.current.as_ref()?;
        table.row(self.position?)
    }

    #[must_use]
    pub fn get(&self, ordinal: usize) -> Option<&RowValues> {
        self.current_row()?.get_by_index(ordinal)
    }

    #[must_use]
    pub fn get_by_name(&self, name: &str) -> Option<&RowValues> {
        self.current_row()?.get(name)
    }

    /// True when the current row holds NULL at `ordinal`, or there is no such value.
    #[must_use]
    pub fn is_null(&self, ordinal: usize) -> bool {
        self.get(ordinal).is_none_or(RowValues::is_null)
    }
}
