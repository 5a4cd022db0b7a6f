use std::any::{Any, type_name};

use crate::command::RowWindow;
use crate::error::{DacError, DriverError};
use crate::results::{DataColumn, DataSet, DataTable};
use crate::types::RowValues;

/// What the caller will do with the result sets of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultShape {
    /// Only the number of affected rows is needed.
    NonQuery,
    /// Only the first column of the first row is needed.
    Scalar,
    /// Only the first result set is kept; later statements still execute.
    Table,
    /// Every result set is kept.
    Set,
}

impl ResultShape {
    /// Which rows of the result set at `index` should be materialized.
    #[must_use]
    pub fn retain_for(self, window: RowWindow, index: usize) -> Retain {
        match (self, index) {
            (ResultShape::Scalar, 0) => Retain::Rows(RowWindow::new(0, 1)),
            (ResultShape::Table, 0) | (ResultShape::Set, _) => Retain::Rows(window),
            _ => Retain::HeadOnly,
        }
    }
}

/// Row retention for one result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retain {
    /// Keep the rows admitted by the window.
    Rows(RowWindow),
    /// Keep no rows; the set is only read far enough to capture its head row.
    HeadOnly,
}

/// Accumulates one result set as a driver walks its rows.
///
/// The driver reads the column metadata once, then offers each row in order. The collector
/// decides whether the row's values are needed and reports when reading can stop:
///
/// ```rust
/// use sql_dac::driver::{DataColumn, DriverError, Retain, ResultCollector, RowValues, RowWindow};
///
/// let columns = vec![DataColumn::new("n", 0, None)];
/// let mut collector = ResultCollector::new(columns, Retain::Rows(RowWindow::new(1, 2)), false);
/// for n in 0..10 {
///     let more = collector.offer(|| Ok::<_, DriverError>(vec![RowValues::Int(n)]))?;
///     if !more {
///         break;
///     }
/// }
/// let result = collector.finish();
/// assert_eq!(result.table.row_count(), 2);
/// # Ok::<(), DriverError>(())
/// ```
#[derive(Debug)]
pub struct ResultCollector {
    retain: Retain,
    keep_head: bool,
    seen: usize,
    table: DataTable,
    head: Option<Vec<RowValues>>,
}

impl ResultCollector {
    /// `keep_head` captures the first row regardless of the window, for output parameters.
    #[must_use]
    pub fn new(columns: Vec<DataColumn>, retain: Retain, keep_head: bool) -> Self {
        Self {
            retain,
            keep_head,
            seen: 0,
            table: DataTable::with_columns(String::new(), columns),
            head: None,
        }
    }

    /// Offer the next row. `read` is only called when the values are needed.
    ///
    /// Returns `false` once no later row can be retained.
    ///
    /// # Errors
    ///
    /// Propagates the error from `read`, or fails when the row width does not match the
    /// column count.
    pub fn offer<F>(&mut self, read: F) -> Result<bool, DriverError>
    where
        F: FnOnce() -> Result<Vec<RowValues>, DriverError>,
    {
        let index = self.seen;
        self.seen += 1;
        let in_window = matches!(self.retain, Retain::Rows(window) if window.admits(index));
        let want_head = self.keep_head && index == 0;
        if in_window || want_head {
            let values = read()?;
            if want_head {
                self.head = Some(values.clone());
            }
            if in_window {
                self.table
                    .push_row(values)
                    .map_err(|e| DriverError::ExecutionError(e.to_string()))?;
            }
        }
        Ok(!self.is_saturated())
    }

    fn is_saturated(&self) -> bool {
        if self.keep_head && self.seen == 0 {
            return false;
        }
        match self.retain {
            Retain::Rows(window) => window.exhausted_at(self.seen),
            Retain::HeadOnly => true,
        }
    }

    #[must_use]
    pub fn finish(self) -> CollectedResult {
        CollectedResult {
            table: self.table,
            head: self.head,
        }
    }
}

/// One materialized result set plus its unwindowed first row, when requested.
#[derive(Debug, Clone, Default)]
pub struct CollectedResult {
    pub table: DataTable,
    pub head: Option<Vec<RowValues>>,
}

impl CollectedResult {
    /// `(column, value)` pairs of the head row.
    pub fn head_pairs(&self) -> impl Iterator<Item = (&str, &RowValues)> + Clone {
        self.table
            .columns()
            .iter()
            .map(|c| c.name.as_str())
            .zip(self.head.iter().flatten())
    }
}

/// A caller-supplied container resolved at runtime.
pub(crate) enum FillTarget<'a> {
    Table(&'a mut DataTable),
    Set(&'a mut DataSet),
}

impl<'a> FillTarget<'a> {
    /// Resolve `target` to a table or a set.
    pub(crate) fn resolve<T: Any>(target: &'a mut T) -> Result<Self, DacError> {
        let any = target as &mut dyn Any;
        if any.is::<DataTable>() {
            return any
                .downcast_mut::<DataTable>()
                .map(FillTarget::Table)
                .ok_or_else(|| DacError::invalid_fill_type(type_name::<T>()));
        }
        any.downcast_mut::<DataSet>()
            .map(FillTarget::Set)
            .ok_or_else(|| DacError::invalid_fill_type(type_name::<T>()))
    }

    pub(crate) fn shape(&self) -> ResultShape {
        match self {
            FillTarget::Table(_) => ResultShape::Table,
            FillTarget::Set(_) => ResultShape::Set,
        }
    }

    pub(crate) fn fill(self, tables: Vec<DataTable>) -> Result<(), DacError> {
        match self {
            FillTarget::Table(target) => fill_table(target, tables),
            FillTarget::Set(target) => {
                fill_set(target, tables);
                Ok(())
            }
        }
    }
}

/// Name the materialized tables and wrap them in a set.
pub(crate) fn into_set(tables: Vec<DataTable>) -> DataSet {
    let mut set = DataSet::default();
    fill_set(&mut set, tables);
    set
}

/// The first result set, named `Table`.
pub(crate) fn first_table(tables: Vec<DataTable>) -> Result<DataTable, DacError> {
    let mut table = tables
        .into_iter()
        .next()
        .ok_or_else(|| DacError::generic("command produced no result set to fill a table"))?;
    table.set_name("Table");
    Ok(table)
}

pub(crate) fn fill_table(target: &mut DataTable, tables: Vec<DataTable>) -> Result<(), DacError> {
    let first = first_table(tables)?;
    if target.name().is_empty() {
        target.set_name(first.name());
    }
    target.append(first)
}

pub(crate) fn fill_set(target: &mut DataSet, tables: Vec<DataTable>) {
    for mut table in tables {
        table.set_name(String::new());
        target.push_table(table);
    }
}

/// First column of the first row of the first result set.
pub(crate) fn scalar(tables: &[DataTable]) -> RowValues {
    tables
        .first()
        .and_then(|t| t.row(0))
        .and_then(|r| r.get_by_index(0))
        .cloned()
        .unwrap_or(RowValues::Null)
}
